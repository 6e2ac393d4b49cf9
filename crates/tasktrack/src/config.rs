//! Project configuration file support for tasktrack.
//!
//! Loads configuration from `tasktrack.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tasktrack_git::DEFAULT_COMMAND_TIMEOUT;
use tasktrack_logging::LogFormat;

/// Project-level configuration loaded from `tasktrack.toml`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProjectConfig {
    /// Ceiling for each git subprocess, e.g. `"30s"` or `"2m"`
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    /// Patch byte ceiling for diffs
    pub max_patch_bytes: Option<usize>,
    /// Report untracked files in diffs
    pub include_untracked: bool,
    /// Extra directory names skipped when fingerprinting a plain directory
    pub skip_dirs: Vec<String>,
    /// Where baselines are written, relative to the working directory.
    /// Unset keeps them outside the tracked tree, under the user data directory.
    pub snapshot_dir: Option<PathBuf>,
    pub log: LogConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
    /// Write rolling log files under the user data directory
    pub file: bool,
    /// Directory for rolling log files; implies `file`
    pub dir: Option<PathBuf>,
    /// Mirror tracker events as JSON lines into this file
    pub events_file: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_patch_bytes: None,
            include_untracked: false,
            skip_dirs: Vec::new(),
            snapshot_dir: None,
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            file: false,
            dir: None,
            events_file: None,
        }
    }
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "tasktrack.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Load the config, falling back to defaults when no file exists
    pub fn load_or_default(working_dir: &Path) -> Result<Self> {
        Ok(Self::load(working_dir)?.unwrap_or_default())
    }

    /// Snapshot directory resolved against the working directory
    pub fn snapshot_dir_in(&self, working_dir: &Path) -> Result<PathBuf> {
        match self.snapshot_dir {
            Some(ref dir) if dir.is_absolute() => Ok(dir.clone()),
            Some(ref dir) => Ok(working_dir.join(dir)),
            None => default_snapshot_dir(working_dir),
        }
    }
}

/// `<data dir>/tasktrack/snapshots/<key>`, where the key is derived from the
/// canonical working directory so each tracked tree gets its own baseline
pub fn default_snapshot_dir(working_dir: &Path) -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("No user data directory; set snapshot_dir in tasktrack.toml")?;

    let canonical =
        std::fs::canonicalize(working_dir).unwrap_or_else(|_| working_dir.to_path_buf());
    let digest = Sha256::digest(canonical.as_os_str().as_encoded_bytes());
    let key = hex::encode(&digest[..8]);

    Ok(data_dir.join("tasktrack").join("snapshots").join(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());

        let config = ProjectConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.command_timeout, DEFAULT_COMMAND_TIMEOUT);
        assert!(config.snapshot_dir.is_none());
        assert!(!config.include_untracked);
    }

    #[test]
    fn parses_full_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
command_timeout = "5s"
max_patch_bytes = 65536
include_untracked = true
skip_dirs = ["vendor", "dist"]
snapshot_dir = "/var/tmp/snap"

[log]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();

        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.max_patch_bytes, Some(65536));
        assert!(config.include_untracked);
        assert_eq!(config.skip_dirs, vec!["vendor", "dist"]);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(
            config.snapshot_dir_in(dir.path()).unwrap(),
            PathBuf::from("/var/tmp/snap")
        );
    }

    #[test]
    fn relative_snapshot_dir_is_joined() {
        let config = ProjectConfig {
            snapshot_dir: Some(PathBuf::from(".snapshots")),
            ..ProjectConfig::default()
        };
        assert_eq!(
            config.snapshot_dir_in(Path::new("/work")).unwrap(),
            PathBuf::from("/work/.snapshots")
        );
    }

    #[test]
    fn default_snapshot_dir_is_outside_the_tracked_tree() {
        let work = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();

        let Ok(first) = default_snapshot_dir(work.path()) else {
            return;
        };

        assert!(!first.starts_with(work.path()));
        assert_eq!(first.parent().unwrap().file_name().unwrap(), "snapshots");
        assert_eq!(first, default_snapshot_dir(work.path()).unwrap());
        assert_ne!(first, default_snapshot_dir(other.path()).unwrap());
    }

    #[test]
    fn log_table_accepts_file_settings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[log]\nfile = true\nevents_file = \"events.jsonl\"\n",
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();

        assert!(config.log.file);
        assert!(config.log.dir.is_none());
        assert_eq!(config.log.events_file, Some(PathBuf::from("events.jsonl")));
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "colour = \"red\"\n").unwrap();

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
