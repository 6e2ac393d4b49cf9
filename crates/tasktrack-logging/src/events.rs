use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured events emitted while tracking a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    TrackerStarted {
        working_dir: PathBuf,
        is_repo: bool,
    },
    StatusCaptured {
        head_commit: Option<String>,
        branch: Option<String>,
        dirty_files: usize,
        untracked_files: usize,
    },
    FingerprintComputed {
        fingerprint: String,
        is_repo: bool,
    },
    BaselineCreated {
        snapshot_dir: PathBuf,
        head_commit: Option<String>,
        dirty_files: usize,
    },
    DiffComputed {
        base: String,
        files_changed: usize,
        insertions: u64,
        deletions: u64,
        patch_included: bool,
    },
    NoDiff {
        reason: String,
    },
    ErrorEncountered {
        operation: String,
        error: String,
    },
}

impl TrackerEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Event logger - writes to stderr and optionally mirrors JSON lines to a file
pub struct EventLogger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl EventLogger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, event: &TrackerEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Some(Self::render_pretty(event)),
            LogFormat::Compact => Some(Self::render_compact(event)),
        };
        if let Some(line) = line {
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn render_pretty(event: &TrackerEvent) -> String {
        match event {
            TrackerEvent::TrackerStarted {
                working_dir,
                is_repo,
            } => format!(
                "{} {} {}",
                "▶".bright_blue(),
                "tasktrack".bold().bright_white(),
                format!(
                    "{} ({})",
                    working_dir.display(),
                    if *is_repo { "git" } else { "plain directory" }
                )
                .dimmed()
            ),
            TrackerEvent::StatusCaptured {
                head_commit,
                branch,
                dirty_files,
                untracked_files,
            } => format!(
                "  {} {} {} {}, {} dirty, {} untracked",
                "●".bright_cyan(),
                "Status:".dimmed(),
                branch.as_deref().unwrap_or("(detached)"),
                short_commit(head_commit.as_deref()),
                dirty_files,
                untracked_files
            ),
            TrackerEvent::FingerprintComputed { fingerprint, .. } => format!(
                "  {} {} {}",
                "#".bright_magenta(),
                "Fingerprint:".dimmed(),
                fingerprint
            ),
            TrackerEvent::BaselineCreated {
                snapshot_dir,
                head_commit,
                dirty_files,
            } => format!(
                "  {} Baseline at {} ({} dirty) → {}",
                "✓".bright_green(),
                short_commit(head_commit.as_deref()),
                dirty_files,
                snapshot_dir.display().to_string().dimmed()
            ),
            TrackerEvent::DiffComputed {
                files_changed,
                insertions,
                deletions,
                patch_included,
                ..
            } => {
                if *files_changed > 0 {
                    format!(
                        "  {} {} {} {}, {} {}, {} {}{}",
                        "📁".dimmed(),
                        "Diff:".dimmed(),
                        files_changed,
                        if *files_changed == 1 { "file" } else { "files" },
                        format!("+{}", insertions).green(),
                        if *insertions == 1 { "line" } else { "lines" },
                        format!("-{}", deletions).red(),
                        if *deletions == 1 { "line" } else { "lines" },
                        if *patch_included { "" } else { " (patch omitted)" }
                    )
                } else {
                    format!("  {} {}", "📁".dimmed(), "Diff: no changes".dimmed())
                }
            }
            TrackerEvent::NoDiff { reason } => {
                format!("  {} {}", "○".dimmed(), format!("No diff: {}", reason).dimmed())
            }
            TrackerEvent::ErrorEncountered { operation, error } => format!(
                "{} {} failed: {}",
                "✗".bright_red(),
                operation,
                error.bright_red()
            ),
        }
    }

    fn render_compact(event: &TrackerEvent) -> String {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        match event {
            TrackerEvent::TrackerStarted { is_repo, .. } => {
                format!("[{}] start repo={}", timestamp, is_repo)
            }
            TrackerEvent::StatusCaptured {
                dirty_files,
                untracked_files,
                ..
            } => format!(
                "[{}] status dirty={} untracked={}",
                timestamp, dirty_files, untracked_files
            ),
            TrackerEvent::FingerprintComputed { fingerprint, .. } => {
                format!("[{}] fingerprint {}", timestamp, fingerprint)
            }
            TrackerEvent::BaselineCreated { head_commit, .. } => format!(
                "[{}] baseline {}",
                timestamp,
                short_commit(head_commit.as_deref())
            ),
            TrackerEvent::DiffComputed {
                base,
                files_changed,
                insertions,
                deletions,
                ..
            } => format!(
                "[{}] diff:{} {}f +{} -{}",
                timestamp,
                short_commit(Some(base)),
                files_changed,
                insertions,
                deletions
            ),
            TrackerEvent::NoDiff { reason } => format!("[{}] nodiff {}", timestamp, reason),
            TrackerEvent::ErrorEncountered { operation, error } => {
                format!("[{}] error:{}:{}", timestamp, operation, error)
            }
        }
    }
}

fn short_commit(commit: Option<&str>) -> String {
    match commit {
        Some(id) => id.chars().take(8).collect(),
        None => "-".to_string(),
    }
}
