mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use tasktrack_git::{DiffOptions, FileStatus, StructuredDiff, WorkspaceTracker};
use tasktrack_logging::{EventLogger, LogFormat, TrackerEvent};

use crate::config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(
    name = "tasktrack",
    about = "Track a working directory's state across a task",
    version,
    author
)]
struct Cli {
    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log output format (overrides tasktrack.toml)
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatChoice>,

    /// Log level filter when RUST_LOG is unset (overrides tasktrack.toml)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show repository status
    Status,
    /// Print the fingerprint of the current state
    Fingerprint {
        /// Hash file contents even inside a git repository
        #[arg(long)]
        content: bool,
    },
    /// Record a baseline for later diffs
    Baseline {
        /// Where to write baseline.json (default: under the user data directory)
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Show changes as a structured diff
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Diff against this commit instead of HEAD
    #[arg(long, conflicts_with = "baseline")]
    since: Option<String>,

    /// Diff against the commit recorded by `tasktrack baseline`
    #[arg(long)]
    baseline: bool,

    /// Snapshot directory holding the baseline (default: under the user data directory)
    #[arg(long, requires = "baseline")]
    snapshot_dir: Option<PathBuf>,

    /// Drop the patch when it is larger than this many bytes
    #[arg(long)]
    max_size: Option<usize>,

    /// Omit the patch text
    #[arg(long)]
    no_patch: bool,

    /// Report untracked files as added
    #[arg(long)]
    include_untracked: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = ProjectConfig::load_or_default(&working_dir)?;

    let log_format: LogFormat = cli
        .log_format
        .map(Into::into)
        .unwrap_or(config.log.format);
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    let log_dir = config.log.dir.clone().or_else(|| {
        if config.log.file {
            tasktrack_logging::default_log_dir()
        } else {
            None
        }
    });
    let _guard = tasktrack_logging::init_tracing(log_level, log_format, log_dir.as_deref());

    let logger = match config.log.events_file {
        Some(ref path) => EventLogger::with_file(log_format, path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?,
        None => EventLogger::new(log_format),
    };

    let tracker = WorkspaceTracker::new(&working_dir)
        .with_command_timeout(config.command_timeout)
        .with_skip_dirs(config.skip_dirs.iter().cloned());

    logger.log(&TrackerEvent::TrackerStarted {
        working_dir: working_dir.clone(),
        is_repo: tracker.is_repository(),
    });

    let result = run(&cli, &config, &working_dir, &tracker, &logger).await;
    if let Err(ref e) = result {
        logger.log(&TrackerEvent::ErrorEncountered {
            operation: command_name(&cli.command).to_string(),
            error: format!("{:#}", e),
        });
    }
    result
}

async fn run(
    cli: &Cli,
    config: &ProjectConfig,
    working_dir: &Path,
    tracker: &WorkspaceTracker,
    logger: &EventLogger,
) -> Result<()> {
    match &cli.command {
        Command::Status => {
            let status = tracker.status().context("Failed to read repository status")?;
            logger.log(&TrackerEvent::StatusCaptured {
                head_commit: status.head_commit.clone(),
                branch: status.branch.clone(),
                dirty_files: status.dirty_files.len(),
                untracked_files: status.untracked_files.len(),
            });

            if cli.json {
                print_json(&status)?;
            } else {
                println!("repository: {}", status.is_repo);
                if let Some(ref head) = status.head_commit {
                    println!("head:       {}", head);
                }
                if let Some(ref branch) = status.branch {
                    println!("branch:     {}", branch);
                }
                for path in &status.dirty_files {
                    println!("{} {}", "M".yellow(), path);
                }
                for path in &status.untracked_files {
                    println!("{} {}", "?".dimmed(), path);
                }
            }
        }
        Command::Fingerprint { content } => {
            let fingerprint = if *content {
                tracker.fingerprint_plain_directory()
            } else {
                tracker.fingerprint()
            }
            .context("Failed to compute fingerprint")?;

            logger.log(&TrackerEvent::FingerprintComputed {
                fingerprint: fingerprint.to_string(),
                is_repo: tracker.is_repository(),
            });

            if cli.json {
                print_json(&serde_json::json!({ "fingerprint": fingerprint }))?;
            } else {
                println!("{}", fingerprint);
            }
        }
        Command::Baseline { snapshot_dir } => {
            let dir = resolve_snapshot_dir(snapshot_dir.as_deref(), config, working_dir)?;
            let record = tracker
                .create_baseline(&dir)
                .await
                .with_context(|| format!("Failed to create baseline in {}", dir.display()))?;

            logger.log(&TrackerEvent::BaselineCreated {
                snapshot_dir: dir.clone(),
                head_commit: record.head_commit.clone(),
                dirty_files: record.dirty_files.len(),
            });

            if cli.json {
                print_json(&record)?;
            } else {
                println!(
                    "baseline {} at {}",
                    record.head_commit.as_deref().unwrap_or("(no commit)"),
                    record.timestamp.to_rfc3339()
                );
            }
        }
        Command::Diff(args) => {
            let options = DiffOptions {
                max_size: args.max_size.or(config.max_patch_bytes),
                include_patch: !args.no_patch,
                include_untracked: args.include_untracked || config.include_untracked,
            };

            let (base, diff) = if let Some(ref commit) = args.since {
                (commit.clone(), tracker.diff_since(commit, &options).await)
            } else if args.baseline {
                let dir = resolve_snapshot_dir(args.snapshot_dir.as_deref(), config, working_dir)?;
                (
                    "baseline".to_string(),
                    tracker.diff_since_baseline(&dir, &options).await,
                )
            } else {
                ("HEAD".to_string(), tracker.current_diff(&options).await)
            };
            let diff = diff.context("Failed to compute diff")?;

            match diff {
                Some(ref diff) => logger.log(&TrackerEvent::DiffComputed {
                    base,
                    files_changed: diff.stats.files_changed,
                    insertions: diff.stats.insertions,
                    deletions: diff.stats.deletions,
                    patch_included: diff.patch.is_some(),
                }),
                None => logger.log(&TrackerEvent::NoDiff {
                    reason: no_diff_reason(tracker, args),
                }),
            }

            if cli.json {
                print_json(&diff)?;
            } else if let Some(ref diff) = diff {
                print_diff(diff);
            }
        }
    }

    Ok(())
}

fn resolve_snapshot_dir(
    flag: Option<&Path>,
    config: &ProjectConfig,
    working_dir: &Path,
) -> Result<PathBuf> {
    match flag {
        Some(dir) if dir.is_absolute() => Ok(dir.to_path_buf()),
        Some(dir) => Ok(working_dir.join(dir)),
        None => config.snapshot_dir_in(working_dir),
    }
}

fn no_diff_reason(tracker: &WorkspaceTracker, args: &DiffArgs) -> String {
    if !tracker.is_repository() {
        "not a git repository".to_string()
    } else if args.since.is_some() {
        "commit not found".to_string()
    } else if args.baseline {
        "no baseline commit recorded".to_string()
    } else {
        "no changes".to_string()
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Status => "status",
        Command::Fingerprint { .. } => "fingerprint",
        Command::Baseline { .. } => "baseline",
        Command::Diff(_) => "diff",
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

fn print_diff(diff: &StructuredDiff) {
    for file in &diff.files {
        let marker = match file.status {
            FileStatus::Added => "A".green(),
            FileStatus::Modified => "M".yellow(),
            FileStatus::Deleted => "D".red(),
            FileStatus::Renamed => "R".cyan(),
        };
        let name = match file.old_path {
            Some(ref old) => format!("{} -> {}", old, file.path),
            None => file.path.clone(),
        };
        if file.binary {
            println!("{} {} {}", marker, name, "(binary)".dimmed());
        } else {
            println!(
                "{} {} {} {}",
                marker,
                name,
                format!("+{}", file.additions).green(),
                format!("-{}", file.deletions).red()
            );
        }
    }
    println!("{}", diff.summary.bold());

    if let Some(ref patch) = diff.patch {
        println!();
        print!("{}", patch);
    }
}
