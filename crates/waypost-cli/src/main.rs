// crates/waypost-cli/src/main.rs
// ============================================================================
// Module: Waypost CLI Entry Point
// Description: Command dispatcher for serving the API and reviewing data.
// Purpose: Provide a small operational surface over the configured stores.
// Dependencies: clap, serde_json, time, tokio, waypost-api, waypost-config,
//               waypost-core
// ============================================================================

//! ## Overview
//! The `waypost` binary serves the HTTP API (`serve`), reviews stored
//! welcome-book and feedback entries from the configured backend (`book`,
//! `feedback`), and probes store readiness (`check`). Review commands read
//! through the same store contracts the server uses, so they observe exactly
//! what the API would return.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use time::format_description::well_known::Rfc3339;
use waypost_api::ApiServer;
use waypost_api::build_stores;
use waypost_config::WaypostConfig;
use waypost_core::FeedbackRegistry;
use waypost_core::VisitorRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "waypost.toml";

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Waypost: a small content and feedback API for programmatic callers.
#[derive(Debug, Parser)]
#[command(name = "waypost", version, about)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Review welcome-book entries from the configured store.
    Book {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Maximum entries to display.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Include each visitor's answers in the output.
        #[arg(short, long)]
        answers: bool,
    },
    /// Review feedback entries from the configured store.
    Feedback {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Maximum entries to display.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Probe store readiness and exit nonzero when unavailable.
    Check {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure carrying a user-facing message.
#[derive(Debug)]
struct CliError {
    /// Message emitted to stderr.
    message: String,
}

impl CliError {
    /// Creates an error from any displayable cause.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "waypost: {}", err.message);
            ExitCode::FAILURE
        }
    }
}

/// Executes the command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let server =
                ApiServer::from_config(config).map_err(|err| CliError::new(err.to_string()))?;
            server.serve().await.map_err(|err| CliError::new(err.to_string()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Book {
            config,
            limit,
            answers,
        } => {
            let config = load_config(config.as_deref())?;
            render_book(&config, limit, answers)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Feedback {
            config,
            limit,
        } => {
            let config = load_config(config.as_deref())?;
            render_feedback(&config, limit)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check {
            config,
        } => {
            let config = load_config(config.as_deref())?;
            check_stores(&config)
        }
    }
}

/// Loads configuration from an explicit path, the default file, or defaults.
fn load_config(path: Option<&Path>) -> CliResult<WaypostConfig> {
    match path {
        Some(path) => WaypostConfig::load(path).map_err(|err| CliError::new(err.to_string())),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_NAME);
            if default_path.is_file() {
                WaypostConfig::load(default_path).map_err(|err| CliError::new(err.to_string()))
            } else {
                let config = WaypostConfig::default();
                config.validate().map_err(|err| CliError::new(err.to_string()))?;
                Ok(config)
            }
        }
    }
}

// ============================================================================
// SECTION: Review Commands
// ============================================================================

/// Renders recent welcome-book entries as a text listing.
fn render_book(config: &WaypostConfig, limit: usize, answers: bool) -> CliResult<()> {
    let (visitor_store, _) =
        build_stores(&config.store).map_err(|err| CliError::new(err.to_string()))?;
    let registry = VisitorRegistry::new(visitor_store);
    let records =
        registry.list_visitors(limit).map_err(|err| CliError::new(err.to_string()))?;
    if records.is_empty() {
        return write_stdout_line("No welcome book entries found.");
    }
    let mut output = String::new();
    for record in &records {
        output.push_str(&format!(
            "{:<10} {:<24} {:<20} {:<22} {:>5}  {}\n",
            short_id(record.id.as_str()),
            record.name,
            record.agent_type.as_deref().unwrap_or("-"),
            format_timestamp(record.visit_time),
            record.visit_count,
            record.purpose.as_deref().unwrap_or("-"),
        ));
        if answers && !record.answers.is_empty() {
            let rendered = serde_json::to_string_pretty(&record.answers)
                .map_err(|err| CliError::new(err.to_string()))?;
            output.push_str(&rendered);
            output.push('\n');
        }
    }
    output.push_str(&format!("Total entries: {}\n", records.len()));
    write_stdout(&output)
}

/// Renders recent feedback entries as a text listing.
fn render_feedback(config: &WaypostConfig, limit: usize) -> CliResult<()> {
    let (_, feedback_store) =
        build_stores(&config.store).map_err(|err| CliError::new(err.to_string()))?;
    let registry = FeedbackRegistry::new(feedback_store);
    let records =
        registry.list_feedback(limit).map_err(|err| CliError::new(err.to_string()))?;
    if records.is_empty() {
        return write_stdout_line("No feedback entries found.");
    }
    let mut output = String::new();
    for record in &records {
        output.push_str(&format!(
            "{:<10} {:<24} {:<20} {:<22} {}  {}\n",
            short_id(record.id.as_str()),
            record.agent_name,
            record.agent_type.as_deref().unwrap_or("-"),
            format_timestamp(record.submission_time),
            record.usability_rating.map_or_else(|| "-".to_string(), |r| r.to_string()),
            truncate_field(record.issues.as_deref().unwrap_or("-")),
        ));
    }
    output.push_str(&format!("Total entries: {}\n", records.len()));
    write_stdout(&output)
}

/// Probes both stores and reports readiness.
fn check_stores(config: &WaypostConfig) -> CliResult<ExitCode> {
    let (visitor_store, feedback_store) =
        build_stores(&config.store).map_err(|err| CliError::new(err.to_string()))?;
    let visitors = VisitorRegistry::new(visitor_store).readiness();
    let feedback = FeedbackRegistry::new(feedback_store).readiness();
    let healthy = visitors.is_ok() && feedback.is_ok();
    write_stdout_line(&format!(
        "visitors: {}\nfeedback: {}",
        readiness_label(visitors.is_ok()),
        readiness_label(feedback.is_ok()),
    ))?;
    if healthy {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Returns a readiness label for display.
const fn readiness_label(ready: bool) -> &'static str {
    if ready { "ready" } else { "unavailable" }
}

/// Shortens an opaque identifier for tabular display.
fn short_id(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{prefix}…")
}

/// Formats a timestamp for display, ISO-8601 UTC.
fn format_timestamp(timestamp: time::OffsetDateTime) -> String {
    timestamp.format(&Rfc3339).unwrap_or_else(|_| "-".to_string())
}

/// Truncates a free-text field for single-line display.
fn truncate_field(text: &str) -> String {
    if text.chars().count() <= 30 {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(30).collect();
        format!("{prefix}…")
    }
}

/// Writes a block of text to stdout.
fn write_stdout(output: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(line: &str) -> CliResult<()> {
    write_stdout(&format!("{line}\n"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
