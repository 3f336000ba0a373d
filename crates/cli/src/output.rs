// Command output: text on a terminal, JSON when piped or with `--json`.
// Errors go to stderr with a stable code.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use vectorlink_engine::config::ConfigError;
use vectorlink_engine::conversation::ConversationError;
use vectorlink_engine::lock::LockError;
use vectorlink_engine::remote::RemoteError;
use vectorlink_engine::security::API_KEY_ENV_VARS;
use vectorlink_engine::sync::SyncError;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    /// One JSON object per command.
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
///
/// - `Human`: calls `human_fn` to produce a human-readable string.
/// - `Json`: serializes `value` as JSON.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    let text = match format {
        OutputFormat::Human => human_fn(value),
        OutputFormat::Json => serde_json::to_string(value).map_err(io::Error::other)?,
    };
    writeln!(io::stdout().lock(), "{text}")
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let line = render_error(format, code, message, io::stderr().is_terminal());
    let _ = writeln!(io::stderr().lock(), "{line}");
}

fn render_error(format: OutputFormat, code: &str, message: &str, is_tty: bool) -> String {
    match format {
        OutputFormat::Human if is_tty => format!("{ANSI_RED}error:{ANSI_RESET} {message}"),
        OutputFormat::Human => format!("error: {message}"),
        OutputFormat::Json => {
            serde_json::json!({ "error": { "code": code, "message": message } }).to_string()
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");

    for cause in error.chain() {
        if let Some(sync_err) = cause.downcast_ref::<SyncError>() {
            match sync_err {
                SyncError::InProgress => {
                    return (
                        "SYNC_IN_PROGRESS",
                        "Another sync is already running. Retry with: vectorlink sync --wait"
                            .to_string(),
                    );
                }
                SyncError::Config(config_err) => return config_error(config_err),
                SyncError::Listing(_) | SyncError::Client(_) => return ("REMOTE_ERROR", message),
                SyncError::Scan(_) => return ("SCAN_ERROR", message),
                SyncError::Lock(_) => return ("LOCK_ERROR", message),
            }
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            return config_error(config_err);
        }
        if let Some(conv_err) = cause.downcast_ref::<ConversationError>() {
            if let ConversationError::NotFound(id) = conv_err {
                return (
                    "NOT_FOUND",
                    format!(
                        "Conversation {id} not found. Run: vectorlink conversation list to see available conversations"
                    ),
                );
            }
            return ("CONVERSATION_ERROR", message);
        }
        if cause.downcast_ref::<RemoteError>().is_some() {
            return ("REMOTE_ERROR", message);
        }
        if cause.downcast_ref::<LockError>().is_some() {
            return ("LOCK_ERROR", message);
        }
    }

    ("ERROR", message)
}

fn config_error(error: &ConfigError) -> (&'static str, String) {
    let message = match error {
        ConfigError::MissingIndexId => {
            "No index configured for this vault. Run: vectorlink init --index-id <ID>".to_string()
        }
        ConfigError::MissingApiKey => format!(
            "No API key found. Set {} or run: vectorlink setup --api-key <KEY>",
            API_KEY_ENV_VARS[0]
        ),
        other => other.to_string(),
    };
    ("CONFIG_ERROR", message)
}
