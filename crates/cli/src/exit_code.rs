// Consistent exit codes for the vectorlink CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = configuration missing or invalid
//   11 = another sync is already running
//   12 = conversation head moved underneath us
//   13 = remote/network error

use std::process;

use vectorlink_engine::config::ConfigError;
use vectorlink_engine::conversation::ConversationError;
use vectorlink_engine::remote::RemoteError;
use vectorlink_engine::sync::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Config = 10,
    Busy = 11,
    Conflict = 12,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(sync_err) = cause.downcast_ref::<SyncError>() {
                return match sync_err {
                    SyncError::Config(_) => Self::Config,
                    SyncError::InProgress => Self::Busy,
                    SyncError::Listing(_) | SyncError::Client(_) => Self::Network,
                    SyncError::Scan(_) | SyncError::Lock(_) => Self::Error,
                };
            }
            if let Some(conv_err) = cause.downcast_ref::<ConversationError>() {
                return match conv_err {
                    ConversationError::HeadConflict { .. } => Self::Conflict,
                    ConversationError::Storage(_) => Self::Config,
                    ConversationError::NotFound(_)
                    | ConversationError::EmptyName
                    | ConversationError::DefaultUndeletable => Self::Usage,
                };
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::Config;
            }
            if cause.downcast_ref::<RemoteError>().is_some() {
                return Self::Network;
            }
        }
        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
