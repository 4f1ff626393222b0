//! User-facing notifications raised by the workspace.
//!
//! The workspace never renders anything itself; it pushes [`Notification`]s
//! onto an mpsc channel and whoever owns the receiving end (the CLI, a UI
//! shell, a test) decides how to show them.

use chrono::Utc;
use pix2code_core::types::Timestamp;
use pix2code_stream::close::{ABNORMAL_CLOSE_CODE, SERVER_FAULT_CLOSE_CODE};
use pix2code_stream::session::SessionOutcome;
use serde::Serialize;

pub const CANCEL_MESSAGE: &str = "Code generation cancelled";
pub const APP_ERROR_FALLBACK: &str = "Server encountered an error";
pub const ABNORMAL_CLOSE_MESSAGE: &str =
    "Connection closed abnormally. Backend might be unavailable.";
pub const SERVER_FAULT_MESSAGE: &str =
    "Server encountered an unexpected error. Please try again.";
pub const GENERIC_ERROR_MESSAGE: &str = "Error generating code. Check the Developer Console AND the backend logs for details. Feel free to open a Github issue.";
pub const CLOUD_CONNECTION_ERROR: &str = "Error connecting to server. Please try again later.";
pub const MALFORMED_MESSAGE: &str = "Error processing server response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: Timestamp,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

/// Notification for a finished session, or `None` for a normal completion.
///
/// * `backend_url` - WebSocket base URL, quoted in the local connection
///   error so the user knows which backend to start.
pub fn outcome_notification(
    outcome: &SessionOutcome,
    is_running_on_cloud: bool,
    backend_url: &str,
) -> Option<Notification> {
    let notification = match outcome {
        SessionOutcome::Completed => return None,
        SessionOutcome::Cancelled => Notification::success(CANCEL_MESSAGE),
        SessionOutcome::AppError { message } => {
            Notification::error(message.as_deref().unwrap_or(APP_ERROR_FALLBACK))
        }
        SessionOutcome::Abnormal { code, .. } => Notification::error(match *code {
            ABNORMAL_CLOSE_CODE => ABNORMAL_CLOSE_MESSAGE,
            SERVER_FAULT_CLOSE_CODE => SERVER_FAULT_MESSAGE,
            _ => GENERIC_ERROR_MESSAGE,
        }),
        SessionOutcome::ConnectFailed {
            url,
            timed_out: true,
            ..
        } => Notification::error(format!("Connection timeout: Could not connect to {url}")),
        SessionOutcome::ConnectFailed { .. } => Notification::error(connection_error_message(
            is_running_on_cloud,
            backend_url,
        )),
    };
    Some(notification)
}

pub fn connection_error_message(is_running_on_cloud: bool, backend_url: &str) -> String {
    if is_running_on_cloud {
        CLOUD_CONNECTION_ERROR.to_string()
    } else {
        format!("Error connecting to backend at {backend_url}. Make sure your backend service is running.")
    }
}
