//! WebSocket close codes used by the code-generation channel.

/// Normal closure: generation finished.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Connection dropped without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Server hit an unexpected condition.
pub const SERVER_FAULT_CLOSE_CODE: u16 = 1011;

/// Server signals a fatal generation failure; the close reason carries
/// the user-facing message.
pub const APP_ERROR_CLOSE_CODE: u16 = 4332;

/// Client-initiated cancellation.
pub const USER_CLOSE_CODE: u16 = 4333;

/// Classification of a close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    Normal,
    UserClosed,
    AppError,
    Abnormal,
}

impl CloseKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            NORMAL_CLOSE_CODE => Self::Normal,
            USER_CLOSE_CODE => Self::UserClosed,
            APP_ERROR_CLOSE_CODE => Self::AppError,
            _ => Self::Abnormal,
        }
    }
}
