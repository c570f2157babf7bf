//! Errors raised by the window control unit

use thiserror::Error;
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};

/// Why a candidate surface could not be taken under management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The window vanished or its attributes could not be read
    #[error("window {0:#x} could not be queried")]
    NotFound(u32),

    /// The window asked to be left alone
    #[error("window {0:#x} is override-redirect")]
    OverrideRedirect(u32),

    /// The window's root does not belong to a managed screen
    #[error("window {0:#x} is not on a managed screen")]
    NoScreen(u32),
}

/// Errors that occur while talking to the display server
#[derive(Debug, Error)]
pub enum WmError {
    /// The connection to the server broke
    #[error("display connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// A request was rejected by the server
    #[error("request failed: {0}")]
    Request(String),

    /// Management of a single window was abandoned
    #[error("capture aborted: {0}")]
    Capture(#[from] CaptureError),
}

impl From<ReplyError> for WmError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::ConnectionError(e) => Self::Connection(e),
            ReplyError::X11Error(e) => Self::Request(format!("{:?}", e.error_kind)),
        }
    }
}

impl From<ReplyOrIdError> for WmError {
    fn from(err: ReplyOrIdError) -> Self {
        match err {
            ReplyOrIdError::ConnectionError(e) => Self::Connection(e),
            ReplyOrIdError::X11Error(e) => Self::Request(format!("{:?}", e.error_kind)),
            ReplyOrIdError::IdsExhausted => Self::Request("resource ids exhausted".into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WmError>;
