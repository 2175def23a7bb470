//! Errors surfaced to the host

use thiserror::Error;

/// Result type for engine control operations
pub type LinkResult<T> = Result<T, LinkError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("channel {0} out of range 1-14")]
    InvalidChannel(u8),

    #[error("acquisition already running")]
    AlreadyRunning,
}
