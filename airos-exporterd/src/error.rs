use std::time::Duration;
use thiserror::Error;

/// Failures of the management session: connecting, authenticating and
/// running commands on the device.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Credentials rejected. Never retried.
    #[error("authentication failed for {host}")]
    Authentication { host: String },

    /// Network-level failure: refused, timed out, handshake or channel error.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("connection to {host} failed after {attempts} attempts: {last}")]
    Exhausted {
        host: String,
        attempts: u32,
        last: Box<SessionError>,
    },

    #[error("malformed output from `{command}`: {reason}")]
    Malformed { command: String, reason: String },
}

impl SessionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}

/// Anything that aborts a scrape. Rendered into the `error` label of the
/// error-indicator reading.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` is not a number: {value:?}")]
    NotANumber { field: String, value: String },

    #[error("division by zero computing {0}")]
    DivideByZero(&'static str),

    #[error("scrape timed out after {0:?}")]
    Timeout(Duration),
}
