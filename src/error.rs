use thiserror::Error;

/// Every failure a session can surface. All of them are fatal to the process.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Pasted text could not be understood as a connection description.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The transport rejected an operation or the connection broke down.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn connection(context: &str, err: impl std::fmt::Display) -> Self {
        SessionError::Connection(format!("{context}: {err}"))
    }

    pub fn is_malformed_input(&self) -> bool {
        matches!(self, SessionError::MalformedInput(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, SessionError::Connection(_))
    }
}
