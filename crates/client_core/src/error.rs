use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Application,
    Decode,
}

/// Failure of one session operation.
///
/// `Display` is the message surfaced as the session's last error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),
    #[error("could not reach analysis service: {0}")]
    Transport(String),
    #[error("{message}")]
    Application { status: u16, message: String },
    #[error("malformed response from analysis service")]
    Decode { reason: String },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Validation(_) => ErrorKind::Validation,
            SessionError::Transport(_) => ErrorKind::Transport,
            SessionError::Application { .. } => ErrorKind::Application,
            SessionError::Decode { .. } => ErrorKind::Decode,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// The service rejected a query because nothing has been indexed yet.
    pub fn needs_upload(&self) -> bool {
        match self {
            SessionError::Application { status, message } => {
                *status == 400
                    && message
                        .to_ascii_lowercase()
                        .contains("upload a document first")
            }
            _ => false,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(value: TransportError) -> Self {
        SessionError::Transport(value.to_string())
    }
}
