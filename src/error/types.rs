//! Error types
//!
//! Construction and lifecycle failures live in `ServerError`; everything that
//! can go wrong on the outbound path lives in `SendError`.

use std::fmt;
use std::io;
use std::sync::Arc;

/// Errors raised while building or running a `Server`.
#[derive(Debug)]
pub enum ServerError {
    /// Neither a listener nor a bind address was configured.
    NoListener,
    InvalidBufferSize,
    BindFailed(String, io::Error),
    AlreadyServing,
    Stopped,
    InvalidConfig(String),
    Config(config::ConfigError),
    IoError(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::NoListener => {
                write!(f, "No listener configured: provide a listener or a bind address")
            }
            ServerError::InvalidBufferSize => write!(f, "Buffer size must be greater than 0"),
            ServerError::BindFailed(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            ServerError::AlreadyServing => write!(f, "Server is already serving"),
            ServerError::Stopped => write!(f, "Server has been stopped"),
            ServerError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            ServerError::Config(e) => write!(f, "Configuration error: {}", e),
            ServerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::BindFailed(_, e) | ServerError::IoError(e) => Some(e),
            ServerError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(error: config::ConfigError) -> Self {
        ServerError::Config(error)
    }
}

impl From<io::Error> for ServerError {
    fn from(error: io::Error) -> Self {
        ServerError::IoError(error)
    }
}

/// Outcome of a failed outbound write.
///
/// Cloneable so the same failure can be returned to the caller and handed to
/// the `on_send_data` hook.
#[derive(Debug, Clone)]
pub enum SendError {
    /// No live client is registered under the key.
    NotFound(String),
    /// The client was already torn down; nothing was written.
    Closed,
    /// The socket write itself failed.
    Io(Arc<io::Error>),
}

impl SendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SendError::NotFound(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SendError::Closed)
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NotFound(key) => write!(f, "Client key not found: {}", key),
            SendError::Closed => write!(f, "Client is closed"),
            SendError::Io(e) => write!(f, "Write failed: {}", e),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for SendError {
    fn from(error: io::Error) -> Self {
        SendError::Io(Arc::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_kinds() {
        assert!(SendError::NotFound("1.2.3.4:5".into()).is_not_found());
        assert!(SendError::Closed.is_closed());

        let io_err: SendError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(!io_err.is_closed());
        assert!(!io_err.is_not_found());
        assert_eq!(io_err.to_string(), "Write failed: pipe");
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::BindFailed(
            "0.0.0.0:1".into(),
            io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        );
        assert_eq!(err.to_string(), "Failed to bind to 0.0.0.0:1: in use");
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&ServerError::NoListener).is_none());
    }
}
