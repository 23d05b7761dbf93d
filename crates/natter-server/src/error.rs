use natter_proto::ProtocolError;
use natter_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Store task failed: {0}")]
    TaskFailed(String),
}

impl ServerError {
    /// Whether this error ends the connection it occurred on.
    pub fn is_fatal(&self) -> bool {
        match self {
            ServerError::Protocol(e) => e.is_fatal(),
            ServerError::ReadTimeout
            | ServerError::WriteTimeout
            | ServerError::ConnectionClosed => true,
            ServerError::Store(_) | ServerError::TaskFailed(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(ServerError::ReadTimeout.is_fatal());
        assert!(ServerError::Protocol(ProtocolError::InvalidLength(-1)).is_fatal());
        assert!(!ServerError::Protocol(ProtocolError::InvalidUtf8).is_fatal());
        assert!(!ServerError::Store(StoreError::NotFound).is_fatal());
        assert!(!ServerError::TaskFailed("panicked".into()).is_fatal());
    }
}
