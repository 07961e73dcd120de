use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("version mismatch: local {local}, remote {remote}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("unexpected {received} while waiting for {expected}")]
    UnexpectedMessage {
        expected: &'static str,
        received: &'static str,
    },

    #[error("remote error: code={code}, message={message}")]
    RemoteError { code: u32, message: String },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
