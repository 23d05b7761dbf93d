use thiserror::Error;

/// Errors raised while framing or parsing packets.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid packet id {0}")]
    InvalidPacketId(i32),

    #[error("Invalid packet length {0}")]
    InvalidLength(i32),

    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Payload text is not valid UTF-8")]
    InvalidUtf8,

    #[error("Missing payload for packet {0}")]
    MissingPayload(i32),

    #[error("Invalid value {value} for field {field}")]
    InvalidField { field: &'static str, value: i32 },
}

impl ProtocolError {
    /// Frame-level errors leave the byte stream in an unknown state and must
    /// close the connection. Payload-level errors only spoil one packet.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::InvalidPacketId(_)
                | ProtocolError::InvalidLength(_)
                | ProtocolError::FrameTooLarge { .. }
        )
    }
}
