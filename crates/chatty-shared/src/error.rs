use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty packet")]
    Empty,

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(char),

    #[error("Unsupported packet: {0}")]
    Unsupported(String),

    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ColorError {
    #[error("Invalid hex color: {0}")]
    InvalidHex(String),
}
