use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Microphone failures. These are the only errors surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MicError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("microphone device error: {0}")]
    Device(String),
}

/// Failures of a single peer connection. Contained to that peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("session description error: {0}")]
    Sdp(String),

    #[error("ice candidate error: {0}")]
    Candidate(String),

    #[error("peer connection error: {0}")]
    Connection(String),

    #[error("peer connection closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("relay closed")]
    Closed,

    #[error("relay send failed: {0}")]
    Send(String),

    #[error("relay encode failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error(transparent)]
    Microphone(#[from] MicError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("not in a room")]
    NotInRoom,

    #[error("mesh engine stopped")]
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
