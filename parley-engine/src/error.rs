use parley_core::SdpType;
use thiserror::Error;

/// Creating or committing a session description failed.
#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("failed to create local {kind:?}: {reason}")]
    Create { kind: SdpType, reason: String },

    #[error("failed to commit {kind:?} description: {reason}")]
    Commit { kind: SdpType, reason: String },

    #[error("endpoint has no local description after commit")]
    MissingLocal,
}

#[derive(Debug, Error)]
#[error("failed to add remote candidate: {0}")]
pub struct CandidateError(pub String);

#[derive(Debug, Error)]
pub enum SendError {
    #[error("channel `{0}` is not open")]
    NotOpen(String),

    #[error("send on channel `{label}` failed: {reason}")]
    Failed { label: String, reason: String },
}

#[derive(Debug, Error)]
#[error("failed to open channel `{label}`: {reason}")]
pub struct ChannelError {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("failed to create connection endpoint: {0}")]
    Create(String),

    #[error("failed to attach local track `{id}`: {reason}")]
    Track { id: String, reason: String },

    #[error("failed to close connection endpoint: {0}")]
    Close(String),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("relay is not connected")]
    NotConnected,

    #[error("failed to encode relay frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures surfaced by the negotiation coordinator.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Description(#[from] DescriptionError),

    #[error(transparent)]
    Candidate(#[from] CandidateError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}
