//! The connection endpoint contract the engine drives, and the events it raises.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

use crate::config::ChannelSpec;
use crate::error::{CandidateError, ChannelError, DescriptionError, EndpointError, SendError};

/// The endpoint's local view of negotiation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
}

impl TrackInfo {
    pub fn local(kind: TrackKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            stream_id: "parley-local".to_owned(),
        }
    }
}

/// A bidirectional message channel living on an endpoint.
///
/// `send_text` never waits: it either hands the frame to the transport or
/// fails, mirroring browser data channels.
pub trait Channel: Send + Sync {
    fn label(&self) -> &str;

    fn state(&self) -> ChannelState;

    fn send_text(&self, text: &str) -> Result<(), SendError>;

    fn close(&self);

    fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }
}

/// Callbacks raised by an endpoint.
pub enum EndpointEvent {
    NegotiationNeeded,
    /// A local candidate; the empty candidate marks the end of gathering.
    IceCandidate(IceCandidate),
    ConnectionStateChanged(ConnectionState),
    ChannelOpen { label: String },
    ChannelMessage { label: String, text: String },
    ChannelClosed { label: String },
    /// Frames a channel accepted but could not write, oldest first.
    Undelivered { label: String, frames: Vec<String> },
    /// A channel announced in-band by the remote side.
    IncomingChannel(Arc<dyn Channel>),
    IncomingTrack(TrackInfo),
}

impl std::fmt::Debug for EndpointEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegotiationNeeded => f.write_str("NegotiationNeeded"),
            Self::IceCandidate(c) => f.debug_tuple("IceCandidate").field(c).finish(),
            Self::ConnectionStateChanged(s) => {
                f.debug_tuple("ConnectionStateChanged").field(s).finish()
            }
            Self::ChannelOpen { label } => f.debug_struct("ChannelOpen").field("label", label).finish(),
            Self::ChannelMessage { label, text } => f
                .debug_struct("ChannelMessage")
                .field("label", label)
                .field("len", &text.len())
                .finish(),
            Self::ChannelClosed { label } => {
                f.debug_struct("ChannelClosed").field("label", label).finish()
            }
            Self::Undelivered { label, frames } => f
                .debug_struct("Undelivered")
                .field("label", label)
                .field("frames", &frames.len())
                .finish(),
            Self::IncomingChannel(c) => f.debug_tuple("IncomingChannel").field(&c.label()).finish(),
            Self::IncomingTrack(t) => f.debug_tuple("IncomingTrack").field(t).finish(),
        }
    }
}

/// An endpoint event stamped with the generation of the endpoint that raised it.
#[derive(Debug)]
pub struct TaggedEndpointEvent {
    pub generation: u64,
    pub event: EndpointEvent,
}

/// Where an endpoint delivers its callbacks. Cheap to clone and safe to move
/// into transport threads.
#[derive(Clone)]
pub struct EndpointEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEndpointEvent>,
}

impl EndpointEventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEndpointEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the session has stopped listening.
    pub fn emit(&self, event: EndpointEvent) -> bool {
        self.tx
            .send(TaggedEndpointEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// The negotiation primitives of one peer connection.
#[async_trait(?Send)]
pub trait ConnectionEndpoint {
    async fn create_and_commit_local_offer(&self) -> Result<SessionDescription, DescriptionError>;

    async fn create_and_commit_local_answer(&self) -> Result<SessionDescription, DescriptionError>;

    /// Commits a remote description. A remote offer arriving while a local offer
    /// is pending rolls the local offer back first.
    async fn commit_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), DescriptionError>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), CandidateError>;

    fn signaling_state(&self) -> SignalingState;

    fn connection_state(&self) -> ConnectionState;

    /// Routes every callback of this endpoint (and of channels it opens later) into `sink`.
    fn register_callbacks(&self, sink: EndpointEventSink);

    async fn open_channel(&self, spec: &ChannelSpec) -> Result<Arc<dyn Channel>, ChannelError>;

    async fn add_local_track(&self, track: &TrackInfo) -> Result<(), EndpointError>;

    async fn close(&self) -> Result<(), EndpointError>;
}

/// Builds fresh endpoints for the lifecycle manager.
#[async_trait(?Send)]
pub trait EndpointFactory {
    async fn create(&self) -> Result<std::rc::Rc<dyn ConnectionEndpoint>, EndpointError>;
}
