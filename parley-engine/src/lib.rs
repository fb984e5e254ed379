//! Client side of a two-party call: perfect negotiation over a signaling
//! relay, an ordered control channel with delivery receipts and a feature
//! announcement channel.

pub mod chat;
pub mod config;
pub mod effects;
pub mod endpoint;
pub mod error;
pub mod feature_sync;
pub mod message_queue;
pub mod negotiation;
pub mod relay;
pub mod session;
pub mod state;
pub mod transport;

pub use chat::{ChatEvent, ChatLog, DeliveryStatus};
pub use config::{ChannelSpec, EngineConfig};
pub use endpoint::{
    Channel, ChannelState, ConnectionEndpoint, ConnectionState, EndpointEvent, EndpointEventSink,
    EndpointFactory, SignalingState, TaggedEndpointEvent, TrackInfo, TrackKind,
};
pub use error::{
    CandidateError, ChannelError, DescriptionError, EndpointError, EngineError, NegotiationError,
    RelayError, SendError,
};
pub use feature_sync::FeatureSyncChannel;
pub use message_queue::{Delivery, MessageQueue, QueuePosition};
pub use negotiation::{NegotiationCoordinator, NegotiationOutcome, SignalOutcome};
pub use relay::{RelayEvent, SignalRelay, WsRelay};
pub use session::{
    ResetReport, Session, SessionCommand, SessionHandle, SessionLifecycleManager, SessionNotice,
};
pub use state::{NegotiationFlags, PeerState, Role, SelfState};
pub use transport::{WebRtcChannel, WebRtcEndpoint, WebRtcEndpointFactory};
