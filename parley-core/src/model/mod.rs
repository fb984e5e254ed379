mod feature;
mod message;
mod peer;
mod room;
mod signaling;

pub use feature::{FeatureMap, features};
pub use message::ChatMessage;
pub use peer::{PeerId, PeerIdError};
pub use room::{RoomId, RoomIdError, RoomLocator};
pub use signaling::{
    IceCandidate, IceServerConfig, RelayFrame, SdpType, SessionDescription, SignalEnvelope,
    SignalPayload,
};
