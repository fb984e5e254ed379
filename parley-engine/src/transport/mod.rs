//! `webrtc` backed implementations of the endpoint contract.

mod webrtc_channel;
mod webrtc_endpoint;

pub use webrtc_channel::{UndeliveredHandler, WebRtcChannel};
pub use webrtc_endpoint::{WebRtcEndpoint, WebRtcEndpointFactory};
