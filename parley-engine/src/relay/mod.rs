mod ws_relay;

pub use ws_relay::WsRelay;

use async_trait::async_trait;
use parley_core::SignalEnvelope;

use crate::error::RelayError;

/// Events a relay delivers for the room this party sits in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Connected,
    PeerJoined,
    PeerLeft,
    Signal(SignalEnvelope),
}

/// Outbound half of the signaling relay.
#[async_trait(?Send)]
pub trait SignalRelay {
    /// Opens the relay session; the relay answers with [`RelayEvent::Connected`].
    async fn open(&self) -> Result<(), RelayError>;

    fn close(&self);

    fn emit(&self, signal: SignalEnvelope) -> Result<(), RelayError>;
}
