use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::endpoint::{EndpointEventSink, EndpointFactory, TaggedEndpointEvent};
use crate::error::{EndpointError, EngineError};
use crate::state::{PeerState, SelfState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub generation: u64,
    pub detached_tracks: usize,
}

/// Tears down and rebuilds everything scoped to one endpoint.
pub struct SessionLifecycleManager {
    config: Rc<EngineConfig>,
    factory: Rc<dyn EndpointFactory>,
    events_tx: mpsc::UnboundedSender<TaggedEndpointEvent>,
}

impl SessionLifecycleManager {
    pub fn new(
        config: Rc<EngineConfig>,
        factory: Rc<dyn EndpointFactory>,
        events_tx: mpsc::UnboundedSender<TaggedEndpointEvent>,
    ) -> Self {
        Self {
            config,
            factory,
            events_tx,
        }
    }

    pub async fn initial_peer(&self) -> Result<PeerState, EndpointError> {
        let endpoint = self.factory.create().await?;
        Ok(PeerState::new(endpoint, 0))
    }

    /// Replaces the peer with a fresh endpoint and clears the negotiation flags.
    ///
    /// The new endpoint is built before anything is torn down; the swap itself
    /// does not suspend, so no task can see a half-reset peer.
    pub async fn reset(
        &self,
        me: &RefCell<SelfState>,
        peer: &RefCell<PeerState>,
    ) -> Result<ResetReport, EndpointError> {
        let fresh = self.factory.create().await?;

        let retired = {
            let mut peer = peer.borrow_mut();
            let generation = peer.generation + 1;
            std::mem::replace(&mut *peer, PeerState::new(fresh, generation))
        };
        me.borrow_mut().flags.clear();

        let report = ResetReport {
            generation: retired.generation + 1,
            detached_tracks: retired.tracks.len(),
        };
        info!(
            generation = report.generation,
            detached_tracks = report.detached_tracks,
            "Peer reset"
        );

        if let Err(e) = retired.endpoint.close().await {
            warn!("Failed to close retired endpoint: {}", e);
        }
        Ok(report)
    }

    /// Wires callbacks, opens the feature and control channels, then attaches
    /// local tracks. Channels come first so they exist before any send attempt.
    pub async fn establish(&self, peer: &RefCell<PeerState>) -> Result<(), EngineError> {
        let (endpoint, generation) = {
            let peer = peer.borrow();
            (Rc::clone(&peer.endpoint), peer.generation)
        };
        info!(generation, "Establishing call features");

        endpoint.register_callbacks(EndpointEventSink::new(generation, self.events_tx.clone()));

        let feature_channel = endpoint.open_channel(&self.config.feature_channel).await?;
        if !Self::store(peer, generation, |p| p.feature_channel = Some(feature_channel)) {
            return Ok(());
        }

        let chat_channel = endpoint.open_channel(&self.config.chat_channel).await?;
        if !Self::store(peer, generation, |p| p.chat_channel = Some(chat_channel)) {
            return Ok(());
        }

        for track in &self.config.local_tracks {
            if let Err(e) = endpoint.add_local_track(track).await {
                warn!("Failed to attach local track: {}", e);
            }
        }
        Ok(())
    }

    fn store(peer: &RefCell<PeerState>, generation: u64, apply: impl FnOnce(&mut PeerState)) -> bool {
        let mut peer = peer.borrow_mut();
        if peer.generation != generation {
            debug!(generation, "Peer replaced during establish");
            return false;
        }
        apply(&mut peer);
        true
    }
}
