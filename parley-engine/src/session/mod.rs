//! The session event loop: relay events, endpoint callbacks and application
//! commands all funnel through [`Session::run`] on one thread.

mod lifecycle;

pub use lifecycle::{ResetReport, SessionLifecycleManager};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use parley_core::utils::now_millis;
use parley_core::{ChatMessage, SignalEnvelope, features};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chat::ChatEvent;
use crate::config::{ChannelSpec, EngineConfig};
use crate::effects::filter_from_label;
use crate::endpoint::{
    Channel, ConnectionState, EndpointEvent, EndpointFactory, TaggedEndpointEvent, TrackInfo,
};
use crate::error::EngineError;
use crate::feature_sync::FeatureSyncChannel;
use crate::negotiation::NegotiationCoordinator;
use crate::relay::{RelayEvent, SignalRelay};
use crate::state::{PeerState, Role, SelfState};

/// Requests from the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Join,
    Leave,
    SendChat(String),
    SetFeature { name: String, enabled: bool },
    CycleFilter,
}

/// What the session reports back to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    RoleAssigned(Role),
    ChatReceived { text: String, timestamp: i64 },
    ChatDelivered { timestamp: i64, delayed: bool },
    PeerFeatureChanged { name: String, enabled: bool },
    ConnectionStateChanged(ConnectionState),
    PeerFilterChanged(String),
    RemoteTrackAdded(TrackInfo),
    RemoteMediaDetached,
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Returns false once the session has shut down.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn join(&self) -> bool {
        self.send(SessionCommand::Join)
    }

    pub fn leave(&self) -> bool {
        self.send(SessionCommand::Leave)
    }

    pub fn send_chat(&self, text: impl Into<String>) -> bool {
        self.send(SessionCommand::SendChat(text.into()))
    }

    pub fn set_feature(&self, name: impl Into<String>, enabled: bool) -> bool {
        self.send(SessionCommand::SetFeature {
            name: name.into(),
            enabled,
        })
    }

    pub fn cycle_filter(&self) -> bool {
        self.send(SessionCommand::CycleFilter)
    }
}

struct SessionInner {
    config: Rc<EngineConfig>,
    me: Rc<RefCell<SelfState>>,
    peer: Rc<RefCell<PeerState>>,
    relay: Rc<dyn SignalRelay>,
    coordinator: NegotiationCoordinator,
    lifecycle: SessionLifecycleManager,
    features: FeatureSyncChannel,
    notices: mpsc::UnboundedSender<SessionNotice>,
}

/// One party of a two-party call.
///
/// Handlers are spawned with [`tokio::task::spawn_local`], so [`Session::run`]
/// must be driven inside a [`tokio::task::LocalSet`].
pub struct Session {
    inner: SessionInner,
    relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
    endpoint_rx: mpsc::UnboundedReceiver<TaggedEndpointEvent>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl Session {
    pub async fn start(
        config: EngineConfig,
        relay: Rc<dyn SignalRelay>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        factory: Rc<dyn EndpointFactory>,
    ) -> Result<(Self, SessionHandle, mpsc::UnboundedReceiver<SessionNotice>), EngineError> {
        let config = Rc::new(config);
        let (endpoint_tx, endpoint_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let lifecycle = SessionLifecycleManager::new(config.clone(), factory, endpoint_tx);
        let peer = Rc::new(RefCell::new(lifecycle.initial_peer().await?));
        let me = Rc::new(RefCell::new(SelfState::new(
            config.initial_features.clone(),
            config.delivery_delay_threshold_ms,
        )));
        let coordinator = NegotiationCoordinator::new(me.clone(), peer.clone(), relay.clone());

        let mut features = FeatureSyncChannel::new();
        for name in [features::AUDIO, features::VIDEO] {
            let notices = notice_tx.clone();
            features.on_feature(name, move |enabled| {
                let _ = notices.send(SessionNotice::PeerFeatureChanged {
                    name: name.to_owned(),
                    enabled,
                });
            });
        }

        let session = Self {
            inner: SessionInner {
                config,
                me,
                peer,
                relay,
                coordinator,
                lifecycle,
                features,
                notices: notice_tx,
            },
            relay_rx,
            endpoint_rx,
            command_rx,
        };
        Ok((session, SessionHandle { tx: command_tx }, notice_rx))
    }

    pub fn self_state(&self) -> Rc<RefCell<SelfState>> {
        self.inner.me.clone()
    }

    pub fn peer_state(&self) -> Rc<RefCell<PeerState>> {
        self.inner.peer.clone()
    }

    pub async fn run(mut self) {
        info!("Session event loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.inner.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down session.");
                            break;
                        }
                    }
                }

                Some(event) = self.relay_rx.recv() => {
                    self.inner.handle_relay_event(event).await;
                }

                Some(tagged) = self.endpoint_rx.recv() => {
                    self.inner.handle_endpoint_event(tagged).await;
                }
            }
        }

        self.inner.relay.close();
        let endpoint = self.inner.peer.borrow().endpoint.clone();
        if let Err(e) = endpoint.close().await {
            warn!("Failed to close endpoint on shutdown: {}", e);
        }
        info!("Session event loop finished");
    }
}

impl SessionInner {
    async fn handle_command(&self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join => {
                info!("Joining the call");
                if let Err(e) = self.relay.open().await {
                    error!("Failed to open relay: {}", e);
                }
            }

            SessionCommand::Leave => {
                info!("Leaving the call");
                self.relay.close();
                self.me.borrow_mut().clear_role();
                self.reset().await;
            }

            SessionCommand::SendChat(text) => {
                let message = self.me.borrow_mut().chat.submit(text, now_millis());
                self.send_control(message);
            }

            SessionCommand::SetFeature { name, enabled } => {
                let mut me = self.me.borrow_mut();
                let peer = self.peer.borrow();
                self.features
                    .set_local(&mut me.features, &name, enabled, peer.feature_channel());
            }

            SessionCommand::CycleFilter => self.cycle_filter().await,
        }
    }

    async fn handle_relay_event(&self, event: RelayEvent) {
        match event {
            RelayEvent::Connected => {
                info!("Connected to the signaling relay");
                self.establish().await;
            }

            RelayEvent::PeerJoined => {
                if self.coordinator.assign_role() {
                    self.notify(SessionNotice::RoleAssigned(Role::Polite));
                }
            }

            RelayEvent::PeerLeft => {
                info!("Peer left, resetting");
                self.reset().await;
                self.establish().await;
            }

            RelayEvent::Signal(signal) => {
                let coordinator = self.coordinator.clone();
                tokio::task::spawn_local(async move {
                    match coordinator.handle_signal(signal).await {
                        Ok(outcome) => debug!(?outcome, "Signal handled"),
                        Err(e) => error!("Failed to handle signal: {}", e),
                    }
                });
            }
        }
    }

    async fn handle_endpoint_event(&self, tagged: TaggedEndpointEvent) {
        // The queue outlives the endpoint, so even a retired one may hand frames back.
        if let EndpointEvent::Undelivered { label, frames } = tagged.event {
            self.on_undelivered(&label, frames);
            return;
        }

        let current = self.peer.borrow().generation;
        if tagged.generation != current {
            debug!(
                generation = tagged.generation,
                current, "Dropping callback from a retired endpoint"
            );
            return;
        }

        match tagged.event {
            EndpointEvent::NegotiationNeeded => {
                let coordinator = self.coordinator.clone();
                tokio::task::spawn_local(async move {
                    match coordinator.handle_negotiation_needed().await {
                        Ok(outcome) => debug!(?outcome, "Negotiation attempt finished"),
                        Err(e) => error!("Negotiation failed: {}", e),
                    }
                });
            }

            EndpointEvent::IceCandidate(candidate) => {
                if let Err(e) = self.relay.emit(SignalEnvelope::Candidate(candidate)) {
                    warn!("Failed to forward local candidate: {}", e);
                }
            }

            EndpointEvent::ConnectionStateChanged(state) => {
                info!(?state, "Connection state changed");
                self.notify(SessionNotice::ConnectionStateChanged(state));
            }

            EndpointEvent::ChannelOpen { label } => self.on_channel_open(&label),

            EndpointEvent::ChannelMessage { label, text } => self.on_channel_message(&label, &text),

            EndpointEvent::ChannelClosed { label } => {
                info!(label, "Channel closed");
            }

            EndpointEvent::Undelivered { .. } => {}

            EndpointEvent::IncomingChannel(channel) => self.on_incoming_channel(channel),

            EndpointEvent::IncomingTrack(track) => {
                info!(id = track.id, "Remote track arrived");
                self.peer.borrow_mut().tracks.push(track.clone());
                self.notify(SessionNotice::RemoteTrackAdded(track));
            }
        }
    }

    fn on_channel_open(&self, label: &str) {
        if label == self.config.chat_channel.label {
            info!(label, "Chat channel opened");
            let peer = self.peer.borrow();
            if let Some(channel) = peer.chat_channel() {
                self.me.borrow_mut().outbound.drain_on_open(channel);
            }
        } else if label == self.config.feature_channel.label {
            info!(label, "Feature channel opened");
            let me = self.me.borrow();
            let peer = self.peer.borrow();
            self.features.share_all(&me.features, peer.feature_channel());
        } else if filter_from_label(label).is_some() {
            self.peer.borrow_mut().effect_channels.retain(|channel| {
                if channel.label() == label {
                    channel.close();
                    false
                } else {
                    true
                }
            });
        }
    }

    fn on_channel_message(&self, label: &str, text: &str) {
        if label == self.config.chat_channel.label {
            let message: ChatMessage = match serde_json::from_str(text) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Invalid chat frame: {}", e);
                    return;
                }
            };

            let event = self.me.borrow_mut().chat.handle_incoming(message, now_millis());
            match event {
                ChatEvent::Received {
                    text,
                    timestamp,
                    reply,
                } => {
                    self.notify(SessionNotice::ChatReceived { text, timestamp });
                    self.send_control(reply);
                }
                ChatEvent::Delivered { timestamp, delayed } => {
                    self.notify(SessionNotice::ChatDelivered { timestamp, delayed });
                }
                ChatEvent::UnknownAcknowledgement { .. } => {}
            }
        } else if label == self.config.feature_channel.label {
            let mut peer = self.peer.borrow_mut();
            if let Err(e) = self.features.receive(&mut peer.features, text) {
                warn!("Invalid feature frame: {}", e);
            }
        } else {
            debug!(label, "Message on unhandled channel");
        }
    }

    fn on_undelivered(&self, label: &str, frames: Vec<String>) {
        if label != self.config.chat_channel.label {
            // Feature state is resent in full on the next open.
            debug!(label, dropped = frames.len(), "Undelivered frames on auxiliary channel");
            return;
        }

        let messages: Vec<ChatMessage> = frames
            .iter()
            .filter_map(|frame| match serde_json::from_str(frame) {
                Ok(message) => Some(message),
                Err(e) => {
                    error!("Undelivered chat frame is not a control message: {}", e);
                    None
                }
            })
            .collect();

        info!(count = messages.len(), "Re-queueing undelivered chat messages");
        self.me.borrow_mut().outbound.restore(messages);
    }

    fn on_incoming_channel(&self, channel: Arc<dyn Channel>) {
        let label = channel.label().to_owned();
        info!(label, "Data channel added");

        let Some(filter) = filter_from_label(&label) else {
            return;
        };

        let mut peer = self.peer.borrow_mut();
        peer.filter = Some(filter.to_owned());
        if channel.is_open() {
            channel.close();
        } else {
            peer.effect_channels.push(channel);
        }
        drop(peer);

        self.notify(SessionNotice::PeerFilterChanged(filter.to_owned()));
    }

    async fn cycle_filter(&self) {
        let endpoint = self.peer.borrow().endpoint.clone();
        if endpoint.connection_state() != ConnectionState::Connected {
            debug!("Not connected, filter unchanged");
            return;
        }

        let label = self.me.borrow_mut().filters.next_label();
        if let Err(e) = endpoint.open_channel(&ChannelSpec::announced(label)).await {
            warn!("Failed to announce filter: {}", e);
        }
    }

    async fn establish(&self) {
        if let Err(e) = self.lifecycle.establish(&self.peer).await {
            error!("Failed to establish call features: {}", e);
        }
    }

    async fn reset(&self) {
        match self.lifecycle.reset(&self.me, &self.peer).await {
            Ok(_) => self.notify(SessionNotice::RemoteMediaDetached),
            Err(e) => error!("Failed to reset peer: {}", e),
        }
    }

    fn send_control(&self, message: ChatMessage) {
        let peer = self.peer.borrow();
        let delivery = self
            .me
            .borrow_mut()
            .outbound
            .send_or_queue(peer.chat_channel(), message);
        debug!(?delivery, "Control message handed off");
    }

    fn notify(&self, notice: SessionNotice) {
        let _ = self.notices.send(notice);
    }
}
