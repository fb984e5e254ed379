use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{IceCandidate, SdpType, SessionDescription};
use parley_engine::{
    CandidateError, Channel, ChannelError, ChannelSpec, ChannelState, ConnectionEndpoint,
    ConnectionState, DescriptionError, EndpointError, EndpointEvent, EndpointEventSink,
    EndpointFactory, SignalingState, TrackInfo,
};
use tokio::sync::Notify;

use super::MockChannel;

#[derive(Default)]
struct Recorded {
    signaling: Option<SignalingState>,
    connection: Option<ConnectionState>,
    remote: Option<SessionDescription>,
    candidates: Vec<IceCandidate>,
    channels: Vec<Arc<MockChannel>>,
    tracks: Vec<TrackInfo>,
    rollbacks: usize,
    offers: usize,
    closed: bool,
    sink: Option<EndpointEventSink>,
}

/// Endpoint that walks the signaling state machine without any transport.
pub struct MockEndpoint {
    name: String,
    inner: RefCell<Recorded>,
    fail_offers: Cell<bool>,
    fail_candidates: Cell<bool>,
    hold_offers: Cell<bool>,
    offer_gate: Notify,
}

impl MockEndpoint {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            inner: RefCell::new(Recorded::default()),
            fail_offers: Cell::new(false),
            fail_candidates: Cell::new(false),
            hold_offers: Cell::new(false),
            offer_gate: Notify::new(),
        })
    }

    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.set(fail);
    }

    /// Every candidate is rejected while set.
    pub fn fail_candidates(&self, fail: bool) {
        self.fail_candidates.set(fail);
    }

    /// Parks offer creation until [`MockEndpoint::release_offer`].
    pub fn hold_offers(&self, hold: bool) {
        self.hold_offers.set(hold);
    }

    pub fn release_offer(&self) {
        self.offer_gate.notify_one();
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.inner.borrow_mut().connection = Some(state);
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.borrow().rollbacks
    }

    pub fn offers(&self) -> usize {
        self.inner.borrow().offers
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.inner.borrow().candidates.clone()
    }

    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.inner.borrow().tracks.clone()
    }

    pub fn has_sink(&self) -> bool {
        self.inner.borrow().sink.is_some()
    }

    pub fn channel(&self, label: &str) -> Option<Arc<MockChannel>> {
        self.inner
            .borrow()
            .channels
            .iter()
            .find(|c| c.label() == label)
            .cloned()
    }

    pub fn channel_labels(&self) -> Vec<String> {
        self.inner
            .borrow()
            .channels
            .iter()
            .map(|c| c.label().to_owned())
            .collect()
    }

    /// Raises an event through the registered sink.
    pub fn fire(&self, event: EndpointEvent) -> bool {
        let sink = self.inner.borrow().sink.clone();
        sink.is_some_and(|sink| sink.emit(event))
    }

    /// Marks a channel open and raises the open callback.
    pub fn open(&self, label: &str) -> bool {
        match self.channel(label) {
            Some(channel) => {
                channel.set_state(ChannelState::Open);
                self.fire(EndpointEvent::ChannelOpen {
                    label: label.to_owned(),
                })
            }
            None => false,
        }
    }

    pub fn deliver(&self, label: &str, text: &str) -> bool {
        self.fire(EndpointEvent::ChannelMessage {
            label: label.to_owned(),
            text: text.to_owned(),
        })
    }

    fn signaling(&self) -> SignalingState {
        self.inner
            .borrow()
            .signaling
            .unwrap_or(SignalingState::Stable)
    }

    fn set_signaling(&self, state: SignalingState) {
        self.inner.borrow_mut().signaling = Some(state);
    }
}

#[async_trait(?Send)]
impl ConnectionEndpoint for MockEndpoint {
    async fn create_and_commit_local_offer(&self) -> Result<SessionDescription, DescriptionError> {
        if self.fail_offers.get() {
            return Err(DescriptionError::Create {
                kind: SdpType::Offer,
                reason: "mock failure".into(),
            });
        }
        if self.hold_offers.get() {
            self.offer_gate.notified().await;
        }

        let n = {
            let mut inner = self.inner.borrow_mut();
            inner.offers += 1;
            inner.offers
        };
        self.set_signaling(SignalingState::HaveLocalOffer);
        Ok(SessionDescription::offer(format!("offer-{}-{}", self.name, n)))
    }

    async fn create_and_commit_local_answer(&self) -> Result<SessionDescription, DescriptionError> {
        if self.signaling() != SignalingState::HaveRemoteOffer {
            return Err(DescriptionError::Create {
                kind: SdpType::Answer,
                reason: format!("no remote offer in {:?}", self.signaling()),
            });
        }
        self.set_signaling(SignalingState::Stable);
        Ok(SessionDescription::answer(format!("answer-{}", self.name)))
    }

    async fn commit_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), DescriptionError> {
        tokio::task::yield_now().await;

        match (description.kind, self.signaling()) {
            (SdpType::Offer, SignalingState::HaveLocalOffer) => {
                self.inner.borrow_mut().rollbacks += 1;
                self.set_signaling(SignalingState::HaveRemoteOffer);
            }
            (SdpType::Offer, SignalingState::Stable) => {
                self.set_signaling(SignalingState::HaveRemoteOffer);
            }
            (SdpType::Answer, SignalingState::HaveLocalOffer) => {
                self.set_signaling(SignalingState::Stable);
            }
            (kind, state) => {
                return Err(DescriptionError::Commit {
                    kind,
                    reason: format!("unexpected in {:?}", state),
                });
            }
        }
        self.inner.borrow_mut().remote = Some(description);
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), CandidateError> {
        if self.fail_candidates.get() || self.inner.borrow().remote.is_none() {
            return Err(CandidateError("no remote description".into()));
        }
        self.inner.borrow_mut().candidates.push(candidate);
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        self.signaling()
    }

    fn connection_state(&self) -> ConnectionState {
        self.inner
            .borrow()
            .connection
            .unwrap_or(ConnectionState::New)
    }

    fn register_callbacks(&self, sink: EndpointEventSink) {
        self.inner.borrow_mut().sink = Some(sink);
    }

    async fn open_channel(&self, spec: &ChannelSpec) -> Result<Arc<dyn Channel>, ChannelError> {
        let channel = Arc::new(MockChannel::new(spec.label.clone(), ChannelState::Connecting));
        self.inner.borrow_mut().channels.push(channel.clone());
        Ok(channel)
    }

    async fn add_local_track(&self, track: &TrackInfo) -> Result<(), EndpointError> {
        self.inner.borrow_mut().tracks.push(track.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), EndpointError> {
        let mut inner = self.inner.borrow_mut();
        inner.closed = true;
        // The sink stays: a closed endpoint may still flush callbacks.
        inner.signaling = Some(SignalingState::Closed);
        Ok(())
    }
}

/// Hands out [`MockEndpoint`]s and keeps them for inspection.
#[derive(Default)]
pub struct MockEndpointFactory {
    name: String,
    created: RefCell<Vec<Rc<MockEndpoint>>>,
}

impl MockEndpointFactory {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            created: RefCell::new(Vec::new()),
        })
    }

    pub fn created(&self) -> usize {
        self.created.borrow().len()
    }

    pub fn endpoint(&self, index: usize) -> Rc<MockEndpoint> {
        self.created.borrow()[index].clone()
    }

    pub fn latest(&self) -> Rc<MockEndpoint> {
        self.created.borrow().last().cloned().unwrap()
    }
}

#[async_trait(?Send)]
impl EndpointFactory for MockEndpointFactory {
    async fn create(&self) -> Result<Rc<dyn ConnectionEndpoint>, EndpointError> {
        let index = self.created.borrow().len();
        let endpoint = MockEndpoint::new(format!("{}-{}", self.name, index));
        self.created.borrow_mut().push(endpoint.clone());
        Ok(endpoint)
    }
}
