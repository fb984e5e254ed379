
use std::cell::RefCell;
use std::rc::Rc;

use parley_core::{FeatureMap, SignalEnvelope};
use parley_engine::{
    EngineConfig, NegotiationCoordinator, PeerState, Role, SelfState, Session, SessionHandle,
    SessionNotice,
};
use tokio::sync::mpsc;
use tracing::Level;

use crate::utils::{MockEndpoint, MockEndpointFactory, MockRelay};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One party wired to a mock endpoint and relay, without a session loop.
pub struct Party {
    pub coordinator: NegotiationCoordinator,
    pub me: Rc<RefCell<SelfState>>,
    pub peer: Rc<RefCell<PeerState>>,
    pub endpoint: Rc<MockEndpoint>,
    pub relay: Rc<MockRelay>,
    pub signals: mpsc::UnboundedReceiver<SignalEnvelope>,
}

impl Party {
    pub fn new(name: &str, role: Role) -> Self {
        let endpoint = MockEndpoint::new(name);
        let (relay, _events, signals) = MockRelay::new();
        let me = Rc::new(RefCell::new(SelfState::new(FeatureMap::new(), 1000)));
        let peer = Rc::new(RefCell::new(PeerState::new(endpoint.clone(), 0)));
        let coordinator = NegotiationCoordinator::new(me.clone(), peer.clone(), relay.clone());
        if role == Role::Polite {
            coordinator.assign_role();
        }

        Self {
            coordinator,
            me,
            peer,
            endpoint,
            relay,
            signals,
        }
    }

    /// Next signal this party emitted, if any is already queued.
    pub fn take_signal(&mut self) -> Option<SignalEnvelope> {
        self.signals.try_recv().ok()
    }
}

/// A running session and the handles a test drives it through.
pub struct SessionHarness {
    pub handle: SessionHandle,
    pub notices: mpsc::UnboundedReceiver<SessionNotice>,
    pub relay: Rc<MockRelay>,
    pub factory: Rc<MockEndpointFactory>,
    pub me: Rc<RefCell<SelfState>>,
    pub peer: Rc<RefCell<PeerState>>,
}

/// Starts a session on the current `LocalSet`.
pub async fn spawn_session(config: EngineConfig) -> SessionHarness {
    let (relay, relay_rx, _signals) = MockRelay::new();
    let factory = MockEndpointFactory::new("ep");

    let (session, handle, notices) =
        Session::start(config, relay.clone(), relay_rx, factory.clone())
            .await
            .expect("session should start");
    let me = session.self_state();
    let peer = session.peer_state();
    tokio::task::spawn_local(session.run());

    SessionHarness {
        handle,
        notices,
        relay,
        factory,
        me,
        peer,
    }
}
