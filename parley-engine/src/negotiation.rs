//! Perfect negotiation: both parties run the same code and offer collisions
//! are settled by the statically assigned [`Role`].

use std::cell::RefCell;
use std::rc::Rc;

use parley_core::{IceCandidate, SdpType, SessionDescription, SignalEnvelope};
use tracing::{debug, error, info, warn};

use crate::endpoint::{ConnectionEndpoint, SignalingState};
use crate::error::NegotiationError;
use crate::relay::SignalRelay;
use crate::state::{PeerState, Role, SelfState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutcome {
    OfferSent,
    /// The endpoint was replaced while the offer was being made.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Offer collision on the impolite side: the offer was dropped untouched.
    IgnoredOffer,
    AnswerApplied,
    /// A remote offer was accepted and our answer was sent.
    Answered,
    CandidateAdded,
    /// Candidate belonging to an ignored offer failed to apply.
    CandidateDropped,
    Superseded,
}

/// Clears `making_offer` however the offer attempt ends, unless the endpoint
/// it belonged to has been replaced meanwhile.
struct OfferInFlight<'a> {
    coordinator: &'a NegotiationCoordinator,
    generation: u64,
}

impl<'a> OfferInFlight<'a> {
    fn begin(coordinator: &'a NegotiationCoordinator, generation: u64) -> Self {
        coordinator.me.borrow_mut().flags.making_offer = true;
        Self {
            coordinator,
            generation,
        }
    }
}

impl Drop for OfferInFlight<'_> {
    fn drop(&mut self) {
        if self.coordinator.is_current(self.generation) {
            self.coordinator.me.borrow_mut().flags.making_offer = false;
        }
    }
}

#[derive(Clone)]
pub struct NegotiationCoordinator {
    me: Rc<RefCell<SelfState>>,
    peer: Rc<RefCell<PeerState>>,
    relay: Rc<dyn SignalRelay>,
}

impl NegotiationCoordinator {
    pub fn new(
        me: Rc<RefCell<SelfState>>,
        peer: Rc<RefCell<PeerState>>,
        relay: Rc<dyn SignalRelay>,
    ) -> Self {
        Self { me, peer, relay }
    }

    /// Called when the relay reports a second party joining. The party already
    /// present becomes polite; repeated calls change nothing.
    pub fn assign_role(&self) -> bool {
        let assigned = self.me.borrow_mut().assign_polite();
        if assigned {
            info!("Peer joined, this side is now polite");
        }
        assigned
    }

    pub fn role(&self) -> Role {
        self.me.borrow().role()
    }

    pub async fn handle_negotiation_needed(&self) -> Result<NegotiationOutcome, NegotiationError> {
        let (endpoint, generation) = self.current_endpoint();
        info!(generation, "Negotiation needed, making an offer");

        let _in_flight = OfferInFlight::begin(self, generation);

        let offer = endpoint.create_and_commit_local_offer().await.map_err(|e| {
            error!("Failed to make offer: {}", e);
            e
        })?;

        if !self.is_current(generation) {
            debug!(generation, "Endpoint replaced while making offer");
            return Ok(NegotiationOutcome::Superseded);
        }

        self.relay.emit(SignalEnvelope::Description(offer))?;
        Ok(NegotiationOutcome::OfferSent)
    }

    pub async fn handle_signal(
        &self,
        signal: SignalEnvelope,
    ) -> Result<SignalOutcome, NegotiationError> {
        match signal {
            SignalEnvelope::Description(description) => self.handle_description(description).await,
            SignalEnvelope::Candidate(candidate) => self.handle_candidate(candidate).await,
        }
    }

    async fn handle_description(
        &self,
        description: SessionDescription,
    ) -> Result<SignalOutcome, NegotiationError> {
        let (endpoint, generation) = self.current_endpoint();
        let kind = description.kind;

        let ignoring = {
            let mut me = self.me.borrow_mut();
            let ready_for_offer = !me.flags.making_offer
                && (endpoint.signaling_state() == SignalingState::Stable
                    || me.flags.setting_remote_answer_pending);
            let collision = kind == SdpType::Offer && !ready_for_offer;
            let ignoring = me.role() != Role::Polite && collision;
            me.flags.ignoring_offer = ignoring;
            ignoring
        };

        if ignoring {
            info!("Offer collision, ignoring remote offer");
            return Ok(SignalOutcome::IgnoredOffer);
        }

        self.me.borrow_mut().flags.setting_remote_answer_pending = kind == SdpType::Answer;
        let committed = endpoint.commit_remote_description(description).await;

        if !self.is_current(generation) {
            debug!(generation, "Endpoint replaced while committing remote description");
            return Ok(SignalOutcome::Superseded);
        }
        self.me.borrow_mut().flags.setting_remote_answer_pending = false;
        committed?;
        debug!(?kind, "Remote description committed");

        if kind != SdpType::Offer {
            return Ok(SignalOutcome::AnswerApplied);
        }

        let answer = endpoint.create_and_commit_local_answer().await?;
        if !self.is_current(generation) {
            debug!(generation, "Endpoint replaced while answering");
            return Ok(SignalOutcome::Superseded);
        }

        self.relay.emit(SignalEnvelope::Description(answer))?;
        Ok(SignalOutcome::Answered)
    }

    async fn handle_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<SignalOutcome, NegotiationError> {
        let (endpoint, generation) = self.current_endpoint();
        let end_of_candidates = candidate.is_end_of_candidates();

        let added = endpoint.add_remote_candidate(candidate).await;

        if !self.is_current(generation) {
            return Ok(SignalOutcome::Superseded);
        }

        match added {
            Ok(()) => Ok(SignalOutcome::CandidateAdded),
            Err(e) => {
                let ignoring = self.me.borrow().flags.ignoring_offer;
                if ignoring && !end_of_candidates {
                    debug!("Dropping candidate of an ignored offer: {}", e);
                    Ok(SignalOutcome::CandidateDropped)
                } else {
                    warn!("Unable to add ICE candidate for peer: {}", e);
                    Err(e.into())
                }
            }
        }
    }

    fn current_endpoint(&self) -> (Rc<dyn ConnectionEndpoint>, u64) {
        let peer = self.peer.borrow();
        (peer.endpoint.clone(), peer.generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.peer.borrow().generation == generation
    }
}
