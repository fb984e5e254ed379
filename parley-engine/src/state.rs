use std::rc::Rc;
use std::sync::Arc;

use parley_core::FeatureMap;

use crate::chat::ChatLog;
use crate::effects::FilterCycle;
use crate::endpoint::{Channel, ConnectionEndpoint, TrackInfo};
use crate::message_queue::MessageQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Yields to incoming offers.
    Polite,
    /// Defers to its own in-flight offer.
    #[default]
    Impolite,
}

/// Flags scoped to one negotiation attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegotiationFlags {
    pub making_offer: bool,
    pub ignoring_offer: bool,
    pub setting_remote_answer_pending: bool,
}

impl NegotiationFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// State owned by this party for the life of the process.
#[derive(Debug)]
pub struct SelfState {
    role: Role,
    role_assigned: bool,
    pub flags: NegotiationFlags,
    pub features: FeatureMap,
    pub outbound: MessageQueue,
    pub chat: ChatLog,
    pub filters: FilterCycle,
}

impl SelfState {
    pub fn new(features: FeatureMap, delay_threshold_ms: i64) -> Self {
        Self {
            role: Role::default(),
            role_assigned: false,
            flags: NegotiationFlags::default(),
            features,
            outbound: MessageQueue::new(),
            chat: ChatLog::new(delay_threshold_ms),
            filters: FilterCycle::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Becomes polite unless a role was already assigned in this relay session.
    /// Returns whether the role changed.
    pub fn assign_polite(&mut self) -> bool {
        if self.role_assigned {
            return false;
        }
        self.role = Role::Polite;
        self.role_assigned = true;
        true
    }

    /// Forgets the role when leaving the relay session.
    pub fn clear_role(&mut self) {
        self.role = Role::default();
        self.role_assigned = false;
    }
}

/// Everything scoped to one endpoint. Replaced wholesale on reset.
pub struct PeerState {
    pub endpoint: Rc<dyn ConnectionEndpoint>,
    /// Bumped for every new endpoint; callbacks carry it so stale ones can be told apart.
    pub generation: u64,
    pub chat_channel: Option<Arc<dyn Channel>>,
    pub feature_channel: Option<Arc<dyn Channel>>,
    pub features: FeatureMap,
    pub tracks: Vec<TrackInfo>,
    pub filter: Option<String>,
    pub effect_channels: Vec<Arc<dyn Channel>>,
}

impl PeerState {
    pub fn new(endpoint: Rc<dyn ConnectionEndpoint>, generation: u64) -> Self {
        Self {
            endpoint,
            generation,
            chat_channel: None,
            feature_channel: None,
            features: FeatureMap::new(),
            tracks: Vec::new(),
            filter: None,
            effect_channels: Vec::new(),
        }
    }

    pub fn chat_channel(&self) -> Option<&dyn Channel> {
        self.chat_channel.as_deref()
    }

    pub fn feature_channel(&self) -> Option<&dyn Channel> {
        self.feature_channel.as_deref()
    }
}
