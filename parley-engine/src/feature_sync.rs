use std::collections::HashMap;

use parley_core::FeatureMap;
use tracing::{debug, warn};

use crate::endpoint::Channel;

type FeatureHandler = Box<dyn Fn(bool)>;

/// Announces local capability flags over the feature channel and merges the
/// peer's announcements.
#[derive(Default)]
pub struct FeatureSyncChannel {
    handlers: HashMap<String, FeatureHandler>,
}

impl FeatureSyncChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a side effect run after `name` is merged from the peer.
    pub fn on_feature<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(bool) + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Full-state announcement, sent once when the channel opens.
    pub fn share_all(&self, local: &FeatureMap, channel: Option<&dyn Channel>) -> bool {
        Self::send(local, channel)
    }

    /// Partial announcement of `names`. Skipped while the channel is missing or
    /// not open: the full state follows on open.
    pub fn share(&self, local: &FeatureMap, names: &[&str], channel: Option<&dyn Channel>) -> bool {
        let partial: FeatureMap = names
            .iter()
            .filter_map(|name| local.get_key_value(*name))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        if partial.is_empty() {
            return false;
        }
        Self::send(&partial, channel)
    }

    /// Records a local change and shares just that key.
    pub fn set_local(
        &self,
        local: &mut FeatureMap,
        name: &str,
        enabled: bool,
        channel: Option<&dyn Channel>,
    ) -> bool {
        local.insert(name.to_owned(), enabled);
        self.share(local, &[name], channel)
    }

    /// Merges a peer announcement into `peer` and runs the handlers of the
    /// merged keys. Returns the keys merged, in frame order.
    pub fn receive(
        &self,
        peer: &mut FeatureMap,
        frame: &str,
    ) -> Result<Vec<(String, bool)>, serde_json::Error> {
        let update: FeatureMap = serde_json::from_str(frame)?;
        for (name, value) in &update {
            peer.insert(name.clone(), *value);
        }

        for (name, value) in &update {
            if let Some(handler) = self.handlers.get(name) {
                handler(*value);
            }
        }

        Ok(update.into_iter().collect())
    }

    fn send(features: &FeatureMap, channel: Option<&dyn Channel>) -> bool {
        let Some(channel) = channel.filter(|c| c.is_open()) else {
            debug!("Feature channel not open, skipping announcement");
            return false;
        };

        let frame = match serde_json::to_string(features) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode features: {}", e);
                return false;
            }
        };

        match channel.send_text(&frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to share features: {}", e);
                false
            }
        }
    }
}
