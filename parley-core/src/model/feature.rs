use std::collections::BTreeMap;

/// Capability flags keyed by feature name. Ordered so that a full-state
/// announcement always serializes the same way.
pub type FeatureMap = BTreeMap<String, bool>;

/// Well-known feature names.
pub mod features {
    pub const AUDIO: &str = "audio";
    pub const VIDEO: &str = "video";
}
