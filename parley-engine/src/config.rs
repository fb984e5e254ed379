use parley_core::utils::{
    CHAT_CHANNEL_ID, CHAT_CHANNEL_LABEL, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2,
    DEFAULT_STUN_ADDR_3, DEFAULT_STUN_ADDR_4, DELIVERY_DELAY_THRESHOLD_MS, FEATURE_CHANNEL_ID,
    FEATURE_CHANNEL_LABEL,
};
use parley_core::{FeatureMap, IceServerConfig, features};

use crate::endpoint::{TrackInfo, TrackKind};

/// Label and (optional) pre-agreed stream id of a data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub label: String,
    /// When set, both sides create the channel themselves with this id and no
    /// in-band announcement happens.
    pub negotiated_id: Option<u16>,
}

impl ChannelSpec {
    pub fn negotiated(label: impl Into<String>, id: u16) -> Self {
        Self {
            label: label.into(),
            negotiated_id: Some(id),
        }
    }

    pub fn announced(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            negotiated_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub chat_channel: ChannelSpec,
    pub feature_channel: ChannelSpec,
    /// Acknowledgements arriving later than this (ms) mark the message delayed.
    pub delivery_delay_threshold_ms: i64,
    pub initial_features: FeatureMap,
    pub local_tracks: Vec<TrackInfo>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let ice_servers = vec![IceServerConfig {
            urls: vec![
                DEFAULT_STUN_ADDR.to_owned(),
                DEFAULT_STUN_ADDR_2.to_owned(),
                DEFAULT_STUN_ADDR_3.to_owned(),
                DEFAULT_STUN_ADDR_4.to_owned(),
            ],
            username: None,
            credential: None,
        }];

        let mut initial_features = FeatureMap::new();
        initial_features.insert(features::AUDIO.to_owned(), false);

        Self {
            ice_servers,
            chat_channel: ChannelSpec::negotiated(CHAT_CHANNEL_LABEL, CHAT_CHANNEL_ID),
            feature_channel: ChannelSpec::negotiated(FEATURE_CHANNEL_LABEL, FEATURE_CHANNEL_ID),
            delivery_delay_threshold_ms: DELIVERY_DELAY_THRESHOLD_MS,
            initial_features,
            local_tracks: vec![TrackInfo::local(TrackKind::Video, "camera")],
        }
    }
}
