use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:stun2.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_4: &str = "stun:stun3.l.google.com:19302";

/// Negotiated (out-of-band) channel carrying chat frames.
pub const CHAT_CHANNEL_LABEL: &str = "text chat";
pub const CHAT_CHANNEL_ID: u16 = 100;

/// Negotiated channel carrying feature announcements.
pub const FEATURE_CHANNEL_LABEL: &str = "features";
pub const FEATURE_CHANNEL_ID: u16 = 101;

/// Label prefix of the throw-away channels that announce a visual filter.
pub const FILTER_LABEL_PREFIX: &str = "filter-";

/// Acknowledgements slower than this mark a message as delayed.
pub const DELIVERY_DELAY_THRESHOLD_MS: i64 = 1000;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
