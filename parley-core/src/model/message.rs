use serde::{Deserialize, Serialize};

/// One frame on the control channel.
///
/// The presence of `id` is what separates a delivery acknowledgement from a
/// content message, so the acknowledgement variant is tried first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatMessage {
    Acknowledgement { id: i64, timestamp: i64 },
    Content { text: String, timestamp: i64 },
}

impl ChatMessage {
    pub fn content(text: impl Into<String>, timestamp: i64) -> Self {
        Self::Content {
            text: text.into(),
            timestamp,
        }
    }

    /// Acknowledges `content_timestamp`, stamped with the time of receipt.
    pub fn acknowledge(content_timestamp: i64, received_at: i64) -> Self {
        Self::Acknowledgement {
            id: content_timestamp,
            timestamp: received_at,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Acknowledgement { timestamp, .. } | Self::Content { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn is_acknowledgement(&self) -> bool {
        matches!(self, Self::Acknowledgement { .. })
    }
}
