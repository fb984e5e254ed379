use std::collections::{BTreeMap, VecDeque};

use parley_core::ChatMessage;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Received { delayed: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub text: String,
    pub status: DeliveryStatus,
}

/// Result of feeding one incoming control frame to the [`ChatLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Peer content; `reply` is the acknowledgement to send back.
    Received {
        text: String,
        timestamp: i64,
        reply: ChatMessage,
    },
    /// One of our messages was acknowledged.
    Delivered { timestamp: i64, delayed: bool },
    UnknownAcknowledgement { id: i64 },
}

/// Acknowledged messages kept for [`ChatLog::status_of`]. Older receipts are forgotten.
pub const RECEIPT_HISTORY: usize = 256;

/// Sent messages keyed by their timestamp, plus receipt bookkeeping.
///
/// Pending messages are kept until acknowledged. Only the most recent
/// [`RECEIPT_HISTORY`] acknowledged ones are retained.
#[derive(Debug)]
pub struct ChatLog {
    sent: BTreeMap<i64, SentMessage>,
    acknowledged: VecDeque<i64>,
    delay_threshold_ms: i64,
    last_timestamp: i64,
}

impl ChatLog {
    pub fn new(delay_threshold_ms: i64) -> Self {
        Self {
            sent: BTreeMap::new(),
            acknowledged: VecDeque::new(),
            delay_threshold_ms,
            last_timestamp: i64::MIN,
        }
    }

    /// Records a new outgoing message and returns the frame to send.
    ///
    /// Timestamps double as message ids, so a submission in the same
    /// millisecond as the previous one is bumped forward.
    pub fn submit(&mut self, text: impl Into<String>, now: i64) -> ChatMessage {
        let timestamp = now.max(self.last_timestamp.saturating_add(1));
        self.last_timestamp = timestamp;

        let text = text.into();
        self.sent.insert(
            timestamp,
            SentMessage {
                text: text.clone(),
                status: DeliveryStatus::Pending,
            },
        );
        ChatMessage::content(text, timestamp)
    }

    pub fn handle_incoming(&mut self, message: ChatMessage, received_at: i64) -> ChatEvent {
        match message {
            ChatMessage::Content { text, timestamp } => ChatEvent::Received {
                text,
                timestamp,
                reply: ChatMessage::acknowledge(timestamp, received_at),
            },
            ChatMessage::Acknowledgement { id, timestamp } => {
                let Some(sent) = self.sent.get_mut(&id) else {
                    warn!(id, "Acknowledgement for unknown message");
                    return ChatEvent::UnknownAcknowledgement { id };
                };
                // `timestamp` is peer supplied.
                let delayed = timestamp.saturating_sub(id) > self.delay_threshold_ms;
                let first_receipt = sent.status == DeliveryStatus::Pending;
                sent.status = DeliveryStatus::Received { delayed };
                if first_receipt {
                    self.remember_receipt(id);
                }
                ChatEvent::Delivered {
                    timestamp: id,
                    delayed,
                }
            }
        }
    }

    pub fn status_of(&self, timestamp: i64) -> Option<DeliveryStatus> {
        self.sent.get(&timestamp).map(|m| m.status)
    }

    pub fn get(&self, timestamp: i64) -> Option<&SentMessage> {
        self.sent.get(&timestamp)
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    fn remember_receipt(&mut self, id: i64) {
        self.acknowledged.push_back(id);
        while self.acknowledged.len() > RECEIPT_HISTORY {
            if let Some(oldest) = self.acknowledged.pop_front() {
                self.sent.remove(&oldest);
            }
        }
    }
}
