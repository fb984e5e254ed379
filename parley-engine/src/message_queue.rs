use std::collections::VecDeque;

use parley_core::ChatMessage;
use tracing::{debug, error, warn};

use crate::endpoint::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    Back,
    Front,
}

/// What happened to a message handed to [`MessageQueue::send_or_queue`].
/// Both outcomes are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Queued,
}

/// Outbound control messages waiting for the control channel.
///
/// Content messages leave in submission order. Acknowledgements that cannot
/// be sent go to the front, ahead of content that has not been sent yet.
#[derive(Debug, Default)]
pub struct MessageQueue {
    items: VecDeque<ChatMessage>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.items.iter()
    }

    pub fn enqueue(&mut self, message: ChatMessage, position: QueuePosition) {
        match position {
            QueuePosition::Back => self.items.push_back(message),
            QueuePosition::Front => self.items.push_front(message),
        }
    }

    /// Puts back messages a channel accepted but never wrote. They go to the
    /// front in their original order.
    pub fn restore(&mut self, messages: Vec<ChatMessage>) {
        for message in messages.into_iter().rev() {
            self.items.push_front(message);
        }
    }

    /// Sends `message` now if `channel` is open, otherwise keeps it for the
    /// next drain. Never fails.
    pub fn send_or_queue(&mut self, channel: Option<&dyn Channel>, message: ChatMessage) -> Delivery {
        let position = if message.is_acknowledgement() {
            QueuePosition::Front
        } else {
            QueuePosition::Back
        };

        if let Some(open) = channel.filter(|c| c.is_open()) {
            if !self.is_empty() {
                self.drain_on_open(open);
            }
            if position == QueuePosition::Back && !self.is_empty() {
                self.enqueue(message, position);
                return Delivery::Queued;
            }
        }

        self.send_or_queue_at(channel, message, position)
    }

    /// Flushes the queue front to back while `channel` stays open. Returns the
    /// number of messages handed to the channel.
    pub fn drain_on_open(&mut self, channel: &dyn Channel) -> usize {
        let mut sent = 0;

        // Sending may close the channel, so the state is checked before every send.
        while channel.is_open() {
            let Some(message) = self.items.pop_front() else {
                break;
            };
            match self.send_or_queue_at(Some(channel), message, QueuePosition::Front) {
                Delivery::Sent => sent += 1,
                Delivery::Queued => break,
            }
        }

        debug!(
            label = channel.label(),
            sent,
            remaining = self.items.len(),
            "Drained message queue"
        );
        sent
    }

    fn send_or_queue_at(
        &mut self,
        channel: Option<&dyn Channel>,
        message: ChatMessage,
        position: QueuePosition,
    ) -> Delivery {
        let Some(channel) = channel.filter(|c| c.is_open()) else {
            self.enqueue(message, position);
            return Delivery::Queued;
        };

        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode control message: {}", e);
                self.enqueue(message, position);
                return Delivery::Queued;
            }
        };

        match channel.send_text(&frame) {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!("Error sending message, queueing it: {}", e);
                self.enqueue(message, position);
                Delivery::Queued
            }
        }
    }
}
