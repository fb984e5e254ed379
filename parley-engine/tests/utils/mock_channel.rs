use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use parley_engine::{Channel, ChannelState, SendError};

/// In-memory channel that records every frame it accepts.
pub struct MockChannel {
    label: String,
    state: Mutex<ChannelState>,
    sent: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
}

impl MockChannel {
    pub fn new(label: impl Into<String>, state: ChannelState) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn set_state(&self, state: ChannelState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Frames accepted so far, in send order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }
}

impl Channel for MockChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    fn send_text(&self, text: &str) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::NotOpen(self.label.clone()));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SendError::Failed {
                label: self.label.clone(),
                reason: "mock failure".into(),
            });
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    fn close(&self) {
        self.set_state(ChannelState::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_channel_rejects_sends_until_open() {
        let channel = MockChannel::new("text chat", ChannelState::Connecting);
        assert!(channel.send_text("a").is_err());

        channel.set_state(ChannelState::Open);
        channel.send_text("b").unwrap();
        assert_eq!(channel.sent(), vec!["b".to_string()]);
    }
}
