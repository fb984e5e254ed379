use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;

use crate::endpoint::{Channel, ChannelState};
use crate::error::SendError;

/// Called with frames that were accepted by [`Channel::send_text`] but could
/// not be written, oldest first.
pub type UndeliveredHandler = Box<dyn Fn(Vec<String>) + Send + Sync>;

/// The async half of a data channel that the writer task drives.
#[async_trait]
pub(crate) trait FrameWriter: Send + Sync + 'static {
    async fn write(&self, text: &str) -> Result<(), SendError>;
}

#[async_trait]
impl FrameWriter for Arc<RTCDataChannel> {
    async fn write(&self, text: &str) -> Result<(), SendError> {
        self.send_text(text.to_owned())
            .await
            .map(|_| ())
            .map_err(|e| SendError::Failed {
                label: self.label().to_owned(),
                reason: e.to_string(),
            })
    }
}

/// Writes frames in order. On a failed write the frame and everything queued
/// behind it go to `on_undelivered`.
pub(crate) async fn write_frames<W: FrameWriter>(
    writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
    on_undelivered: UndeliveredHandler,
) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = writer.write(&text).await {
            let mut frames = vec![text];
            while let Ok(next) = rx.try_recv() {
                frames.push(next);
            }
            warn!(undelivered = frames.len(), "Data channel write failed: {}", e);
            on_undelivered(frames);
        }
    }
}

/// Data channel adapter. Frames are handed to a writer task so that sending
/// never suspends the caller.
pub struct WebRtcChannel {
    label: String,
    dc: Arc<RTCDataChannel>,
    tx: mpsc::UnboundedSender<String>,
}

impl WebRtcChannel {
    pub fn new(dc: Arc<RTCDataChannel>, on_undelivered: UndeliveredHandler) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(write_frames(dc.clone(), rx, on_undelivered));

        Self {
            label: dc.label().to_owned(),
            dc,
            tx,
        }
    }
}

impl Channel for WebRtcChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> ChannelState {
        match self.dc.ready_state() {
            RTCDataChannelState::Open => ChannelState::Open,
            RTCDataChannelState::Closing => ChannelState::Closing,
            RTCDataChannelState::Closed => ChannelState::Closed,
            _ => ChannelState::Connecting,
        }
    }

    fn send_text(&self, text: &str) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::NotOpen(self.label.clone()));
        }
        self.tx
            .send(text.to_owned())
            .map_err(|e| SendError::Failed {
                label: self.label.clone(),
                reason: e.to_string(),
            })
    }

    fn close(&self) {
        let dc = self.dc.clone();
        tokio::spawn(async move {
            if let Err(e) = dc.close().await {
                warn!("Failed to close data channel '{}': {}", dc.label(), e);
            }
        });
    }
}
