use std::cell::RefCell;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parley_core::{RelayFrame, RoomLocator, SignalEnvelope};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{RelayEvent, SignalRelay};
use crate::error::RelayError;

/// Websocket client for the room relay served at `<base>/ws/<room>`.
pub struct WsRelay {
    url: String,
    events_tx: mpsc::UnboundedSender<RelayEvent>,
    outbound: RefCell<Option<mpsc::UnboundedSender<String>>>,
    reader: RefCell<Option<JoinHandle<()>>>,
}

impl WsRelay {
    pub fn new(locator: &RoomLocator) -> (Self, mpsc::UnboundedReceiver<RelayEvent>) {
        let url = format!("{}/ws/{}", locator.base().trim_end_matches('/'), locator.room());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let relay = Self {
            url,
            events_tx,
            outbound: RefCell::new(None),
            reader: RefCell::new(None),
        };
        (relay, events_rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.outbound
            .borrow()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait(?Send)]
impl SignalRelay for WsRelay {
    async fn open(&self) -> Result<(), RelayError> {
        if self.is_open() {
            debug!(url = self.url, "Relay already open");
            return Ok(());
        }

        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RelayError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        info!(url = self.url, "Relay connected");

        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!("Relay write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let events_tx = self.events_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => {
                        info!("Relay closed the connection");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Relay read failed: {}", e);
                        break;
                    }
                };

                let event = match RelayFrame::from_json(text.as_str()) {
                    Ok(RelayFrame::Connect) => RelayEvent::Connected,
                    Ok(RelayFrame::PeerJoined) => RelayEvent::PeerJoined,
                    Ok(RelayFrame::PeerLeft) => RelayEvent::PeerLeft,
                    Ok(RelayFrame::Signal(payload)) => match payload.into_envelope() {
                        Some(signal) => RelayEvent::Signal(signal),
                        None => {
                            debug!("Signal without payload");
                            continue;
                        }
                    },
                    Err(e) => {
                        warn!("Undecodable relay frame: {}", e);
                        continue;
                    }
                };

                if events_tx.send(event).is_err() {
                    break;
                }
            }
        });

        *self.outbound.borrow_mut() = Some(tx);
        if let Some(previous) = self.reader.borrow_mut().replace(reader) {
            previous.abort();
        }
        Ok(())
    }

    fn close(&self) {
        // Dropping the sender ends the writer, which closes the socket.
        if self.outbound.borrow_mut().take().is_some() {
            info!(url = self.url, "Relay closed");
        }
        if let Some(reader) = self.reader.borrow_mut().take() {
            reader.abort();
        }
    }

    fn emit(&self, signal: SignalEnvelope) -> Result<(), RelayError> {
        let text = RelayFrame::signal(signal).to_json()?;
        let outbound = self.outbound.borrow();
        let tx = outbound.as_ref().ok_or(RelayError::NotConnected)?;
        tx.send(text).map_err(|_| RelayError::NotConnected)
    }
}
