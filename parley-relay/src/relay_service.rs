use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use parley_core::{PeerId, RelayFrame, RoomId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomFull;

struct Party {
    peer_id: PeerId,
    tx: mpsc::UnboundedSender<Message>,
}

struct RelayInner {
    rooms: DashMap<RoomId, Vec<Party>>,
    capacity: usize,
}

/// Room membership and fan-out for the websocket relay.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                rooms: DashMap::new(),
                capacity,
            }),
        }
    }

    /// Admits `peer_id` to `room`. The joiner is told `connect`, whoever was
    /// already present is told `connected peer`.
    pub fn join(
        &self,
        room: &RoomId,
        peer_id: PeerId,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Result<(), RoomFull> {
        let mut parties = self.inner.rooms.entry(room.clone()).or_default();
        if parties.len() >= self.inner.capacity {
            warn!("Room {} is full, refusing {}", room, peer_id);
            return Err(RoomFull);
        }

        for party in parties.iter() {
            send_frame(party, &RelayFrame::PeerJoined);
        }
        let joiner = Party { peer_id, tx };
        send_frame(&joiner, &RelayFrame::Connect);
        parties.push(joiner);

        info!("Peer {} joined room {} ({} present)", peer_id, room, parties.len());
        Ok(())
    }

    /// Passes a frame unchanged to everybody else in the room.
    pub fn forward(&self, room: &RoomId, from: PeerId, msg: Message) {
        let Some(parties) = self.inner.rooms.get(room) else {
            warn!("Signal for unknown room {}", room);
            return;
        };
        for party in parties.iter().filter(|p| p.peer_id != from) {
            if let Err(e) = party.tx.send(msg.clone()) {
                error!("Failed to forward signal to {}: {:?}", party.peer_id, e);
            }
        }
    }

    pub fn leave(&self, room: &RoomId, peer_id: PeerId) {
        let now_empty = match self.inner.rooms.get_mut(room) {
            Some(mut parties) => {
                parties.retain(|p| p.peer_id != peer_id);
                for party in parties.iter() {
                    send_frame(party, &RelayFrame::PeerLeft);
                }
                parties.is_empty()
            }
            None => return,
        };

        if now_empty {
            self.inner.rooms.remove_if(room, |_, parties| parties.is_empty());
            debug!("Room {} removed", room);
        }
        info!("Peer {} left room {}", peer_id, room);
    }

    pub fn room_size(&self, room: &RoomId) -> usize {
        self.inner.rooms.get(room).map_or(0, |p| p.len())
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }
}

fn send_frame(party: &Party, frame: &RelayFrame) {
    match frame.to_json() {
        Ok(json) => {
            if let Err(e) = party.tx.send(Message::Text(json.into())) {
                error!("Failed to send WS message to {}: {:?}", party.peer_id, e);
            }
        }
        Err(e) => error!("Failed to serialize relay frame: {}", e),
    }
}
