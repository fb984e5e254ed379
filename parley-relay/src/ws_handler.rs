use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use parley_core::{PeerId, RelayFrame, RoomId};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::RelayService;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(service): State<RelayService>,
) -> Response {
    let room = match room.parse::<RoomId>() {
        Ok(room) => room,
        Err(e) => {
            warn!("Rejecting relay connection: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, room, service))
}

async fn handle_socket(socket: WebSocket, room: RoomId, service: RelayService) {
    let peer_id = PeerId::new();
    info!("New WebSocket connection {} for room {}", peer_id, room);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    if service.join(&room, peer_id, tx).is_err() {
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "room full".into(),
            })))
            .await;
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let room = room.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match RelayFrame::from_json(text.as_str()) {
                        Ok(RelayFrame::Signal(_)) => {
                            service.forward(&room, peer_id, Message::Text(text));
                        }
                        Ok(other) => warn!("Ignoring {:?} from {}", other, peer_id),
                        Err(e) => warn!("Invalid relay frame from {}: {}", peer_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.leave(&room, peer_id);
    info!("WebSocket disconnected: {}", peer_id);
}
