//! WebSocket accept loop and per-connection tasks.
//!
//! Each accepted connection gets a reader half (parsing inbound frames into
//! room events) and a writer task (draining the session's outbound queue),
//! so one slow client never blocks the room or its neighbors.

use crate::room::RoomEvent;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::ClientMessage;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

/// The only upgrade-eligible path; everything else is refused during the
/// handshake.
pub const WS_ENDPOINT: &str = "/ws";

/// Listens for WebSocket connections and feeds parsed client messages into
/// the room's event channel.
pub struct NetworkServer {
    listener: TcpListener,
}

impl NetworkServer {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    /// The bound address; useful when binding to port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process exits. Each connection runs on
    /// its own task; a failed accept is logged and the loop continues.
    pub async fn run(self, room_tx: mpsc::UnboundedSender<RoomEvent>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let room_tx = room_tx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, room_tx).await;
                    });
                }
                Err(e) => error!("Error accepting connection: {}", e),
            }
        }
    }
}

/// Upgrades one TCP connection and pumps it until it closes. The session is
/// registered with the room as soon as the handshake completes and
/// unregistered when the socket goes away, however it goes away.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    room_tx: mpsc::UnboundedSender<RoomEvent>,
) {
    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, check_endpoint).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            // Non-upgrade requests land here after the handshake has
            // already answered them with an HTTP error.
            debug!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let id = new_session_id();
    info!("Client {} connected from {}", id, addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: drains this session's outbound queue.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    if room_tx
        .send(RoomEvent::Connect {
            id: id.clone(),
            tx,
        })
        .is_err()
    {
        return;
    }

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    if room_tx
                        .send(RoomEvent::Message {
                            id: id.clone(),
                            message,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => debug!("Ignoring malformed message from {}: {}", id, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // binary and control frames carry no game meaning
            Err(e) => {
                debug!("Socket error for {}: {}", id, e);
                break;
            }
        }
    }

    let _ = room_tx.send(RoomEvent::Disconnect { id: id.clone() });
    writer.abort();
    info!("Client {} from {} closed", id, addr);
}

/// Handshake callback: only the game endpoint upgrades; every other path is
/// answered with 404 before the WebSocket comes up.
fn check_endpoint(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_ENDPOINT {
        Ok(response)
    } else {
        let mut refusal = ErrorResponse::new(None);
        *refusal.status_mut() = StatusCode::NOT_FOUND;
        Err(refusal)
    }
}

/// Fresh identity per connection.
fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}
