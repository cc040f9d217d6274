//! Lobby service: the stateful coordination hub.
//!
//! Holds the live session, room, and invite tables; everything persistent
//! goes through the storage service. One worker per client connection reads
//! requests; a paired writer task owns the socket's write half and drains a
//! per-client queue, so broadcasts never block on a slow consumer.
//!
//! Lock ordering on any multi-lock path: sessions, then rooms, then
//! invites. Downstream storage calls happen before the locks are taken or
//! after they are released, never across them.

pub mod browse;
pub mod developer;
pub mod launcher;
pub mod rooms;
pub mod session;

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::protocol::validation::validate_request;
use crate::protocol::{
    framing, FrameError, Push, Reason, Reply, RoomStatus, RoomSummary, SessionStatus, UserSummary,
};
use crate::storage::StorageClient;

/// Room ids start here and increase monotonically for the process lifetime.
const FIRST_ROOM_ID: u64 = 100;

/// A logged-in client: its outbound queue and live status.
pub struct Session {
    pub addr: SocketAddr,
    pub sender: mpsc::Sender<Bytes>,
    pub status: SessionStatus,
}

impl Session {
    /// Non-blocking enqueue; a full queue means the client is too slow and
    /// the frame is dropped rather than holding anyone else up.
    pub fn push(&self, frame: &Bytes) {
        if let Err(e) = self.sender.try_send(frame.clone()) {
            tracing::warn!(error = %e, "dropping frame for slow or gone client");
        }
    }
}

/// A one- or two-player aggregation around a chosen game.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: u64,
    pub name: String,
    pub host: String,
    pub players: Vec<String>,
    pub status: RoomStatus,
    pub game_id: Option<u64>,
    pub game_name: Option<String>,
    pub is_public: bool,
}

impl Room {
    fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            name: self.name.clone(),
            host: self.host.clone(),
            players: self.players.len(),
            game_id: self.game_id,
            game_name: self.game_name.clone(),
        }
    }

    fn update_push(&self) -> Push {
        Push::RoomUpdate {
            room_id: self.id,
            name: self.name.clone(),
            players: self.players.clone(),
            host: self.host.clone(),
            game_id: self.game_id,
            game_name: self.game_name.clone(),
            is_public: self.is_public,
            status: self.status,
        }
    }
}

/// One-shot capability to join a specific private room.
#[derive(Debug, Clone)]
pub struct Invite {
    pub from: String,
    pub room_id: u64,
    pub game_name: Option<String>,
}

/// Handle a worker uses to answer its own client.
pub struct ClientConn {
    pub addr: SocketAddr,
    pub sender: mpsc::Sender<Bytes>,
}

impl ClientConn {
    /// Queue a message for this client, waiting for space if needed.
    pub async fn send<T: Serialize>(&self, message: &T) {
        match framing::encode(message) {
            Ok(frame) => {
                if self.sender.send(frame).await.is_err() {
                    tracing::debug!(addr = %self.addr, "client writer gone");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to encode outbound message"),
        }
    }
}

pub struct LobbyServer {
    pub(crate) config: Arc<Config>,
    pub(crate) storage: StorageClient,
    pub(crate) sessions: Mutex<HashMap<String, Session>>,
    pub(crate) rooms: Mutex<HashMap<u64, Room>>,
    pub(crate) invites: Mutex<HashMap<String, Vec<Invite>>>,
    room_counter: AtomicU64,
}

impl LobbyServer {
    pub fn new(config: Arc<Config>) -> Self {
        let storage = StorageClient::new(config.storage.addr());
        Self {
            config,
            storage,
            sessions: Mutex::new(HashMap::new()),
            rooms: Mutex::new(HashMap::new()),
            invites: Mutex::new(HashMap::new()),
            room_counter: AtomicU64::new(FIRST_ROOM_ID),
        }
    }

    pub(crate) fn next_room_id(&self) -> u64 {
        self.room_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Accept connections until `shutdown` fires.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "lobby service listening");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("lobby service shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let server = Arc::clone(&self);
                            tokio::spawn(async move {
                                server.handle_connection(stream, peer).await;
                            });
                        }
                        Err(e) => tracing::error!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        tracing::info!(%addr, "client connected");
        let (mut reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel::<Bytes>(self.config.lobby.client_queue_size);
        let writer_task = tokio::spawn(write_loop(writer, rx));

        let conn = ClientConn {
            addr,
            sender: tx.clone(),
        };
        // Username of the authenticated phase; None while pre-auth.
        let mut username: Option<String> = None;

        loop {
            let body = match framing::read_frame(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    tracing::info!(%addr, user = username.as_deref().unwrap_or("-"), "client disconnected");
                    break;
                }
                Err(FrameError::InvalidLength(len)) => {
                    tracing::warn!(%addr, len, "frame length out of bounds, closing connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "read error, closing connection");
                    break;
                }
            };

            let envelope: serde_json::Value = match serde_json::from_slice(&body) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "invalid JSON from client");
                    conn.send(&Reply::error(Reason::InvalidJsonFormat)).await;
                    continue;
                }
            };
            let Some(action) = envelope.get("action").and_then(|a| a.as_str()).map(str::to_string)
            else {
                conn.send(&Reply::error(Reason::MissingKey("action".into())))
                    .await;
                continue;
            };
            let data = envelope
                .get("data")
                .cloned()
                .unwrap_or(serde_json::Value::Null);

            tracing::debug!(%addr, %action, "request");

            if let Err(reason) = validate_request(&action, &data) {
                conn.send(&Reply::error(reason)).await;
                continue;
            }

            let logout_requested = self
                .dispatch(&conn, &mut username, &action, &data)
                .await;
            if logout_requested {
                break;
            }
        }

        // The disconnect path runs the same cleanup as an explicit logout.
        if let Some(user) = username.take() {
            self.finish_session(&user, false).await;
        }
        drop(conn);
        drop(tx);
        let _ = writer_task.await;
        tracing::info!(%addr, "connection closed");
    }

    /// Process one request. Returns `true` when the connection should close
    /// (explicit logout).
    async fn dispatch(
        &self,
        conn: &ClientConn,
        username: &mut Option<String>,
        action: &str,
        data: &serde_json::Value,
    ) -> bool {
        // System action allowed without login: match services report the
        // end of a game. Trusted by topology; only spawned match services
        // know live room ids.
        if action == "game_over" {
            self.handle_game_over(data).await;
            conn.send(&Reply::ok().with_reason("game_over_processed"))
                .await;
            return false;
        }

        match username.as_deref() {
            // Pre-auth phase: register, login, logout only.
            None => match action {
                "register" => {
                    let reply = self.handle_register(data).await;
                    conn.send(&reply).await;
                }
                "login" => {
                    *username = self.handle_login(conn, data).await;
                }
                "logout" => return true,
                _ => {
                    conn.send(&Reply::error(Reason::MustBeLoggedIn)).await;
                }
            },
            Some(user) => {
                let user = user.to_string();
                match action {
                    "login" => {
                        conn.send(&Reply::error(Reason::AlreadyLoggedIn)).await;
                    }
                    "logout" => {
                        self.finish_session(&user, true).await;
                        *username = None;
                        return true;
                    }
                    "list_rooms" => {
                        let rooms = self.public_room_list().await;
                        conn.send(&Reply::ok().with_field("rooms", to_json(&rooms)))
                            .await;
                    }
                    "list_users" => {
                        let users = self.user_list().await;
                        conn.send(&Reply::ok().with_field("users", to_json(&users)))
                            .await;
                    }
                    "create_room" => self.handle_create_room(conn, &user, data).await,
                    "join_room" => self.handle_join_room(conn, &user, data).await,
                    "leave_room" => self.handle_leave_room(&user).await,
                    "start_game" => self.handle_start_game(conn, &user).await,
                    "invite" => self.handle_invite(conn, &user, data).await,
                    "query_gamelogs" => self.handle_query_gamelogs(conn, data).await,
                    "list_games" => self.handle_list_games(conn).await,
                    "search_games" => self.handle_search_games(conn, data).await,
                    "get_game_info" => self.handle_get_game_info(conn, data).await,
                    "download_game" => self.handle_download_game(conn, data).await,
                    "upload_game" => self.handle_upload_game(conn, &user, data).await,
                    "update_game" => self.handle_update_game(conn, &user, data).await,
                    "remove_game" => self.handle_remove_game(conn, &user, data).await,
                    "list_my_games" => self.handle_list_my_games(conn, &user).await,
                    other => {
                        tracing::warn!(action = other, "unknown action");
                        conn.send(&Reply::error(Reason::UnknownAction)).await;
                    }
                }
            }
        }
        false
    }

    // === Shared views and broadcasts ===

    /// Idle public rooms, for `list_rooms` and list broadcasts.
    pub(crate) async fn public_room_list(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.lock().await;
        let mut list: Vec<RoomSummary> = rooms
            .values()
            .filter(|room| room.status == RoomStatus::Idle && room.is_public)
            .map(Room::summary)
            .collect();
        list.sort_by_key(|room| room.id);
        list
    }

    pub(crate) async fn user_list(&self) -> Vec<UserSummary> {
        let sessions = self.sessions.lock().await;
        let mut list: Vec<UserSummary> = sessions
            .iter()
            .map(|(username, session)| UserSummary {
                username: username.clone(),
                status: session.status,
            })
            .collect();
        list.sort_by(|a, b| a.username.cmp(&b.username));
        list
    }

    /// Send one message to every session. The sender list is copied under
    /// the lock; the sends happen without it.
    pub(crate) async fn broadcast_all<T: Serialize>(&self, message: &T) {
        let frame = match framing::encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast");
                return;
            }
        };
        let senders: Vec<mpsc::Sender<Bytes>> = {
            let sessions = self.sessions.lock().await;
            sessions.values().map(|s| s.sender.clone()).collect()
        };
        for sender in senders {
            if let Err(e) = sender.try_send(frame.clone()) {
                tracing::warn!(error = %e, "dropping broadcast frame for slow client");
            }
        }
    }

    /// Broadcast the refreshed public-room list to every session.
    pub(crate) async fn broadcast_room_list(&self) {
        let rooms = self.public_room_list().await;
        self.broadcast_all(&Reply::ok().with_field("rooms", to_json(&rooms)))
            .await;
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Bytes>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = framing::write_frame(&mut writer, &frame).await {
            tracing::debug!(error = %e, "client write failed, stopping writer");
            break;
        }
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
