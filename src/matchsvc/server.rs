//! Authoritative match server.
//!
//! Lifecycle: bind, accept exactly two players (P1 first), greet each with
//! `WELCOME{role, seed}`, then run one reader task per client plus the main
//! loop. The main loop applies inputs, advances the sim at its tick
//! cadence, broadcasts snapshots at a fixed cadence, and watches the clock.
//!
//! Finalization order is fixed: the game log is written to storage, then
//! `GAME_OVER` goes to both clients, then the lobby is notified. The log
//! write and the lobby notification are best-effort; the clients' own
//! `GAME_OVER` is the source of truth for the outcome.

use chrono::Utc;
use rand::RngExt;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::games::{MatchSim, Outcome};
use crate::net;
use crate::protocol::{
    framing, EndReason, Envelope, MatchClientMessage, MatchServerMessage, PlayerResult, PlayerSlot,
    Reply, Winner,
};
use crate::storage::models::GameLogEntry;
use crate::storage::StorageClient;

/// Snapshot broadcast cadence, independent of the sim's tick rate.
const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(100);

/// Launch parameters, straight from the uniform CLI surface.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub port: u16,
    pub p1: String,
    pub p2: String,
    pub room_id: u64,
    pub game_id: Option<u64>,
    pub storage_addr: String,
    pub lobby_addr: String,
}

enum PlayerEvent {
    Input(PlayerSlot, String),
    Forfeit(PlayerSlot),
    Disconnect(PlayerSlot),
}

/// Run one match to completion.
pub async fn run_server<S: MatchSim>(opts: MatchOptions) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = format!("0.0.0.0:{}", opts.port).parse()?;
    let listener = net::bind_reuse(bind_addr)?;
    tracing::info!(port = opts.port, room_id = opts.room_id, "match service listening");

    let seed: u64 = rand::rng().random_range(0..1_000_000);
    let (events_tx, mut events_rx) = mpsc::channel::<PlayerEvent>(256);
    let readers_done = CancellationToken::new();

    // Accept exactly two players; the first accepted connection is P1.
    let mut writers: Vec<OwnedWriteHalf> = Vec::with_capacity(2);
    for slot in [PlayerSlot::P1, PlayerSlot::P2] {
        loop {
            let (stream, peer) = listener.accept().await?;
            let (read_half, mut write_half) = stream.into_split();

            let welcome = MatchServerMessage::Welcome {
                role: slot,
                seed: Some(seed),
            };
            if let Err(e) = framing::send_message(&mut write_half, &welcome).await {
                tracing::warn!(%peer, error = %e, "failed to greet player, waiting for another");
                continue;
            }

            tracing::info!(%peer, role = %slot, "player connected");
            tokio::spawn(read_inputs(
                read_half,
                slot,
                events_tx.clone(),
                readers_done.clone(),
            ));
            writers.push(write_half);
            break;
        }
    }

    tracing::info!("both players connected, starting game");
    let mut sim = S::from_seed(seed);
    let duration = sim.match_duration();
    let started_at = Utc::now();
    let start = tokio::time::Instant::now();
    let deadline = start + duration;

    let mut tick = tokio::time::interval_at(start + sim.tick_interval(), sim.tick_interval());
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut snapshots = tokio::time::interval_at(start + SNAPSHOT_INTERVAL, SNAPSHOT_INTERVAL);
    snapshots.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let outcome = loop {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {
                break sim.final_outcome();
            }
            event = events_rx.recv() => {
                match event {
                    Some(PlayerEvent::Input(slot, action)) => sim.apply_input(slot, &action),
                    // A dropped connection is indistinguishable from a
                    // forfeit for the other player.
                    Some(PlayerEvent::Forfeit(slot) | PlayerEvent::Disconnect(slot)) => {
                        tracing::info!(player = %slot, "player forfeited or disconnected");
                        break Outcome {
                            winner: slot.other().into(),
                            reason: EndReason::Forfeit,
                        };
                    }
                    None => {
                        // Both readers gone without explicit events.
                        break sim.final_outcome();
                    }
                }
                if let Some(outcome) = sim.outcome() {
                    break outcome;
                }
            }
            _ = tick.tick() => {
                sim.tick();
                if let Some(outcome) = sim.outcome() {
                    break outcome;
                }
            }
            _ = snapshots.tick() => {
                let elapsed = start.elapsed();
                let remaining = duration.saturating_sub(elapsed).as_secs();
                let message = MatchServerMessage::Snapshot { state: sim.snapshot(remaining) };
                broadcast(&mut writers, &message).await;
            }
        }
    };

    readers_done.cancel();
    finalize(&opts, &sim, outcome, started_at, &mut writers).await;
    Ok(())
}

async fn read_inputs(
    mut reader: OwnedReadHalf,
    slot: PlayerSlot,
    events: mpsc::Sender<PlayerEvent>,
    done: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            () = done.cancelled() => return,
            message = framing::recv_message::<_, MatchClientMessage>(&mut reader) => message,
        };
        match message {
            Ok(Some(MatchClientMessage::Input { action })) => {
                let _ = events.send(PlayerEvent::Input(slot, action)).await;
            }
            Ok(Some(MatchClientMessage::Forfeit)) => {
                let _ = events.send(PlayerEvent::Forfeit(slot)).await;
                return;
            }
            Ok(None) => {
                let _ = events.send(PlayerEvent::Disconnect(slot)).await;
                return;
            }
            Err(framing::FrameError::Json(e)) => {
                // Bad message, keep the connection.
                tracing::warn!(player = %slot, error = %e, "ignoring malformed input");
            }
            Err(e) => {
                tracing::warn!(player = %slot, error = %e, "player read error");
                let _ = events.send(PlayerEvent::Disconnect(slot)).await;
                return;
            }
        }
    }
}

/// End-of-match sequence: log to storage, tell the players, tell the lobby.
async fn finalize<S: MatchSim>(
    opts: &MatchOptions,
    sim: &S,
    outcome: Outcome,
    started_at: chrono::DateTime<Utc>,
    writers: &mut [OwnedWriteHalf],
) {
    tracing::info!(winner = ?outcome.winner, reason = ?outcome.reason, "game finished");

    let [p1_figures, p2_figures] = sim.scores();
    let p1_results = PlayerResult {
        user_id: opts.p1.clone(),
        score: p1_figures.0,
        lines: p1_figures.1,
    };
    let p2_results = PlayerResult {
        user_id: opts.p2.clone(),
        score: p2_figures.0,
        lines: p2_figures.1,
    };

    let (winner_username, loser_username) = match outcome.winner {
        Winner::P1 => (opts.p1.clone(), Some(opts.p2.clone())),
        Winner::P2 => (opts.p2.clone(), Some(opts.p1.clone())),
        Winner::Tie => ("TIE".to_string(), None),
    };

    // 1. The immutable match record, written before anyone hears the result.
    let entry = GameLogEntry {
        matchid: format!("match_{}", Uuid::new_v4().simple()),
        game_id: opts.game_id,
        users: vec![opts.p1.clone(), opts.p2.clone()],
        results: vec![p1_results.clone(), p2_results.clone()],
        winner: outcome.winner,
        reason: outcome.reason,
        start_time: started_at,
        end_time: Utc::now(),
    };
    let storage = StorageClient::new(opts.storage_addr.clone());
    match storage.create_game_log(&entry).await {
        Ok(()) => tracing::info!(matchid = %entry.matchid, "game log saved"),
        Err(reason) => {
            // Non-fatal: the clients' GAME_OVER is their source of truth.
            tracing::warn!(matchid = %entry.matchid, %reason, "failed to save game log");
        }
    }

    // 2. Tell both players.
    let game_over = MatchServerMessage::GameOver {
        winner: outcome.winner,
        winner_username,
        loser_username,
        reason: outcome.reason,
        p1_results,
        p2_results,
        room_id: opts.room_id,
    };
    broadcast(writers, &game_over).await;

    // 3. Tell the lobby the room can go back to idle.
    if let Err(e) = notify_lobby(&opts.lobby_addr, opts.room_id).await {
        tracing::warn!(error = %e, "failed to notify lobby of game end");
    }
}

async fn notify_lobby(lobby_addr: &str, room_id: u64) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(lobby_addr).await?;
    let request = Envelope::new("game_over", json!({ "room_id": room_id }));
    framing::send_message(&mut stream, &request).await?;
    match framing::recv_message::<_, Reply>(&mut stream).await? {
        Some(reply) if reply.is_ok() => {
            tracing::info!("lobby notified of game end");
            Ok(())
        }
        Some(reply) => anyhow::bail!("lobby rejected game_over: {:?}", reply.reason),
        None => anyhow::bail!("lobby closed the connection without replying"),
    }
}

async fn broadcast(writers: &mut [OwnedWriteHalf], message: &MatchServerMessage) {
    let frame = match framing::encode(message) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode match message");
            return;
        }
    };
    for writer in writers.iter_mut() {
        if let Err(e) = framing::write_frame(writer, &frame).await {
            tracing::debug!(error = %e, "failed to send to player");
        }
    }
}
