//! Thin terminal client for a match service.
//!
//! Connects with retry and backoff, reads the `WELCOME`, then runs two
//! loops: a reader that renders snapshots and stops on `GAME_OVER`, and a
//! stdin loop that maps typed commands into `INPUT`/`FORFEIT` messages.

use serde_json::{Map, Value};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::net::{connect_with_retry, RetryConfig};
use crate::protocol::{framing, MatchClientMessage, MatchServerMessage};

/// Where to find the match service, from the uniform CLI surface.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub room_id: u64,
}

/// Game-specific presentation: how typed commands map to input tokens and
/// how a snapshot renders as text.
pub struct GameUi {
    pub name: &'static str,
    pub key_map: fn(&str) -> Option<&'static str>,
    pub render: fn(&Map<String, Value>) -> String,
}

/// Run the client until the match ends or the user quits.
pub async fn run_client(opts: ClientOptions, ui: GameUi) -> anyhow::Result<()> {
    let addr = format!("{}:{}", opts.host, opts.port);
    let retry = RetryConfig::default();
    let stream = connect_with_retry(addr.as_str(), &retry).await?;
    let (mut reader, mut writer) = stream.into_split();

    let Some(MatchServerMessage::Welcome { role, seed }) =
        framing::recv_message(&mut reader).await?
    else {
        anyhow::bail!("match service did not send WELCOME");
    };
    println!(
        "[{}] connected to {} as {} (room {}, seed {:?})",
        ui.name, addr, role, opts.room_id, seed
    );
    println!("commands: type a move and press enter; 'quit' forfeits");

    let (done_tx, mut done_rx) = watch::channel(false);
    let render = ui.render;
    let reader_task = tokio::spawn(async move {
        loop {
            match framing::recv_message::<_, MatchServerMessage>(&mut reader).await {
                Ok(Some(MatchServerMessage::Snapshot { state })) => {
                    println!("{}", render(&state));
                }
                Ok(Some(MatchServerMessage::GameOver {
                    winner,
                    winner_username,
                    reason,
                    ..
                })) => {
                    println!("GAME OVER: {winner:?} ({winner_username}), reason: {reason:?}");
                    break;
                }
                Ok(Some(MatchServerMessage::Welcome { .. })) => {}
                Ok(None) => {
                    println!("server closed the connection");
                    break;
                }
                Err(e) => {
                    eprintln!("read error: {e}");
                    break;
                }
            }
        }
        let _ = done_tx.send(true);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = done_rx.changed() => {
                if changed.is_err() || *done_rx.borrow() {
                    break;
                }
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    // stdin closed; keep watching the game until it ends.
                    let _ = done_rx.changed().await;
                    break;
                };
                let command = line.trim();
                if command.is_empty() {
                    continue;
                }
                if command.eq_ignore_ascii_case("quit") || command.eq_ignore_ascii_case("forfeit") {
                    let _ = framing::send_message(&mut writer, &MatchClientMessage::Forfeit).await;
                    break;
                }
                match (ui.key_map)(command) {
                    Some(action) => {
                        let message = MatchClientMessage::Input { action: action.to_string() };
                        if framing::send_message(&mut writer, &message).await.is_err() {
                            break;
                        }
                    }
                    None => println!("unknown command '{command}'"),
                }
            }
        }
    }

    // Give the reader a moment to print the final GAME_OVER.
    let _ = tokio::time::timeout(Duration::from_secs(2), reader_task).await;
    Ok(())
}
