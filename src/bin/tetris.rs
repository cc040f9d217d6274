use clap::{Parser, ValueEnum};
use serde_json::{Map, Value};

use arcadia_server::config;
use arcadia_server::logging;
use arcadia_server::matchsvc::games::tetris::TetrisMatch;
use arcadia_server::matchsvc::{run_client, run_server, ClientOptions, GameUi, MatchOptions};

/// Tetris for the Arcadia platform: authoritative server and terminal
/// client behind the uniform match-service CLI.
#[derive(Parser, Debug)]
#[command(name = "tetris")]
#[command(about = "Two-player Tetris match service")]
#[command(version)]
struct Cli {
    #[arg(long, value_enum)]
    mode: Mode,

    /// Server: port to listen on. Client: port to connect to.
    #[arg(long)]
    port: u16,

    /// Client mode: host of the match service.
    #[arg(long, required_if_eq("mode", "client"))]
    host: Option<String>,

    /// Server mode: username of Player 1.
    #[arg(long, required_if_eq("mode", "server"))]
    p1: Option<String>,

    /// Server mode: username of Player 2.
    #[arg(long, required_if_eq("mode", "server"))]
    p2: Option<String>,

    /// Room this match belongs to.
    #[arg(long = "room_id")]
    room_id: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Server,
    Client,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load();

    match cli.mode {
        Mode::Server => {
            // Short-lived child process: console logs only.
            let mut log_cfg = cfg.logging.clone();
            log_cfg.enable_file_logging = false;
            logging::init_with_config(&log_cfg);

            let opts = MatchOptions {
                port: cli.port,
                p1: cli.p1.unwrap_or_default(),
                p2: cli.p2.unwrap_or_default(),
                room_id: cli.room_id,
                game_id: None,
                storage_addr: cfg.storage.addr(),
                lobby_addr: cfg.lobby.addr(),
            };
            run_server::<TetrisMatch>(opts).await
        }
        Mode::Client => {
            let opts = ClientOptions {
                host: cli.host.unwrap_or_else(|| cfg.lobby.host.clone()),
                port: cli.port,
                room_id: cli.room_id,
            };
            run_client(opts, tetris_ui()).await
        }
    }
}

fn tetris_ui() -> GameUi {
    GameUi {
        name: "tetris",
        key_map: |command| match command.to_ascii_lowercase().as_str() {
            "a" | "left" => Some("MOVE_LEFT"),
            "d" | "right" => Some("MOVE_RIGHT"),
            "w" | "rotate" => Some("ROTATE"),
            "s" | "down" => Some("SOFT_DROP"),
            "x" | "drop" => Some("HARD_DROP"),
            _ => None,
        },
        render: render_snapshot,
    }
}

/// Side-by-side text rendering of both boards.
fn render_snapshot(state: &Map<String, Value>) -> String {
    let remaining = state
        .get("remaining_time")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let p1 = render_board(state.get("p1_state"));
    let p2 = render_board(state.get("p2_state"));

    let mut out = format!("--- time left: {remaining:>3}s ---\n");
    out.push_str(&format!("{:<24}{}\n", p1.header, p2.header));
    for (left, right) in p1.rows.iter().zip(p2.rows.iter()) {
        out.push_str(&format!("{left:<24}{right}\n"));
    }
    out
}

struct BoardView {
    header: String,
    rows: Vec<String>,
}

fn render_board(state: Option<&Value>) -> BoardView {
    let Some(state) = state else {
        return BoardView {
            header: "?".to_string(),
            rows: Vec::new(),
        };
    };
    let score = state.get("score").and_then(Value::as_i64).unwrap_or(0);
    let lines = state.get("lines").and_then(Value::as_u64).unwrap_or(0);
    let over = state
        .get("game_over")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut cells: Vec<Vec<bool>> = state
        .get("board")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cols| {
                            cols.iter()
                                .map(|c| c.as_u64().unwrap_or(0) != 0)
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();

    // Overlay the falling piece.
    if let Some(blocks) = state
        .get("current_piece")
        .and_then(|p| p.get("blocks"))
        .and_then(Value::as_array)
    {
        for block in blocks {
            let pair = block.as_array().map(Vec::as_slice).unwrap_or(&[]);
            let (Some(y), Some(x)) = (
                pair.first().and_then(Value::as_i64),
                pair.get(1).and_then(Value::as_i64),
            ) else {
                continue;
            };
            if y < 0 {
                continue;
            }
            if let Some(cell) = cells
                .get_mut(y as usize)
                .and_then(|row| row.get_mut(x as usize))
            {
                *cell = true;
            }
        }
    }

    let rows = cells
        .iter()
        .map(|row| {
            let mut line = String::from("|");
            for &filled in row {
                line.push(if filled { '#' } else { '.' });
            }
            line.push('|');
            line
        })
        .collect();

    BoardView {
        header: format!(
            "score {score:>5} lines {lines:>3}{}",
            if over { " OVER" } else { "" }
        ),
        rows,
    }
}
