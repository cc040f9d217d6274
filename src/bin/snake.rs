use clap::{Parser, ValueEnum};
use serde_json::{Map, Value};

use arcadia_server::config;
use arcadia_server::logging;
use arcadia_server::matchsvc::games::snake::{SnakeMatch, GRID_HEIGHT, GRID_WIDTH};
use arcadia_server::matchsvc::{run_client, run_server, ClientOptions, GameUi, MatchOptions};

/// Snake for the Arcadia platform: authoritative server and terminal
/// client behind the uniform match-service CLI.
#[derive(Parser, Debug)]
#[command(name = "snake")]
#[command(about = "Two-player Snake match service")]
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
            run_server::<SnakeMatch>(opts).await
        }
        Mode::Client => {
            let opts = ClientOptions {
                host: cli.host.unwrap_or_else(|| cfg.lobby.host.clone()),
                port: cli.port,
                room_id: cli.room_id,
            };
            run_client(opts, snake_ui()).await
        }
    }
}

fn snake_ui() -> GameUi {
    GameUi {
        name: "snake",
        key_map: |command| match command.to_ascii_lowercase().as_str() {
            "w" | "up" => Some("UP"),
            "s" | "down" => Some("DOWN"),
            "a" | "left" => Some("LEFT"),
            "d" | "right" => Some("RIGHT"),
            _ => None,
        },
        render: render_snapshot,
    }
}

fn render_snapshot(state: &Map<String, Value>) -> String {
    let remaining = state
        .get("remaining_time")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let mut grid = vec![vec!['.'; GRID_WIDTH as usize]; GRID_HEIGHT as usize];

    if let Some([x, y]) = point(state.get("food")) {
        plot(&mut grid, x, y, '*');
    }
    for (key, glyph) in [("p1", '1'), ("p2", '2')] {
        if let Some(body) = state
            .get(key)
            .and_then(|p| p.get("body"))
            .and_then(Value::as_array)
        {
            for segment in body {
                if let Some([x, y]) = point(Some(segment)) {
                    plot(&mut grid, x, y, glyph);
                }
            }
        }
    }

    let score = |key: &str| {
        state
            .get(key)
            .and_then(|p| p.get("score"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    };
    let mut out = format!(
        "--- time left: {remaining:>3}s   P1: {}   P2: {} ---\n",
        score("p1"),
        score("p2")
    );
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn point(value: Option<&Value>) -> Option<[i64; 2]> {
    let pair = value?.as_array()?;
    Some([pair.first()?.as_i64()?, pair.get(1)?.as_i64()?])
}

fn plot(grid: &mut [Vec<char>], x: i64, y: i64, glyph: char) {
    if let Some(cell) = usize::try_from(y)
        .ok()
        .and_then(|y| grid.get_mut(y))
        .and_then(|row| usize::try_from(x).ok().and_then(|x| row.get_mut(x)))
    {
        *cell = glyph;
    }
}
