use clap::Parser;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use arcadia_server::config;
use arcadia_server::lobby::LobbyServer;
use arcadia_server::logging;
use arcadia_server::net;

/// Arcadia lobby service -- sessions, rooms, invitations, and match
/// handoff.
#[derive(Parser, Debug)]
#[command(name = "lobby_server")]
#[command(about = "Arcadia lobby service: the stateful coordination hub for players and rooms")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate(&cfg);
    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Lobby address: {}", cfg.lobby.addr());
                println!("  Storage address: {}", cfg.storage.addr());
                println!("  Match port range starts at: {}", cfg.game.start_port);
                println!("  Default game command: {}", cfg.game.default_command.join(" "));
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }
    validation_result.map_err(|e| anyhow::anyhow!("invalid configuration:\n{e}"))?;

    logging::init_with_config(&cfg.logging);

    let addr = cfg
        .lobby
        .addr()
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("lobby address {} did not resolve", cfg.lobby.addr()))?;
    let listener = net::bind_reuse(addr)
        .map_err(|e| anyhow::anyhow!("failed to bind lobby service on {addr}: {e}"))?;

    let server = Arc::new(LobbyServer::new(Arc::clone(&cfg)));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            net::shutdown_signal().await;
            shutdown.cancel();
        });
    }

    server.serve(listener, shutdown).await
}
