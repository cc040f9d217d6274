use clap::Parser;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use arcadia_server::config;
use arcadia_server::logging;
use arcadia_server::net;
use arcadia_server::storage::{server, StorageService};

/// Arcadia storage service -- the authoritative catalog of users, games,
/// versions, and match logs.
#[derive(Parser, Debug)]
#[command(name = "storage_server")]
#[command(about = "Arcadia storage service: persistent catalog behind a JSON-over-TCP interface")]
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
                println!("  Storage address: {}", cfg.storage.addr());
                println!("  Data directory: {}", cfg.storage.data_dir);
                println!("  Lobby address: {}", cfg.lobby.addr());
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

    let service = Arc::new(StorageService::open(Path::new(&cfg.storage.data_dir)).await?);

    let addr = cfg
        .storage
        .addr()
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("storage address {} did not resolve", cfg.storage.addr()))?;
    let listener = net::bind_reuse(addr)
        .map_err(|e| anyhow::anyhow!("failed to bind storage service on {addr}: {e}"))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            net::shutdown_signal().await;
            shutdown.cancel();
        });
    }

    server::serve(listener, service, shutdown).await
}
