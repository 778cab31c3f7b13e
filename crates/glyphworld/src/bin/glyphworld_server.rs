//! # Glyphworld Server
//!
//! Hosts one world over plain TCP. Connect with any 24-bit color
//! terminal:
//!
//! ```bash
//! # Defaults
//! ./glyphworld_server
//!
//! # Custom world
//! ./glyphworld_server world.toml
//!
//! # Play
//! stty raw -echo; nc localhost 2323; stty sane
//! ```
//!
//! `RUST_LOG` controls log output (default `glyphworld=info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use glyphworld::{init_tracing, serve, MemoryStore, WorldConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => match WorldConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("   ✗ FATAL: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => WorldConfig::default(),
    };

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    GLYPHWORLD SERVER v{}", env!("CARGO_PKG_VERSION"));
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("  Seed:      {}", config.seed);
    println!("  Tick rate: {} Hz", config.tick_rate);
    println!("  Viewport:  {}x{} ({:?})", config.viewport_cols, config.viewport_rows, config.render_mode);
    println!();

    println!("🌐 Binding to {} ...", config.bind);
    let listener = match TcpListener::bind(&config.bind).await {
        Ok(listener) => {
            println!("   ✓ TCP listener bound to {}", config.bind);
            listener
        }
        Err(e) => {
            eprintln!("   ✗ FATAL: Failed to bind: {e}");
            eprintln!("     Check if another server is running or port is blocked.");
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
        let _ = shutdown_tx.send(true);
    });

    let store = Arc::new(MemoryStore::with_config(config.clone()));
    match serve(&config, store, listener, shutdown_rx).await {
        Ok(server) => {
            println!();
            println!("  Ticks run:  {}", server.tick_loop.tick_count());
            println!("  Players:    {}", server.state.players().count());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server stopped with an error");
            ExitCode::FAILURE
        }
    }
}
