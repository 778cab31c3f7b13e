//! # Server Verification Tests
//!
//! Full stack over loopback TCP:
//!
//! 1. **Connect**: a client gets a colored frame and a welcome notice
//! 2. **Walk**: key presses move the player and survive shutdown
//! 3. **Shutdown**: open sessions are cut and everyone is saved offline
//!
//! Run with: cargo test -p glyphworld --test server_verification -- --nocapture

use std::sync::Arc;
use std::time::Duration;

use glyphworld::{serve, MemoryStore, PlayerStore, WorldConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

fn test_world() -> WorldConfig {
    WorldConfig {
        seed: 7,
        viewport_cols: 32,
        viewport_rows: 10,
        npc_count: 3,
        ..WorldConfig::default()
    }
}

async fn read_for(stream: &mut TcpStream, window: Duration) -> Vec<u8> {
    let mut seen = Vec::new();
    let mut buf = [0u8; 4096];
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Ok(n)) = tokio::time::timeout_at(deadline, stream.read(&mut buf)).await {
        if n == 0 {
            break;
        }
        seen.extend_from_slice(&buf[..n]);
    }
    seen
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn verify_connect_walk_and_shutdown() {
    let config = test_world();
    let store = Arc::new(MemoryStore::with_config(config.clone()));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = {
        let config = config.clone();
        let store = Arc::clone(&store) as Arc<dyn PlayerStore>;
        tokio::spawn(async move { serve(&config, store, listener, shutdown_rx).await })
    };

    let mut client = TcpStream::connect(addr).await.expect("connect");
    let first = read_for(&mut client, Duration::from_millis(400)).await;
    let text = String::from_utf8_lossy(&first);
    assert!(text.contains("\x1b[38;2;") || text.contains("\x1b[48;2;"), "24-bit color expected");
    assert!(text.contains("Welcome"), "welcome notice expected");

    client.write_all(b"ddd").await.expect("keys");
    let _ = read_for(&mut client, Duration::from_millis(300)).await;

    shutdown_tx.send(true).expect("signal");
    let server = server.await.expect("join").expect("serve");

    assert!(server.tick_loop.tick_count() > 0);
    let player = server.state.players().next().expect("one player");
    assert_eq!((player.x, player.y), (config.spawn_x + 3, config.spawn_y));

    let saved = store.load_player(&player.id).expect("load").expect("saved");
    assert_eq!(saved.x, config.spawn_x + 3);
    assert!(!saved.online);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn verify_two_clients_share_a_world() {
    let config = test_world();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = {
        let config = config.clone();
        tokio::spawn(async move {
            serve(&config, Arc::new(MemoryStore::new()), listener, shutdown_rx).await
        })
    };

    let mut first = TcpStream::connect(addr).await.expect("connect");
    let mut second = TcpStream::connect(addr).await.expect("connect");
    let _ = read_for(&mut first, Duration::from_millis(300)).await;
    let seen = read_for(&mut second, Duration::from_millis(300)).await;
    assert!(!seen.is_empty());

    first.write_all(b"q").await.expect("quit");
    let _ = read_for(&mut first, Duration::from_millis(300)).await;

    shutdown_tx.send(true).expect("signal");
    let server = server.await.expect("join").expect("serve");
    assert_eq!(server.state.players().count(), 2);
    assert_eq!(server.state.online_count(), 0);
}
