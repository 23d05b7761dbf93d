//! # natter-server
//!
//! Persistent TCP chat and presence server.
//!
//! This binary provides:
//! - **Account login** against the SQLite directory, with a snapshot of
//!   friends and pending contact requests on success
//! - **Message relay** of chat, actions, nudges and images to every device of
//!   the recipient, plus audio fan-out to all connected clients
//! - **Presence** updates pushed to friends on login, status change and the
//!   last device disconnecting
//! - **Contact requests** with add, confirm and silent reject
//!
//! Configuration comes from `LISTEN_ADDR`, `DATABASE_PATH` and the other
//! variables read by [`ServerConfig::from_env`]. Logging honours `RUST_LOG`.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use natter_server::{Dispatcher, Registry, ServerConfig, TcpServer};
use natter_store::{Directory, SharedDatabase};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,natter_server=debug")),
        )
        .init();

    info!("Starting natter server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the directory and clear stale presence
    // -----------------------------------------------------------------------
    let directory: Arc<dyn Directory> = Arc::new(SharedDatabase::open(&config.database_path)?);

    // No session survives a restart, so nobody can still be online.
    let reset = directory.reset_user_statuses()?;
    info!(users = reset, "Reset user statuses");

    // -----------------------------------------------------------------------
    // 4. Run the TCP server until Ctrl+C
    // -----------------------------------------------------------------------
    let registry = Arc::new(Registry::new());
    let dispatcher = Dispatcher::new(Arc::clone(&registry), directory);
    let server = TcpServer::new(registry, dispatcher, config);
    let listener = server.bind().await?;

    tokio::select! {
        _ = server.serve(listener) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
