use anyhow::{Context, Result};
use flowscope_core::Event;
use flowscope_server::config;
use flowscope_server::server::{self, ServerState};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn server_name() -> String {
    std::env::var("FLOWSCOPE_SERVER_NAME")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "flowscope".to_string())
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = config::parse_args()?;
    let name = server_name();

    let state = Arc::new(Mutex::new(ServerState::new()));
    let (bus_tx, _bus_rx) = broadcast::channel::<Event>(cfg.bus_capacity);

    let listener = TcpListener::bind(&cfg.listen)
        .await
        .with_context(|| format!("bind {}", cfg.listen))?;
    tracing::info!(listen = %cfg.listen, server = %name, "flowscope-server listening");

    server::run(listener, state, bus_tx, name).await
}
