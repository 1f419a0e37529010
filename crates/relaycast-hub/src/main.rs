//! relaycast hub binary.
//!
//! Boot order: config (generated if missing) -> state + store -> config
//! watcher -> HTTP/WS server. Ctrl-C drains: the watcher stops, the
//! listener closes, the store is closed last.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use relaycast_hub::{app_state::AppState, config, reload::HotReloader, router};

#[derive(Parser, Debug)]
#[command(name = "relaycast-hub", about = "WebSocket message broadcast hub")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Verbose logging (overrides RUST_LOG).
    #[arg(long)]
    debug: bool,

    /// Watch the config file and reload on change.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    hot_reload: bool,

    /// Ask on the terminal before applying a changed config.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    interactive: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();

    let (cfg, created) = match config::load_or_init(&args.config) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(path = %args.config, error = %e, "config load failed");
            std::process::exit(1);
        }
    };
    if created {
        tracing::info!(path = %args.config, "default configuration written");
    }

    let listen: SocketAddr = match cfg.server.bind_addr().parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "server host/port is not a valid bind address");
            std::process::exit(1);
        }
    };
    let ws_url = cfg.server.ws_url();

    let state = match AppState::new(cfg) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "state init failed");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let watcher = if args.hot_reload {
        let swap_state = state.clone();
        let reloader = HotReloader::new(
            PathBuf::from(&args.config),
            state.pause(),
            args.interactive,
            Box::new(move |cfg: Arc<config::HubConfig>| swap_state.apply_config(cfg)),
        );
        Some(reloader.spawn(shutdown_rx.clone()))
    } else {
        None
    };

    let app = router::build_router(state.clone());

    tracing::info!(%listen, %ws_url, "relaycast-hub starting");
    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%listen, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    });

    if let Err(e) = serve.await {
        tracing::error!(error = %e, "server failed");
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = watcher {
        let _ = handle.await;
    }
    if let Err(e) = state.store().close().await {
        tracing::warn!(error = %e, "store close failed");
    }
    tracing::info!("relaycast-hub stopped");
}
