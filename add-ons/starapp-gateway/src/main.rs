//! StarApp Gateway: chat webhook, health check and the progress REST surface.
//!
//! `--print-config` prints the effective configuration as TOML and exits.

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use starapp_core::{BotConfig, Dispatcher, OutcomeTracker};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<BotConfig>,
    pub(crate) dispatcher: Arc<Dispatcher>,
}

impl AppState {
    fn new(config: BotConfig, tracker: OutcomeTracker) -> Self {
        let dispatcher = Dispatcher::new(tracker, config.card_style());
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[starapp-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match BotConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[starapp-gateway] invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--print-config") {
        match config.to_toml() {
            Ok(text) => {
                println!("{}", text);
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("[starapp-gateway] cannot render configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    let store = match config.open_store() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to open outcome store");
            std::process::exit(1);
        }
    };

    let addr = config.bind_addr();
    let state = AppState::new(config, OutcomeTracker::new(store));
    let app = build_app(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %addr, "StarApp gateway listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("CTRL-C received; shutting down gateway");
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %e, "server error");
    }
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::webhook::health).post(handlers::webhook::chat_event))
        .route("/health", get(handlers::webhook::health))
        .route("/progress", get(handlers::rest::progress))
        .route("/add-outcome", post(handlers::rest::add_outcome))
        .route("/remove-outcome", post(handlers::rest::remove_outcome))
        .route("/submitOutcomes", post(handlers::rest::submit_outcomes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
