// main.rs
// Server entry point: loads .env, configures tracing, connects to MongoDB and
// serves the JSON API (see lib.rs for the route table).

use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tenseclinic::{app, config::AppConfig, state};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tenseclinic=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().expect("invalid configuration");
    let addr = config.bind_address;

    let state = Arc::new(
        state::init_state_with(config)
            .await
            .expect("failed to initialize MongoDB state"),
    );

    info!(%addr, "listening");
    let listener = TcpListener::bind(addr).await.expect("failed to bind address");
    axum::serve(listener, app(state))
        .await
        .expect("server error");
}
