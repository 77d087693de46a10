use std::sync::Arc;

mod app;
mod config;
mod db;
mod qr;
mod response;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "profiles=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(env = ?config.env, "starting profiles service");

    let pool = db::connect(&config.db).await?;

    db::prepare(&pool, &config.db).await?;

    let state = AppState::init(config.clone(), pool.clone());
    let app = app::build_app(state);

    let served = app::serve(app, &config.bind_addr()).await;

    pool.close().await;
    tracing::info!("database pool closed");
    served
}
