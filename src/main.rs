mod app;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod mail;
#[cfg(test)]
mod memory;
mod middleware;
mod query;
mod response;
mod reviews;
mod state;
mod tours;
mod users;
mod views;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "natours=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env()?;
    tracing::info!(mode = ?config.mode, "starting natours");
    let (host, port) = (config.host.clone(), config.port);

    let state = AppState::init(config).await?;
    app::serve(app::build_app(state), &host, port).await
}
