mod app;
mod auth;
mod config;
mod crypto;
mod db;
mod error;
mod extract;
mod reminders;
mod state;
#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "medrem=debug,axum=info,tower_http=info".to_string());
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

    let app_state = AppState::init(AppConfig::from_env()?).await?;
    db::migrate(&app_state.db).await;

    let pool = app_state.db.clone();
    let config = app_state.config.clone();
    app::serve(app::build_app(app_state), &config.host, config.port).await?;

    pool.close().await;
    tracing::info!("server shutdown complete");
    Ok(())
}
