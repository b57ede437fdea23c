mod admin;
mod catalog;
mod config;
mod db;
mod entities;
mod error;
mod limits;
mod media;
mod models;
mod routes;
mod tags;
mod templates;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tower_http::trace::TraceLayer;

use crate::{catalog::Catalog, config::Config, limits::SubmissionLimiter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Catalog,
    pub limiter: SubmissionLimiter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,movies=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    if config.admin_token.trim().is_empty() {
        tracing::warn!("ADMIN_TOKEN is not set, admin login is disabled");
    }

    let db = db::connect_and_migrate(&config.database_url).await?;

    let state = Arc::new(AppState {
        config: config.clone(),
        catalog: Catalog::new(db),
        limiter: SubmissionLimiter::per_minute(config.submissions_per_minute),
    });

    state.limiter.spawn_pruner(Duration::from_secs(60));

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
