use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use artzyra::config::AppConfig;
use artzyra::db;
use artzyra::routes;
use artzyra::services::auth::ensure_admin;
use artzyra::services::payment::SimulatedGateway;
use artzyra::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let conn = db::init_db(&config.database_url)?;
    let state = Arc::new(AppState::new(conn, config.clone(), Box::new(SimulatedGateway)));

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let db = state.db()?;
        ensure_admin(&db, &state.auth, email, password)?;
    }

    tracing::info!(
        auto_confirm = config.auto_confirm_bookings,
        token_ttl_hours = config.token_ttl_hours,
        "configuration loaded"
    );

    let app = routes::router(state)?;

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
