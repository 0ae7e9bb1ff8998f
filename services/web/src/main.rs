use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use common::database::{self, run_migrations};
use web::{AppConfig, AppState, create_router, email::mailer_from_config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("web=info,tower_http=info,sqlx=warn")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::load()?;
    info!("Starting Natours in {:?} mode", config.app_env);

    // Initialize database connection pool
    let pool = database::init_pool(&config.database_config()).await?;
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool, &sqlx::migrate!("./migrations")).await?;

    let mailer = mailer_from_config(&config)?;
    let port = config.port;
    let state = AppState::new(config, pool, mailer)?;
    let app = create_router(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Natours listening on 0.0.0.0:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
