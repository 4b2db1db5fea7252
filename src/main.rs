// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use exam_engine::config::{Config, GradingMode};
use exam_engine::routes;
use exam_engine::services::Services;
use exam_engine::services::grading::{DbFunctionGrader, Grader, LocalGrader};
use exam_engine::state::AppState;
use exam_engine::store::{MemoryStore, PgStore, Store};
use exam_engine::utils::clock::{Clock, SystemClock};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (and .env if present)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "exam_engine.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (store, pool): (Arc<dyn Store>, Option<PgPool>) = match &config.database_url {
        Some(url) => {
            let pool = connect_with_retry(url).await?;

            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations applied successfully.");

            let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
            (store, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            (store, None)
        }
    };

    let grader: Arc<dyn Grader> = match (config.grading_mode, pool) {
        (GradingMode::Database, Some(pool)) => Arc::new(DbFunctionGrader::new(pool)),
        (GradingMode::Database, None) => {
            tracing::warn!("Database grading requested without a database, grading locally");
            Arc::new(LocalGrader::new(store.clone(), clock.clone()))
        }
        (GradingMode::Local, _) => Arc::new(LocalGrader::new(store.clone(), clock.clone())),
    };

    let state = AppState {
        services: Services::new(store, grader, clock),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects to Postgres, retrying while the database starts up.
async fn connect_with_retry(url: &str) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected...");
                return Ok(pool);
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
