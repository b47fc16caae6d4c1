//! Deploy-time command that registers the permission catalog and converges
//! the built-in roles, then prints the reconciliation report as JSON.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;

use cirrus_application::ReconciliationService;
use cirrus_core::{AppError, AppResult};
use cirrus_domain::{ReconcileError, built_in_catalog, built_in_role_templates};
use cirrus_infrastructure::PostgresAccessStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let database_url = required_env("DATABASE_URL")?;
    let pool = connect_pool(database_url.as_str()).await?;
    run_migrations(&pool).await?;

    let store = Arc::new(PostgresAccessStore::new(pool));
    let service = ReconciliationService::new(store.clone(), store.clone(), store);

    let catalog = built_in_catalog()?;
    let created = service.register_catalog(&catalog).await?;
    info!(created = created.len(), "permission catalog registered");

    let report = service
        .reconcile_all(&catalog, &built_in_role_templates())
        .await
        .map_err(|error| match error {
            ReconcileError::Store(inner) => inner,
            fatal => AppError::Validation(fatal.to_string()),
        })?;

    let rendered = serde_json::to_string_pretty(&report).map_err(|error| {
        AppError::Internal(format!("failed to render reconciliation report: {error}"))
    })?;
    println!("{rendered}");

    info!("role reconciliation finished");
    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run database migrations: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
