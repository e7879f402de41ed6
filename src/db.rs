use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::{
    config::AppConfig,
    error::AppError,
    repository::{
        memory_store::MemoryStore,
        table_service::{ensure_schema, DocumentStore},
    },
};

pub async fn build_store(config: &AppConfig) -> Result<DocumentStore, AppError> {
    if !config.use_postgres() {
        tracing::warn!(
            storage_backend = config.storage_backend.as_str(),
            "Using the in-memory document store; data is lost on restart"
        );
        return Ok(DocumentStore::Memory(MemoryStore::new()));
    }

    let database_url = config.database_url.as_deref().ok_or_else(|| {
        AppError::Dependency(
            "Database is not configured. Set DATABASE_URL or STORAGE_BACKEND=memory.".to_string(),
        )
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_max_connections)
        .min_connections(config.db_pool_min_connections)
        .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
        .connect(database_url)
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "Could not connect to Postgres");
            AppError::Dependency("Database connection failed.".to_string())
        })?;

    ensure_schema(&pool).await?;
    tracing::info!("Postgres document store ready");
    Ok(DocumentStore::Postgres(pool))
}
