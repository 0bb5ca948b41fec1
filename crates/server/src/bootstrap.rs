use std::sync::Arc;

use difychat_core::config::{AppConfig, ConfigError, LoadOptions};
use difychat_db::{connect_with_settings, migrations, DbPool, SqlConversationRepository};
use difychat_upstream::{DifyClient, UpstreamError};
use tera::Tera;
use thiserror::Error;
use tracing::info;

use crate::pages;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub conversations: Arc<SqlConversationRepository>,
    pub upstream: Arc<DifyClient>,
    pub templates: Arc<Tera>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("upstream client setup failed: {0}")]
    Upstream(#[source] UpstreamError),
    #[error("page templates failed to compile: {0}")]
    Templates(#[source] tera::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let upstream = DifyClient::new(&config.upstream).map_err(BootstrapError::Upstream)?;
    info!(
        event_name = "system.bootstrap.upstream_ready",
        correlation_id = "bootstrap",
        endpoint = upstream.endpoint(),
        timeout_secs = config.upstream.timeout_secs,
        "upstream client configured"
    );

    let templates = pages::init_templates().map_err(BootstrapError::Templates)?;

    Ok(Application {
        conversations: Arc::new(SqlConversationRepository::new(db_pool.clone())),
        upstream: Arc::new(upstream),
        templates: Arc::new(templates),
        db_pool,
        config,
    })
}
