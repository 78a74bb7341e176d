use crate::config::Config;
use crate::db_span;
use anyhow::{Context, Result};
use orchestrator_core::{Orchestrator, WorkflowConfig};
use orchestrator_db::SqliteStore;
use orchestrator_protocol::{HttpTransport, OrchestratorMcpHandler};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Opens (and migrates) the SQLite store backing the orchestrator.
pub async fn create_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let span = db_span!("create_store");
    let _enter = span.enter();

    let database_url = config.database_url();
    info!(%database_url, "opening sqlite store");

    let store = SqliteStore::new(&database_url)
        .await
        .context("failed to open sqlite store")?;

    info!("running database migrations");
    store
        .migrate()
        .await
        .context("failed to run database migrations")?;

    Ok(Arc::new(store))
}

/// Builds the orchestrator and the stdio-facing handler that drives it.
/// `config_root` is where `WorkflowConfig::load` looks for
/// `.taskorchestrator/config.yaml`.
pub async fn initialize_app(
    config: &Config,
    config_root: &Path,
) -> Result<Arc<OrchestratorMcpHandler<SqliteStore>>> {
    info!("initializing application");

    let store = create_store(config).await.context("failed to create store")?;
    let workflow_config = Arc::new(WorkflowConfig::load(config_root));
    let orchestrator = Arc::new(Orchestrator::new(store, workflow_config));
    let handler = Arc::new(OrchestratorMcpHandler::new(orchestrator));

    info!("application initialized successfully");
    Ok(handler)
}

/// Wraps an already-built handler in the optional HTTP/SSE transport.
pub fn create_http_transport(
    handler: Arc<OrchestratorMcpHandler<SqliteStore>>,
) -> HttpTransport<SqliteStore> {
    HttpTransport::new(handler)
}

/// Ensures the directory backing a `sqlite://` URL exists before `sqlx`
/// tries to open it.
pub fn ensure_database_directory_from_config(config: &Config) -> Result<()> {
    ensure_database_directory(&config.database_url())
}

pub fn ensure_database_directory(database_url: &str) -> Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    if db_path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!(directory = %parent.display(), "creating database directory");
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
    }
    Ok(())
}
