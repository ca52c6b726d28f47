pub mod charts;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod identity;
pub mod models;
pub mod redaction;
pub mod session;
pub mod shell;
pub mod store;
pub mod sync;

use crate::config::AppSettings;
use crate::dashboard::Dashboard;
use crate::errors::AppResult;
use crate::models::StoreBackend;
use crate::redaction::Redactor;
use crate::session::IdentityCache;
use crate::store::{PostgrestStore, RecordStore, SqliteStore};
use crate::sync::SyncClient;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn build_store(settings: &AppSettings) -> AppResult<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match settings.store_backend {
        StoreBackend::Postgrest => {
            if settings.store_api_key.is_none() {
                tracing::warn!(url = %settings.store_url, "no store api key configured, requests are anonymous");
            }
            Arc::new(PostgrestStore::new(
                &settings.store_url,
                &settings.store_table,
                settings.store_api_key.clone(),
            ))
        }
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(&settings.sqlite_path())?),
    };
    Ok(store)
}

pub async fn build_dashboard(settings: &AppSettings) -> AppResult<Dashboard> {
    let store = build_store(settings)?;
    let client = SyncClient::new(store, Redactor::new(settings.redact_aggressive));
    let cache = IdentityCache::at_path(&settings.session_path())?;
    tracing::info!(
        backend = settings.store_backend.as_str(),
        store = %client.store_description(),
        "analytics store configured"
    );
    Dashboard::new(client, cache).await
}

pub fn run() -> anyhow::Result<()> {
    let settings = AppSettings::from_env()?;
    std::fs::create_dir_all(&settings.data_dir)?;
    init_tracing(&settings.log_dir()).map_err(anyhow::Error::msg)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let dashboard = build_dashboard(&settings).await?;
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        shell::run_loop(&dashboard, stdin, tokio::io::stdout()).await?;
        tracing::info!("dashboard shell exited");
        Ok::<(), anyhow::Error>(())
    })
}

fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "dashboard.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
