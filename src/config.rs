use crate::errors::{AppError, AppResult};
use crate::models::{BooleanResponse, StoreBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const KEYRING_SERVICE: &str = "call-analytics-dashboard";
const KEYRING_ACCOUNT: &str = "store-api-key";

pub const ENV_BACKEND: &str = "ANALYTICS_STORE_BACKEND";
pub const ENV_URL: &str = "ANALYTICS_STORE_URL";
pub const ENV_TABLE: &str = "ANALYTICS_STORE_TABLE";
pub const ENV_KEY: &str = "ANALYTICS_STORE_KEY";
pub const ENV_DATA_DIR: &str = "ANALYTICS_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub store_backend: StoreBackend,
    pub store_url: String,
    pub store_table: String,
    #[serde(skip_serializing)]
    pub store_api_key: Option<String>,
    pub data_dir: PathBuf,
    pub redact_aggressive: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Postgrest,
            store_url: "https://your-project.supabase.co".to_string(),
            store_table: "user_analytics".to_string(),
            store_api_key: None,
            data_dir: default_data_dir(),
            redact_aggressive: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("call-analytics-dashboard")
}

impl AppSettings {
    /// Settings from the process environment over defaults. The api key falls
    /// back to the OS keychain when the environment does not provide one.
    pub fn from_env() -> AppResult<Self> {
        let mut settings = Self::from_lookup(|name| std::env::var(name).ok())?;
        if settings.store_api_key.is_none() && settings.store_backend == StoreBackend::Postgrest {
            match load_store_key() {
                Ok(key) => settings.store_api_key = key,
                Err(error) => tracing::warn!(error = %error, "could not read store key from keychain"),
            }
        }
        Ok(settings)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut settings = Self::default();
        let value = |name: &str| lookup(name).map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty());

        if let Some(raw) = value(ENV_BACKEND) {
            settings.store_backend = StoreBackend::parse(&raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown store backend {:?}", raw)))?;
        }
        if let Some(url) = value(ENV_URL) {
            settings.store_url = url;
        }
        if let Some(table) = value(ENV_TABLE) {
            settings.store_table = table;
        }
        settings.store_api_key = value(ENV_KEY);
        if let Some(dir) = value(ENV_DATA_DIR) {
            settings.data_dir = PathBuf::from(dir);
        }
        Ok(settings)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("analytics.sqlite")
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn keyring_entry() -> AppResult<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT).map_err(|error| AppError::Io(error.to_string()))
}

pub fn save_store_key(key: &str) -> AppResult<BooleanResponse> {
    if key.trim().is_empty() {
        return Err(AppError::Validation("Store key cannot be empty".to_string()));
    }
    keyring_entry()?
        .set_password(key.trim())
        .map_err(|error| AppError::Io(error.to_string()))?;
    Ok(BooleanResponse { success: true })
}

pub fn clear_store_key() -> AppResult<BooleanResponse> {
    match keyring_entry()?.delete_credential() {
        Ok(_) => Ok(BooleanResponse { success: true }),
        Err(keyring::Error::NoEntry) => Ok(BooleanResponse { success: true }),
        Err(error) => Err(AppError::Io(error.to_string())),
    }
}

pub fn has_store_key() -> AppResult<BooleanResponse> {
    Ok(BooleanResponse {
        success: load_store_key()?.is_some(),
    })
}

fn load_store_key() -> AppResult<Option<String>> {
    match keyring_entry()?.get_password() {
        Ok(value) if !value.is_empty() => Ok(Some(value)),
        Ok(_) => Ok(None),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(error) => Err(AppError::Io(error.to_string())),
    }
}
