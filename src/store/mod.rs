pub mod postgrest;
pub mod sqlite;

use crate::errors::StoreResult;
use crate::models::{AnalyticsPatch, AnalyticsRecord, NewAnalyticsRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use postgrest::PostgrestStore;
pub use sqlite::SqliteStore;

/// Table-like record store keyed by email.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// `Ok(None)` when no record exists for `email`; errors are reserved for
    /// transport and server failures.
    async fn lookup(&self, email: &str) -> StoreResult<Option<AnalyticsRecord>>;

    /// Inserts a new record. A record already stored under the same email is
    /// reported as `StoreError::Conflict`.
    async fn insert(&self, record: &NewAnalyticsRecord) -> StoreResult<AnalyticsRecord>;

    /// Applies the present fields of `patch` and stamps `updated_at`. Returns
    /// whether a record matched `email`.
    async fn update(&self, email: &str, patch: &AnalyticsPatch, updated_at: DateTime<Utc>) -> StoreResult<bool>;

    fn describe(&self) -> String;
}
