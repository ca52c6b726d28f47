use crate::charts::{default_call_duration, default_sad_path};
use crate::errors::{AppError, AppResult, StoreError};
use crate::identity::Identity;
use crate::models::{AnalyticsPatch, AnalyticsRecord, NewAnalyticsRecord};
use crate::redaction::Redactor;
use crate::store::RecordStore;
use chrono::Utc;
use std::sync::Arc;

/// Resolves, creates and updates a user's analytics record in the record
/// store. Every non-conflict store failure reaches callers as
/// `AppError::StoreUnavailable`; the detail only goes to the log.
#[derive(Clone)]
pub struct SyncClient {
    store: Arc<dyn RecordStore>,
    redactor: Redactor,
}

impl SyncClient {
    pub fn new(store: Arc<dyn RecordStore>, redactor: Redactor) -> Self {
        Self { store, redactor }
    }

    pub fn store_description(&self) -> String {
        self.store.describe()
    }

    /// Returns the stored record for `identity`, creating one seeded with the
    /// built-in datasets when none exists. An existing record is never
    /// overwritten. When a concurrent session inserts first, the duplicate-key
    /// failure falls back to fetching the winner's record.
    pub async fn resolve_or_create(&self, identity: &Identity) -> AppResult<AnalyticsRecord> {
        let email = identity.as_str();
        let existing = self
            .store
            .lookup(email)
            .await
            .map_err(|error| self.unavailable("lookup", email, error))?;

        if let Some(record) = existing {
            tracing::info!(email, "loaded existing analytics record");
            return Ok(record);
        }

        let seed = NewAnalyticsRecord {
            email: email.to_string(),
            call_duration_data: default_call_duration(),
            sad_path_data: default_sad_path(),
        };

        match self.store.insert(&seed).await {
            Ok(record) => {
                tracing::info!(email, "created analytics record with default datasets");
                Ok(record)
            }
            Err(StoreError::Conflict(detail)) => {
                tracing::warn!(
                    email,
                    detail = %self.redactor.scrub(&detail),
                    "analytics record created concurrently, fetching existing"
                );
                self.fetch_by_key(identity).await?.ok_or_else(|| {
                    tracing::warn!(email, "conflicting record vanished before fetch");
                    AppError::StoreUnavailable(format!("could not resolve analytics record for {}", email))
                })
            }
            Err(error) => Err(self.unavailable("insert", email, error)),
        }
    }

    /// Applies `patch` to the existing record and stamps a fresh update time.
    /// Callers that need the canonical state fetch it afterwards.
    pub async fn update_fields(&self, identity: &Identity, patch: &AnalyticsPatch) -> AppResult<()> {
        let email = identity.as_str();
        if patch.is_empty() {
            tracing::debug!(email, "skipping empty analytics patch");
            return Ok(());
        }

        let matched = self
            .store
            .update(email, patch, Utc::now())
            .await
            .map_err(|error| self.unavailable("update", email, error))?;

        if !matched {
            tracing::warn!(email, "update matched no analytics record");
            return Err(AppError::NotFound(format!("No analytics record for {}", email)));
        }

        tracing::info!(
            email,
            call_duration = patch.call_duration_data.is_some(),
            sad_path = patch.sad_path_data.is_some(),
            "updated analytics record"
        );
        Ok(())
    }

    pub async fn fetch_by_key(&self, identity: &Identity) -> AppResult<Option<AnalyticsRecord>> {
        let email = identity.as_str();
        self.store
            .lookup(email)
            .await
            .map_err(|error| self.unavailable("fetch", email, error))
    }

    fn unavailable(&self, operation: &str, email: &str, error: StoreError) -> AppError {
        let detail = self.redactor.scrub(&error.to_string());
        tracing::error!(
            operation,
            email,
            store = %self.store.describe(),
            error = %detail,
            "analytics store call failed"
        );
        AppError::StoreUnavailable(format!("Failed to {} analytics for {}", operation, email))
    }
}

#[cfg(test)]
mod tests {
    use super::SyncClient;
    use crate::charts::{default_call_duration, default_sad_path, reshape_peak};
    use crate::errors::{AppError, StoreError, StoreResult};
    use crate::identity::normalize_email;
    use crate::models::{AnalyticsPatch, AnalyticsRecord, NewAnalyticsRecord};
    use crate::redaction::Redactor;
    use crate::store::{RecordStore, SqliteStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sqlite_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
        Arc::new(SqliteStore::new(&dir.path().join("analytics.db")).expect("store"))
    }

    /// Hides the record from the first lookup, as if another session
    /// inserted between our lookup and insert.
    struct LateInsertStore {
        inner: Arc<SqliteStore>,
        hide_next_lookup: AtomicBool,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for LateInsertStore {
        async fn lookup(&self, email: &str) -> StoreResult<Option<AnalyticsRecord>> {
            if self.hide_next_lookup.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.lookup(email).await
        }

        async fn insert(&self, record: &NewAnalyticsRecord) -> StoreResult<AnalyticsRecord> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(record).await
        }

        async fn update(&self, email: &str, patch: &AnalyticsPatch, updated_at: DateTime<Utc>) -> StoreResult<bool> {
            self.inner.update(email, patch, updated_at).await
        }

        fn describe(&self) -> String {
            "late-insert".to_string()
        }
    }

    struct DownStore;

    #[async_trait]
    impl RecordStore for DownStore {
        async fn lookup(&self, _email: &str) -> StoreResult<Option<AnalyticsRecord>> {
            Err(StoreError::Transport("connection refused apikey=abcdef123456".to_string()))
        }

        async fn insert(&self, _record: &NewAnalyticsRecord) -> StoreResult<AnalyticsRecord> {
            Err(StoreError::Transport("connection refused".to_string()))
        }

        async fn update(&self, _email: &str, _patch: &AnalyticsPatch, _updated_at: DateTime<Utc>) -> StoreResult<bool> {
            Err(StoreError::Rejected {
                status: 500,
                code: None,
                message: "boom".to_string(),
            })
        }

        fn describe(&self) -> String {
            "down".to_string()
        }
    }

    #[tokio::test]
    async fn fresh_email_creates_one_seeded_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = sqlite_store(&dir);
        let client = SyncClient::new(store.clone(), Redactor::new(true));
        let identity = normalize_email("a@b.com").expect("email");

        let record = client.resolve_or_create(&identity).await.expect("resolve");
        assert_eq!(record.email, "a@b.com");
        assert_eq!(record.call_duration_data, default_call_duration());
        assert_eq!(record.sad_path_data, default_sad_path());
        assert_eq!(store.count_records().expect("count"), 1);
    }

    #[tokio::test]
    async fn resolving_existing_email_never_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = sqlite_store(&dir);
        let client = SyncClient::new(store.clone(), Redactor::new(true));
        let identity = normalize_email("a@b.com").expect("email");

        client.resolve_or_create(&identity).await.expect("create");
        let custom = reshape_peak(&default_call_duration(), 5).expect("reshape");
        client
            .update_fields(&identity, &AnalyticsPatch::call_duration(custom.clone()))
            .await
            .expect("update");

        for _ in 0..3 {
            let record = client.resolve_or_create(&identity).await.expect("resolve");
            assert_eq!(record.call_duration_data, custom);
            assert_eq!(record.sad_path_data, default_sad_path());
        }
        assert_eq!(store.count_records().expect("count"), 1);
    }

    #[tokio::test]
    async fn insert_conflict_falls_back_to_existing_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inner = sqlite_store(&dir);
        let identity = normalize_email("a@b.com").expect("email");

        let winner = SyncClient::new(inner.clone(), Redactor::default());
        winner.resolve_or_create(&identity).await.expect("winner");
        let custom = reshape_peak(&default_call_duration(), 20).expect("reshape");
        winner
            .update_fields(&identity, &AnalyticsPatch::call_duration(custom.clone()))
            .await
            .expect("update");

        let racing = Arc::new(LateInsertStore {
            inner: inner.clone(),
            hide_next_lookup: AtomicBool::new(true),
            inserts: AtomicUsize::new(0),
        });
        let loser = SyncClient::new(racing.clone(), Redactor::default());
        let record = loser.resolve_or_create(&identity).await.expect("fallback");

        assert_eq!(racing.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(record.call_duration_data, custom);
        assert_eq!(inner.count_records().expect("count"), 1);
    }

    #[tokio::test]
    async fn store_failures_collapse_to_unavailable() {
        let client = SyncClient::new(Arc::new(DownStore), Redactor::new(true));
        let identity = normalize_email("a@b.com").expect("email");

        let error = client.resolve_or_create(&identity).await.expect_err("lookup fails");
        assert!(error.is_store_unavailable());
        assert!(!error.to_string().contains("abcdef123456"));

        let error = client
            .update_fields(&identity, &AnalyticsPatch::sad_path(default_sad_path()))
            .await
            .expect_err("update fails");
        assert!(error.is_store_unavailable());

        assert!(client.fetch_by_key(&identity).await.expect_err("fetch fails").is_store_unavailable());
    }

    #[tokio::test]
    async fn update_without_record_is_not_found_and_empty_patch_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = SyncClient::new(sqlite_store(&dir), Redactor::default());
        let identity = normalize_email("ghost@b.com").expect("email");

        client
            .update_fields(&identity, &AnalyticsPatch::default())
            .await
            .expect("empty patch");

        let error = client
            .update_fields(&identity, &AnalyticsPatch::sad_path(default_sad_path()))
            .await
            .expect_err("missing record");
        assert!(matches!(error, AppError::NotFound(_)));
        assert!(client.fetch_by_key(&identity).await.expect("fetch").is_none());
    }
}
