use crate::errors::{AppError, AppResult, StoreError, StoreResult};
use crate::models::{AnalyticsPatch, AnalyticsRecord, NewAnalyticsRecord};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const SELECT_COLUMNS: &str = "id, email, call_duration_data, sad_path_data, created_at, updated_at";

/// Local SQLite rendition of the analytics table, with the same unique key on
/// `email` the hosted table has.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn count_records(&self) -> StoreResult<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(1) FROM user_analytics", [], |row| row.get(0))?)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("database mutex poisoned".to_string()))
    }

    fn select_by_email(conn: &Connection, email: &str) -> StoreResult<Option<AnalyticsRecord>> {
        let raw = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM user_analytics WHERE email = ?1"),
                [email],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }
}

struct RawRow {
    id: i64,
    email: String,
    call_duration_json: String,
    sad_path_json: String,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            call_duration_json: row.get(2)?,
            sad_path_json: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_record(self) -> StoreResult<AnalyticsRecord> {
        Ok(AnalyticsRecord {
            id: Some(self.id),
            email: self.email,
            call_duration_data: serde_json::from_str(&self.call_duration_json)?,
            sad_path_data: serde_json::from_str(&self.sad_path_json)?,
            created_at: Some(parse_timestamp(&self.created_at)?),
            updated_at: Some(parse_timestamp(&self.updated_at)?),
        })
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| StoreError::Decode(format!("bad timestamp {raw:?}: {error}")))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn lookup(&self, email: &str) -> StoreResult<Option<AnalyticsRecord>> {
        let conn = self.lock()?;
        Self::select_by_email(&conn, email)
    }

    async fn insert(&self, record: &NewAnalyticsRecord) -> StoreResult<AnalyticsRecord> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_analytics (email, call_duration_data, sad_path_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                record.email,
                serde_json::to_string(&record.call_duration_data)?,
                serde_json::to_string(&record.sad_path_data)?,
                now,
            ],
        )?;

        Self::select_by_email(&conn, &record.email)?
            .ok_or_else(|| StoreError::Backend(format!("inserted record for {} not readable", record.email)))
    }

    async fn update(&self, email: &str, patch: &AnalyticsPatch, updated_at: DateTime<Utc>) -> StoreResult<bool> {
        let call_duration_json = patch
            .call_duration_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let sad_path_json = patch.sad_path_data.as_ref().map(serde_json::to_string).transpose()?;

        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE user_analytics
             SET call_duration_data = COALESCE(?1, call_duration_data),
                 sad_path_data = COALESCE(?2, sad_path_data),
                 updated_at = ?3
             WHERE email = ?4",
            params![call_duration_json, sad_path_json, updated_at.to_rfc3339(), email],
        )?;
        Ok(changed > 0)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.db_path.display())
    }
}
