//! Record store backed by a hosted PostgREST table API (the REST surface
//! Supabase exposes under `/rest/v1`).
//!
//! Requests carry no timeout and are never retried; a failure is reported
//! once to the caller.

use crate::errors::{StoreError, StoreResult};
use crate::models::{AnalyticsPatch, AnalyticsRecord, NewAnalyticsRecord};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::RequestBuilder;
use serde::Deserialize;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
/// PostgREST's "JSON object requested, multiple (or no) rows returned".
const NO_ROWS_CODE: &str = "PGRST116";
/// Postgres `unique_violation`.
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    table: String,
    api_key: Option<String>,
}

impl PostgrestStore {
    pub fn new(base_url: &str, table: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key.as_str())
                .header(AUTHORIZATION, format!("Bearer {}", key)),
            None => request,
        }
    }

    fn by_email(&self, request: RequestBuilder, email: &str) -> RequestBuilder {
        request.query(&[("email", format!("eq.{}", email)), ("select", "*".to_string())])
    }
}

fn parse_error_body(body: &str) -> PostgrestErrorBody {
    serde_json::from_str(body).unwrap_or_default()
}

pub(crate) fn is_not_found(status: u16, body: &str) -> bool {
    status == 406 && parse_error_body(body).code.as_deref() == Some(NO_ROWS_CODE)
}

pub(crate) fn classify_failure(status: u16, body: &str) -> StoreError {
    let parsed = parse_error_body(body);
    let message = match (&parsed.message, &parsed.details) {
        (Some(message), Some(details)) => format!("{} ({})", message, details),
        (Some(message), None) => message.clone(),
        (None, _) if body.trim().is_empty() => format!("HTTP {}", status),
        (None, _) => body.trim().to_string(),
    };

    if status == 409 || parsed.code.as_deref() == Some(UNIQUE_VIOLATION_CODE) {
        return StoreError::Conflict(message);
    }

    StoreError::Rejected {
        status,
        code: parsed.code,
        message,
    }
}

pub(crate) fn update_body(patch: &AnalyticsPatch, updated_at: DateTime<Utc>) -> StoreResult<serde_json::Value> {
    let mut body = serde_json::to_value(patch)?;
    let object = body
        .as_object_mut()
        .ok_or_else(|| StoreError::Decode("patch did not serialize to an object".to_string()))?;
    object.insert("updated_at".to_string(), serde_json::Value::String(updated_at.to_rfc3339()));
    Ok(body)
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn lookup(&self, email: &str) -> StoreResult<Option<AnalyticsRecord>> {
        let request = self.by_email(self.client.get(self.table_url()), email).header(ACCEPT, SINGLE_OBJECT);
        let response = self.authorize(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if (200..300).contains(&status) {
            return Ok(Some(serde_json::from_str(&body)?));
        }
        if is_not_found(status, &body) {
            return Ok(None);
        }
        Err(classify_failure(status, &body))
    }

    async fn insert(&self, record: &NewAnalyticsRecord) -> StoreResult<AnalyticsRecord> {
        let request = self
            .client
            .post(self.table_url())
            .header("Prefer", RETURN_REPRESENTATION)
            .header(ACCEPT, SINGLE_OBJECT)
            .json(record);
        let response = self.authorize(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if (200..300).contains(&status) {
            return Ok(serde_json::from_str(&body)?);
        }
        Err(classify_failure(status, &body))
    }

    async fn update(&self, email: &str, patch: &AnalyticsPatch, updated_at: DateTime<Utc>) -> StoreResult<bool> {
        let request = self
            .by_email(self.client.patch(self.table_url()), email)
            .header("Prefer", RETURN_REPRESENTATION)
            .header(ACCEPT, "application/json")
            .json(&update_body(patch, updated_at)?);
        let response = self.authorize(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, &body));
        }
        let rows: Vec<serde_json::Value> = serde_json::from_str(&body)?;
        Ok(!rows.is_empty())
    }

    fn describe(&self) -> String {
        self.table_url()
    }
}
