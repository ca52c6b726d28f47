use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("STORE_UNAVAILABLE: {0}")]
    StoreUnavailable(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures reported by a record store backend, before the sync layer
/// collapses them for callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Conflict(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("store rejected request ({status}{}): {message}", code_suffix(.code))]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("malformed store payload: {0}")]
    Decode(String),
    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(inner, message) = &value {
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
                && matches!(
                    inner.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
            {
                return Self::Conflict(message.clone().unwrap_or_else(|| value.to_string()));
            }
        }
        Self::Backend(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|code| format!(", code {code}")).unwrap_or_default()
}

pub type StoreResult<T> = Result<T, StoreError>;
