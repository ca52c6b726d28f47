use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallDurationPoint {
    /// Minutes.
    pub duration: i64,
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SadPathCategory {
    pub name: String,
    pub value: u64,
    pub color: String,
}

/// One row of the analytics table, keyed by email. Field names follow the
/// table's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub email: String,
    pub call_duration_data: Vec<CallDurationPoint>,
    pub sad_path_data: Vec<SadPathCategory>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnalyticsRecord {
    pub email: String,
    pub call_duration_data: Vec<CallDurationPoint>,
    pub sad_path_data: Vec<SadPathCategory>,
}

/// Partial update of a record's datasets. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_duration_data: Option<Vec<CallDurationPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sad_path_data: Option<Vec<SadPathCategory>>,
}

impl AnalyticsPatch {
    pub fn call_duration(points: Vec<CallDurationPoint>) -> Self {
        Self {
            call_duration_data: Some(points),
            sad_path_data: None,
        }
    }

    pub fn sad_path(categories: Vec<SadPathCategory>) -> Self {
        Self {
            call_duration_data: None,
            sad_path_data: Some(categories),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.call_duration_data.is_none() && self.sad_path_data.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    CallDuration,
    SadPath,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallDuration => "call-duration",
            Self::SadPath => "sad-path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum IdentityPhase {
    Anonymous,
    AwaitingIdentity,
    Identified { email: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Notice {
    PersistenceFailed { chart: ChartKind, message: String },
}

/// A single field-level edit of one sad-path category, as typed into the
/// edit dialog. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SadPathEdit {
    pub index: usize,
    pub name: Option<String>,
    pub count: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDurationSummary {
    pub peak_duration: i64,
    pub data_points: usize,
    pub max_density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SadPathShare {
    pub name: String,
    pub value: u64,
    pub color: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SadPathSummary {
    pub total: u64,
    pub shares: Vec<SadPathShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDurationView {
    pub points: Vec<CallDurationPoint>,
    pub summary: CallDurationSummary,
    pub edit_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SadPathView {
    pub categories: Vec<SadPathCategory>,
    pub summary: SadPathSummary,
    pub edit_label: String,
}

/// Everything the presentation layer needs to draw the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub session_id: String,
    pub identity: IdentityPhase,
    pub prompt_open: bool,
    pub prompt_error: Option<String>,
    pub notice: Option<Notice>,
    pub call_duration: CallDurationView,
    pub sad_path: SadPathView,
}

impl DashboardSnapshot {
    pub fn email(&self) -> Option<&str> {
        match &self.identity {
            IdentityPhase::Identified { email } => Some(email.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "kebab-case")]
pub enum EditGate {
    /// Identity is known; the chart's edit dialog may open.
    Open { chart: ChartKind, initial_peak: Option<i64> },
    /// The identity prompt was opened instead.
    IdentityRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveOutcome {
    Saved,
    IdentityRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    Postgrest,
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgrest => "postgrest",
            Self::Sqlite => "sqlite",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgrest" | "supabase" | "remote" => Some(Self::Postgrest),
            "sqlite" | "local" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}
