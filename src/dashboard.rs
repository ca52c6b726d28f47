use crate::charts::{
    apply_sad_path_edits, default_call_duration, default_sad_path, edit_label, parse_peak_input, reshape_peak,
    summarize_call_duration, summarize_sad_path,
};
use crate::errors::{AppError, AppResult};
use crate::identity::{normalize_email, Identity};
use crate::models::{
    AnalyticsPatch, AnalyticsRecord, CallDurationPoint, CallDurationView, ChartKind, DashboardSnapshot, EditGate,
    IdentityPhase, Notice, SadPathCategory, SadPathEdit, SadPathView, SaveOutcome,
};
use crate::session::IdentityCache;
use crate::sync::SyncClient;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const IDENTITY_FAILURE_MESSAGE: &str = "Failed to load your analytics. Please try again.";
const SAVE_FAILURE_MESSAGE: &str = "Failed to save changes. Please try again.";

struct DashboardState {
    session_id: String,
    identity: Option<Identity>,
    prompt_open: bool,
    prompt_error: Option<String>,
    notice: Option<Notice>,
    call_duration: Vec<CallDurationPoint>,
    sad_path: Vec<SadPathCategory>,
}

impl DashboardState {
    fn fresh() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            identity: None,
            prompt_open: false,
            prompt_error: None,
            notice: None,
            call_duration: default_call_duration(),
            sad_path: default_sad_path(),
        }
    }

    fn phase(&self) -> IdentityPhase {
        match (&self.identity, self.prompt_open) {
            (Some(identity), _) => IdentityPhase::Identified {
                email: identity.as_str().to_string(),
            },
            (None, true) => IdentityPhase::AwaitingIdentity,
            (None, false) => IdentityPhase::Anonymous,
        }
    }

    fn open_prompt(&mut self) {
        self.prompt_open = true;
        self.prompt_error = None;
    }

    fn adopt(&mut self, record: AnalyticsRecord) {
        self.call_duration = record.call_duration_data;
        self.sad_path = record.sad_path_data;
        self.notice = None;
    }

    fn show_local(&mut self, chart: ChartKind, patch: AnalyticsPatch) {
        if let Some(points) = patch.call_duration_data {
            self.call_duration = points;
        }
        if let Some(categories) = patch.sad_path_data {
            self.sad_path = categories;
        }
        self.notice = Some(Notice::PersistenceFailed {
            chart,
            message: SAVE_FAILURE_MESSAGE.to_string(),
        });
    }

    fn snapshot(&self) -> DashboardSnapshot {
        let identified = self.identity.is_some();
        DashboardSnapshot {
            session_id: self.session_id.clone(),
            identity: self.phase(),
            prompt_open: self.prompt_open,
            prompt_error: self.prompt_error.clone(),
            notice: self.notice.clone(),
            call_duration: CallDurationView {
                points: self.call_duration.clone(),
                summary: summarize_call_duration(&self.call_duration),
                edit_label: edit_label(identified).to_string(),
            },
            sad_path: SadPathView {
                categories: self.sad_path.clone(),
                summary: summarize_sad_path(&self.sad_path),
                edit_label: edit_label(identified).to_string(),
            },
        }
    }
}

/// Owns the visitor's identity and the two displayed datasets, and decides
/// whether the built-in defaults or the stored record is what gets shown.
///
/// Store calls run while the state lock is held, so actions from one session
/// apply strictly one after another.
#[derive(Clone)]
pub struct Dashboard {
    client: SyncClient,
    cache: IdentityCache,
    state: Arc<Mutex<DashboardState>>,
}

impl Dashboard {
    /// Builds the dashboard as a fresh load: any cached identity is purged.
    pub async fn new(client: SyncClient, cache: IdentityCache) -> AppResult<Self> {
        let dashboard = Self {
            client,
            cache,
            state: Arc::new(Mutex::new(DashboardState::fresh())),
        };
        dashboard.load().await?;
        Ok(dashboard)
    }

    /// A fresh page load. Always lands in the anonymous phase showing the
    /// built-in datasets, whatever the previous session did.
    pub async fn load(&self) -> AppResult<DashboardSnapshot> {
        let purged = self.cache.purge_on_load()?;
        let mut state = self.state.lock().await;
        *state = DashboardState::fresh();
        tracing::info!(session_id = %state.session_id, purged_identity = purged, "dashboard loaded");
        Ok(state.snapshot())
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Edit affordance of a chart. Without an identity the prompt opens
    /// instead of the chart's editor.
    pub async fn request_edit(&self, chart: ChartKind) -> EditGate {
        let mut state = self.state.lock().await;
        if state.identity.is_none() {
            state.open_prompt();
            tracing::debug!(session_id = %state.session_id, chart = chart.as_str(), "edit needs identity");
            return EditGate::IdentityRequired;
        }

        let initial_peak = match chart {
            ChartKind::CallDuration => Some(summarize_call_duration(&state.call_duration).peak_duration),
            ChartKind::SadPath => None,
        };
        EditGate::Open { chart, initial_peak }
    }

    pub async fn dismiss_prompt(&self) -> DashboardSnapshot {
        let mut state = self.state.lock().await;
        state.prompt_open = false;
        state.prompt_error = None;
        state.snapshot()
    }

    /// Resolves a submitted email. A submission made while another identity
    /// is active ends that identity first, so a failure leaves the prompt
    /// open over the defaults rather than over the previous user's data.
    pub async fn submit_identity(&self, raw_email: &str) -> AppResult<DashboardSnapshot> {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.identity.take() {
            tracing::info!(session_id = %state.session_id, email = previous.as_str(), "replacing identity");
            if let Err(error) = self.cache.forget() {
                tracing::warn!(error = %error, "could not clear cached identity");
            }
            state.call_duration = default_call_duration();
            state.sad_path = default_sad_path();
            state.notice = None;
        }
        state.prompt_open = true;

        let identity = match normalize_email(raw_email) {
            Ok(identity) => identity,
            Err(error) => {
                state.prompt_error = Some(user_message(&error));
                return Err(error);
            }
        };

        let record = match self.client.resolve_or_create(&identity).await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(
                    session_id = %state.session_id,
                    email = identity.as_str(),
                    error = %error,
                    "identity resolution failed"
                );
                state.prompt_error = Some(IDENTITY_FAILURE_MESSAGE.to_string());
                return Err(error);
            }
        };

        if let Err(error) = self.cache.remember(&identity) {
            tracing::warn!(error = %error, "could not cache identity locally");
        }

        tracing::info!(session_id = %state.session_id, email = identity.as_str(), "visitor identified");
        state.identity = Some(identity);
        state.prompt_open = false;
        state.prompt_error = None;
        state.adopt(record);
        Ok(state.snapshot())
    }

    /// Reshapes the curve around the typed peak and persists it. Bad input is
    /// rejected before any store call.
    pub async fn save_call_duration(&self, peak_input: &str) -> AppResult<SaveOutcome> {
        let peak = parse_peak_input(peak_input)?;
        let mut state = self.state.lock().await;
        let Some(identity) = state.identity.clone() else {
            state.open_prompt();
            return Ok(SaveOutcome::IdentityRequired);
        };

        let reshaped = reshape_peak(&state.call_duration, peak)?;
        self.persist(&mut state, &identity, ChartKind::CallDuration, AnalyticsPatch::call_duration(reshaped))
            .await
    }

    pub async fn save_sad_path(&self, edits: &[SadPathEdit]) -> AppResult<SaveOutcome> {
        let mut state = self.state.lock().await;
        let edited = apply_sad_path_edits(&state.sad_path, edits)?;
        let Some(identity) = state.identity.clone() else {
            state.open_prompt();
            return Ok(SaveOutcome::IdentityRequired);
        };

        self.persist(&mut state, &identity, ChartKind::SadPath, AnalyticsPatch::sad_path(edited))
            .await
    }

    /// Reloads the stored record. Unsaved local edits are discarded.
    pub async fn refresh(&self) -> AppResult<DashboardSnapshot> {
        let mut state = self.state.lock().await;
        let Some(identity) = state.identity.clone() else {
            return Ok(state.snapshot());
        };

        match self.client.fetch_by_key(&identity).await? {
            Some(record) => state.adopt(record),
            None => tracing::warn!(
                session_id = %state.session_id,
                email = identity.as_str(),
                "analytics record missing on refresh"
            ),
        }
        Ok(state.snapshot())
    }

    /// Drops the local identity and reopens the prompt. The stored record is
    /// left alone.
    pub async fn switch_user(&self) -> AppResult<DashboardSnapshot> {
        self.cache.forget()?;
        let mut state = self.state.lock().await;
        if let Some(identity) = state.identity.take() {
            tracing::info!(session_id = %state.session_id, email = identity.as_str(), "switching user");
        }
        state.call_duration = default_call_duration();
        state.sad_path = default_sad_path();
        state.notice = None;
        state.open_prompt();
        Ok(state.snapshot())
    }

    async fn persist(
        &self,
        state: &mut DashboardState,
        identity: &Identity,
        chart: ChartKind,
        patch: AnalyticsPatch,
    ) -> AppResult<SaveOutcome> {
        if let Err(error) = self.client.update_fields(identity, &patch).await {
            tracing::warn!(
                session_id = %state.session_id,
                chart = chart.as_str(),
                error = %error,
                "chart edit not persisted"
            );
            state.show_local(chart, patch);
            return Err(error);
        }

        match self.client.fetch_by_key(identity).await {
            Ok(Some(record)) => state.adopt(record),
            Ok(None) => {
                state.show_local(chart, patch);
                return Err(AppError::NotFound(format!("No analytics record for {}", identity)));
            }
            Err(error) => {
                // The update went through; what we computed is what was stored.
                tracing::warn!(
                    session_id = %state.session_id,
                    chart = chart.as_str(),
                    error = %error,
                    "refresh after save failed"
                );
                state.show_local(chart, patch);
                state.notice = None;
            }
        }

        tracing::info!(session_id = %state.session_id, chart = chart.as_str(), "chart saved");
        Ok(SaveOutcome::Saved)
    }
}

fn user_message(error: &AppError) -> String {
    match error {
        AppError::Validation(message) => message.clone(),
        _ => IDENTITY_FAILURE_MESSAGE.to_string(),
    }
}
