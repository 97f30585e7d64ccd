//! Handlers for a talent's payout onboarding.
//!
//! Every endpoint is scoped to `/talents/{talent_id}/payout-onboarding` and
//! requires the caller to be that talent or an admin.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use payout_core::error::CoreError;
use payout_core::onboarding::{
    OnboardingProgress, PayoutStep, WorkflowState, MIN_STEP, TERMINAL_STEP,
};

use crate::engine::steps::require_current;
use crate::engine::{ConfirmInput, InitiateInput};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One entry of the step list shown to the talent.
#[derive(Debug, Serialize)]
pub struct StepView {
    pub number: u8,
    pub step: PayoutStep,
    pub label: &'static str,
    pub done: bool,
    pub current: bool,
}

/// Progress plus the derived workflow state the client renders from.
#[derive(Debug, Serialize)]
pub struct ProgressView {
    #[serde(flatten)]
    pub progress: OnboardingProgress,
    pub state: WorkflowState,
    pub steps: Vec<StepView>,
}

impl From<OnboardingProgress> for ProgressView {
    fn from(progress: OnboardingProgress) -> Self {
        let current = progress.current();
        let steps = PayoutStep::ALL
            .iter()
            .map(|&step| StepView {
                number: step.to_number(),
                step,
                label: step.label(),
                done: progress.is_step_done(step),
                current: current == Some(step),
            })
            .collect();
        Self {
            state: progress.state(),
            steps,
            progress,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct WatchState {
    pub step: PayoutStep,
    pub watching: bool,
}

/// Parse the `{step}` path segment. Any malformed value is a validation
/// error so it renders in the usual error envelope.
fn parse_step(raw: &str) -> AppResult<PayoutStep> {
    let number = raw.trim().parse::<u8>().map_err(|_| {
        CoreError::Validation(format!(
            "Invalid step '{raw}'. Must be a number between {MIN_STEP} and {TERMINAL_STEP}"
        ))
    })?;
    Ok(PayoutStep::from_number(number)?)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/v1/talents/{talent_id}/payout-onboarding
///
/// Load the talent's progress, creating the not-started record on first
/// access.
pub async fn get_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Path(talent_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let progress = state.controller.load_progress(&talent_id).await?;
    Ok(Json(DataResponse {
        data: ProgressView::from(progress),
    }))
}

/// POST /api/v1/talents/{talent_id}/payout-onboarding/start
///
/// Move a not-started talent to the first step. Idempotent.
pub async fn start(
    user: AuthUser,
    State(state): State<AppState>,
    Path(talent_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let progress = state.controller.start_workflow(&talent_id).await?;
    Ok(Json(DataResponse {
        data: ProgressView::from(progress),
    }))
}

/// GET /api/v1/talents/{talent_id}/payout-onboarding/history
pub async fn history(
    user: AuthUser,
    State(state): State<AppState>,
    Path(talent_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let records = state.controller.history(&talent_id).await?;
    Ok(Json(DataResponse { data: records }))
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// POST /api/v1/talents/{talent_id}/payout-onboarding/steps/{step}/initiate
pub async fn initiate_step(
    user: AuthUser,
    State(state): State<AppState>,
    Path((talent_id, step)): Path<(String, String)>,
    Json(input): Json<InitiateInput>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let step = parse_step(&step)?;
    let initiation = state.engine.initiate(&talent_id, step, input).await?;
    Ok(Json(DataResponse { data: initiation }))
}

/// POST /api/v1/talents/{talent_id}/payout-onboarding/steps/{step}/confirm
///
/// Confirm the step with its collaborator. A running status watcher for the
/// step is stopped once the step is recorded.
pub async fn confirm_step(
    user: AuthUser,
    State(state): State<AppState>,
    Path((talent_id, step)): Path<(String, String)>,
    Json(input): Json<ConfirmInput>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let step = parse_step(&step)?;
    let outcome = state.engine.confirm(&talent_id, step, input).await?;

    if outcome.progress().is_step_done(step) {
        state.watcher.unwatch(&talent_id, step);
    }
    Ok(Json(DataResponse { data: outcome }))
}

/// GET /api/v1/talents/{talent_id}/payout-onboarding/steps/{step}/status?reference=
pub async fn step_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path((talent_id, step)): Path<(String, String)>,
    Query(query): Query<StatusQuery>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let step = parse_step(&step)?;
    let status = state.engine.status(&talent_id, step, query.reference).await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/talents/{talent_id}/payout-onboarding/steps/{step}/watch
///
/// Poll the collaborator in the background until the step settles.
/// Returns 202; nothing is started for a step that is already recorded, and
/// only the current step can be watched.
pub async fn watch_step(
    user: AuthUser,
    State(state): State<AppState>,
    Path((talent_id, step)): Path<(String, String)>,
    Json(input): Json<WatchRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let step = parse_step(&step)?;
    let progress = state.controller.load_progress(&talent_id).await?;

    if progress.is_step_done(step) {
        return Ok((
            StatusCode::OK,
            Json(DataResponse {
                data: WatchState {
                    step,
                    watching: false,
                },
            }),
        ));
    }
    require_current(&progress, step)?;

    state.watcher.watch(&talent_id, step, &input.reference)?;
    tracing::info!(talent_id = %talent_id, step = step.to_number(), "Status watch requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: WatchState {
                step,
                watching: true,
            },
        }),
    ))
}

/// DELETE /api/v1/talents/{talent_id}/payout-onboarding/steps/{step}/watch
pub async fn unwatch_step(
    user: AuthUser,
    State(state): State<AppState>,
    Path((talent_id, step)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    user.ensure_can_access(&talent_id)?;
    let step = parse_step(&step)?;
    let was_running = state.watcher.unwatch(&talent_id, step);
    tracing::debug!(talent_id = %talent_id, step = step.to_number(), was_running, "Status watch cancelled");
    Ok(Json(DataResponse {
        data: WatchState {
            step,
            watching: false,
        },
    }))
}
