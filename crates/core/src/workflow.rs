//! Onboarding workflow controller and its persistence seam.
//!
//! The controller is the only writer of onboarding progress. It reads the
//! current record, plans the transition with [`crate::onboarding`], and
//! applies it through [`ProgressStore`] with a compare-and-set on the
//! cursor so that a retried or double-submitted completion advances at
//! most once.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::onboarding::{
    plan_completion, CompletionPlan, IgnoreReason, OnboardingProgress, PayoutStep,
    ProgressUpdate, StepResult, NOT_STARTED,
};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// One entry in a talent's append-only completion history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: PayoutStep,
    pub result: StepResult,
    pub completed_at: Timestamp,
}

/// Persistence for onboarding progress, keyed by talent id.
///
/// Every method returns `Ok(None)` when the talent does not exist (for
/// reads) or when a conditional write's precondition no longer holds.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Read the progress record, creating the default one if the talent
    /// exists but has never been read.
    async fn load_or_init(&self, talent_id: &str)
        -> Result<Option<OnboardingProgress>, CoreError>;

    /// Move the cursor from not-started to step 1.
    async fn start(&self, talent_id: &str) -> Result<Option<OnboardingProgress>, CoreError>;

    /// Apply `update` if the cursor still equals `expected_step`, and
    /// append the step result to the history in the same write.
    async fn advance(
        &self,
        talent_id: &str,
        expected_step: i32,
        update: &ProgressUpdate,
    ) -> Result<Option<OnboardingProgress>, CoreError>;

    /// Completion history, oldest first.
    async fn history(&self, talent_id: &str) -> Result<Vec<StepRecord>, CoreError>;

    /// Whether the backing store is reachable.
    async fn ping(&self) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What `complete_step` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Advanced {
        progress: OnboardingProgress,
    },
    Ignored {
        progress: OnboardingProgress,
        reason: IgnoreReason,
    },
}

impl StepOutcome {
    pub fn progress(&self) -> &OnboardingProgress {
        match self {
            Self::Advanced { progress } | Self::Ignored { progress, .. } => progress,
        }
    }

    pub fn into_progress(self) -> OnboardingProgress {
        match self {
            Self::Advanced { progress } | Self::Ignored { progress, .. } => progress,
        }
    }

    pub fn advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Sequences a talent through the payout onboarding steps.
#[derive(Clone)]
pub struct WorkflowController {
    store: Arc<dyn ProgressStore>,
}

impl WorkflowController {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Load a talent's progress. A missing talent is `NotFound`.
    pub async fn load_progress(&self, talent_id: &str) -> Result<OnboardingProgress, CoreError> {
        let progress = self
            .store
            .load_or_init(talent_id)
            .await?
            .ok_or_else(|| CoreError::talent_not_found(talent_id))?;

        tracing::debug!(
            talent_id,
            current_step = progress.current_step,
            completed = progress.completed,
            "Loaded onboarding progress"
        );
        Ok(progress)
    }

    /// Move a not-started talent to step 1.
    ///
    /// Calling it on a talent that has already started returns the current
    /// record unchanged.
    pub async fn start_workflow(&self, talent_id: &str) -> Result<OnboardingProgress, CoreError> {
        let progress = self.load_progress(talent_id).await?;
        if progress.current_step != NOT_STARTED {
            tracing::debug!(
                talent_id,
                current_step = progress.current_step,
                "Onboarding already started"
            );
            return Ok(progress);
        }

        match self.store.start(talent_id).await? {
            Some(started) => {
                tracing::info!(talent_id, "Onboarding started");
                Ok(started)
            }
            // Lost a race with another start; report whatever won.
            None => self.load_progress(talent_id).await,
        }
    }

    /// Record the confirmed result of `step`.
    ///
    /// Applies only when `step` is the talent's current step. Anything else
    /// is reported as [`StepOutcome::Ignored`] with the unchanged record.
    pub async fn complete_step(
        &self,
        talent_id: &str,
        step: PayoutStep,
        result: StepResult,
    ) -> Result<StepOutcome, CoreError> {
        let progress = self.load_progress(talent_id).await?;

        let update = match plan_completion(&progress, step, result, chrono::Utc::now())? {
            CompletionPlan::Apply(update) => update,
            CompletionPlan::Ignore(reason) => {
                tracing::info!(
                    talent_id,
                    step = step.to_number(),
                    current_step = progress.current_step,
                    reason = %reason.describe(),
                    "Step completion ignored"
                );
                return Ok(StepOutcome::Ignored { progress, reason });
            }
        };

        match self
            .store
            .advance(talent_id, progress.current_step, &update)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    talent_id,
                    step = step.to_number(),
                    to_step = updated.current_step,
                    completed = updated.completed,
                    "Onboarding step completed"
                );
                Ok(StepOutcome::Advanced { progress: updated })
            }
            None => {
                let fresh = self.load_progress(talent_id).await?;
                tracing::warn!(
                    talent_id,
                    step = step.to_number(),
                    current_step = fresh.current_step,
                    "Step completion lost a concurrent write"
                );
                Ok(StepOutcome::Ignored {
                    progress: fresh,
                    reason: IgnoreReason::Superseded,
                })
            }
        }
    }

    /// Completion history for a talent. A missing talent is `NotFound`.
    pub async fn history(&self, talent_id: &str) -> Result<Vec<StepRecord>, CoreError> {
        // Resolve the talent first so an unknown id is a 404, not an empty list.
        self.load_progress(talent_id).await?;
        self.store.history(talent_id).await
    }

    /// Whether progress can currently be read and written.
    pub async fn store_healthy(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Progress store health check failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
