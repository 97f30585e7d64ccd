//! Postgres-backed [`ProgressStore`].

use async_trait::async_trait;

use payout_core::error::CoreError;
use payout_core::onboarding::{validate_step_transition, OnboardingProgress, ProgressUpdate};
use payout_core::workflow::{ProgressStore, StepRecord};

use crate::repositories::{StepCompletionRepo, TalentOnboardingRepo};
use crate::DbPool;

/// Stores onboarding progress in `talent_onboarding` and its history in
/// `onboarding_step_completions`.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: DbPool,
}

impl PgProgressStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn persistence(e: sqlx::Error) -> CoreError {
    tracing::error!(error = %e, "Progress store query failed");
    CoreError::Persistence(e.to_string())
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn load_or_init(
        &self,
        talent_id: &str,
    ) -> Result<Option<OnboardingProgress>, CoreError> {
        let row = TalentOnboardingRepo::get_or_create(&self.pool, talent_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn start(&self, talent_id: &str) -> Result<Option<OnboardingProgress>, CoreError> {
        let row = TalentOnboardingRepo::start(&self.pool, talent_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn advance(
        &self,
        talent_id: &str,
        expected_step: i32,
        update: &ProgressUpdate,
    ) -> Result<Option<OnboardingProgress>, CoreError> {
        validate_step_transition(expected_step, update.next_step)?;
        let result = serde_json::to_value(&update.result)
            .map_err(|e| CoreError::Internal(format!("Failed to encode step result: {e}")))?;

        let row = TalentOnboardingRepo::advance(&self.pool, talent_id, expected_step, update, &result)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn history(&self, talent_id: &str) -> Result<Vec<StepRecord>, CoreError> {
        StepCompletionRepo::list_for_talent(&self.pool, talent_id)
            .await
            .map_err(persistence)?
            .into_iter()
            .map(StepRecord::try_from)
            .collect()
    }

    async fn ping(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(persistence)
    }
}
