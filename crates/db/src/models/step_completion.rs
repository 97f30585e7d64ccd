//! Step completion audit entity model.

use serde::Serialize;
use sqlx::FromRow;
use payout_core::error::CoreError;
use payout_core::onboarding::{PayoutStep, StepResult};
use payout_core::types::{DbId, TalentId, Timestamp};
use payout_core::workflow::StepRecord;

/// A row from the `onboarding_step_completions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StepCompletion {
    pub id: DbId,
    pub talent_id: TalentId,
    pub step: i16,
    pub result: serde_json::Value,
    pub completed_at: Timestamp,
}

impl TryFrom<StepCompletion> for StepRecord {
    type Error = CoreError;

    fn try_from(row: StepCompletion) -> Result<Self, Self::Error> {
        let step = u8::try_from(row.step)
            .map_err(|_| CoreError::Internal(format!("Stored step {} is negative", row.step)))
            .and_then(PayoutStep::from_number)?;
        let result: StepResult = serde_json::from_value(row.result).map_err(|e| {
            CoreError::Internal(format!("Stored result for completion {} is malformed: {e}", row.id))
        })?;
        Ok(StepRecord {
            step,
            result,
            completed_at: row.completed_at,
        })
    }
}
