//! Talent onboarding progress entity model.

use serde::Serialize;
use sqlx::FromRow;
use payout_core::onboarding::OnboardingProgress;
use payout_core::types::{DbId, TalentId, Timestamp};

/// A row from the `talent_onboarding` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TalentOnboarding {
    pub id: DbId,
    pub talent_id: TalentId,
    pub current_step: i32,
    pub completed: bool,
    pub moov_account_id: Option<String>,
    pub bank_account_linked: bool,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<TalentOnboarding> for OnboardingProgress {
    fn from(row: TalentOnboarding) -> Self {
        Self {
            talent_id: row.talent_id,
            current_step: row.current_step,
            completed: row.completed,
            moov_account_id: row.moov_account_id,
            bank_account_linked: row.bank_account_linked,
            completed_at: row.completed_at,
        }
    }
}
