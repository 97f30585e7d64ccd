//! Repository for the `talent_onboarding` table.
//!
//! Every write that moves the cursor is conditional on the cursor value the
//! caller read, so concurrent writers cannot both advance the same step.

use sqlx::PgPool;

use payout_core::onboarding::{ProgressUpdate, NOT_STARTED};

use crate::models::talent_onboarding::TalentOnboarding;
use crate::repositories::StepCompletionRepo;

/// Column list for `talent_onboarding` queries.
const COLUMNS: &str = "\
    id, talent_id, current_step, completed, moov_account_id, \
    bank_account_linked, completed_at, created_at, updated_at";

/// Provides reads and conditional writes for onboarding progress.
pub struct TalentOnboardingRepo;

impl TalentOnboardingRepo {
    /// Find the progress row for a talent.
    pub async fn find_by_talent(
        pool: &PgPool,
        talent_id: &str,
    ) -> Result<Option<TalentOnboarding>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM talent_onboarding WHERE talent_id = $1");
        sqlx::query_as::<_, TalentOnboarding>(&query)
            .bind(talent_id)
            .fetch_optional(pool)
            .await
    }

    /// Return the progress row, creating the default one on first read.
    ///
    /// Returns `None` when the talent itself does not exist. An existing row
    /// is returned untouched, so reads never bump `updated_at`.
    pub async fn get_or_create(
        pool: &PgPool,
        talent_id: &str,
    ) -> Result<Option<TalentOnboarding>, sqlx::Error> {
        if let Some(row) = Self::find_by_talent(pool, talent_id).await? {
            return Ok(Some(row));
        }

        let query = format!(
            "INSERT INTO talent_onboarding (talent_id) \
             SELECT id FROM talents WHERE id = $1 \
             ON CONFLICT (talent_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, TalentOnboarding>(&query)
            .bind(talent_id)
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(row) => Ok(Some(row)),
            // Either the talent is unknown or a concurrent reader created the row.
            None => Self::find_by_talent(pool, talent_id).await,
        }
    }

    /// Move the cursor from not-started to step 1.
    ///
    /// Returns `None` if the row is missing or has already started.
    pub async fn start(
        pool: &PgPool,
        talent_id: &str,
    ) -> Result<Option<TalentOnboarding>, sqlx::Error> {
        let query = format!(
            "UPDATE talent_onboarding SET current_step = $2 \
             WHERE talent_id = $1 AND current_step = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TalentOnboarding>(&query)
            .bind(talent_id)
            .bind(NOT_STARTED + 1)
            .bind(NOT_STARTED)
            .fetch_optional(pool)
            .await
    }

    /// Apply `update` if the cursor still equals `expected_step`, and record
    /// the step result in the completion history in the same transaction.
    ///
    /// Returns `None` (and writes nothing) when the cursor has moved.
    pub async fn advance(
        pool: &PgPool,
        talent_id: &str,
        expected_step: i32,
        update: &ProgressUpdate,
        result: &serde_json::Value,
    ) -> Result<Option<TalentOnboarding>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE talent_onboarding SET \
                current_step = $3, \
                moov_account_id = COALESCE($4, moov_account_id), \
                completed = completed OR $5, \
                bank_account_linked = bank_account_linked OR $6, \
                completed_at = COALESCE(completed_at, $7) \
             WHERE talent_id = $1 AND current_step = $2 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, TalentOnboarding>(&query)
            .bind(talent_id)
            .bind(expected_step)
            .bind(update.next_step)
            .bind(update.moov_account_id.as_deref())
            .bind(update.completed)
            .bind(update.bank_account_linked)
            .bind(update.completed_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        StepCompletionRepo::insert(
            &mut *tx,
            talent_id,
            i16::from(update.step.to_number()),
            result,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }
}
