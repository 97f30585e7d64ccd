//! Repository for the append-only `onboarding_step_completions` table.

use sqlx::{PgConnection, PgPool};

use crate::models::step_completion::StepCompletion;

/// Column list for `onboarding_step_completions` queries.
const COLUMNS: &str = "id, talent_id, step, result, completed_at";

/// Provides inserts and reads for step completion history. Rows are never
/// updated or deleted.
pub struct StepCompletionRepo;

impl StepCompletionRepo {
    /// Record a completed step. Runs on the caller's transaction so the
    /// entry commits together with the cursor move.
    pub async fn insert(
        conn: &mut PgConnection,
        talent_id: &str,
        step: i16,
        result: &serde_json::Value,
    ) -> Result<StepCompletion, sqlx::Error> {
        let query = format!(
            "INSERT INTO onboarding_step_completions (talent_id, step, result) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StepCompletion>(&query)
            .bind(talent_id)
            .bind(step)
            .bind(result)
            .fetch_one(conn)
            .await
    }

    /// All completions for a talent, oldest first.
    pub async fn list_for_talent(
        pool: &PgPool,
        talent_id: &str,
    ) -> Result<Vec<StepCompletion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM onboarding_step_completions \
             WHERE talent_id = $1 \
             ORDER BY completed_at ASC, id ASC"
        );
        sqlx::query_as::<_, StepCompletion>(&query)
            .bind(talent_id)
            .fetch_all(pool)
            .await
    }
}
