//! Repository for the `talents` mirror table.

use sqlx::PgPool;

use crate::models::talent::{Talent, UpsertTalent};

/// Column list for `talents` queries.
const COLUMNS: &str = "id, display_name, email, created_at, updated_at";

/// Provides lookups and upserts for talents.
pub struct TalentRepo;

impl TalentRepo {
    /// Insert a talent, or refresh its display fields if it already exists.
    pub async fn upsert(pool: &PgPool, input: &UpsertTalent) -> Result<Talent, sqlx::Error> {
        let query = format!(
            "INSERT INTO talents (id, display_name, email) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET \
                display_name = EXCLUDED.display_name, \
                email = EXCLUDED.email \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Talent>(&query)
            .bind(&input.id)
            .bind(&input.display_name)
            .bind(input.email.as_deref())
            .fetch_one(pool)
            .await
    }

    /// Find a talent by id.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Talent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM talents WHERE id = $1");
        sqlx::query_as::<_, Talent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
