//! Talent mirror entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use payout_core::types::{TalentId, Timestamp};

/// A row from the `talents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Talent {
    pub id: TalentId,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering or refreshing a talent from the identity platform.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertTalent {
    pub id: TalentId,
    pub display_name: String,
    pub email: Option<String>,
}
