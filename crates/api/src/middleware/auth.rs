//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use payout_core::error::CoreError;
use payout_core::types::TalentId;

use crate::auth::jwt::{validate_token, ADMIN_ROLE};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated caller extracted from a JWT Bearer token in the
/// `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The caller's talent id (from `claims.sub`).
    pub talent_id: TalentId,
    /// The caller's role name (`"talent"` or `"admin"`).
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    /// Talents may only act on their own onboarding; admins on anyone's.
    pub fn ensure_can_access(&self, talent_id: &str) -> Result<(), AppError> {
        if self.is_admin() || self.talent_id == talent_id {
            return Ok(());
        }
        tracing::warn!(
            caller = %self.talent_id,
            talent_id,
            "Rejected access to another talent's onboarding"
        );
        Err(AppError::Core(CoreError::Forbidden(
            "You can only manage your own payout onboarding".into(),
        )))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            talent_id: claims.sub,
            role: claims.role,
        })
    }
}
