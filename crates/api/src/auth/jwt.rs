//! JWT access-token validation.
//!
//! Access tokens are HS256-signed JWTs issued by the identity platform; this
//! service only verifies them. The subject is the talent id; staff tokens
//! carry the `admin` role and may act on any talent.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use payout_core::error::CoreError;
use payout_core::types::TalentId;

/// Role name that may act on any talent's onboarding.
pub const ADMIN_ROLE: &str = "admin";

/// Role name carried by talents themselves.
pub const TALENT_ROLE: &str = "talent";

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the talent id.
    pub sub: TalentId,
    /// The caller's role name (`"talent"` or `"admin"`).
    pub role: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier, kept for audit.
    pub jti: String,
}

/// Configuration for JWT validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the token issuer.
    pub secret: String,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var      | Required | Default |
    /// |--------------|----------|---------|
    /// | `JWT_SECRET` | **yes**  | --      |
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            secret: crate::config::required("JWT_SECRET")?,
        })
    }
}

/// Validate and decode an access token, returning the embedded [`Claims`].
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}
