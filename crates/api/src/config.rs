use std::str::FromStr;
use std::time::Duration;

use payout_core::error::CoreError;
use payout_core::polling::PollPolicy;
use payout_providers::{ESignConfig, MoovConfig, PlaidConfig, VeriffConfig};

use crate::auth::jwt::JwtConfig;

/// Read a required variable. Empty values count as missing.
pub fn required(name: &str) -> Result<String, CoreError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CoreError::Configuration(format!(
            "{name} must be set in the environment"
        ))),
    }
}

/// Read an optional variable, falling back to `default`.
pub fn string_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an optional variable, falling back to `default`.
pub fn parsed_or<T>(name: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            CoreError::Configuration(format!("{name} has an invalid value '{raw}': {e}"))
        }),
        Err(_) => Ok(default),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background watchers on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Result<Self, CoreError> {
        let cors_origins: Vec<String> = string_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: string_or("HOST", "0.0.0.0"),
            port: parsed_or("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: parsed_or("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: parsed_or("SHUTDOWN_TIMEOUT_SECS", 30)?,
            jwt: JwtConfig::from_env()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Shared secrets for verifying inbound webhook signatures.
#[derive(Debug, Clone)]
pub struct WebhookSecrets {
    pub identity: String,
    pub tax_forms: String,
}

/// Credentials and endpoints for every collaborator, plus the status
/// polling schedule.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub veriff: VeriffConfig,
    pub moov: MoovConfig,
    pub plaid: PlaidConfig,
    pub esign: ESignConfig,
    pub webhooks: WebhookSecrets,
    pub poll: PollPolicy,
}

impl ProviderConfig {
    /// Load collaborator configuration. Any missing credential is a
    /// [`CoreError::Configuration`] naming the variable.
    ///
    /// | Env Var                        | Required | Default                               |
    /// |--------------------------------|----------|---------------------------------------|
    /// | `VERIFF_BASE_URL`              | no       | `https://stationapi.veriff.com`       |
    /// | `VERIFF_API_KEY`               | **yes**  | --                                    |
    /// | `VERIFF_SHARED_SECRET`         | **yes**  | --                                    |
    /// | `VERIFF_CALLBACK_URL`          | no       | --                                    |
    /// | `MOOV_BASE_URL`                | no       | `https://api.moov.io`                 |
    /// | `MOOV_PUBLIC_KEY`              | **yes**  | --                                    |
    /// | `MOOV_SECRET_KEY`              | **yes**  | --                                    |
    /// | `MOOV_ACCOUNT_ID`              | **yes**  | --                                    |
    /// | `PLAID_BASE_URL`               | no       | `https://sandbox.plaid.com`           |
    /// | `PLAID_CLIENT_ID`              | **yes**  | --                                    |
    /// | `PLAID_SECRET`                 | **yes**  | --                                    |
    /// | `PLAID_CLIENT_NAME`            | no       | `Payouts`                             |
    /// | `ESIGN_BASE_URL`               | **yes**  | --                                    |
    /// | `ESIGN_API_KEY`                | **yes**  | --                                    |
    /// | `ESIGN_TEMPLATE_ID`            | **yes**  | --                                    |
    /// | `IDENTITY_WEBHOOK_SECRET`      | no       | `VERIFF_SHARED_SECRET`                |
    /// | `TAX_FORM_WEBHOOK_SECRET`      | **yes**  | --                                    |
    /// | `STATUS_POLL_INITIAL_SECS`     | no       | `3`                                   |
    /// | `STATUS_POLL_MAX_SECS`         | no       | `30`                                  |
    /// | `STATUS_POLL_MULTIPLIER`       | no       | `2`                                   |
    /// | `STATUS_POLL_MAX_ATTEMPTS`     | no       | `40`                                  |
    pub fn from_env() -> Result<Self, CoreError> {
        let veriff_secret = required("VERIFF_SHARED_SECRET")?;
        let veriff = VeriffConfig {
            base_url: string_or("VERIFF_BASE_URL", "https://stationapi.veriff.com"),
            api_key: required("VERIFF_API_KEY")?,
            shared_secret: veriff_secret.clone(),
            callback_url: std::env::var("VERIFF_CALLBACK_URL").ok(),
        };

        let moov = MoovConfig {
            base_url: string_or("MOOV_BASE_URL", "https://api.moov.io"),
            public_key: required("MOOV_PUBLIC_KEY")?,
            secret_key: required("MOOV_SECRET_KEY")?,
            account_id: required("MOOV_ACCOUNT_ID")?,
        };

        let plaid = PlaidConfig {
            base_url: string_or("PLAID_BASE_URL", "https://sandbox.plaid.com"),
            client_id: required("PLAID_CLIENT_ID")?,
            secret: required("PLAID_SECRET")?,
            client_name: string_or("PLAID_CLIENT_NAME", "Payouts"),
        };

        let esign = ESignConfig {
            base_url: required("ESIGN_BASE_URL")?,
            api_key: required("ESIGN_API_KEY")?,
            template_id: required("ESIGN_TEMPLATE_ID")?,
        };

        let webhooks = WebhookSecrets {
            identity: std::env::var("IDENTITY_WEBHOOK_SECRET").unwrap_or(veriff_secret),
            tax_forms: required("TAX_FORM_WEBHOOK_SECRET")?,
        };

        Ok(Self {
            veriff,
            moov,
            plaid,
            esign,
            webhooks,
            poll: poll_policy_from_env()?,
        })
    }
}

/// Read the status polling schedule, starting from [`PollPolicy::default`].
pub fn poll_policy_from_env() -> Result<PollPolicy, CoreError> {
    let defaults = PollPolicy::default();
    let policy = PollPolicy {
        initial_interval: Duration::from_secs(parsed_or(
            "STATUS_POLL_INITIAL_SECS",
            defaults.initial_interval.as_secs(),
        )?),
        max_interval: Duration::from_secs(parsed_or(
            "STATUS_POLL_MAX_SECS",
            defaults.max_interval.as_secs(),
        )?),
        multiplier: parsed_or("STATUS_POLL_MULTIPLIER", defaults.multiplier)?,
        max_attempts: parsed_or("STATUS_POLL_MAX_ATTEMPTS", defaults.max_attempts)?,
    };

    if policy.initial_interval > policy.max_interval {
        return Err(CoreError::Configuration(
            "STATUS_POLL_INITIAL_SECS must not exceed STATUS_POLL_MAX_SECS".to_string(),
        ));
    }
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // Variable names are unique to each test so parallel tests do not race.

    #[test]
    fn missing_required_variable_names_it() {
        let err = required("PAYOUT_TEST_DEFINITELY_UNSET").unwrap_err();
        assert_matches!(err, CoreError::Configuration(msg) if msg.contains("PAYOUT_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn parsed_or_uses_default_when_unset() {
        assert_eq!(parsed_or("PAYOUT_TEST_UNSET_NUMBER", 7u32).unwrap(), 7);
    }

    #[test]
    fn default_poll_policy_matches_core_defaults() {
        assert_eq!(poll_policy_from_env().unwrap(), PollPolicy::default());
    }
}
