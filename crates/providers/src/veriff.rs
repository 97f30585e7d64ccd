//! Identity verification through Veriff.
//!
//! Sessions are created with the talent id as `vendorData` so that decision
//! webhooks can be routed back to the right talent without a lookup table.

use async_trait::async_trait;
use serde::Deserialize;

use payout_core::signing::compute_signature;
use payout_core::verification::VerificationStatus;

use crate::error::ProviderError;
use crate::http;
use crate::traits::{IdentityDecision, IdentityProvider, IdentitySession};

const PROVIDER: &str = "Veriff";

/// Connection settings for the Veriff station API.
#[derive(Debug, Clone)]
pub struct VeriffConfig {
    pub base_url: String,
    pub api_key: String,
    /// Shared secret used to sign requests and verify decision webhooks.
    pub shared_secret: String,
    /// Where Veriff sends the talent after the hosted flow.
    pub callback_url: Option<String>,
}

pub struct VeriffClient {
    client: reqwest::Client,
    config: VeriffConfig,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SessionResponse {
    verification: SessionBody,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    id: String,
    url: String,
    #[serde(default)]
    status: Option<String>,
}

/// Shape shared by the decision endpoint and the decision webhook.
#[derive(Debug, Deserialize)]
struct DecisionResponse {
    #[serde(default)]
    verification: Option<DecisionBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionBody {
    id: String,
    status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    vendor_data: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl VeriffClient {
    pub fn new(config: VeriffConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::build_client(PROVIDER)?,
            config,
        })
    }

    fn session_request_body(&self, talent_id: &str) -> serde_json::Value {
        let mut verification = serde_json::json!({
            "vendorData": talent_id,
        });
        if let Some(callback) = &self.config.callback_url {
            verification["callback"] = serde_json::Value::String(callback.clone());
        }
        serde_json::json!({ "verification": verification })
    }
}

/// Parse a decision document, from either the decision endpoint or a
/// webhook body.
///
/// A session without a decision yet reports `session_id` back with a
/// `submitted` status.
pub fn parse_decision(session_id: &str, body: &[u8]) -> Result<IdentityDecision, ProviderError> {
    let parsed: DecisionResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;

    let Some(decision) = parsed.verification else {
        return Ok(IdentityDecision {
            session_id: session_id.to_string(),
            status: VerificationStatus::Submitted,
            reason: None,
            vendor_data: None,
        });
    };

    let status = VerificationStatus::parse(&decision.status)
        .map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;
    Ok(IdentityDecision {
        session_id: decision.id,
        status,
        reason: decision.reason,
        vendor_data: decision.vendor_data,
    })
}

/// Parse a decision webhook body. The session id comes from the body.
pub fn parse_decision_webhook(body: &[u8]) -> Result<IdentityDecision, ProviderError> {
    let decision = parse_decision("", body)?;
    if decision.session_id.is_empty() {
        return Err(ProviderError::decode(PROVIDER, "webhook has no verification"));
    }
    Ok(decision)
}

#[async_trait]
impl IdentityProvider for VeriffClient {
    async fn create_session(&self, talent_id: &str) -> Result<IdentitySession, ProviderError> {
        let body = self.session_request_body(talent_id);
        let payload = serde_json::to_vec(&body)
            .map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;
        let signature = compute_signature(&self.config.shared_secret, &payload);

        let request = self
            .client
            .post(http::url(&self.config.base_url, "/v1/sessions"))
            .header("x-auth-client", &self.config.api_key)
            .header("x-hmac-signature", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        let response: SessionResponse = http::send_json(PROVIDER, request).await?;

        let status = match response.verification.status.as_deref() {
            Some(s) => VerificationStatus::parse(s)
                .map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?,
            None => VerificationStatus::Created,
        };

        tracing::info!(talent_id, session_id = %response.verification.id, "Veriff session created");
        Ok(IdentitySession {
            id: response.verification.id,
            url: response.verification.url,
            status,
        })
    }

    async fn decision(&self, session_id: &str) -> Result<IdentityDecision, ProviderError> {
        let session_id = http::path_segment(PROVIDER, session_id)?;
        let signature = compute_signature(&self.config.shared_secret, session_id.as_bytes());
        let request = self
            .client
            .get(http::url(
                &self.config.base_url,
                &format!("/v1/sessions/{session_id}/decision"),
            ))
            .header("x-auth-client", &self.config.api_key)
            .header("x-hmac-signature", signature);

        let response = http::send(PROVIDER, request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| ProviderError::Request {
                provider: PROVIDER,
                source,
            })?;
        parse_decision(session_id, &body)
    }
}
