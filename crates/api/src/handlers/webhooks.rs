//! Inbound collaborator webhooks.
//!
//! Both endpoints authenticate the sender with an HMAC-SHA256 signature of
//! the raw body in the `x-hmac-signature` header. A verified event is
//! applied through the step engine exactly like a client confirmation, so a
//! late or repeated delivery is ignored by the workflow.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use payout_core::error::CoreError;
use payout_core::onboarding::PayoutStep;
use payout_core::signing::{verify_signature, SIGNATURE_HEADER};
use payout_core::verification::TaxDocumentStatus;
use payout_providers::veriff::parse_decision_webhook;
use payout_providers::TaxDocument;

use crate::engine::Settlement;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a tax-form status event.
#[derive(Debug, Deserialize)]
pub struct TaxFormEvent {
    pub document_id: String,
    /// The talent id the document was created for.
    pub external_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub settlement: Settlement,
}

fn verify(headers: &HeaderMap, body: &[u8], secret: &str, source: &'static str) -> AppResult<()> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(secret, body, signature) {
        tracing::warn!(source, "Rejected webhook with invalid signature");
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid webhook signature".into(),
        )));
    }
    Ok(())
}

/// Stop the watcher once the step has settled one way or the other.
fn stop_watcher(state: &AppState, talent_id: &str, step: PayoutStep, settlement: &Settlement) {
    if !matches!(settlement, Settlement::Pending { .. }) {
        state.watcher.unwatch(talent_id, step);
    }
}

/// POST /api/v1/webhooks/identity
///
/// Identity decision from the KYC provider. `vendorData` carries the talent
/// id. Non-final statuses are acknowledged without a state change.
pub async fn identity_decision(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    verify(&headers, &body, &state.webhooks.identity, "identity")?;

    let decision = parse_decision_webhook(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed identity webhook: {e}")))?;
    let talent_id = decision
        .vendor_data
        .clone()
        .ok_or_else(|| AppError::BadRequest("Identity webhook has no vendorData".into()))?;

    tracing::info!(
        talent_id = %talent_id,
        session_id = %decision.session_id,
        status = decision.status.as_str(),
        "Identity webhook received"
    );

    let settlement = state
        .engine
        .settle_identity_decision(&talent_id, &decision)
        .await?;
    stop_watcher(&state, &talent_id, PayoutStep::IdentityVerification, &settlement);

    Ok(Json(DataResponse {
        data: WebhookAck {
            received: true,
            settlement,
        },
    }))
}

/// POST /api/v1/webhooks/tax-forms
///
/// Tax document status change from the e-sign service.
pub async fn tax_form_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    verify(&headers, &body, &state.webhooks.tax_forms, "tax_forms")?;

    let event: TaxFormEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed tax form webhook: {e}")))?;
    let status = TaxDocumentStatus::parse(&event.status)?;

    tracing::info!(
        talent_id = %event.external_id,
        document_id = %event.document_id,
        status = status.as_str(),
        "Tax form webhook received"
    );

    let doc = TaxDocument {
        id: event.document_id,
        external_id: event.external_id,
        status,
        signing_url: None,
    };
    let settlement = state.engine.settle_tax_document(&doc.external_id, &doc).await?;
    stop_watcher(&state, &doc.external_id, PayoutStep::TaxInformation, &settlement);

    Ok(Json(DataResponse {
        data: WebhookAck {
            received: true,
            settlement,
        },
    }))
}
