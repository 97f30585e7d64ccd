use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Webhook routes mounted at `/webhooks`.
///
/// ```text
/// POST /identity  -> identity_decision
/// POST /tax-forms -> tax_form_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/identity", post(webhooks::identity_decision))
        .route("/tax-forms", post(webhooks::tax_form_status))
}
