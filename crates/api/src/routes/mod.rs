pub mod health;
pub mod payout_onboarding;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /talents/{talent_id}/payout-onboarding                     progress (GET)
/// /talents/{talent_id}/payout-onboarding/start               start workflow (POST)
/// /talents/{talent_id}/payout-onboarding/history             completed steps (GET)
/// /talents/{talent_id}/payout-onboarding/steps/{step}/initiate  begin a step (POST)
/// /talents/{talent_id}/payout-onboarding/steps/{step}/confirm   confirm a step (POST)
/// /talents/{talent_id}/payout-onboarding/steps/{step}/status    collaborator status (GET)
/// /talents/{talent_id}/payout-onboarding/steps/{step}/watch     start, stop polling (POST, DELETE)
///
/// /webhooks/identity                                         identity decision (signed)
/// /webhooks/tax-forms                                        tax form status (signed)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Talent-scoped onboarding (JWT required).
        .nest(
            "/talents/{talent_id}/payout-onboarding",
            payout_onboarding::router(),
        )
        // Collaborator callbacks (HMAC signed, no JWT).
        .nest("/webhooks", webhooks::router())
}
