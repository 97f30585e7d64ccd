//! Route definitions for payout onboarding.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::payout_onboarding;
use crate::state::AppState;

/// Routes mounted at `/talents/{talent_id}/payout-onboarding`.
///
/// ```text
/// GET    /                      -> get_progress
/// POST   /start                 -> start
/// GET    /history               -> history
/// POST   /steps/{step}/initiate -> initiate_step
/// POST   /steps/{step}/confirm  -> confirm_step
/// GET    /steps/{step}/status   -> step_status
/// POST   /steps/{step}/watch    -> watch_step
/// DELETE /steps/{step}/watch    -> unwatch_step
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(payout_onboarding::get_progress))
        .route("/start", post(payout_onboarding::start))
        .route("/history", get(payout_onboarding::history))
        .route(
            "/steps/{step}/initiate",
            post(payout_onboarding::initiate_step),
        )
        .route("/steps/{step}/confirm", post(payout_onboarding::confirm_step))
        .route("/steps/{step}/status", get(payout_onboarding::step_status))
        .route(
            "/steps/{step}/watch",
            post(payout_onboarding::watch_step).delete(payout_onboarding::unwatch_step),
        )
}
