//! Request handlers.
//!
//! Handlers authenticate the caller, delegate to the workflow controller or
//! step engine held in [`AppState`](crate::state::AppState), and map errors
//! via [`AppError`](crate::error::AppError).

pub mod payout_onboarding;
pub mod webhooks;
