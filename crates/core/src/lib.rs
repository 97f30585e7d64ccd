//! Domain layer for talent payout onboarding.
//!
//! Holds the step state machine, the workflow controller and its persistence
//! seam, identity-field validation, webhook signing, and the bounded polling
//! routine used to wait on external confirmations. Nothing in this crate
//! performs network I/O directly.

pub mod error;
pub mod identity;
pub mod memory;
pub mod onboarding;
pub mod polling;
pub mod signing;
pub mod types;
pub mod verification;
pub mod workflow;
