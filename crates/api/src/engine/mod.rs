//! Onboarding step engine.
//!
//! [`steps`] runs each step against its collaborator and records confirmed
//! results; [`watcher`] polls provider-side steps in the background.

pub mod steps;
pub mod watcher;

pub use steps::{
    Collaborators, ConfirmInput, InitiateInput, Settlement, StepEngine, StepInitiation, StepStatus,
};
pub use watcher::StatusWatcher;
