use std::sync::Arc;

use payout_core::workflow::WorkflowController;

use crate::config::{ServerConfig, WebhookSecrets};
use crate::engine::{StatusWatcher, StepEngine};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT settings, timeouts).
    pub config: Arc<ServerConfig>,
    /// Reads and advances onboarding progress.
    pub controller: WorkflowController,
    /// Drives each step against its collaborator.
    pub engine: Arc<StepEngine>,
    /// Background status polls, one per talent and step.
    pub watcher: Arc<StatusWatcher>,
    /// Secrets for verifying inbound webhooks.
    pub webhooks: Arc<WebhookSecrets>,
}
