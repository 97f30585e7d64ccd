//! Bounded, cancellable polling of external status.
//!
//! Identity verification and tax-form signing finish on the provider's
//! side. [`poll_until`] re-reads their status with exponential backoff
//! until the probe reports a final value, the attempt budget runs out, or
//! the caller cancels. [`PollHandle`] runs a poll loop on the Tokio runtime
//! and lets the owner cancel it when the talent navigates away.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default delay before the second probe.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(3);

/// Default ceiling for the backoff delay.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of probes before giving up (roughly 18 minutes).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Backoff schedule and attempt budget for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
    /// Total number of probes, including the first one. Zero never probes.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            multiplier: 2,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    /// Delay after the probe numbered `attempt` (0-based).
    ///
    /// `initial_interval * multiplier^attempt`, capped at `max_interval`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_interval
            .checked_mul(factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

/// What a single probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Ready(T),
}

#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("polling cancelled")]
    Cancelled,

    #[error("no final status after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("status probe failed: {0}")]
    Probe(E),
}

/// Run `probe` until it reports [`PollStatus::Ready`].
///
/// Sleeps [`PollPolicy::delay_for`] between probes. A probe error stops the
/// loop immediately; retrying transient failures is the probe's business.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
{
    for attempt in 0..policy.max_attempts {
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            status = probe() => status.map_err(PollError::Probe)?,
        };

        if let PollStatus::Ready(value) = status {
            return Ok(value);
        }

        if attempt + 1 == policy.max_attempts {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(policy.delay_for(attempt)) => {}
        }
    }

    Err(PollError::Exhausted {
        attempts: policy.max_attempts,
    })
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A spawned poll task that can be cancelled by its owner.
#[derive(Debug)]
pub struct PollHandle<T> {
    cancel: CancellationToken,
    task: JoinHandle<T>,
}

impl<T: Send + 'static> PollHandle<T> {
    /// Spawn `make(token)` on the runtime. The future should observe the
    /// token (normally by passing it to [`poll_until`]).
    pub fn spawn<F, Fut>(make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(make(cancel.clone()));
        Self { cancel, task }
    }

    /// Ask the task to stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to finish.
    pub async fn join(self) -> Result<T, tokio::task::JoinError> {
        self.task.await
    }
}

/// Spawn a [`poll_until`] loop with its own cancellation token.
pub fn spawn_poll<T, E, F, Fut>(policy: PollPolicy, probe: F) -> PollHandle<Result<T, PollError<E>>>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<PollStatus<T>, E>> + Send + 'static,
{
    PollHandle::spawn(move |cancel| async move { poll_until(&policy, &cancel, probe).await })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
