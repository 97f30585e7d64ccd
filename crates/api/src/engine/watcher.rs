//! Background status watchers.
//!
//! While a talent waits on a provider-side step (tax form signing, identity
//! review) the client can ask the server to watch the status. Each watcher
//! is a bounded [`poll_until`] loop owned by a [`PollHandle`]; at most one
//! runs per talent and step, and a webhook confirmation stops it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use payout_core::error::CoreError;
use payout_core::onboarding::PayoutStep;
use payout_core::polling::{poll_until, PollError, PollHandle, PollPolicy, PollStatus};
use payout_core::types::TalentId;

use super::steps::{provider_name, Settlement, StepEngine};

type WatchKey = (TalentId, PayoutStep);

/// A running watcher. `id` tells a replaced entry apart from its successor.
struct Watch {
    id: u64,
    handle: PollHandle<()>,
}

type Registry = Mutex<HashMap<WatchKey, Watch>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<WatchKey, Watch>> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct StatusWatcher {
    engine: Arc<StepEngine>,
    policy: PollPolicy,
    watches: Arc<Registry>,
    next_id: AtomicU64,
}

impl StatusWatcher {
    pub fn new(engine: Arc<StepEngine>, policy: PollPolicy) -> Self {
        Self {
            engine,
            policy,
            watches: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Start watching `reference` for `step`, replacing any running watcher
    /// for the same talent and step.
    pub fn watch(&self, talent_id: &str, step: PayoutStep, reference: &str) -> Result<(), CoreError> {
        if !step.is_pollable() {
            return Err(CoreError::Validation(format!(
                "Step {} ({}) cannot be watched",
                step.to_number(),
                step.label()
            )));
        }
        if reference.trim().is_empty() {
            return Err(CoreError::Validation("reference is required".to_string()));
        }

        let engine = Arc::clone(&self.engine);
        let policy = self.policy;
        let talent = talent_id.to_string();
        let reference = reference.to_string();
        let registry = Arc::clone(&self.watches);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key: WatchKey = (talent.clone(), step);

        // Held until the entry is inserted so the task cannot finish and
        // deregister before it is registered.
        let mut watches = lock(&self.watches);

        let handle = PollHandle::spawn(move |cancel| async move {
            let result = poll_until(&policy, &cancel, || {
                let engine = Arc::clone(&engine);
                let talent = talent.clone();
                let reference = reference.clone();
                async move {
                    let status = match engine.probe(&talent, step, &reference).await {
                        Ok(Settlement::Completed { outcome }) => PollStatus::Ready(outcome),
                        Ok(Settlement::Pending { .. }) => PollStatus::Pending,
                        Ok(Settlement::Refused { message }) => {
                            return Err(CoreError::Rejected {
                                provider: provider_name(step),
                                message,
                            })
                        }
                        Err(e) => return Err(e),
                    };
                    Ok(status)
                }
            })
            .await;

            let step_number = step.to_number();
            match result {
                Ok(outcome) => tracing::info!(
                    talent_id = %talent,
                    step = step_number,
                    advanced = outcome.advanced(),
                    "Watched step confirmed"
                ),
                Err(PollError::Cancelled) => {
                    tracing::debug!(talent_id = %talent, step = step_number, "Status watcher cancelled")
                }
                Err(PollError::Exhausted { attempts }) => tracing::warn!(
                    talent_id = %talent,
                    step = step_number,
                    attempts,
                    "Status watcher gave up without a final status"
                ),
                Err(PollError::Probe(e)) => tracing::warn!(
                    talent_id = %talent,
                    step = step_number,
                    error = %e,
                    "Status watcher stopped"
                ),
            }

            let mut watches = lock(&registry);
            if watches.get(&key).is_some_and(|watch| watch.id == id) {
                watches.remove(&key);
            }
        });

        if let Some(previous) = watches.insert((talent_id.to_string(), step), Watch { id, handle }) {
            previous.handle.cancel();
        }
        drop(watches);
        tracing::debug!(talent_id, step = step.to_number(), "Status watcher started");
        Ok(())
    }

    /// Stop the watcher for a talent and step. Returns whether one was
    /// running.
    pub fn unwatch(&self, talent_id: &str, step: PayoutStep) -> bool {
        match lock(&self.watches).remove(&(talent_id.to_string(), step)) {
            Some(watch) => {
                let running = !watch.handle.is_finished();
                watch.handle.cancel();
                running
            }
            None => false,
        }
    }

    pub fn is_watching(&self, talent_id: &str, step: PayoutStep) -> bool {
        lock(&self.watches)
            .get(&(talent_id.to_string(), step))
            .is_some_and(|watch| !watch.handle.is_finished() && !watch.handle.is_cancelled())
    }

    /// Number of registered watchers. Finished watchers deregister
    /// themselves.
    pub fn active_count(&self) -> usize {
        lock(&self.watches).len()
    }

    /// Cancel every watcher and wait for them to stop.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = lock(&self.watches)
            .drain()
            .map(|(_, watch)| watch.handle)
            .collect();
        tracing::info!(count = handles.len(), "Stopping status watchers");
        for handle in &handles {
            handle.cancel();
        }
        for handle in handles {
            if let Err(e) = handle.join().await {
                tracing::error!(error = %e, "Status watcher task failed");
            }
        }
    }
}
