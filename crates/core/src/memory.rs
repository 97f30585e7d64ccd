//! In-process [`ProgressStore`] used by tests and local development.
//!
//! Mirrors the Postgres store's contract: talents must be registered before
//! their progress can be read, writes are conditional on the cursor, and the
//! completion history is append-only.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::CoreError;
use crate::onboarding::{validate_step_transition, OnboardingProgress, ProgressUpdate, NOT_STARTED};
use crate::types::TalentId;
use crate::workflow::{ProgressStore, StepRecord};

#[derive(Default)]
struct Inner {
    talents: HashSet<TalentId>,
    progress: HashMap<TalentId, OnboardingProgress>,
    history: HashMap<TalentId, Vec<StepRecord>>,
    /// Talents whose cursor is bumped right after the next read.
    bump_after_read: HashSet<TalentId>,
}

#[derive(Default)]
pub struct MemoryProgressStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given talents registered.
    pub fn with_talents<I, S>(talents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TalentId>,
    {
        let store = Self::new();
        {
            let mut inner = store.lock();
            inner.talents.extend(talents.into_iter().map(Into::into));
        }
        store
    }

    pub fn register_talent(&self, talent_id: impl Into<TalentId>) {
        self.lock().talents.insert(talent_id.into());
    }

    /// Make every subsequent call fail with a persistence error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Simulate a concurrent writer: the next read of `talent_id` returns
    /// the current record, then the stored cursor moves one step on.
    pub fn advance_behind_next_read(&self, talent_id: &str) {
        self.lock().bump_after_read.insert(talent_id.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), CoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::Persistence(
                "progress store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load_or_init(
        &self,
        talent_id: &str,
    ) -> Result<Option<OnboardingProgress>, CoreError> {
        self.check_available()?;
        let mut inner = self.lock();
        if !inner.talents.contains(talent_id) {
            return Ok(None);
        }

        let snapshot = inner
            .progress
            .entry(talent_id.to_string())
            .or_insert_with(|| OnboardingProgress::not_started(talent_id))
            .clone();

        if inner.bump_after_read.remove(talent_id) {
            if let Some(record) = inner.progress.get_mut(talent_id) {
                record.current_step += 1;
            }
        }

        Ok(Some(snapshot))
    }

    async fn start(&self, talent_id: &str) -> Result<Option<OnboardingProgress>, CoreError> {
        self.check_available()?;
        let mut inner = self.lock();
        let Some(record) = inner.progress.get_mut(talent_id) else {
            return Ok(None);
        };
        if record.current_step != NOT_STARTED {
            return Ok(None);
        }
        record.current_step = NOT_STARTED + 1;
        Ok(Some(record.clone()))
    }

    async fn advance(
        &self,
        talent_id: &str,
        expected_step: i32,
        update: &ProgressUpdate,
    ) -> Result<Option<OnboardingProgress>, CoreError> {
        self.check_available()?;
        validate_step_transition(expected_step, update.next_step)?;

        let mut inner = self.lock();
        let Some(record) = inner.progress.get_mut(talent_id) else {
            return Ok(None);
        };
        if record.current_step != expected_step {
            return Ok(None);
        }
        record.apply(update);
        let updated = record.clone();

        inner
            .history
            .entry(talent_id.to_string())
            .or_default()
            .push(StepRecord {
                step: update.step,
                result: update.result.clone(),
                completed_at: chrono::Utc::now(),
            });

        Ok(Some(updated))
    }

    async fn history(&self, talent_id: &str) -> Result<Vec<StepRecord>, CoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .history
            .get(talent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), CoreError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::{PayoutStep, StepResult};

    fn tax_update() -> ProgressUpdate {
        ProgressUpdate {
            step: PayoutStep::TaxInformation,
            next_step: 2,
            moov_account_id: None,
            completed: false,
            bank_account_linked: false,
            completed_at: None,
            result: StepResult::TaxInformation {
                document_id: "doc_1".into(),
            },
        }
    }

    #[tokio::test]
    async fn unregistered_talent_reads_none() {
        let store = MemoryProgressStore::new();
        assert!(store.load_or_init("t1").await.unwrap().is_none());
        store.register_talent("t1");
        assert!(store.load_or_init("t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn start_only_moves_from_zero() {
        let store = MemoryProgressStore::with_talents(["t1"]);
        store.load_or_init("t1").await.unwrap();
        assert_eq!(store.start("t1").await.unwrap().unwrap().current_step, 1);
        assert!(store.start("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn advance_requires_expected_cursor() {
        let store = MemoryProgressStore::with_talents(["t1"]);
        store.load_or_init("t1").await.unwrap();
        store.start("t1").await.unwrap();

        assert!(store.advance("t1", 1, &tax_update()).await.unwrap().is_some());
        // Same write again: the cursor is now 2, so the precondition fails.
        let mut replay = tax_update();
        replay.next_step = 2;
        assert!(store.advance("t1", 1, &replay).await.unwrap().is_none());
        assert_eq!(store.history("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn advance_rejects_skipping_writes() {
        let store = MemoryProgressStore::with_talents(["t1"]);
        store.load_or_init("t1").await.unwrap();
        store.start("t1").await.unwrap();

        let mut skip = tax_update();
        skip.next_step = 3;
        assert!(store.advance("t1", 1, &skip).await.is_err());
    }
}
