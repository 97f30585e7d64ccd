//! Payout onboarding steps and the step state machine.
//!
//! A talent moves through four externally-backed steps in a fixed order.
//! Progress is an integer cursor, `current_step`, pointing at the next
//! incomplete step: [`NOT_STARTED`] before the workflow begins and
//! [`COMPLETED_STEP`] once the terminal step is done.
//!
//! Everything here is pure. The functions decide what a transition should
//! write; [`crate::workflow::WorkflowController`] applies the decision
//! through a [`crate::workflow::ProgressStore`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{TalentId, Timestamp};

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// The four steps of payout onboarding, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStep {
    TaxInformation,
    IdentityVerification,
    PaymentAccount,
    BankLink,
}

/// Total number of steps in the workflow.
pub const TOTAL_STEPS: u8 = 4;

/// First step number (1-based).
pub const MIN_STEP: u8 = 1;

/// Last step number. Completing it completes the workflow.
pub const TERMINAL_STEP: u8 = 4;

/// Cursor value before `start_workflow`.
pub const NOT_STARTED: i32 = 0;

/// Cursor value after the terminal step has been completed.
pub const COMPLETED_STEP: i32 = TERMINAL_STEP as i32 + 1;

impl PayoutStep {
    /// All steps in workflow order.
    pub const ALL: [PayoutStep; TOTAL_STEPS as usize] = [
        Self::TaxInformation,
        Self::IdentityVerification,
        Self::PaymentAccount,
        Self::BankLink,
    ];

    /// Convert a 1-based step number to a `PayoutStep`.
    pub fn from_number(n: u8) -> Result<Self, CoreError> {
        match n {
            1 => Ok(Self::TaxInformation),
            2 => Ok(Self::IdentityVerification),
            3 => Ok(Self::PaymentAccount),
            4 => Ok(Self::BankLink),
            _ => Err(CoreError::Validation(format!(
                "Invalid step number {n}. Must be between {MIN_STEP} and {TERMINAL_STEP}"
            ))),
        }
    }

    /// Convert to a 1-based step number.
    pub fn to_number(self) -> u8 {
        match self {
            Self::TaxInformation => 1,
            Self::IdentityVerification => 2,
            Self::PaymentAccount => 3,
            Self::BankLink => 4,
        }
    }

    /// Human-readable label for the step.
    pub fn label(self) -> &'static str {
        match self {
            Self::TaxInformation => "Tax Information",
            Self::IdentityVerification => "Identity Verification",
            Self::PaymentAccount => "Payment Account",
            Self::BankLink => "Bank Account",
        }
    }

    /// The step that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::TaxInformation => Some(Self::IdentityVerification),
            Self::IdentityVerification => Some(Self::PaymentAccount),
            Self::PaymentAccount => Some(Self::BankLink),
            Self::BankLink => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::BankLink)
    }

    /// Steps whose completion is only known once the provider calls back
    /// or reports a final status; initiating them is never enough.
    pub fn awaits_external_confirmation(self) -> bool {
        matches!(self, Self::IdentityVerification | Self::BankLink)
    }

    /// Steps whose provider status can be watched by polling.
    pub fn is_pollable(self) -> bool {
        matches!(self, Self::TaxInformation | Self::IdentityVerification)
    }
}

// ---------------------------------------------------------------------------
// Workflow state
// ---------------------------------------------------------------------------

/// Where a talent currently is in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum WorkflowState {
    NotStarted,
    Step(PayoutStep),
    Completed,
}

impl WorkflowState {
    /// Derive the state from a persisted cursor and completion flag.
    pub fn from_cursor(current_step: i32, completed: bool) -> Self {
        if completed || current_step >= COMPLETED_STEP {
            return Self::Completed;
        }
        if current_step <= NOT_STARTED {
            return Self::NotStarted;
        }
        // 1..=TERMINAL_STEP by the checks above.
        match PayoutStep::from_number(current_step as u8) {
            Ok(step) => Self::Step(step),
            Err(_) => Self::NotStarted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Step(_) => "in_progress",
            Self::Completed => "completed",
        }
    }
}

// ---------------------------------------------------------------------------
// Progress record
// ---------------------------------------------------------------------------

/// A talent's persisted onboarding progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub talent_id: TalentId,
    /// Index of the next incomplete step (0 = not started).
    pub current_step: i32,
    pub completed: bool,
    /// External payment-account id, set by the payment-account step.
    pub moov_account_id: Option<String>,
    pub bank_account_linked: bool,
    pub completed_at: Option<Timestamp>,
}

impl OnboardingProgress {
    /// The default record for a talent that has never been read before.
    pub fn not_started(talent_id: impl Into<TalentId>) -> Self {
        Self {
            talent_id: talent_id.into(),
            current_step: NOT_STARTED,
            completed: false,
            moov_account_id: None,
            bank_account_linked: false,
            completed_at: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        WorkflowState::from_cursor(self.current_step, self.completed)
    }

    /// The step the talent is expected to work on next, if any.
    pub fn current(&self) -> Option<PayoutStep> {
        match self.state() {
            WorkflowState::Step(step) => Some(step),
            WorkflowState::NotStarted | WorkflowState::Completed => None,
        }
    }

    /// Whether `step` has already been confirmed. Completed steps stay
    /// viewable even though they cannot be completed again.
    pub fn is_step_done(&self, step: PayoutStep) -> bool {
        self.current_step > i32::from(step.to_number())
    }

    /// Apply a planned update in place.
    ///
    /// Fields only ever move forward: the account id is replaced, never
    /// cleared, and the completion flags are never reset.
    pub fn apply(&mut self, update: &ProgressUpdate) {
        self.current_step = update.next_step;
        if let Some(account_id) = &update.moov_account_id {
            self.moov_account_id = Some(account_id.clone());
        }
        self.completed |= update.completed;
        self.bank_account_linked |= update.bank_account_linked;
        if self.completed_at.is_none() {
            self.completed_at = update.completed_at;
        }
    }
}

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

/// The collaborator-confirmed result of a step, one variant per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepResult {
    TaxInformation { document_id: String },
    IdentityVerification { session_id: String },
    PaymentAccount { moov_account_id: String },
    BankLink { bank_account_id: String },
}

impl StepResult {
    /// The step this result belongs to.
    pub fn step(&self) -> PayoutStep {
        match self {
            Self::TaxInformation { .. } => PayoutStep::TaxInformation,
            Self::IdentityVerification { .. } => PayoutStep::IdentityVerification,
            Self::PaymentAccount { .. } => PayoutStep::PaymentAccount,
            Self::BankLink { .. } => PayoutStep::BankLink,
        }
    }

    /// The external reference carried by the result.
    pub fn reference(&self) -> &str {
        match self {
            Self::TaxInformation { document_id } => document_id,
            Self::IdentityVerification { session_id } => session_id,
            Self::PaymentAccount { moov_account_id } => moov_account_id,
            Self::BankLink { bank_account_id } => bank_account_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// The write a successful `complete_step` performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub step: PayoutStep,
    pub next_step: i32,
    /// `Some` replaces the stored account id.
    pub moov_account_id: Option<String>,
    pub completed: bool,
    pub bank_account_linked: bool,
    pub completed_at: Option<Timestamp>,
    /// Recorded in the append-only completion history.
    pub result: StepResult,
}

/// Why a completion was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    NotStarted,
    AlreadyCompleted,
    StepAlreadyDone { current_step: i32 },
    StepNotReached { current_step: i32 },
    /// The cursor moved between the read and the conditional write.
    Superseded,
}

impl IgnoreReason {
    pub fn describe(&self) -> String {
        match self {
            Self::NotStarted => "Onboarding has not been started".to_string(),
            Self::AlreadyCompleted => "Onboarding is already complete".to_string(),
            Self::StepAlreadyDone { current_step } => {
                format!("Step already completed; onboarding is at step {current_step}")
            }
            Self::StepNotReached { current_step } => {
                format!("Step not reached yet; onboarding is at step {current_step}")
            }
            Self::Superseded => "Progress changed while completing the step".to_string(),
        }
    }
}

/// Outcome of planning a step completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPlan {
    Apply(ProgressUpdate),
    Ignore(IgnoreReason),
}

/// Validate a cursor transition.
///
/// The cursor only ever moves forward by exactly one, from
/// [`NOT_STARTED`] up to [`COMPLETED_STEP`].
pub fn validate_step_transition(current: i32, next: i32) -> Result<(), CoreError> {
    if !(NOT_STARTED..COMPLETED_STEP).contains(&current) {
        return Err(CoreError::Validation(format!(
            "Current step {current} is out of range ({NOT_STARTED}..{TERMINAL_STEP})"
        )));
    }
    if next != current + 1 {
        return Err(CoreError::Validation(format!(
            "Cannot transition from step {current} to step {next}. \
             Progress only advances one step at a time."
        )));
    }
    Ok(())
}

/// Validate that a step result carries a usable reference.
pub fn validate_step_result(result: &StepResult) -> Result<(), CoreError> {
    if result.reference().trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Step {} ({}) result is missing its external reference",
            result.step().to_number(),
            result.step().label()
        )));
    }
    Ok(())
}

/// Decide what completing `step` with `result` should do to `progress`.
///
/// Out-of-order completions are ignored rather than rejected so that a
/// retried confirmation is harmless. A result for a different step than
/// `step` is a caller bug and is rejected.
pub fn plan_completion(
    progress: &OnboardingProgress,
    step: PayoutStep,
    result: StepResult,
    now: Timestamp,
) -> Result<CompletionPlan, CoreError> {
    if result.step() != step {
        return Err(CoreError::Validation(format!(
            "Result for step {} cannot complete step {}",
            result.step().to_number(),
            step.to_number()
        )));
    }
    validate_step_result(&result)?;

    match progress.state() {
        WorkflowState::NotStarted => return Ok(CompletionPlan::Ignore(IgnoreReason::NotStarted)),
        WorkflowState::Completed => {
            return Ok(CompletionPlan::Ignore(IgnoreReason::AlreadyCompleted))
        }
        WorkflowState::Step(_) => {}
    }

    let n = i32::from(step.to_number());
    let current_step = progress.current_step;
    if current_step > n {
        return Ok(CompletionPlan::Ignore(IgnoreReason::StepAlreadyDone {
            current_step,
        }));
    }
    if current_step < n {
        return Ok(CompletionPlan::Ignore(IgnoreReason::StepNotReached {
            current_step,
        }));
    }

    validate_step_transition(current_step, n + 1)?;

    let terminal = step.is_terminal();
    let moov_account_id = match &result {
        StepResult::PaymentAccount { moov_account_id } => Some(moov_account_id.clone()),
        _ => None,
    };

    Ok(CompletionPlan::Apply(ProgressUpdate {
        step,
        next_step: n + 1,
        moov_account_id,
        completed: terminal,
        bank_account_linked: terminal,
        completed_at: terminal.then_some(now),
        result,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn progress_at(step: i32) -> OnboardingProgress {
        OnboardingProgress {
            current_step: step,
            ..OnboardingProgress::not_started("t1")
        }
    }

    fn result_for(step: PayoutStep) -> StepResult {
        match step {
            PayoutStep::TaxInformation => StepResult::TaxInformation {
                document_id: "doc_1".into(),
            },
            PayoutStep::IdentityVerification => StepResult::IdentityVerification {
                session_id: "sess_1".into(),
            },
            PayoutStep::PaymentAccount => StepResult::PaymentAccount {
                moov_account_id: "acct_1".into(),
            },
            PayoutStep::BankLink => StepResult::BankLink {
                bank_account_id: "bank_1".into(),
            },
        }
    }

    // -- PayoutStep --

    #[test]
    fn step_from_number_valid() {
        assert_eq!(
            PayoutStep::from_number(1).unwrap(),
            PayoutStep::TaxInformation
        );
        assert_eq!(PayoutStep::from_number(4).unwrap(), PayoutStep::BankLink);
    }

    #[test]
    fn step_from_number_invalid() {
        assert!(PayoutStep::from_number(0).is_err());
        assert!(PayoutStep::from_number(5).is_err());
        assert!(PayoutStep::from_number(255).is_err());
    }

    #[test]
    fn step_numbers_follow_workflow_order() {
        for (i, step) in PayoutStep::ALL.iter().enumerate() {
            assert_eq!(step.to_number() as usize, i + 1);
            assert_eq!(PayoutStep::from_number(step.to_number()).unwrap(), *step);
        }
    }

    #[test]
    fn next_walks_the_sequence() {
        let mut step = PayoutStep::TaxInformation;
        let mut visited = vec![step];
        while let Some(next) = step.next() {
            visited.push(next);
            step = next;
        }
        assert_eq!(visited, PayoutStep::ALL.to_vec());
        assert!(step.is_terminal());
    }

    #[test]
    fn only_identity_and_bank_link_await_confirmation() {
        let awaiting: Vec<_> = PayoutStep::ALL
            .into_iter()
            .filter(|s| s.awaits_external_confirmation())
            .collect();
        assert_eq!(
            awaiting,
            vec![PayoutStep::IdentityVerification, PayoutStep::BankLink]
        );
    }

    // -- WorkflowState --

    #[test]
    fn state_from_cursor() {
        assert_eq!(WorkflowState::from_cursor(0, false), WorkflowState::NotStarted);
        assert_eq!(
            WorkflowState::from_cursor(1, false),
            WorkflowState::Step(PayoutStep::TaxInformation)
        );
        assert_eq!(
            WorkflowState::from_cursor(4, false),
            WorkflowState::Step(PayoutStep::BankLink)
        );
        assert_eq!(WorkflowState::from_cursor(5, true), WorkflowState::Completed);
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_value(WorkflowState::Step(PayoutStep::PaymentAccount)).unwrap();
        assert_eq!(json["state"], "step");
        assert_eq!(json["step"], "payment_account");
        let json = serde_json::to_value(WorkflowState::NotStarted).unwrap();
        assert_eq!(json["state"], "not_started");
    }

    // -- validate_step_transition --

    #[test]
    fn transition_forward_by_one_is_valid() {
        for current in NOT_STARTED..COMPLETED_STEP {
            assert!(validate_step_transition(current, current + 1).is_ok());
        }
    }

    #[test]
    fn transition_backward_is_invalid() {
        for current in 1..=COMPLETED_STEP - 1 {
            assert!(validate_step_transition(current, current - 1).is_err());
        }
    }

    #[test]
    fn transition_skip_or_stay_is_invalid() {
        assert!(validate_step_transition(1, 1).is_err());
        assert!(validate_step_transition(1, 3).is_err());
        assert!(validate_step_transition(0, 2).is_err());
    }

    #[test]
    fn transition_out_of_completed_is_invalid() {
        assert!(validate_step_transition(COMPLETED_STEP, COMPLETED_STEP + 1).is_err());
    }

    // -- plan_completion --

    #[test]
    fn completing_current_step_advances_by_one() {
        let plan = plan_completion(
            &progress_at(1),
            PayoutStep::TaxInformation,
            result_for(PayoutStep::TaxInformation),
            Utc::now(),
        )
        .unwrap();
        assert_matches!(plan, CompletionPlan::Apply(update) => {
            assert_eq!(update.next_step, 2);
            assert!(!update.completed);
            assert!(!update.bank_account_linked);
            assert!(update.moov_account_id.is_none());
        });
    }

    #[test]
    fn payment_account_step_carries_account_id() {
        let plan = plan_completion(
            &progress_at(3),
            PayoutStep::PaymentAccount,
            result_for(PayoutStep::PaymentAccount),
            Utc::now(),
        )
        .unwrap();
        assert_matches!(plan, CompletionPlan::Apply(update) => {
            assert_eq!(update.moov_account_id.as_deref(), Some("acct_1"));
        });
    }

    #[test]
    fn terminal_step_completes_workflow() {
        let now = Utc::now();
        let plan = plan_completion(
            &progress_at(4),
            PayoutStep::BankLink,
            result_for(PayoutStep::BankLink),
            now,
        )
        .unwrap();
        assert_matches!(plan, CompletionPlan::Apply(update) => {
            assert_eq!(update.next_step, COMPLETED_STEP);
            assert!(update.completed);
            assert!(update.bank_account_linked);
            assert_eq!(update.completed_at, Some(now));
        });
    }

    #[test]
    fn out_of_order_completion_is_ignored() {
        let plan = plan_completion(
            &progress_at(2),
            PayoutStep::PaymentAccount,
            result_for(PayoutStep::PaymentAccount),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(
            plan,
            CompletionPlan::Ignore(IgnoreReason::StepNotReached { current_step: 2 })
        );

        let plan = plan_completion(
            &progress_at(3),
            PayoutStep::TaxInformation,
            result_for(PayoutStep::TaxInformation),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(
            plan,
            CompletionPlan::Ignore(IgnoreReason::StepAlreadyDone { current_step: 3 })
        );
    }

    #[test]
    fn completion_before_start_is_ignored() {
        let plan = plan_completion(
            &progress_at(0),
            PayoutStep::TaxInformation,
            result_for(PayoutStep::TaxInformation),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan, CompletionPlan::Ignore(IgnoreReason::NotStarted));
    }

    #[test]
    fn completion_after_finish_is_ignored() {
        let mut progress = progress_at(COMPLETED_STEP);
        progress.completed = true;
        progress.bank_account_linked = true;
        let plan = plan_completion(
            &progress,
            PayoutStep::BankLink,
            result_for(PayoutStep::BankLink),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan, CompletionPlan::Ignore(IgnoreReason::AlreadyCompleted));
    }

    #[test]
    fn mismatched_result_is_rejected() {
        let err = plan_completion(
            &progress_at(1),
            PayoutStep::TaxInformation,
            result_for(PayoutStep::IdentityVerification),
            Utc::now(),
        )
        .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn blank_reference_is_rejected() {
        let err = plan_completion(
            &progress_at(3),
            PayoutStep::PaymentAccount,
            StepResult::PaymentAccount {
                moov_account_id: "  ".into(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    // -- OnboardingProgress::apply --

    #[test]
    fn apply_never_clears_account_id() {
        let mut progress = progress_at(4);
        progress.moov_account_id = Some("acct_1".into());
        let update = ProgressUpdate {
            step: PayoutStep::BankLink,
            next_step: COMPLETED_STEP,
            moov_account_id: None,
            completed: true,
            bank_account_linked: true,
            completed_at: Some(Utc::now()),
            result: result_for(PayoutStep::BankLink),
        };
        progress.apply(&update);
        assert_eq!(progress.moov_account_id.as_deref(), Some("acct_1"));
        assert!(progress.completed);
        assert!(progress.bank_account_linked);
        assert_eq!(progress.state(), WorkflowState::Completed);
    }

    #[test]
    fn step_result_roundtrips_through_json() {
        let result = result_for(PayoutStep::IdentityVerification);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["step"], "identity_verification");
        assert_eq!(json["session_id"], "sess_1");
        let back: StepResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
