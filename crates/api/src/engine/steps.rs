//! Step engine: runs each onboarding step against its collaborator.
//!
//! The engine is the only caller of [`WorkflowController::complete_step`]
//! outside tests. A step is completed only after its collaborator has
//! confirmed it: synchronously for payment-account creation, and through a
//! status read (client confirm, poll, or webhook) for everything else.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use payout_core::error::CoreError;
use payout_core::identity::IdentityProfile;
use payout_core::onboarding::{
    IgnoreReason, OnboardingProgress, PayoutStep, StepResult, WorkflowState,
};
use payout_core::types::Timestamp;
use payout_core::verification::{
    CapabilityStatus, StatusVerdict, TaxDocumentStatus, VerificationStatus,
};
use payout_core::workflow::{StepOutcome, WorkflowController};
use payout_providers::{
    AccountCapability, BankLinkProvider, IdentityDecision, IdentityProvider, PaymentAccountProvider, TaxDocument,
    TaxFormProvider,
};

/// The collaborators behind the four steps.
#[derive(Clone)]
pub struct Collaborators {
    pub tax_forms: Arc<dyn TaxFormProvider>,
    pub identity: Arc<dyn IdentityProvider>,
    pub payments: Arc<dyn PaymentAccountProvider>,
    pub bank_link: Arc<dyn BankLinkProvider>,
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Request body for initiating a step. Only the payment-account step takes
/// input.
#[derive(Debug, Default, Deserialize)]
pub struct InitiateInput {
    #[serde(default)]
    pub profile: Option<IdentityProfile>,
}

/// Request body for confirming a step. Each step reads the fields it needs.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmInput {
    /// Tax information: the signed document.
    #[serde(default)]
    pub document_id: Option<String>,
    /// Identity verification: the KYC session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Payment account: re-check an account created earlier.
    #[serde(default)]
    pub moov_account_id: Option<String>,
    /// Bank link: the token returned by the bank-link widget.
    #[serde(default)]
    pub public_token: Option<String>,
    /// Bank link: the account the talent picked in the widget.
    #[serde(default)]
    pub selected_account_id: Option<String>,
}

/// What initiating a step produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepInitiation {
    TaxInformation {
        document_id: String,
        status: TaxDocumentStatus,
        signing_url: Option<String>,
    },
    IdentityVerification {
        session_id: String,
        verification_url: String,
        status: VerificationStatus,
    },
    /// Account creation is synchronous, so the step is already completed.
    PaymentAccount {
        moov_account_id: String,
        outcome: StepOutcome,
    },
    BankLink {
        link_token: String,
        expiration: Option<Timestamp>,
    },
}

/// Read-only collaborator status of a step.
#[derive(Debug, Clone, Serialize)]
pub struct StepStatus {
    pub step: PayoutStep,
    pub status: String,
    pub verdict: StatusVerdict,
    /// Whether the workflow has already recorded the step.
    pub recorded: bool,
}

/// How a collaborator verdict was applied to the workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Settlement {
    /// The collaborator confirmed the step and `complete_step` ran.
    Completed { outcome: StepOutcome },
    /// Nothing final yet.
    Pending { status: String },
    /// The collaborator refused; the step has to be initiated again.
    Refused { message: String },
}

impl Settlement {
    /// Turn a non-completion into the error an interactive caller sees.
    pub fn into_outcome(self, step: PayoutStep) -> Result<StepOutcome, CoreError> {
        match self {
            Settlement::Completed { outcome } => Ok(outcome),
            Settlement::Pending { status } => Err(CoreError::Conflict(format!(
                "{} is still pending (status: {status})",
                step.label()
            ))),
            Settlement::Refused { message } => Err(CoreError::Rejected {
                provider: provider_name(step),
                message,
            }),
        }
    }
}

pub(crate) fn provider_name(step: PayoutStep) -> &'static str {
    match step {
        PayoutStep::TaxInformation => "E-sign",
        PayoutStep::IdentityVerification => "Veriff",
        PayoutStep::PaymentAccount => "Moov",
        PayoutStep::BankLink => "Plaid",
    }
}

fn required_field<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, CoreError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::Validation(format!("{name} is required")))
}

/// Fail unless `step` is the step the talent is on.
pub(crate) fn require_current(progress: &OnboardingProgress, step: PayoutStep) -> Result<(), CoreError> {
    match progress.state() {
        WorkflowState::NotStarted => Err(CoreError::Conflict(
            "Onboarding has not been started".to_string(),
        )),
        WorkflowState::Completed => Err(CoreError::Conflict(
            "Onboarding is already complete".to_string(),
        )),
        WorkflowState::Step(current) if current == step => Ok(()),
        WorkflowState::Step(current) => Err(CoreError::Conflict(format!(
            "Step {} ({}) is not the current step; onboarding is at step {} ({})",
            step.to_number(),
            step.label(),
            current.to_number(),
            current.label()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct StepEngine {
    controller: WorkflowController,
    providers: Collaborators,
}

impl StepEngine {
    pub fn new(controller: WorkflowController, providers: Collaborators) -> Self {
        Self {
            controller,
            providers,
        }
    }

    /// Start the external part of `step` for the talent.
    pub async fn initiate(
        &self,
        talent_id: &str,
        step: PayoutStep,
        input: InitiateInput,
    ) -> Result<StepInitiation, CoreError> {
        let progress = self.controller.load_progress(talent_id).await?;
        require_current(&progress, step)?;

        let initiation = match step {
            PayoutStep::TaxInformation => {
                let doc = self.providers.tax_forms.get_or_create_document(talent_id).await?;
                StepInitiation::TaxInformation {
                    document_id: doc.id,
                    status: doc.status,
                    signing_url: doc.signing_url,
                }
            }
            PayoutStep::IdentityVerification => {
                let session = self.providers.identity.create_session(talent_id).await?;
                StepInitiation::IdentityVerification {
                    session_id: session.id,
                    verification_url: session.url,
                    status: session.status,
                }
            }
            PayoutStep::PaymentAccount => {
                let profile = input.profile.ok_or_else(|| {
                    CoreError::Validation("Identity details are required".to_string())
                })?;
                profile.check(chrono::Utc::now().date_naive())?;

                let moov_account_id = self
                    .providers
                    .payments
                    .create_account(talent_id, &profile)
                    .await?;
                let outcome = self
                    .controller
                    .complete_step(
                        talent_id,
                        step,
                        StepResult::PaymentAccount {
                            moov_account_id: moov_account_id.clone(),
                        },
                    )
                    .await?;
                StepInitiation::PaymentAccount {
                    moov_account_id,
                    outcome,
                }
            }
            PayoutStep::BankLink => {
                let account_id = progress.moov_account_id.as_deref().ok_or_else(|| {
                    CoreError::Conflict(
                        "A payment account is required before linking a bank".to_string(),
                    )
                })?;
                let token = self.providers.bank_link.create_link_token(account_id).await?;
                StepInitiation::BankLink {
                    link_token: token.link_token,
                    expiration: token.expiration,
                }
            }
        };

        tracing::info!(talent_id, step = step.to_number(), "Step initiated");
        Ok(initiation)
    }

    /// Confirm `step` with its collaborator and record it.
    ///
    /// Confirming a step that is already recorded is a no-op that reports
    /// the current progress, so a client retry never calls the
    /// collaborator twice.
    pub async fn confirm(
        &self,
        talent_id: &str,
        step: PayoutStep,
        input: ConfirmInput,
    ) -> Result<StepOutcome, CoreError> {
        let progress = self.controller.load_progress(talent_id).await?;
        if progress.is_step_done(step) {
            let reason = if progress.completed {
                IgnoreReason::AlreadyCompleted
            } else {
                IgnoreReason::StepAlreadyDone {
                    current_step: progress.current_step,
                }
            };
            return Ok(StepOutcome::Ignored { progress, reason });
        }
        require_current(&progress, step)?;

        match step {
            PayoutStep::TaxInformation => {
                let document_id = required_field(&input.document_id, "document_id")?;
                let doc = self.providers.tax_forms.document(document_id).await?;
                self.settle_tax_document(talent_id, &doc)
                    .await?
                    .into_outcome(step)
            }
            PayoutStep::IdentityVerification => {
                let session_id = required_field(&input.session_id, "session_id")?;
                let decision = self.providers.identity.decision(session_id).await?;
                self.settle_identity_decision(talent_id, &decision)
                    .await?
                    .into_outcome(step)
            }
            PayoutStep::PaymentAccount => {
                let account_id = required_field(&input.moov_account_id, "moov_account_id")?;
                let account = self.providers.payments.capability_status(account_id).await?;
                ensure_account_owner(talent_id, &account)?;
                match account.status.verdict() {
                    StatusVerdict::Confirmed => {
                        self.controller
                            .complete_step(
                                talent_id,
                                step,
                                StepResult::PaymentAccount {
                                    moov_account_id: account_id.to_string(),
                                },
                            )
                            .await
                    }
                    StatusVerdict::Pending | StatusVerdict::Refused => Err(CoreError::Rejected {
                        provider: provider_name(step),
                        message: "The payment account cannot receive payouts. Please submit your details again."
                            .to_string(),
                    }),
                }
            }
            PayoutStep::BankLink => {
                let public_token = required_field(&input.public_token, "public_token")?;
                let account_id = progress.moov_account_id.as_deref().ok_or_else(|| {
                    CoreError::Conflict(
                        "A payment account is required before linking a bank".to_string(),
                    )
                })?;

                let item = self
                    .providers
                    .bank_link
                    .exchange_public_token(public_token, input.selected_account_id.as_deref())
                    .await?;
                let processor_token = self.providers.bank_link.processor_token(&item).await?;
                let bank_account_id = self
                    .providers
                    .payments
                    .attach_bank_account(account_id, &processor_token)
                    .await?;

                self.controller
                    .complete_step(talent_id, step, StepResult::BankLink { bank_account_id })
                    .await
            }
        }
    }

    /// Read the collaborator's view of a step without changing anything.
    pub async fn status(
        &self,
        talent_id: &str,
        step: PayoutStep,
        reference: Option<String>,
    ) -> Result<StepStatus, CoreError> {
        let progress = self.controller.load_progress(talent_id).await?;
        let recorded = progress.is_step_done(step);

        let (status, verdict) = match step {
            PayoutStep::TaxInformation => {
                let document_id = required_field(&reference, "reference")?;
                let doc = self.providers.tax_forms.document(document_id).await?;
                ensure_owner(talent_id, &doc.external_id)?;
                (doc.status.as_str().to_string(), doc.status.verdict())
            }
            PayoutStep::IdentityVerification => {
                let session_id = required_field(&reference, "reference")?;
                let decision = self.providers.identity.decision(session_id).await?;
                if let Some(owner) = &decision.vendor_data {
                    ensure_owner(talent_id, owner)?;
                }
                (decision.status.as_str().to_string(), decision.status.verdict())
            }
            PayoutStep::PaymentAccount => {
                let account_id = reference
                    .or_else(|| progress.moov_account_id.clone())
                    .ok_or_else(|| {
                        CoreError::Validation(
                            "reference is required until an account exists".to_string(),
                        )
                    })?;
                let account = self.providers.payments.capability_status(&account_id).await?;
                ensure_account_owner(talent_id, &account)?;
                (account.status.as_str().to_string(), account.status.verdict())
            }
            PayoutStep::BankLink => {
                if progress.bank_account_linked {
                    ("linked".to_string(), StatusVerdict::Confirmed)
                } else {
                    ("not_linked".to_string(), StatusVerdict::Pending)
                }
            }
        };

        tracing::debug!(talent_id, step = step.to_number(), status = %status, "Step status read");
        Ok(StepStatus {
            step,
            status,
            verdict,
            recorded,
        })
    }

    /// One status read for a background watcher.
    pub async fn probe(
        &self,
        talent_id: &str,
        step: PayoutStep,
        reference: &str,
    ) -> Result<Settlement, CoreError> {
        match step {
            PayoutStep::TaxInformation => {
                let doc = self.providers.tax_forms.document(reference).await?;
                self.settle_tax_document(talent_id, &doc).await
            }
            PayoutStep::IdentityVerification => {
                let decision = self.providers.identity.decision(reference).await?;
                self.settle_identity_decision(talent_id, &decision).await
            }
            PayoutStep::PaymentAccount | PayoutStep::BankLink => Err(CoreError::Validation(
                format!("Step {} cannot be watched", step.to_number()),
            )),
        }
    }

    /// Apply a tax document's status to the workflow.
    pub async fn settle_tax_document(
        &self,
        talent_id: &str,
        doc: &TaxDocument,
    ) -> Result<Settlement, CoreError> {
        ensure_owner(talent_id, &doc.external_id)?;
        match doc.status.verdict() {
            StatusVerdict::Confirmed => {
                let outcome = self
                    .controller
                    .complete_step(
                        talent_id,
                        PayoutStep::TaxInformation,
                        StepResult::TaxInformation {
                            document_id: doc.id.clone(),
                        },
                    )
                    .await?;
                Ok(Settlement::Completed { outcome })
            }
            StatusVerdict::Pending => Ok(Settlement::Pending {
                status: doc.status.as_str().to_string(),
            }),
            StatusVerdict::Refused => {
                tracing::info!(talent_id, document_id = %doc.id, status = doc.status.as_str(), "Tax form refused");
                Ok(Settlement::Refused {
                    message: "The tax form was declined or expired. Please start it again."
                        .to_string(),
                })
            }
        }
    }

    /// Apply an identity decision to the workflow.
    pub async fn settle_identity_decision(
        &self,
        talent_id: &str,
        decision: &IdentityDecision,
    ) -> Result<Settlement, CoreError> {
        if let Some(owner) = &decision.vendor_data {
            ensure_owner(talent_id, owner)?;
        }
        match decision.status.verdict() {
            StatusVerdict::Confirmed => {
                let outcome = self
                    .controller
                    .complete_step(
                        talent_id,
                        PayoutStep::IdentityVerification,
                        StepResult::IdentityVerification {
                            session_id: decision.session_id.clone(),
                        },
                    )
                    .await?;
                Ok(Settlement::Completed { outcome })
            }
            StatusVerdict::Pending => Ok(Settlement::Pending {
                status: decision.status.as_str().to_string(),
            }),
            StatusVerdict::Refused => {
                tracing::info!(
                    talent_id,
                    session_id = %decision.session_id,
                    status = decision.status.as_str(),
                    reason = decision.reason.as_deref().unwrap_or(""),
                    "Identity verification refused"
                );
                Ok(Settlement::Refused {
                    message: decision.status.refusal_message().to_string(),
                })
            }
        }
    }
}

fn ensure_owner(talent_id: &str, owner: &str) -> Result<(), CoreError> {
    if owner != talent_id {
        return Err(CoreError::Forbidden(
            "The referenced resource belongs to another talent".to_string(),
        ));
    }
    Ok(())
}

/// A payment account must carry the talent's id. A missing account is left
/// to the capability verdict; an existing account without an owner is never
/// accepted.
fn ensure_account_owner(talent_id: &str, account: &AccountCapability) -> Result<(), CoreError> {
    match (&account.owner, account.status) {
        (Some(owner), _) => ensure_owner(talent_id, owner),
        (None, CapabilityStatus::Absent) => Ok(()),
        (None, _) => Err(CoreError::Forbidden(
            "The payment account is not linked to this talent".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn progress_at(step: i32) -> OnboardingProgress {
        OnboardingProgress {
            current_step: step,
            ..OnboardingProgress::not_started("t1")
        }
    }

    #[test]
    fn require_current_accepts_only_the_current_step() {
        assert!(require_current(&progress_at(2), PayoutStep::IdentityVerification).is_ok());
        assert_matches!(
            require_current(&progress_at(2), PayoutStep::BankLink),
            Err(CoreError::Conflict(msg)) if msg.contains("step 2")
        );
        assert_matches!(
            require_current(&progress_at(0), PayoutStep::TaxInformation),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn account_owner_must_match_the_talent() {
        let account = |owner: Option<&str>, status| AccountCapability {
            owner: owner.map(str::to_string),
            status,
        };
        assert!(ensure_account_owner("t1", &account(Some("t1"), CapabilityStatus::Enabled)).is_ok());
        assert_matches!(
            ensure_account_owner("t1", &account(Some("t2"), CapabilityStatus::Enabled)),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            ensure_account_owner("t1", &account(None, CapabilityStatus::Pending)),
            Err(CoreError::Forbidden(_))
        );
        assert!(ensure_account_owner("t1", &account(None, CapabilityStatus::Absent)).is_ok());
    }

    #[test]
    fn blank_fields_are_missing() {
        assert_matches!(
            required_field(&Some("  ".into()), "session_id"),
            Err(CoreError::Validation(msg)) if msg == "session_id is required"
        );
        assert_eq!(required_field(&Some(" s1 ".into()), "x").unwrap(), "s1");
    }

    #[test]
    fn settlement_maps_to_interactive_errors() {
        let pending = Settlement::Pending {
            status: "submitted".into(),
        };
        assert_matches!(
            pending.into_outcome(PayoutStep::IdentityVerification),
            Err(CoreError::Conflict(msg)) if msg.contains("still pending")
        );

        let refused = Settlement::Refused {
            message: "declined".into(),
        };
        assert_matches!(
            refused.into_outcome(PayoutStep::IdentityVerification),
            Err(CoreError::Rejected { provider: "Veriff", .. })
        );
    }
}
