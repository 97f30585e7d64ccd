//! Collaborator seams used by the step engine.
//!
//! Every trait is object safe so the API can hold `Arc<dyn …>` and tests can
//! substitute in-memory fakes.

use async_trait::async_trait;
use serde::Serialize;

use payout_core::identity::IdentityProfile;
use payout_core::types::Timestamp;
use payout_core::verification::{CapabilityStatus, TaxDocumentStatus, VerificationStatus};

use crate::error::ProviderError;

// ---------------------------------------------------------------------------
// Tax forms
// ---------------------------------------------------------------------------

/// An e-sign tax document for one talent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxDocument {
    pub id: String,
    /// The talent id the document was created for.
    pub external_id: String,
    pub status: TaxDocumentStatus,
    /// Present while the document still needs a signature.
    pub signing_url: Option<String>,
}

#[async_trait]
pub trait TaxFormProvider: Send + Sync {
    /// Return the talent's open tax document, creating one if none exists.
    async fn get_or_create_document(&self, talent_id: &str) -> Result<TaxDocument, ProviderError>;

    async fn document(&self, document_id: &str) -> Result<TaxDocument, ProviderError>;
}

// ---------------------------------------------------------------------------
// Identity verification
// ---------------------------------------------------------------------------

/// A KYC session the talent completes in the provider's hosted flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySession {
    pub id: String,
    pub url: String,
    pub status: VerificationStatus,
}

/// The provider's current verdict on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityDecision {
    pub session_id: String,
    pub status: VerificationStatus,
    pub reason: Option<String>,
    /// The talent id echoed back from session creation.
    pub vendor_data: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_session(&self, talent_id: &str) -> Result<IdentitySession, ProviderError>;

    /// Current decision for a session. Sessions without a decision yet
    /// report a non-terminal status.
    async fn decision(&self, session_id: &str) -> Result<IdentityDecision, ProviderError>;
}

// ---------------------------------------------------------------------------
// Payment accounts
// ---------------------------------------------------------------------------

/// The payout capability of a payment account and the talent it was
/// created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountCapability {
    /// The talent id stored on the account at creation. `None` when the
    /// account does not exist or carries no talent reference.
    pub owner: Option<String>,
    pub status: CapabilityStatus,
}

#[async_trait]
pub trait PaymentAccountProvider: Send + Sync {
    /// Create an individual payment account tagged with `talent_id`.
    /// Returns the account id.
    async fn create_account(
        &self,
        talent_id: &str,
        profile: &IdentityProfile,
    ) -> Result<String, ProviderError>;

    async fn capability_status(&self, account_id: &str)
        -> Result<AccountCapability, ProviderError>;

    /// Attach a bank account using a processor token. Returns the bank
    /// account id.
    async fn attach_bank_account(
        &self,
        account_id: &str,
        processor_token: &str,
    ) -> Result<String, ProviderError>;
}

// ---------------------------------------------------------------------------
// Bank linking
// ---------------------------------------------------------------------------

/// A short-lived token that opens the bank-link widget on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: Option<Timestamp>,
}

/// A linked bank login and the account selected in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedItem {
    pub item_id: String,
    pub access_token: String,
    pub account_id: String,
}

#[async_trait]
pub trait BankLinkProvider: Send + Sync {
    /// Issue a link token for a payment account. The account id is the
    /// provider's stable user reference.
    async fn create_link_token(&self, account_id: &str) -> Result<LinkToken, ProviderError>;

    /// Exchange the public token returned by the widget. `account_id` is
    /// the account the talent picked; when absent the first depository
    /// account of the item is used.
    async fn exchange_public_token(
        &self,
        public_token: &str,
        account_id: Option<&str>,
    ) -> Result<LinkedItem, ProviderError>;

    /// Create a processor token that lets the payment provider pull the
    /// account's details.
    async fn processor_token(&self, item: &LinkedItem) -> Result<String, ProviderError>;
}
