//! External collaborators for payout onboarding.
//!
//! Each step of the workflow is backed by a third-party service. The
//! [`traits`] module defines the seams the step engine depends on; the
//! remaining modules are the production HTTP clients behind them.

pub mod error;
pub mod esign;
mod http;
pub mod moov;
pub mod plaid;
pub mod traits;
pub mod veriff;

pub use error::ProviderError;
pub use esign::{ESignClient, ESignConfig};
pub use moov::{MoovClient, MoovConfig};
pub use plaid::{PlaidClient, PlaidConfig};
pub use traits::{
    AccountCapability, BankLinkProvider, IdentityDecision, IdentityProvider, IdentitySession, LinkToken, LinkedItem,
    PaymentAccountProvider, TaxDocument, TaxFormProvider,
};
pub use veriff::{VeriffClient, VeriffConfig};
