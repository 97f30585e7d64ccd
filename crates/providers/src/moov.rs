//! Payment accounts through Moov.

use async_trait::async_trait;
use chrono::Datelike;
use serde::Deserialize;

use payout_core::identity::IdentityProfile;
use payout_core::verification::CapabilityStatus;

use crate::error::ProviderError;
use crate::http;
use crate::traits::{AccountCapability, PaymentAccountProvider};

const PROVIDER: &str = "Moov";

/// The capability a talent's account needs to receive payouts.
const PAYOUT_CAPABILITY: &str = "send-funds";

/// Capabilities requested when the account is created.
const REQUESTED_CAPABILITIES: [&str; 2] = ["transfers", PAYOUT_CAPABILITY];

#[derive(Debug, Clone)]
pub struct MoovConfig {
    pub base_url: String,
    pub public_key: String,
    pub secret_key: String,
    /// Platform account id, sent as the partner on every request.
    pub account_id: String,
}

pub struct MoovClient {
    client: reqwest::Client,
    config: MoovConfig,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(rename = "accountID")]
    account_id: String,
}

#[derive(Debug, Deserialize)]
struct AccountDetails {
    #[serde(rename = "foreignID", default)]
    foreign_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CapabilityResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct BankAccountResponse {
    #[serde(rename = "bankAccountID")]
    bank_account_id: String,
}

impl MoovClient {
    pub fn new(config: MoovConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::build_client(PROVIDER)?,
            config,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, http::url(&self.config.base_url, path))
            .basic_auth(&self.config.public_key, Some(&self.config.secret_key))
            .header("x-account-id", &self.config.account_id)
    }
}

/// Build the individual-account request for a validated profile. The talent
/// id travels as `foreignID` so the account can be traced back to its owner.
fn account_request_body(talent_id: &str, profile: &IdentityProfile) -> serde_json::Value {
    let dob = profile.date_of_birth;
    let address = &profile.address;
    serde_json::json!({
        "accountType": "individual",
        "foreignID": talent_id,
        "profile": {
            "individual": {
                "name": {
                    "firstName": profile.first_name,
                    "lastName": profile.last_name,
                },
                "email": profile.email,
                "birthDate": {
                    "day": dob.day(),
                    "month": dob.month(),
                    "year": dob.year(),
                },
                "governmentID": {
                    "ssn": {
                        "full": profile.ssn_digits(),
                        "lastFour": profile.ssn_last4(),
                    }
                },
                "address": {
                    "addressLine1": address.address_line1,
                    "addressLine2": address.address_line2,
                    "city": address.city,
                    "stateOrProvince": address.state_or_province.to_ascii_uppercase(),
                    "postalCode": address.postal_code,
                    "country": "US",
                }
            }
        },
        "capabilities": REQUESTED_CAPABILITIES,
    })
}

#[async_trait]
impl PaymentAccountProvider for MoovClient {
    async fn create_account(
        &self,
        talent_id: &str,
        profile: &IdentityProfile,
    ) -> Result<String, ProviderError> {
        let request = self
            .request(reqwest::Method::POST, "/accounts")
            .json(&account_request_body(talent_id, profile));
        let response: AccountResponse = http::send_json(PROVIDER, request).await?;

        tracing::info!(talent_id, account_id = %response.account_id, "Moov account created");
        Ok(response.account_id)
    }

    async fn capability_status(
        &self,
        account_id: &str,
    ) -> Result<AccountCapability, ProviderError> {
        let account_id = http::path_segment(PROVIDER, account_id)?;

        let request = self.request(reqwest::Method::GET, &format!("/accounts/{account_id}"));
        let owner = match http::send_json::<AccountDetails>(PROVIDER, request).await {
            Ok(details) => details.foreign_id.filter(|id| !id.is_empty()),
            Err(ProviderError::Api { status: 404, .. }) => {
                return Ok(AccountCapability {
                    owner: None,
                    status: CapabilityStatus::Absent,
                });
            }
            Err(e) => return Err(e),
        };

        let request = self.request(
            reqwest::Method::GET,
            &format!("/accounts/{account_id}/capabilities/{PAYOUT_CAPABILITY}"),
        );
        let status = match http::send_json::<CapabilityResponse>(PROVIDER, request).await {
            Ok(response) => CapabilityStatus::parse(&response.status),
            Err(ProviderError::Api { status: 404, .. }) => CapabilityStatus::Absent,
            Err(e) => return Err(e),
        };
        Ok(AccountCapability { owner, status })
    }

    async fn attach_bank_account(
        &self,
        account_id: &str,
        processor_token: &str,
    ) -> Result<String, ProviderError> {
        let account_id = http::path_segment(PROVIDER, account_id)?;
        let body = serde_json::json!({
            "plaid": { "token": processor_token },
        });
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("/accounts/{account_id}/bank-accounts"),
            )
            .json(&body);
        let response: BankAccountResponse = http::send_json(PROVIDER, request).await?;

        tracing::info!(
            account_id,
            bank_account_id = %response.bank_account_id,
            "Bank account attached"
        );
        Ok(response.bank_account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use payout_core::identity::Address;

    fn profile() -> IdentityProfile {
        IdentityProfile {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            address: Address {
                address_line1: "1 Main St".into(),
                address_line2: None,
                city: "Springfield".into(),
                state_or_province: "il".into(),
                postal_code: "62704".into(),
            },
            ssn: "123-45-6789".into(),
        }
    }

    #[test]
    fn account_body_maps_profile() {
        let body = account_request_body("talent-7", &profile());
        let individual = &body["profile"]["individual"];
        assert_eq!(body["accountType"], "individual");
        assert_eq!(body["foreignID"], "talent-7");
        assert_eq!(individual["name"]["lastName"], "Lovelace");
        assert_eq!(individual["birthDate"]["month"], 12);
        assert_eq!(individual["governmentID"]["ssn"]["full"], "123456789");
        assert_eq!(individual["governmentID"]["ssn"]["lastFour"], "6789");
        assert_eq!(individual["address"]["stateOrProvince"], "IL");
        assert_eq!(body["capabilities"][1], PAYOUT_CAPABILITY);
    }

    #[test]
    fn parses_account_id() {
        let parsed: AccountResponse =
            serde_json::from_str(r#"{"accountID":"acct_1","mode":"sandbox"}"#).unwrap();
        assert_eq!(parsed.account_id, "acct_1");
    }

    #[test]
    fn parses_account_owner() {
        let parsed: AccountDetails =
            serde_json::from_str(r#"{"accountID":"acct_1","foreignID":"talent-7"}"#).unwrap();
        assert_eq!(parsed.foreign_id.as_deref(), Some("talent-7"));

        let untagged: AccountDetails = serde_json::from_str(r#"{"accountID":"acct_2"}"#).unwrap();
        assert_eq!(untagged.foreign_id, None);
    }

    #[test]
    fn parses_bank_account_id() {
        let parsed: BankAccountResponse =
            serde_json::from_str(r#"{"bankAccountID":"bank_1","status":"new"}"#).unwrap();
        assert_eq!(parsed.bank_account_id, "bank_1");
    }
}
