//! Bank linking through Plaid.
//!
//! The access token obtained from the public-token exchange is used only to
//! mint a processor token for the payment provider. It is never persisted.

use async_trait::async_trait;
use serde::Deserialize;

use payout_core::types::Timestamp;

use crate::error::ProviderError;
use crate::http;
use crate::traits::{BankLinkProvider, LinkToken, LinkedItem};

const PROVIDER: &str = "Plaid";

/// Processor name registered for the payment provider integration.
const PROCESSOR: &str = "moov";

#[derive(Debug, Clone)]
pub struct PlaidConfig {
    pub base_url: String,
    pub client_id: String,
    pub secret: String,
    /// Shown in the Link widget.
    pub client_name: String,
}

pub struct PlaidClient {
    client: reqwest::Client,
    config: PlaidConfig,
}

#[derive(Debug, Deserialize)]
struct LinkTokenResponse {
    link_token: String,
    #[serde(default)]
    expiration: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<PlaidAccount>,
}

#[derive(Debug, Deserialize)]
struct PlaidAccount {
    account_id: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ProcessorTokenResponse {
    processor_token: String,
}

impl PlaidClient {
    pub fn new(config: PlaidConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::build_client(PROVIDER)?,
            config,
        })
    }

    /// Merge the credentials every Plaid endpoint expects into `body`.
    fn authed(&self, mut body: serde_json::Value) -> serde_json::Value {
        body["client_id"] = serde_json::Value::String(self.config.client_id.clone());
        body["secret"] = serde_json::Value::String(self.config.secret.clone());
        body
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let request = self
            .client
            .post(http::url(&self.config.base_url, path))
            .json(&self.authed(body));
        http::send_json(PROVIDER, request).await
    }

    fn link_token_body(&self, client_user_id: &str) -> serde_json::Value {
        serde_json::json!({
            "client_name": self.config.client_name,
            "user": { "client_user_id": client_user_id },
            "products": ["auth"],
            "country_codes": ["US"],
            "language": "en",
        })
    }
}

/// Pick the account to link: the talent's choice when it belongs to the
/// item, otherwise the first depository account.
fn select_account(accounts: &[PlaidAccount], wanted: Option<&str>) -> Result<String, ProviderError> {
    if let Some(wanted) = wanted {
        return accounts
            .iter()
            .find(|a| a.account_id == wanted)
            .map(|a| a.account_id.clone())
            .ok_or_else(|| ProviderError::Rejected {
                provider: PROVIDER,
                message: "The selected bank account is not part of the linked login".to_string(),
            });
    }
    accounts
        .iter()
        .find(|a| a.kind == "depository")
        .map(|a| a.account_id.clone())
        .ok_or_else(|| ProviderError::Rejected {
            provider: PROVIDER,
            message: "The linked login has no checking or savings account".to_string(),
        })
}

#[async_trait]
impl BankLinkProvider for PlaidClient {
    async fn create_link_token(&self, account_id: &str) -> Result<LinkToken, ProviderError> {
        let response: LinkTokenResponse = self
            .post("/link/token/create", self.link_token_body(account_id))
            .await?;
        Ok(LinkToken {
            link_token: response.link_token,
            expiration: response.expiration,
        })
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
        account_id: Option<&str>,
    ) -> Result<LinkedItem, ProviderError> {
        let exchange: ExchangeResponse = self
            .post(
                "/item/public_token/exchange",
                serde_json::json!({ "public_token": public_token }),
            )
            .await?;

        let accounts: AccountsResponse = self
            .post(
                "/accounts/get",
                serde_json::json!({ "access_token": exchange.access_token }),
            )
            .await?;
        let account_id = select_account(&accounts.accounts, account_id)?;

        tracing::info!(item_id = %exchange.item_id, "Plaid public token exchanged");
        Ok(LinkedItem {
            item_id: exchange.item_id,
            access_token: exchange.access_token,
            account_id,
        })
    }

    async fn processor_token(&self, item: &LinkedItem) -> Result<String, ProviderError> {
        let response: ProcessorTokenResponse = self
            .post(
                "/processor/token/create",
                serde_json::json!({
                    "access_token": item.access_token,
                    "account_id": item.account_id,
                    "processor": PROCESSOR,
                }),
            )
            .await?;
        Ok(response.processor_token)
    }
}
