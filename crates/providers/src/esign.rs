//! Tax forms through a REST e-signature service.
//!
//! Documents are created from a fixed W-9 template and tagged with the
//! talent id as `external_id`, so repeated initiation finds the open
//! document instead of sending a second one.

use async_trait::async_trait;
use serde::Deserialize;

use payout_core::verification::TaxDocumentStatus;

use crate::error::ProviderError;
use crate::http;
use crate::traits::{TaxDocument, TaxFormProvider};

const PROVIDER: &str = "E-sign";

#[derive(Debug, Clone)]
pub struct ESignConfig {
    pub base_url: String,
    pub api_key: String,
    pub template_id: String,
}

pub struct ESignClient {
    client: reqwest::Client,
    config: ESignConfig,
}

#[derive(Debug, Deserialize)]
struct DocumentBody {
    id: String,
    external_id: String,
    status: String,
    #[serde(default)]
    signing_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    data: Vec<DocumentBody>,
}

impl TryFrom<DocumentBody> for TaxDocument {
    type Error = ProviderError;

    fn try_from(body: DocumentBody) -> Result<Self, Self::Error> {
        let status = TaxDocumentStatus::parse(&body.status)
            .map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;
        Ok(TaxDocument {
            id: body.id,
            external_id: body.external_id,
            status,
            signing_url: body.signing_url,
        })
    }
}

impl ESignClient {
    pub fn new(config: ESignConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::build_client(PROVIDER)?,
            config,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(http::url(&self.config.base_url, path))
            .bearer_auth(&self.config.api_key)
    }
}

/// The most useful existing document: a signed one wins, then an open one.
/// Declined and expired documents are skipped so a new one gets created.
fn reusable(documents: Vec<TaxDocument>) -> Option<TaxDocument> {
    let mut open = None;
    for doc in documents {
        match doc.status {
            TaxDocumentStatus::Completed => return Some(doc),
            TaxDocumentStatus::Pending if open.is_none() => open = Some(doc),
            _ => {}
        }
    }
    open
}

#[async_trait]
impl TaxFormProvider for ESignClient {
    async fn get_or_create_document(&self, talent_id: &str) -> Result<TaxDocument, ProviderError> {
        let request = self.get("/documents").query(&[("external_id", talent_id)]);
        let existing: DocumentList = http::send_json(PROVIDER, request).await?;
        let existing = existing
            .data
            .into_iter()
            .map(TaxDocument::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(doc) = reusable(existing) {
            tracing::debug!(talent_id, document_id = %doc.id, "Reusing tax document");
            return Ok(doc);
        }

        let body = serde_json::json!({
            "template_id": self.config.template_id,
            "external_id": talent_id,
        });
        let request = self
            .client
            .post(http::url(&self.config.base_url, "/documents"))
            .bearer_auth(&self.config.api_key)
            .json(&body);
        let created: DocumentBody = http::send_json(PROVIDER, request).await?;
        let doc = TaxDocument::try_from(created)?;

        tracing::info!(talent_id, document_id = %doc.id, "Tax document created");
        Ok(doc)
    }

    async fn document(&self, document_id: &str) -> Result<TaxDocument, ProviderError> {
        let document_id = http::path_segment(PROVIDER, document_id)?;
        let request = self.get(&format!("/documents/{document_id}"));
        let body: DocumentBody = http::send_json(PROVIDER, request).await?;
        TaxDocument::try_from(body)
    }
}
