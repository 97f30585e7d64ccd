#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use jsonwebtoken::{encode, EncodingKey, Header};
use payout_api::auth::jwt::{Claims, JwtConfig, ADMIN_ROLE, TALENT_ROLE};
use payout_api::config::{ServerConfig, WebhookSecrets};
use payout_api::engine::{Collaborators, StatusWatcher, StepEngine};
use payout_api::router::build_app_router;
use payout_api::state::AppState;
use payout_core::identity::IdentityProfile;
use payout_core::memory::MemoryProgressStore;
use payout_core::polling::PollPolicy;
use payout_core::signing::{compute_signature, SIGNATURE_HEADER};
use payout_core::verification::{CapabilityStatus, TaxDocumentStatus, VerificationStatus};
use payout_core::workflow::WorkflowController;
use payout_providers::{
    AccountCapability, BankLinkProvider, IdentityDecision, IdentityProvider, IdentitySession, LinkToken, LinkedItem,
    PaymentAccountProvider, ProviderError, TaxDocument, TaxFormProvider,
};

pub const TALENT: &str = "talent-1";
pub const OTHER_TALENT: &str = "talent-2";
pub const IDENTITY_SECRET: &str = "identity-webhook-secret";
pub const TAX_FORM_SECRET: &str = "tax-form-webhook-secret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "test-jwt-secret".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Fake collaborators
// ---------------------------------------------------------------------------

/// Tax documents are named `doc-{talent_id}`.
pub struct FakeTaxForms {
    pub status: Mutex<TaxDocumentStatus>,
    pub reads: AtomicUsize,
}

#[async_trait]
impl TaxFormProvider for FakeTaxForms {
    async fn get_or_create_document(&self, talent_id: &str) -> Result<TaxDocument, ProviderError> {
        Ok(TaxDocument {
            id: format!("doc-{talent_id}"),
            external_id: talent_id.to_string(),
            status: *self.status.lock().unwrap(),
            signing_url: Some(format!("https://sign.test/doc-{talent_id}")),
        })
    }

    async fn document(&self, document_id: &str) -> Result<TaxDocument, ProviderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let talent_id = document_id.strip_prefix("doc-").ok_or(ProviderError::Api {
            provider: "E-sign",
            status: 404,
            body: "document not found".to_string(),
        })?;
        Ok(TaxDocument {
            id: document_id.to_string(),
            external_id: talent_id.to_string(),
            status: *self.status.lock().unwrap(),
            signing_url: None,
        })
    }
}

/// Identity sessions are named `sess-{talent_id}`.
pub struct FakeIdentity {
    pub status: Mutex<VerificationStatus>,
    pub reads: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn create_session(&self, talent_id: &str) -> Result<IdentitySession, ProviderError> {
        Ok(IdentitySession {
            id: format!("sess-{talent_id}"),
            url: format!("https://verify.test/sess-{talent_id}"),
            status: VerificationStatus::Created,
        })
    }

    async fn decision(&self, session_id: &str) -> Result<IdentityDecision, ProviderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(IdentityDecision {
            session_id: session_id.to_string(),
            status: *self.status.lock().unwrap(),
            reason: None,
            vendor_data: session_id.strip_prefix("sess-").map(str::to_string),
        })
    }
}

/// Payment accounts are named `acct-{n}` and remember the talent they were
/// created for.
pub struct FakePayments {
    pub capability: Mutex<CapabilityStatus>,
    pub unavailable: AtomicBool,
    pub accounts_created: AtomicUsize,
    pub owners: Mutex<HashMap<String, String>>,
}

impl FakePayments {
    /// Register an account created outside the API.
    pub fn register_account(&self, account_id: &str, talent_id: &str) {
        self.owners
            .lock()
            .unwrap()
            .insert(account_id.to_string(), talent_id.to_string());
    }
}

#[async_trait]
impl PaymentAccountProvider for FakePayments {
    async fn create_account(
        &self,
        talent_id: &str,
        _profile: &IdentityProfile,
    ) -> Result<String, ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                provider: "Moov",
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        let n = self.accounts_created.fetch_add(1, Ordering::SeqCst) + 1;
        let account_id = format!("acct-{n}");
        self.register_account(&account_id, talent_id);
        Ok(account_id)
    }

    async fn capability_status(
        &self,
        account_id: &str,
    ) -> Result<AccountCapability, ProviderError> {
        let owner = self.owners.lock().unwrap().get(account_id).cloned();
        let status = match owner {
            Some(_) => *self.capability.lock().unwrap(),
            None => CapabilityStatus::Absent,
        };
        Ok(AccountCapability { owner, status })
    }

    async fn attach_bank_account(
        &self,
        _account_id: &str,
        processor_token: &str,
    ) -> Result<String, ProviderError> {
        Ok(format!("bank-for-{processor_token}"))
    }
}

pub struct FakeBankLink;

#[async_trait]
impl BankLinkProvider for FakeBankLink {
    async fn create_link_token(&self, account_id: &str) -> Result<LinkToken, ProviderError> {
        Ok(LinkToken {
            link_token: format!("link-sandbox-{account_id}"),
            expiration: None,
        })
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
        account_id: Option<&str>,
    ) -> Result<LinkedItem, ProviderError> {
        if public_token == "public-invalid" {
            return Err(ProviderError::Rejected {
                provider: "Plaid",
                message: "The bank link expired. Please link your bank again.".to_string(),
            });
        }
        Ok(LinkedItem {
            item_id: "item-1".to_string(),
            access_token: "access-sandbox-1".to_string(),
            account_id: account_id.unwrap_or("checking-1").to_string(),
        })
    }

    async fn processor_token(&self, item: &LinkedItem) -> Result<String, ProviderError> {
        Ok(format!("processor-{}", item.account_id))
    }
}

// ---------------------------------------------------------------------------
// Test app
// ---------------------------------------------------------------------------

/// Handles to everything behind the router, so tests can steer the fakes
/// and inspect the workflow directly.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryProgressStore>,
    pub controller: WorkflowController,
    pub watcher: Arc<StatusWatcher>,
    pub tax_forms: Arc<FakeTaxForms>,
    pub identity: Arc<FakeIdentity>,
    pub payments: Arc<FakePayments>,
}

/// A fast poll schedule so watcher tests settle within milliseconds.
pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(20),
        multiplier: 2,
        max_attempts: 50,
    }
}

/// Build the full application router over an in-memory store with
/// [`TALENT`] and [`OTHER_TALENT`] registered.
///
/// Uses the same `build_app_router` as `main.rs` so tests exercise the
/// production middleware stack.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryProgressStore::with_talents([TALENT, OTHER_TALENT]));
    let controller = WorkflowController::new(store.clone());

    let tax_forms = Arc::new(FakeTaxForms {
        status: Mutex::new(TaxDocumentStatus::Pending),
        reads: AtomicUsize::new(0),
    });
    let identity = Arc::new(FakeIdentity {
        status: Mutex::new(VerificationStatus::Submitted),
        reads: AtomicUsize::new(0),
    });
    let payments = Arc::new(FakePayments {
        capability: Mutex::new(CapabilityStatus::Enabled),
        unavailable: AtomicBool::new(false),
        accounts_created: AtomicUsize::new(0),
        owners: Mutex::new(HashMap::new()),
    });

    let collaborators = Collaborators {
        tax_forms: tax_forms.clone(),
        identity: identity.clone(),
        payments: payments.clone(),
        bank_link: Arc::new(FakeBankLink),
    };
    let engine = Arc::new(StepEngine::new(controller.clone(), collaborators));
    let watcher = Arc::new(StatusWatcher::new(Arc::clone(&engine), fast_poll()));

    let state = AppState {
        config: Arc::new(config.clone()),
        controller: controller.clone(),
        engine,
        watcher: Arc::clone(&watcher),
        webhooks: Arc::new(WebhookSecrets {
            identity: IDENTITY_SECRET.to_string(),
            tax_forms: TAX_FORM_SECRET.to_string(),
        }),
    };
    let router = build_app_router(state, &config).expect("test config is valid");

    TestApp {
        router,
        store,
        controller,
        watcher,
        tax_forms,
        identity,
        payments,
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Issue a 15-minute HS256 token the way the identity platform does.
pub fn sign_token(sub: &str, role: &str, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: now + 15 * 60,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn talent_token(talent_id: &str) -> String {
    sign_token(talent_id, TALENT_ROLE, &test_config().jwt.secret)
}

pub fn admin_token() -> String {
    sign_token("admin-1", ADMIN_ROLE, &test_config().jwt.secret)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn onboarding_path(talent_id: &str, suffix: &str) -> String {
    format!("/api/v1/talents/{talent_id}/payout-onboarding{suffix}")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a webhook body signed with `secret`.
pub async fn post_signed(app: &Router, uri: &str, secret: &str, body: &[u8]) -> Response<Body> {
    let signature = compute_signature(secret, body);
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_vec()))
        .unwrap();
    send(app, request).await
}

/// A profile that passes every identity check.
pub fn valid_profile() -> serde_json::Value {
    serde_json::json!({
        "first_name": "Dana",
        "last_name": "Reyes",
        "email": "dana@example.com",
        "date_of_birth": "1990-04-02",
        "address": {
            "address_line1": "12 Main St",
            "address_line2": null,
            "city": "Austin",
            "state_or_province": "TX",
            "postal_code": "78701"
        },
        "ssn": "123-45-6789"
    })
}

pub async fn assert_status(response: Response<Body>, expected: StatusCode) -> serde_json::Value {
    let status = response.status();
    let json = body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {json}");
    json
}
