use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payout_api::config::{ProviderConfig, ServerConfig};
use payout_api::engine::{Collaborators, StatusWatcher, StepEngine};
use payout_api::router::build_app_router;
use payout_api::state::AppState;
use payout_core::workflow::WorkflowController;
use payout_db::PgProgressStore;
use payout_providers::{ESignClient, MoovClient, PlaidClient, VeriffClient};

type StartupError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "payout_api=debug,payout_db=debug,payout_providers=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    let providers = ProviderConfig::from_env()?;

    // --- Database ---
    let database_url = payout_api::config::required("DATABASE_URL")?;

    let pool = payout_db::create_pool(&database_url).await?;
    tracing::info!("Database connection pool created");

    payout_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    payout_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let collaborators = Collaborators {
        tax_forms: Arc::new(ESignClient::new(providers.esign)?),
        identity: Arc::new(VeriffClient::new(providers.veriff)?),
        payments: Arc::new(MoovClient::new(providers.moov)?),
        bank_link: Arc::new(PlaidClient::new(providers.plaid)?),
    };
    tracing::info!("Provider clients created");

    // --- Workflow ---
    let controller = WorkflowController::new(Arc::new(PgProgressStore::new(pool)));
    let engine = Arc::new(StepEngine::new(controller.clone(), collaborators));
    let watcher = Arc::new(StatusWatcher::new(Arc::clone(&engine), providers.poll));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        controller,
        engine,
        watcher: Arc::clone(&watcher),
        webhooks: Arc::new(providers.webhooks),
    };

    let app = build_app_router(state, &config)?;

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(timeout, watcher.shutdown()).await.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Status watchers did not stop in time"
        );
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
