//! Authentication gateway
//!
//! Single-binary service that:
//! 1. Logs users in through an OpenID Connect provider (authorization code + PKCE)
//! 2. Issues signed access and refresh credentials to trusted identities
//! 3. Refreshes access credentials and revokes credentials on logout
//! 4. Guards the sample `/api/protected` resource with bearer access credentials

mod api;
mod auth;
mod config;
mod error;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credential::{SessionOrchestrator, SystemClock};
use identity_provider::OidcProvider;
use stores::{FileRevocationStore, MemoryIdentityStore};

use crate::auth::PendingLogins;
use crate::config::Config;

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    session: Arc<SessionOrchestrator>,
    pending: Arc<PendingLogins>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

impl AppState {
    fn new(
        session: Arc<SessionOrchestrator>,
        max_pending_logins: usize,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self {
            session,
            pending: Arc::new(PendingLogins::new(max_pending_logins)),
            started_at: Instant::now(),
            prometheus,
        }
    }
}

/// Build the axum router with all routes and shared state.
///
/// Request metrics are attached per route so the matched path is available as
/// a label. The concurrency limit covers the whole router.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/login", get(auth::login_redirect).post(auth::login))
        .route("/token", get(auth::token_callback))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/api", get(api::index))
        .route("/api/protected", get(api::protected))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn(metrics::track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting auth-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let credential_config = config
        .credential_config()
        .context("invalid credential configuration")?;

    info!(
        listen_addr = %config.server.listen_addr,
        algorithm = %config.tokens.algorithm,
        access_token_expire_minutes = config.tokens.access_token_expire_minutes,
        refresh_token_expire_minutes = config.tokens.refresh_token_expire_minutes,
        revocation_path = %config.storage.revocation_path.display(),
        "configuration loaded"
    );

    let identities = match &config.storage.identities_path {
        Some(path) => MemoryIdentityStore::load(path, config.identities.clone())
            .await
            .with_context(|| format!("failed to load identities from {}", path.display()))?,
        None => MemoryIdentityStore::new(config.identities.clone()),
    };
    let revocations = FileRevocationStore::load(config.storage.revocation_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to load revocation store from {}",
                config.storage.revocation_path.display()
            )
        })?;

    let client_id = config
        .identity_provider
        .client_id
        .clone()
        .context("identity provider client_id missing")?;
    let client_secret = config
        .identity_provider
        .client_secret
        .clone()
        .context("identity provider client secret missing")?;
    let provider = OidcProvider::new(
        reqwest::Client::new(),
        client_id,
        client_secret,
        config.identity_provider.redirect_uri.clone(),
        config.oidc_endpoints(),
    );

    let session = SessionOrchestrator::new(
        &credential_config,
        Arc::new(SystemClock),
        Arc::new(provider),
        Arc::new(identities),
        Arc::new(revocations),
    );
    let app_state = AppState::new(
        Arc::new(session),
        config.server.max_pending_logins,
        prometheus_handle,
    );

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race it against the timer.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: status, uptime, trusted identity and revocation counts,
/// and the number of logins awaiting their callback.
/// Returns 503 when either store cannot answer.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let pending_logins = state.pending.len().await;
    let identities = state.session.identities().count().await;
    let revocations = state.session.revocations().count().await;

    let (status_code, body) = match (identities, revocations) {
        (Ok(identities), Ok(revocations)) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "uptime_seconds": uptime,
                "trusted_identities": identities,
                "revoked_credentials": revocations,
                "pending_logins": pending_logins,
            }),
        ),
        (identities, revocations) => {
            if let Err(e) = &identities {
                error!(error = %e, "identity store unavailable");
            }
            if let Err(e) = &revocations {
                error!(error = %e, "revocation store unavailable");
            }
            let availability = |ok: bool| if ok { "ok" } else { "unavailable" };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "degraded",
                    "uptime_seconds": uptime,
                    "identity_store": availability(identities.is_ok()),
                    "revocation_store": availability(revocations.is_ok()),
                }),
            )
        }
    };

    (
        status_code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
