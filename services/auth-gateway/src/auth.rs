//! Login, refresh and logout endpoints
//!
//! Endpoints:
//! - GET  /login    start the authorization-code flow, redirect to the provider
//! - GET  /token    provider callback, exchange code and issue credentials
//! - POST /login    exchange a code obtained by the client itself
//! - POST /refresh  trade a refresh credential for a new access credential
//! - POST /logout   revoke the presented access credential (and refresh, if given)
//!
//! Request bodies are read as raw bytes and parsed here so that a malformed
//! body is a 401 like any other bad credential, not an extractor 4xx.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use credential::{IssuedCredential, TokenPair};
use identity_provider::{compute_challenge, generate_state, generate_verifier};

use crate::AppState;
use crate::api::CurrentSession;
use crate::error::ApiError;

/// PKCE verifier for an authorization-code flow awaiting its callback.
struct PendingLogin {
    verifier: String,
    created_at: Instant,
}

/// Authorization-code flows started by GET /login, keyed by their CSRF `state`.
///
/// Each entry is consumed exactly once by GET /token. The table is bounded:
/// once `capacity` live flows are waiting, new ones are refused until some
/// complete or expire.
pub struct PendingLogins {
    entries: Mutex<HashMap<String, PendingLogin>>,
    capacity: usize,
}

/// Maximum age of a pending login before its callback is refused.
pub const PENDING_LOGIN_EXPIRY: Duration = Duration::from_secs(600);

impl PendingLogins {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Record a new flow. Returns `false` when the table is full.
    async fn begin(&self, state: String, verifier: String) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            // Expired flows are swept only when the table is full
            entries.retain(|_, p| p.created_at.elapsed() < PENDING_LOGIN_EXPIRY);
            if entries.len() >= self.capacity {
                return false;
            }
        }
        entries.insert(
            state,
            PendingLogin {
                verifier,
                created_at: Instant::now(),
            },
        );
        true
    }

    /// Remove the flow for `state`, returning its verifier if it has not expired.
    async fn take(&self, state: &str) -> Option<String> {
        let pending = self.entries.lock().await.remove(state)?;
        (pending.created_at.elapsed() < PENDING_LOGIN_EXPIRY).then_some(pending.verifier)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

const TOKEN_TYPE: &str = "bearer";

/// GET /login: create a pending login and redirect (303) to the consent URL.
pub async fn login_redirect(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let csrf_state = generate_state();
    let verifier = generate_verifier();
    let challenge = compute_challenge(&verifier);
    let url = state
        .session
        .provider()
        .authorization_url(&csrf_state, &challenge);

    if !state.pending.begin(csrf_state, verifier).await {
        warn!(
            capacity = state.pending.capacity,
            "pending login table full, refusing new login"
        );
        return Err(ApiError::Unavailable);
    }

    debug!(provider = state.session.provider().id(), "login flow initiated");
    Ok(Redirect::to(&url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: String,
    state: String,
}

/// GET /token: provider callback carrying `code` and `state`.
pub async fn token_callback(
    State(state): State<AppState>,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Ok(Query(params)) = params else {
        return Err(ApiError::Unauthorized);
    };

    let Some(verifier) = state.pending.take(&params.state).await else {
        info!("login callback for unknown or expired state");
        return Err(ApiError::Unauthorized);
    };

    let pair = state
        .session
        .login(&params.code, Some(&verifier))
        .await?;
    Ok(login_response(&state, &pair))
}

#[derive(Deserialize)]
struct LoginRequest {
    code: String,
    #[serde(default)]
    code_verifier: Option<String>,
}

/// POST /login: `{code, code_verifier?}`.
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: LoginRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::Unauthorized)?;

    let pair = state
        .session
        .login(&request.code, request.code_verifier.as_deref())
        .await?;
    Ok(login_response(&state, &pair))
}

#[derive(Deserialize)]
struct RefreshRequest {
    grant_type: String,
    refresh_token: String,
}

/// POST /refresh: `{grant_type: "refresh_token", refresh_token}`.
///
/// The refresh credential is not rotated; the response carries only a new
/// access credential.
pub async fn refresh(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: RefreshRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::Unauthorized)?;
    if request.grant_type != "refresh_token" {
        return Err(ApiError::Unauthorized);
    }

    let access = state.session.refresh(&request.refresh_token).await?;
    Ok(Json(json!({
        "result": true,
        "access_token": access.token,
        "token_type": TOKEN_TYPE,
        "expires_in": expires_in(&state, &access),
    }))
    .into_response())
}

#[derive(Deserialize, Default)]
struct LogoutRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

/// POST /logout: revoke the bearer access credential and an optional refresh
/// credential from the body. An empty body is accepted.
///
/// The refresh credential must be the caller's own; anything else is a 401
/// and nothing is revoked.
pub async fn logout(
    State(state): State<AppState>,
    session: CurrentSession,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| ApiError::Unauthorized)?
    };

    let refresh_token = request.refresh_token.filter(|t| !t.is_empty());
    state
        .session
        .logout(&session.claims.sub, &session.token, refresh_token.as_deref())
        .await?;

    info!(subject = %session.claims.sub, "logged out");
    Ok(Json(json!({ "result": true })).into_response())
}

fn login_response(state: &AppState, pair: &TokenPair) -> Response {
    Json(json!({
        "result": true,
        "access_token": pair.access.token,
        "refresh_token": pair.refresh.token,
        "token_type": TOKEN_TYPE,
        "expires_in": expires_in(state, &pair.access),
    }))
    .into_response()
}

fn expires_in(state: &AppState, credential: &IssuedCredential) -> u64 {
    credential.claims.expires_in(state.session.now())
}
