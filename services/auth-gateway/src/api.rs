//! Sample resources and the bearer-credential extractor
//!
//! `CurrentSession` runs the resource-access flow for any handler that takes
//! it as an argument. Handlers never see a request whose access credential
//! failed verification.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde_json::{Value, json};

use credential::Claims;

use crate::AppState;
use crate::error::ApiError;

/// Verified access credential attached to a request.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub claims: Claims,
    /// Exact serialized form, needed to revoke it on logout.
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::Unauthorized)?;

        let claims = state.session.authenticate(token).await?;
        Ok(CurrentSession {
            claims,
            token: token.to_string(),
        })
    }
}

/// Extract the credential from an `Authorization: Bearer <token>` value.
///
/// The scheme is case-insensitive. An empty credential is treated as absent.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// GET /api
pub async fn index() -> Json<Value> {
    Json(json!({ "message": "unprotected api endpoint" }))
}

/// GET /api/protected: reachable only with a valid access credential.
pub async fn protected(session: CurrentSession) -> Json<Value> {
    Json(json!({
        "message": "protected api endpoint",
        "email": session.claims.sub,
    }))
}
