//! OpenID Connect authorization-code client
//!
//! Two endpoint interactions per login:
//! 1. POST the authorization code (plus PKCE verifier) to the token endpoint
//! 2. GET the userinfo endpoint with the returned access token
//!
//! The userinfo response is the identity assertion. An email the provider
//! reports as unverified is rejected here, before the trust check.

use std::future::Future;
use std::pin::Pin;

use common::Secret;
use serde::Deserialize;
use tracing::debug;

use crate::constants::{
    GOOGLE_AUTHORIZE_ENDPOINT, GOOGLE_TOKEN_ENDPOINT, GOOGLE_USERINFO_ENDPOINT, SCOPES,
};
use crate::{IdentityAssertion, IdentityProvider, ProviderError, Result};

/// Endpoints of an OIDC issuer.
#[derive(Debug, Clone)]
pub struct OidcEndpoints {
    pub authorize: String,
    pub token: String,
    pub userinfo: String,
}

impl Default for OidcEndpoints {
    fn default() -> Self {
        Self {
            authorize: GOOGLE_AUTHORIZE_ENDPOINT.to_string(),
            token: GOOGLE_TOKEN_ENDPOINT.to_string(),
            userinfo: GOOGLE_USERINFO_ENDPOINT.to_string(),
        }
    }
}

/// Token endpoint response. Only the access token is needed for userinfo.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OIDC userinfo claims used by the gateway.
#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Authorization-code client for a confidential OIDC application.
pub struct OidcProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    endpoints: OidcEndpoints,
}

impl OidcProvider {
    pub fn new(
        client: reqwest::Client,
        client_id: String,
        client_secret: Secret<String>,
        redirect_uri: String,
        endpoints: OidcEndpoints,
    ) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            redirect_uri,
            endpoints,
        }
    }

    async fn fetch_token(&self, code: &str, code_verifier: Option<&str>) -> Result<String> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose().as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let response = self
            .client
            .post(&self.endpoints.token)
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ProviderError::Exchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ProviderError::Exchange(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<IdentityAssertion> {
        let response = self
            .client
            .get(&self.endpoints.userinfo)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Exchange(format!(
                "userinfo endpoint returned {status}"
            )));
        }

        let info = response
            .json::<UserInfo>()
            .await
            .map_err(|e| ProviderError::Exchange(format!("invalid userinfo response: {e}")))?;

        let email = match info.email {
            Some(email) if !email.trim().is_empty() => email,
            _ => return Err(ProviderError::Unverified("userinfo has no email".into())),
        };
        if info.email_verified == Some(false) {
            return Err(ProviderError::Unverified(format!(
                "email {email} is not verified by the provider"
            )));
        }

        Ok(IdentityAssertion {
            email,
            name: info.name,
        })
    }
}

impl IdentityProvider for OidcProvider {
    fn id(&self) -> &str {
        "oidc"
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&code_challenge={}&code_challenge_method=S256&state={}",
            self.endpoints.authorize,
            urlencoded(&self.client_id),
            urlencoded(&self.redirect_uri),
            urlencoded(SCOPES),
            code_challenge,
            urlencoded(state),
        )
    }

    fn exchange<'a>(
        &'a self,
        code: &'a str,
        code_verifier: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<IdentityAssertion>> + Send + 'a>> {
        Box::pin(async move {
            let access_token = self.fetch_token(code, code_verifier).await?;
            let assertion = self.fetch_userinfo(&access_token).await?;
            debug!(email = %assertion.email, "identity provider verified email");
            Ok(assertion)
        })
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use std::collections::HashMap;

    fn provider(base: &str) -> OidcProvider {
        OidcProvider::new(
            reqwest::Client::new(),
            "client-123".into(),
            Secret::new("client-secret".into()),
            "http://127.0.0.1:7000/token".into(),
            OidcEndpoints {
                authorize: format!("{base}/authorize"),
                token: format!("{base}/token"),
                userinfo: format!("{base}/userinfo"),
            },
        )
    }

    /// Start a mock issuer whose userinfo endpoint returns `userinfo`.
    ///
    /// The token endpoint only accepts code "good-code" with the configured
    /// client credentials and answers with access token "idp-at".
    async fn start_mock_issuer(userinfo: serde_json::Value) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route(
                "/token",
                post(
                    |axum::Form(form): axum::Form<HashMap<String, String>>| async move {
                        let ok = form.get("grant_type").map(String::as_str)
                            == Some("authorization_code")
                            && form.get("code").map(String::as_str) == Some("good-code")
                            && form.get("client_secret").map(String::as_str)
                                == Some("client-secret");
                        if ok {
                            (
                                StatusCode::OK,
                                serde_json::json!({"access_token": "idp-at", "token_type": "Bearer"})
                                    .to_string(),
                            )
                        } else {
                            (
                                StatusCode::BAD_REQUEST,
                                serde_json::json!({"error": "invalid_grant"}).to_string(),
                            )
                        }
                    },
                ),
            )
            .route(
                "/userinfo",
                get(move |headers: HeaderMap| {
                    let userinfo = userinfo.clone();
                    async move {
                        let authorized = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            == Some("Bearer idp-at");
                        if authorized {
                            (StatusCode::OK, axum::Json(userinfo))
                        } else {
                            (StatusCode::UNAUTHORIZED, axum::Json(serde_json::json!({})))
                        }
                    }
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let p = provider("https://idp.example");
        let url = p.authorization_url("state-123", "challenge-abc");

        assert!(url.starts_with("https://idp.example/authorize?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A7000%2Ftoken"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("code_challenge=challenge-abc"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("state=state-123"));
    }

    #[test]
    fn default_endpoints_are_google() {
        let endpoints = OidcEndpoints::default();
        assert_eq!(endpoints.authorize, GOOGLE_AUTHORIZE_ENDPOINT);
        assert_eq!(endpoints.token, GOOGLE_TOKEN_ENDPOINT);
        assert_eq!(endpoints.userinfo, GOOGLE_USERINFO_ENDPOINT);
    }

    #[test]
    fn urlencoded_leaves_unreserved_alone() {
        assert_eq!(urlencoded("aZ09-_.~"), "aZ09-_.~");
        assert_eq!(urlencoded("a b/c?d=e&f"), "a%20b%2Fc%3Fd%3De%26f");
    }

    #[tokio::test]
    async fn exchange_returns_verified_identity() {
        let base = start_mock_issuer(serde_json::json!({
            "email": "a@example.com",
            "email_verified": true,
            "name": "Alice Example",
        }))
        .await;

        let assertion = provider(&base)
            .exchange("good-code", Some("verifier"))
            .await
            .unwrap();
        assert_eq!(assertion.email, "a@example.com");
        assert_eq!(assertion.name.as_deref(), Some("Alice Example"));
    }

    #[tokio::test]
    async fn exchange_rejects_bad_code() {
        let base = start_mock_issuer(serde_json::json!({"email": "a@example.com"})).await;

        let result = provider(&base).exchange("bad-code", None).await;
        assert!(
            matches!(result, Err(ProviderError::Exchange(_))),
            "got: {result:?}"
        );
    }

    #[tokio::test]
    async fn exchange_rejects_unverified_email() {
        let base = start_mock_issuer(serde_json::json!({
            "email": "a@example.com",
            "email_verified": false,
        }))
        .await;

        let result = provider(&base).exchange("good-code", None).await;
        assert!(matches!(result, Err(ProviderError::Unverified(_))));
    }

    #[tokio::test]
    async fn exchange_rejects_missing_email() {
        let base = start_mock_issuer(serde_json::json!({"name": "No Email"})).await;

        let result = provider(&base).exchange("good-code", None).await;
        assert!(matches!(result, Err(ProviderError::Unverified(_))));
    }

    #[tokio::test]
    async fn exchange_reports_unreachable_issuer() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = provider(&format!("http://{addr}"))
            .exchange("good-code", None)
            .await;
        assert!(matches!(result, Err(ProviderError::Http(_))));
    }
}
