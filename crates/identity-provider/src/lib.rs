//! Identity-provider boundary
//!
//! Defines the `IdentityProvider` trait that turns an authorization artifact
//! (an OAuth authorization code) into a verified identity assertion. The
//! credential engine consumes assertions; it never generates them.
//!
//! Login flow with the bundled OpenID Connect client:
//! 1. Gateway calls `pkce::generate_state()` + `pkce::generate_verifier()`
//! 2. User is redirected to `IdentityProvider::authorization_url()`
//! 3. The provider redirects back with `code` and `state`
//! 4. Gateway calls `IdentityProvider::exchange()` and receives `{email, name}`

pub mod constants;
pub mod oidc;
pub mod pkce;

pub use oidc::{OidcEndpoints, OidcProvider};
pub use pkce::{compute_challenge, generate_state, generate_verifier};

use std::future::Future;
use std::pin::Pin;

/// Identity verified by an external provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    pub email: String,
    pub name: Option<String>,
}

/// Errors from the identity provider exchange.
///
/// The session layer collapses all of these to "unauthorized"; the variants
/// exist for logs.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("identity not verified: {0}")]
    Unverified(String),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Exchange an authorization artifact for a verified identity.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn IdentityProvider>`).
pub trait IdentityProvider: Send + Sync {
    /// Identifier for logging (e.g. "google")
    fn id(&self) -> &str;

    /// Consent URL the user is redirected to.
    ///
    /// `state` is the CSRF token echoed back on the callback; `code_challenge`
    /// is the S256 PKCE challenge for the verifier kept server-side.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String;

    /// Exchange an authorization code for a verified identity assertion.
    fn exchange<'a>(
        &'a self,
        code: &'a str,
        code_verifier: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<IdentityAssertion>> + Send + 'a>>;
}
