//! OpenID Connect defaults
//!
//! Google's public endpoints. Deployments pointing at another OIDC issuer
//! override these through configuration.

/// Authorization (consent) endpoint
pub const GOOGLE_AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for the authorization-code grant
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// OpenID userinfo endpoint
pub const GOOGLE_USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Scopes needed to receive a verified email and display name.
pub const SCOPES: &str = "openid email profile";
