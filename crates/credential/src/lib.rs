//! Credential lifecycle engine
//!
//! Issues, verifies, rotates and revokes the gateway's bearer credentials.
//! Credentials are compact HMAC-signed JWS tokens carrying `sub`, `kind`,
//! `iat`, `exp` and `jti` claims.
//!
//! Component graph:
//! - `codec::CredentialCodec` signs and checks tokens (the integrity boundary)
//! - `issuer::CredentialIssuer` mints access and refresh credentials
//! - `verifier::CredentialVerifier` runs revocation, signature, kind, expiry
//!   and trust checks, in that order
//! - `session::SessionOrchestrator` drives login, refresh, resource access and
//!   logout over the two stores and the identity provider
//!
//! Every verification failure is a `Rejection`. Callers facing the network
//! must collapse all rejections to a single "unauthorized" outcome and treat
//! `Error::Store` as a server fault.

pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod issuer;
pub mod metrics;
pub mod session;
pub mod verifier;

pub use claims::{Claims, CredentialKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{CredentialCodec, IssuedCredential};
pub use config::CredentialConfig;
pub use error::{Error, Rejection, Result};
pub use issuer::{CredentialIssuer, TokenPair};
pub use session::SessionOrchestrator;
pub use verifier::CredentialVerifier;
