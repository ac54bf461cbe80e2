//! Credential codec: compact HMAC-signed JWS
//!
//! `decode` verifies the signature before any claim is trusted and refuses
//! tokens whose header names a different algorithm than the configured one.
//! The header check is explicit; the token's self-declared `alg` never
//! selects the verification algorithm.
//!
//! Expiry is not checked here. The codec is a pure function of the token and
//! the secret; time-dependent checks belong to the verifier.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::claims::{Claims, CredentialKind};
use crate::clock::Clock;
use crate::config::CredentialConfig;
use crate::error::{Error, Rejection, Result};

/// A freshly minted credential: the wire form plus the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub token: String,
    pub claims: Claims,
}

pub struct CredentialCodec {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl CredentialCodec {
    pub fn new(config: &CredentialConfig, clock: Arc<dyn Clock>) -> Self {
        let key = config.secret().expose_bytes();
        Self {
            algorithm: config.algorithm(),
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            clock,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Assemble claims (`iat = now`, `exp = now + validity`) and sign them.
    pub fn encode(
        &self,
        subject: &str,
        kind: CredentialKind,
        validity: Duration,
    ) -> Result<IssuedCredential> {
        let now = self.clock.now();
        let claims = Claims {
            sub: subject.to_string(),
            kind,
            iat: now,
            exp: now.saturating_add(validity.as_secs()),
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };

        let token = jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| Error::Signing(e.to_string()))?;

        Ok(IssuedCredential { token, claims })
    }

    /// Check structure and signature and return the claims.
    ///
    /// Never returns partially trusted claims: any mismatch is
    /// `Malformed` or `SignatureInvalid`.
    pub fn decode(&self, token: &str) -> std::result::Result<Claims, Rejection> {
        let header = jsonwebtoken::decode_header(token).map_err(|e| {
            debug!(error = %e, "unparseable credential header");
            Rejection::Malformed
        })?;

        if header.alg != self.algorithm {
            debug!(
                presented = ?header.alg,
                expected = ?self.algorithm,
                "credential algorithm mismatch"
            );
            return Err(Rejection::SignatureInvalid);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    Rejection::SignatureInvalid
                }
                _ => {
                    debug!(error = %e, "credential failed to decode");
                    Rejection::Malformed
                }
            })?
            .claims;

        if claims.sub.is_empty() || claims.iat > claims.exp {
            return Err(Rejection::Malformed);
        }

        Ok(claims)
    }
}
