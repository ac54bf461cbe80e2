//! Credential issuance
//!
//! The issuer does not re-check trust. Callers establish that the identity is
//! trusted before minting.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::claims::CredentialKind;
use crate::codec::{CredentialCodec, IssuedCredential};
use crate::config::CredentialConfig;
use crate::error::Result;
use crate::metrics;

/// Access and refresh credentials minted together at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedCredential,
    pub refresh: IssuedCredential,
}

pub struct CredentialIssuer {
    codec: Arc<CredentialCodec>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl CredentialIssuer {
    pub fn new(codec: Arc<CredentialCodec>, config: &CredentialConfig) -> Self {
        Self {
            codec,
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
        }
    }

    pub fn issue_access(&self, subject: &str) -> Result<IssuedCredential> {
        self.issue(subject, CredentialKind::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, subject: &str) -> Result<IssuedCredential> {
        self.issue(subject, CredentialKind::Refresh, self.refresh_ttl)
    }

    /// Encoding has no side effects, so a failure minting the refresh
    /// credential leaves nothing to roll back.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue_access(subject)?,
            refresh: self.issue_refresh(subject)?,
        })
    }

    fn issue(
        &self,
        subject: &str,
        kind: CredentialKind,
        validity: Duration,
    ) -> Result<IssuedCredential> {
        let issued = self.codec.encode(subject, kind, validity)?;
        debug!(subject, %kind, exp = issued.claims.exp, "issued credential");
        metrics::record_issued(kind);
        Ok(issued)
    }
}
