//! Session orchestration
//!
//! Drives the end-to-end flows over the stateless codec and the two stores:
//!
//! - login: identity provider assertion -> trust check -> access + refresh
//! - refresh: verify refresh credential -> new access credential only
//! - access: verify access credential -> identity for the protected operation
//! - logout: record credentials in the revocation store
//!
//! The orchestrator owns no persistent state. Refresh credentials are not
//! rotated: one stays valid for its whole window no matter how many access
//! credentials it mints, so revocation is the only way to cut it short.

use std::sync::Arc;

use identity_provider::{IdentityAssertion, IdentityProvider};
use stores::{IdentityStore, RevocationStore};
use tracing::{error, info, warn};

use crate::claims::{Claims, CredentialKind};
use crate::clock::Clock;
use crate::codec::{CredentialCodec, IssuedCredential};
use crate::config::CredentialConfig;
use crate::error::{Error, Rejection, Result};
use crate::issuer::{CredentialIssuer, TokenPair};
use crate::metrics;
use crate::verifier::CredentialVerifier;

pub struct SessionOrchestrator {
    provider: Arc<dyn IdentityProvider>,
    identities: Arc<dyn IdentityStore>,
    revocations: Arc<dyn RevocationStore>,
    codec: Arc<CredentialCodec>,
    issuer: CredentialIssuer,
    verifier: CredentialVerifier,
    clock: Arc<dyn Clock>,
}

impl SessionOrchestrator {
    pub fn new(
        config: &CredentialConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn IdentityProvider>,
        identities: Arc<dyn IdentityStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        let codec = Arc::new(CredentialCodec::new(config, clock.clone()));
        Self {
            issuer: CredentialIssuer::new(codec.clone(), config),
            verifier: CredentialVerifier::new(
                codec.clone(),
                identities.clone(),
                revocations.clone(),
                clock.clone(),
            ),
            codec,
            provider,
            identities,
            revocations,
            clock,
        }
    }

    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    pub fn identities(&self) -> &dyn IdentityStore {
        self.identities.as_ref()
    }

    pub fn revocations(&self) -> &dyn RevocationStore {
        self.revocations.as_ref()
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Login flow from an authorization code.
    ///
    /// Any identity-provider failure is an `AssertionRejected` rejection.
    pub async fn login(&self, code: &str, code_verifier: Option<&str>) -> Result<TokenPair> {
        let assertion = match self.provider.exchange(code, code_verifier).await {
            Ok(assertion) => assertion,
            Err(e) => {
                warn!(provider = self.provider.id(), error = %e, "identity provider exchange failed");
                let err = Error::Unauthorized(Rejection::AssertionRejected);
                metrics::record_outcome("login", Err(&err));
                return Err(err);
            }
        };
        self.login_with_assertion(&assertion).await
    }

    /// Login flow from an already verified identity assertion.
    pub async fn login_with_assertion(&self, assertion: &IdentityAssertion) -> Result<TokenPair> {
        let result = self.try_login(assertion).await;
        observe("login", &result);
        if result.is_ok() {
            info!(subject = %assertion.email, "login succeeded, issued credential pair");
        }
        result
    }

    async fn try_login(&self, assertion: &IdentityAssertion) -> Result<TokenPair> {
        if assertion.email.trim().is_empty() {
            return Err(Rejection::AssertionRejected.into());
        }
        if !self.identities.exists(&assertion.email).await? {
            return Err(Rejection::UntrustedIdentity.into());
        }
        self.issuer.issue_pair(&assertion.email)
    }

    /// Refresh flow: a valid refresh credential buys one new access credential.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedCredential> {
        let result = async {
            let claims = self
                .verifier
                .verify(refresh_token, CredentialKind::Refresh)
                .await?;
            self.issuer.issue_access(&claims.sub)
        }
        .await;
        observe("refresh", &result);
        result
    }

    /// Resource-access flow: resolve the identity behind an access credential.
    pub async fn authenticate(&self, access_token: &str) -> Result<Claims> {
        let result = self
            .verifier
            .verify(access_token, CredentialKind::Access)
            .await;
        observe("access", &result);
        result
    }

    /// Revoke a credential by its exact serialized form. Idempotent.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(Rejection::Malformed.into());
        }
        let result = self
            .revocations
            .insert(token.to_string())
            .await
            .map_err(Error::from);
        observe("logout", &result);
        if result.is_ok() {
            metrics::record_revoked();
        }
        result
    }

    /// Logout flow for an authenticated `subject`: revoke its access
    /// credential and, if given, its refresh credential.
    ///
    /// The refresh credential must carry this gateway's signature, be of the
    /// refresh kind and belong to `subject`. Otherwise nothing is revoked.
    /// A refresh credential that has already expired is not recorded.
    pub async fn logout(
        &self,
        subject: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        let result = async {
            let refresh = match refresh_token {
                Some(token) => self.own_live_refresh(subject, token)?,
                None => None,
            };
            for token in std::iter::once(access_token).chain(refresh) {
                self.revocations.insert(token.to_string()).await?;
                metrics::record_revoked();
            }
            Ok::<(), Error>(())
        }
        .await;
        observe("logout", &result);
        result
    }

    fn own_live_refresh<'t>(&self, subject: &str, token: &'t str) -> Result<Option<&'t str>> {
        let claims = self.codec.decode(token)?;
        if claims.kind != CredentialKind::Refresh {
            return Err(Rejection::KindMismatch.into());
        }
        if claims.sub != subject {
            return Err(Rejection::SubjectMismatch.into());
        }
        if claims.is_expired_at(self.clock.now()) {
            return Ok(None);
        }
        Ok(Some(token))
    }
}

/// Log and count a flow outcome. Rejection reasons stay internal.
fn observe<T>(flow: &'static str, result: &Result<T>) {
    match result {
        Ok(_) => metrics::record_outcome(flow, Ok(())),
        Err(e) => {
            match e {
                Error::Unauthorized(rejection) => {
                    warn!(flow, reason = rejection.as_str(), "credential rejected")
                }
                other => error!(flow, error = %other, "credential flow failed"),
            }
            metrics::record_outcome(flow, Err(e));
        }
    }
}
