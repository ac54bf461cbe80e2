//! Credential verification
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. revocation (exact serialized form in the blacklist)
//! 2. structure and signature (codec)
//! 3. kind matches the declared use
//! 4. expiry (`now < exp`)
//! 5. subject is in the trust set
//!
//! Revoked or tampered tokens never reach the claim-dependent checks. A store
//! that cannot answer yields `Error::Store`, never a rejection.

use std::sync::Arc;

use stores::{IdentityStore, RevocationStore};

use crate::claims::{Claims, CredentialKind};
use crate::clock::Clock;
use crate::codec::CredentialCodec;
use crate::error::{Rejection, Result};

pub struct CredentialVerifier {
    codec: Arc<CredentialCodec>,
    identities: Arc<dyn IdentityStore>,
    revocations: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
}

impl CredentialVerifier {
    pub fn new(
        codec: Arc<CredentialCodec>,
        identities: Arc<dyn IdentityStore>,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec,
            identities,
            revocations,
            clock,
        }
    }

    /// Verify `token` for use as `required`, returning its claims.
    ///
    /// `claims.sub` is the resolved identity.
    pub async fn verify(&self, token: &str, required: CredentialKind) -> Result<Claims> {
        if self.revocations.contains(token).await? {
            return Err(Rejection::Revoked.into());
        }

        let claims = self.codec.decode(token)?;

        if claims.kind != required {
            return Err(Rejection::KindMismatch.into());
        }

        if claims.is_expired_at(self.clock.now()) {
            return Err(Rejection::Expired.into());
        }

        if !self.identities.exists(&claims.sub).await? {
            return Err(Rejection::UntrustedIdentity.into());
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CredentialConfig;
    use crate::error::Error;
    use crate::issuer::CredentialIssuer;
    use common::Secret;
    use std::time::Duration;
    use stores::{MemoryIdentityStore, MemoryRevocationStore, StoreFuture, TrustedIdentity};

    const NOW: u64 = 1_800_000_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        issuer: CredentialIssuer,
        verifier: CredentialVerifier,
        revocations: Arc<MemoryRevocationStore>,
    }

    fn fixture() -> Fixture {
        let config = CredentialConfig::new(Secret::new("verifier-secret".to_string())).unwrap();
        let clock = Arc::new(ManualClock::new(NOW));
        let codec = Arc::new(CredentialCodec::new(&config, clock.clone()));
        let identities = Arc::new(MemoryIdentityStore::new(vec![TrustedIdentity {
            email: "a@example.com".into(),
            name: "A".into(),
        }]));
        let revocations = Arc::new(MemoryRevocationStore::new());

        Fixture {
            issuer: CredentialIssuer::new(codec.clone(), &config),
            verifier: CredentialVerifier::new(
                codec,
                identities,
                revocations.clone(),
                clock.clone(),
            ),
            clock,
            revocations,
        }
    }

    fn rejection(result: Result<Claims>) -> Rejection {
        match result {
            Err(Error::Unauthorized(r)) => r,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    /// Store whose every call fails, as if the backend were unreachable.
    struct DownStore;

    impl IdentityStore for DownStore {
        fn exists<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async { Err(stores::Error::Unavailable("identity store down".into())) })
        }

        fn count(&self) -> StoreFuture<'_, usize> {
            Box::pin(async { Err(stores::Error::Unavailable("identity store down".into())) })
        }
    }

    impl RevocationStore for DownStore {
        fn contains<'a>(&'a self, _token: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async { Err(stores::Error::Unavailable("revocation store down".into())) })
        }

        fn insert(&self, _token: String) -> StoreFuture<'_, ()> {
            Box::pin(async { Err(stores::Error::Unavailable("revocation store down".into())) })
        }

        fn count(&self) -> StoreFuture<'_, usize> {
            Box::pin(async { Err(stores::Error::Unavailable("revocation store down".into())) })
        }
    }

    #[tokio::test]
    async fn fresh_access_credential_verifies() {
        let f = fixture();
        let access = f.issuer.issue_access("a@example.com").unwrap();

        let claims = f
            .verifier
            .verify(&access.token, CredentialKind::Access)
            .await
            .unwrap();
        assert_eq!(claims.sub, "a@example.com");
    }

    #[tokio::test]
    async fn expiry_boundary_is_exact() {
        let f = fixture();
        let access = f.issuer.issue_access("a@example.com").unwrap();
        let exp = access.claims.exp;

        f.clock.set(exp - 1);
        assert!(f.verifier.verify(&access.token, CredentialKind::Access).await.is_ok());

        f.clock.set(exp);
        let result = f.verifier.verify(&access.token, CredentialKind::Access).await;
        assert_eq!(rejection(result), Rejection::Expired);
    }

    #[tokio::test]
    async fn revoked_credential_fails_even_if_valid() {
        let f = fixture();
        let access = f.issuer.issue_access("a@example.com").unwrap();
        f.revocations.insert(access.token.clone()).await.unwrap();

        for kind in [CredentialKind::Access, CredentialKind::Refresh] {
            let result = f.verifier.verify(&access.token, kind).await;
            assert_eq!(rejection(result), Rejection::Revoked);
        }
    }

    #[tokio::test]
    async fn revocation_is_checked_before_signature() {
        let f = fixture();
        f.revocations.insert("garbage".into()).await.unwrap();

        let result = f.verifier.verify("garbage", CredentialKind::Access).await;
        assert_eq!(rejection(result), Rejection::Revoked);
    }

    #[tokio::test]
    async fn kind_confusion_is_rejected_both_ways() {
        let f = fixture();
        let pair = f.issuer.issue_pair("a@example.com").unwrap();

        let result = f.verifier.verify(&pair.refresh.token, CredentialKind::Access).await;
        assert_eq!(rejection(result), Rejection::KindMismatch);

        let result = f.verifier.verify(&pair.access.token, CredentialKind::Refresh).await;
        assert_eq!(rejection(result), Rejection::KindMismatch);
    }

    #[tokio::test]
    async fn kind_is_checked_before_expiry() {
        let f = fixture();
        let access = f.issuer.issue_access("a@example.com").unwrap();
        f.clock.advance(Duration::from_secs(3_600));

        let result = f.verifier.verify(&access.token, CredentialKind::Refresh).await;
        assert_eq!(rejection(result), Rejection::KindMismatch);
    }

    #[tokio::test]
    async fn untrusted_subject_is_rejected() {
        let f = fixture();
        let access = f.issuer.issue_access("x@nowhere.com").unwrap();

        let result = f.verifier.verify(&access.token, CredentialKind::Access).await;
        assert_eq!(rejection(result), Rejection::UntrustedIdentity);
    }

    #[tokio::test]
    async fn expired_untrusted_reports_expired() {
        let f = fixture();
        let access = f.issuer.issue_access("x@nowhere.com").unwrap();
        f.clock.advance(Duration::from_secs(15 * 60));

        let result = f.verifier.verify(&access.token, CredentialKind::Access).await;
        assert_eq!(rejection(result), Rejection::Expired);
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let f = fixture();
        let result = f.verifier.verify("definitely.not.jwt", CredentialKind::Access).await;
        assert_eq!(rejection(result), Rejection::Malformed);
    }

    #[tokio::test]
    async fn tampered_token_never_verifies() {
        let f = fixture();
        let access = f.issuer.issue_access("a@example.com").unwrap();
        let bytes = access.token.as_bytes();

        // Flip one character at a time across header, payload and signature
        for i in (0..bytes.len()).step_by(7) {
            if bytes[i] == b'.' {
                continue;
            }
            let mut tampered = bytes.to_vec();
            tampered[i] = if bytes[i] == b'x' { b'y' } else { b'x' };
            let tampered = String::from_utf8(tampered).unwrap();

            let result = f.verifier.verify(&tampered, CredentialKind::Access).await;
            assert!(
                matches!(
                    result,
                    Err(Error::Unauthorized(Rejection::SignatureInvalid))
                        | Err(Error::Unauthorized(Rejection::Malformed))
                ),
                "tampering at {i} must fail, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn revocation_store_failure_is_not_a_rejection() {
        let config = CredentialConfig::new(Secret::new("s".to_string())).unwrap();
        let clock = Arc::new(ManualClock::new(NOW));
        let codec = Arc::new(CredentialCodec::new(&config, clock.clone()));
        let issuer = CredentialIssuer::new(codec.clone(), &config);
        let verifier = CredentialVerifier::new(
            codec,
            Arc::new(MemoryIdentityStore::default()),
            Arc::new(DownStore),
            clock,
        );

        let access = issuer.issue_access("a@example.com").unwrap();
        let result = verifier.verify(&access.token, CredentialKind::Access).await;
        assert!(matches!(result, Err(Error::Store(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn identity_store_failure_is_not_a_rejection() {
        let config = CredentialConfig::new(Secret::new("s".to_string())).unwrap();
        let clock = Arc::new(ManualClock::new(NOW));
        let codec = Arc::new(CredentialCodec::new(&config, clock.clone()));
        let issuer = CredentialIssuer::new(codec.clone(), &config);
        let verifier = CredentialVerifier::new(
            codec,
            Arc::new(DownStore),
            Arc::new(MemoryRevocationStore::new()),
            clock,
        );

        let access = issuer.issue_access("a@example.com").unwrap();
        let result = verifier.verify(&access.token, CredentialKind::Access).await;
        assert!(matches!(result, Err(Error::Store(_))), "got {result:?}");
    }
}
