//! Credential claims

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which flow a credential may be used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    /// Short-lived, authorizes resource access
    Access,
    /// Long-lived, only mints new access credentials
    Refresh,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Access => "access",
            CredentialKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed payload of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity key the credential asserts
    pub sub: String,
    pub kind: CredentialKind,
    /// Issued-at, seconds since epoch
    pub iat: u64,
    /// Absolute expiry, seconds since epoch (exclusive)
    pub exp: u64,
    /// Unique id, so credentials minted in the same second never collide
    pub jti: String,
}

impl Claims {
    /// A credential is usable strictly before `exp`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.exp
    }

    /// Seconds left before expiry at `now` (0 once expired).
    pub fn expires_in(&self, now: u64) -> u64 {
        self.exp.saturating_sub(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: u64) -> Claims {
        Claims {
            sub: "a@example.com".into(),
            kind: CredentialKind::Access,
            iat: 100,
            exp,
            jti: "id".into(),
        }
    }

    #[test]
    fn expiry_is_exclusive() {
        let c = claims(1_000);
        assert!(!c.is_expired_at(999));
        assert!(c.is_expired_at(1_000));
        assert!(c.is_expired_at(1_001));
    }

    #[test]
    fn expires_in_saturates() {
        let c = claims(1_000);
        assert_eq!(c.expires_in(400), 600);
        assert_eq!(c.expires_in(2_000), 0);
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&claims(1)).unwrap();
        assert!(json.contains("\"kind\":\"access\""), "got: {json}");

        let refresh: CredentialKind = serde_json::from_str("\"refresh\"").unwrap();
        assert_eq!(refresh, CredentialKind::Refresh);
        assert!(serde_json::from_str::<CredentialKind>("\"ACCESS\"").is_err());
    }
}
