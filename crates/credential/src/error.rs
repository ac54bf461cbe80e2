//! Error types for the credential engine

/// Why a credential or login was refused.
///
/// Kept for logs and metrics only. The transport boundary reports every
/// variant identically so callers cannot tell which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("credential is malformed")]
    Malformed,

    #[error("credential signature is invalid")]
    SignatureInvalid,

    #[error("credential has expired")]
    Expired,

    #[error("credential has been revoked")]
    Revoked,

    #[error("identity is not trusted")]
    UntrustedIdentity,

    #[error("credential kind does not match its use")]
    KindMismatch,

    #[error("identity assertion was rejected")]
    AssertionRejected,

    #[error("credential belongs to a different identity")]
    SubjectMismatch,
}

impl Rejection {
    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::SignatureInvalid => "signature_invalid",
            Rejection::Expired => "expired",
            Rejection::Revoked => "revoked",
            Rejection::UntrustedIdentity => "untrusted_identity",
            Rejection::KindMismatch => "kind_mismatch",
            Rejection::AssertionRejected => "assertion_rejected",
            Rejection::SubjectMismatch => "subject_mismatch",
        }
    }
}

/// Errors from credential operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] Rejection),

    #[error("store failure: {0}")]
    Store(#[from] stores::Error),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid credential configuration: {0}")]
    Config(String),
}

impl Error {
    /// The rejection reason, if this is an authentication failure rather than a fault.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Error::Unauthorized(r) => Some(*r),
            _ => None,
        }
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
