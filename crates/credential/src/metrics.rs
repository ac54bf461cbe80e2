//! Credential lifecycle metrics
//!
//! - `credentials_issued_total` (counter): label `kind`
//! - `credential_verifications_total` (counter): labels `flow`, `outcome`, `reason`
//! - `credentials_revoked_total` (counter)
//!
//! Calls are no-ops until the binary installs a recorder.

use crate::claims::CredentialKind;
use crate::error::Error;

pub fn record_issued(kind: CredentialKind) {
    metrics::counter!("credentials_issued_total", "kind" => kind.as_str()).increment(1);
}

/// Record the outcome of a session flow (`login`, `refresh`, `access`, `logout`).
pub fn record_outcome(flow: &'static str, outcome: std::result::Result<(), &Error>) {
    let (result, reason) = match outcome {
        Ok(()) => ("accepted", "none"),
        Err(Error::Unauthorized(rejection)) => ("rejected", rejection.as_str()),
        Err(Error::Store(_)) => ("error", "store"),
        Err(Error::Signing(_)) => ("error", "signing"),
        Err(Error::Config(_)) => ("error", "config"),
    };
    metrics::counter!(
        "credential_verifications_total",
        "flow" => flow,
        "outcome" => result,
        "reason" => reason
    )
    .increment(1);
}

pub fn record_revoked() {
    metrics::counter!("credentials_revoked_total").increment(1);
}
