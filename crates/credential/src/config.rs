//! Signing configuration passed explicitly to the codec and issuer

use std::time::Duration;

use common::Secret;
use jsonwebtoken::Algorithm;

use crate::error::{Error, Result};

/// Default signing algorithm
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Default access credential lifetime: 15 minutes
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh credential lifetime: 30 days
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Immutable signing configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    secret: Secret<String>,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl CredentialConfig {
    /// Configuration with the default algorithm and lifetimes.
    ///
    /// A blank secret is refused: a gateway without a signing key must not start.
    pub fn new(secret: Secret<String>) -> Result<Self> {
        if secret.is_blank() {
            return Err(Error::Config("signing secret must not be empty".into()));
        }
        Ok(Self {
            secret,
            algorithm: DEFAULT_ALGORITHM,
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        })
    }

    /// Use a different HMAC algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Result<Self> {
        if !is_hmac(algorithm) {
            return Err(Error::Config(format!(
                "algorithm {algorithm:?} is not supported, expected HS256, HS384 or HS512"
            )));
        }
        self.algorithm = algorithm;
        Ok(self)
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Result<Self> {
        self.access_ttl = whole_seconds("access", ttl)?;
        Ok(self)
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Result<Self> {
        self.refresh_ttl = whole_seconds("refresh", ttl)?;
        Ok(self)
    }

    pub fn secret(&self) -> &Secret<String> {
        &self.secret
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

/// Parse an algorithm name, accepting only the HMAC family.
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    let algorithm: Algorithm = name
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("unknown signing algorithm: {name}")))?;
    if !is_hmac(algorithm) {
        return Err(Error::Config(format!(
            "algorithm {name} needs a key pair, only HS256, HS384 and HS512 are supported"
        )));
    }
    Ok(algorithm)
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

/// Claims carry whole seconds, so a lifetime must be a non-zero whole number of seconds.
fn whole_seconds(kind: &str, ttl: Duration) -> Result<Duration> {
    if ttl.as_secs() == 0 {
        return Err(Error::Config(format!(
            "{kind} credential lifetime must be at least one second"
        )));
    }
    if ttl.subsec_nanos() != 0 {
        return Err(Error::Config(format!(
            "{kind} credential lifetime must be a whole number of seconds, got {ttl:?}"
        )));
    }
    Ok(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Secret<String> {
        Secret::new(s.to_string())
    }

    #[test]
    fn defaults_match_documented_lifetimes() {
        let config = CredentialConfig::new(secret("k")).unwrap();
        assert_eq!(config.algorithm(), Algorithm::HS256);
        assert_eq!(config.access_ttl(), Duration::from_secs(900));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(2_592_000));
    }

    #[test]
    fn blank_secret_is_refused() {
        assert!(CredentialConfig::new(secret("")).is_err());
        assert!(CredentialConfig::new(secret("   ")).is_err());
    }

    #[test]
    fn zero_lifetimes_are_refused() {
        let config = CredentialConfig::new(secret("k")).unwrap();
        assert!(config.clone().with_access_ttl(Duration::ZERO).is_err());
        assert!(config.with_refresh_ttl(Duration::from_millis(500)).is_err());
    }

    #[test]
    fn fractional_lifetimes_are_refused() {
        let config = CredentialConfig::new(secret("k")).unwrap();
        assert!(config.clone().with_access_ttl(Duration::from_millis(1500)).is_err());
        assert!(config.clone().with_refresh_ttl(Duration::from_nanos(60_000_000_001)).is_err());
        assert_eq!(
            config
                .with_access_ttl(Duration::from_millis(2000))
                .unwrap()
                .access_ttl(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn only_hmac_algorithms_parse() {
        assert_eq!(parse_algorithm("HS256").unwrap(), Algorithm::HS256);
        assert_eq!(parse_algorithm("HS512").unwrap(), Algorithm::HS512);
        assert!(parse_algorithm("RS256").is_err());
        assert!(parse_algorithm("none").is_err());
        assert!(parse_algorithm("hs256-ish").is_err());
    }

    #[test]
    fn with_algorithm_rejects_asymmetric() {
        let config = CredentialConfig::new(secret("k")).unwrap();
        assert!(config.clone().with_algorithm(Algorithm::ES256).is_err());
        assert_eq!(
            config.with_algorithm(Algorithm::HS384).unwrap().algorithm(),
            Algorithm::HS384
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let config = CredentialConfig::new(secret("super-secret")).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
