//! Trusted identity store
//!
//! The authoritative set of identities allowed to receive credentials. Entries
//! are provisioned out-of-band (config seeds or a JSON seed file) and never
//! mutated by the credential engine itself.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::StoreFuture;
use crate::error::{Error, Result};

/// An identity permitted to receive credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedIdentity {
    /// Stable identity key (the verified email address)
    pub email: String,
    /// Display label
    pub name: String,
}

/// Seed file entry: `{"alice@example.com": {"name": "Alice"}}`
#[derive(Debug, Deserialize)]
struct SeedEntry {
    name: String,
}

/// Membership queries against the trust set.
pub trait IdentityStore: Send + Sync {
    /// Whether `key` is in the trust set.
    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Number of trusted identities (health reporting).
    fn count(&self) -> StoreFuture<'_, usize>;
}

/// In-memory trust set, optionally seeded from a JSON file.
///
/// Reads take a shared lock; provisioning takes the exclusive lock, so a
/// membership check never observes a half-applied insert.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<String, TrustedIdentity>>,
}

impl MemoryIdentityStore {
    pub fn new(seed: impl IntoIterator<Item = TrustedIdentity>) -> Self {
        let identities = seed
            .into_iter()
            .map(|identity| (identity.email.clone(), identity))
            .collect();
        Self {
            identities: RwLock::new(identities),
        }
    }

    /// Load a seed file mapping email to `{ "name": ... }` and merge `extra`.
    ///
    /// Entries from `extra` win on duplicate keys.
    pub async fn load(path: &Path, extra: Vec<TrustedIdentity>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Io(format!("reading identity seed file: {e}")))?;
        let seed: HashMap<String, SeedEntry> = serde_json::from_str(&contents)
            .map_err(|e| Error::Parse(format!("parsing identity seed file: {e}")))?;

        let mut identities: Vec<TrustedIdentity> = seed
            .into_iter()
            .map(|(email, entry)| TrustedIdentity {
                email,
                name: entry.name,
            })
            .collect();
        identities.extend(extra);

        info!(path = %path.display(), identities = identities.len(), "loaded trusted identities");
        Ok(Self::new(identities))
    }

    /// Provision (or relabel) an identity.
    pub async fn insert(&self, identity: TrustedIdentity) {
        let mut identities = self.identities.write().await;
        debug!(email = %identity.email, "provisioned trusted identity");
        identities.insert(identity.email.clone(), identity);
    }

    /// Look up an identity's full record.
    pub async fn get(&self, key: &str) -> Option<TrustedIdentity> {
        self.identities.read().await.get(key).cloned()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.identities.read().await.contains_key(key)) })
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move { Ok(self.identities.read().await.len()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str, name: &str) -> TrustedIdentity {
        TrustedIdentity {
            email: email.into(),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn seeded_identity_exists() {
        let store = MemoryIdentityStore::new(vec![identity("a@example.com", "A")]);
        assert!(store.exists("a@example.com").await.unwrap());
        assert!(!store.exists("x@nowhere.com").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn membership_is_exact_match() {
        let store = MemoryIdentityStore::new(vec![identity("a@example.com", "A")]);
        assert!(!store.exists("A@example.com").await.unwrap());
        assert!(!store.exists("a@example.com ").await.unwrap());
        assert!(!store.exists("").await.unwrap());
    }

    #[tokio::test]
    async fn insert_provisions_new_identity() {
        let store = MemoryIdentityStore::default();
        assert!(!store.exists("b@example.com").await.unwrap());

        store.insert(identity("b@example.com", "B")).await;
        assert!(store.exists("b@example.com").await.unwrap());
        assert_eq!(store.get("b@example.com").await.unwrap().name, "B");
    }

    #[tokio::test]
    async fn load_merges_seed_file_and_extra() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        tokio::fs::write(
            &path,
            r#"{"a@example.com": {"name": "From File"}, "c@example.com": {"name": "C"}}"#,
        )
        .await
        .unwrap();

        let store = MemoryIdentityStore::load(&path, vec![identity("a@example.com", "From Config")])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.get("a@example.com").await.unwrap().name, "From Config");
        assert!(store.exists("c@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn load_missing_file_errors() {
        let result = MemoryIdentityStore::load(Path::new("/nonexistent/identities.json"), vec![]).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn load_invalid_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        tokio::fs::write(&path, "[not a map]").await.unwrap();

        let result = MemoryIdentityStore::load(&path, vec![]).await;
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
