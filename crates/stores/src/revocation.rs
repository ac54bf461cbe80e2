//! Revocation store (token blacklist)
//!
//! Records the exact serialized form of revoked credentials. The blacklist is
//! monotonic: entries are never removed, expired or not.
//!
//! `FileRevocationStore` persists the set as a JSON array. Inserts are
//! committed to memory only after the file write succeeds, so a `contains`
//! racing an `insert` sees either the state before the revocation or the
//! durable state after it. Reads run concurrently and never wait on disk.

use std::collections::HashSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::StoreFuture;
use crate::error::{Error, Result};

/// Membership queries and insertion for revoked tokens.
pub trait RevocationStore: Send + Sync {
    /// Whether the exact serialized token has been revoked.
    fn contains<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool>;

    /// Record a token as revoked. Inserting an already-revoked token is a no-op.
    fn insert(&self, token: String) -> StoreFuture<'_, ()>;

    /// Number of revoked tokens (health reporting).
    fn count(&self) -> StoreFuture<'_, usize>;
}

/// Volatile blacklist for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    tokens: RwLock<HashSet<String>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevocationStore for MemoryRevocationStore {
    fn contains<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.tokens.read().await.contains(token)) })
    }

    fn insert(&self, token: String) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.tokens.write().await.insert(token);
            Ok(())
        })
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move { Ok(self.tokens.read().await.len()) })
    }
}

/// Blacklist persisted to a JSON file.
///
/// Readers share `tokens` and never wait on disk I/O. `writer` serializes
/// inserts: the next set is written out first and swapped in afterwards,
/// so the read lock is only ever held in memory.
pub struct FileRevocationStore {
    path: PathBuf,
    tokens: RwLock<HashSet<String>>,
    writer: Mutex<()>,
}

impl FileRevocationStore {
    /// Load the blacklist from `path`.
    ///
    /// A missing file is a cold start: it is created as `[]`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let tokens = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let tokens: HashSet<String> = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;
                info!(path = %path.display(), revoked = tokens.len(), "loaded revocation list");
                tokens
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no revocation list yet, starting empty");
                let tokens = HashSet::new();
                persist(&path, &tokens).await?;
                tokens
            }
            Err(e) => return Err(Error::Io(format!("{}: {e}", path.display()))),
        };

        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
            writer: Mutex::new(()),
        })
    }
}

impl RevocationStore for FileRevocationStore {
    fn contains<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.tokens.read().await.contains(token)) })
    }

    fn insert(&self, token: String) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _writer = self.writer.lock().await;

            let next = {
                let tokens = self.tokens.read().await;
                if tokens.contains(&token) {
                    return Ok(());
                }
                let mut next = tokens.clone();
                next.insert(token);
                next
            };

            // Visible to readers only once durable
            persist(&self.path, &next).await?;
            let revoked = next.len();
            *self.tokens.write().await = next;
            debug!(revoked, "recorded revoked token");
            Ok(())
        })
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move { Ok(self.tokens.read().await.len()) })
    }
}

/// Replace the blacklist file with `tokens` as a sorted JSON array.
///
/// The sibling temp file is created owner-only, flushed to disk, then renamed
/// over `path`, so a crash leaves either the old list or the new one.
async fn persist(path: &Path, tokens: &HashSet<String>) -> Result<()> {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut body = serde_json::to_vec_pretty(&sorted)
        .map_err(|e| Error::Parse(format!("serializing revocation list: {e}")))?;
    body.push(b'\n');

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io(format!("{} is not a file path", path.display())))?;
    let mut tmp_name = OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let io_err = |stage: &str, e: std::io::Error| {
        Error::Io(format!("{stage} {}: {e}", tmp_path.display()))
    };
    let mut file = options
        .open(&tmp_path)
        .await
        .map_err(|e| io_err("creating", e))?;
    file.write_all(&body)
        .await
        .map_err(|e| io_err("writing", e))?;
    file.sync_all().await.map_err(|e| io_err("syncing", e))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("replacing {}: {e}", path.display())))?;

    debug!(path = %path.display(), revoked = sorted.len(), "persisted revocation list");
    Ok(())
}
