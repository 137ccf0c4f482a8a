//! Snapshot store persisting one JSON document per username
//!
//! Provides a `SnapshotStore` that keeps each user's snapshot in
//! `<dir>/<username>.json`. Writes go through a temporary file and a rename so
//! that a concurrent reader sees either the previous or the new document,
//! never a partial one.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use directories::ProjectDirs;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::username::Username;
use crate::snapshot::Snapshot;

/// File extension used for stored snapshots
const SNAPSHOT_EXT: &str = "json";

/// Distinguishes temporary files written concurrently by this process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Errors that can occur when reading or writing snapshots
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot is stored under this username
    #[error("no snapshot stored for {0}")]
    NotFound(Username),

    /// The stored file exists but is not a valid JSON document
    #[error("snapshot for {username} is not valid JSON: {source}")]
    Corrupt {
        username: Username,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem access failed
    #[error("store I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Maps usernames to JSON snapshot files on disk
///
/// The store is passive: it never fetches or expires anything. Entries are
/// created and overwritten by `write` and are never deleted.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    /// Directory holding `<username>.json` files
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store in the platform data directory
    ///
    /// Uses `~/.local/share/statkeeper/stats/` on Linux, or the equivalent
    /// XDG path on other platforms. Returns `None` if no home directory can
    /// be determined.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "statkeeper")?;
        let dir = project_dirs.data_dir().join("stats");
        Some(Self { dir })
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self, username: &Username) -> PathBuf {
        self.dir.join(format!("{}.{}", username, SNAPSHOT_EXT))
    }

    /// Hidden sibling of the snapshot file; never listed as a key
    fn temp_path(&self, username: &Username) -> PathBuf {
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}.{}.{}-{}.tmp",
            username,
            SNAPSHOT_EXT,
            std::process::id(),
            seq
        ))
    }

    /// Returns true if a snapshot file exists for `username`
    pub async fn exists(&self, username: &Username) -> bool {
        fs::metadata(self.snapshot_path(username))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Reads the snapshot stored for `username`
    ///
    /// # Returns
    /// * `Ok(Snapshot)` with the complete stored document
    /// * `Err(StoreError::NotFound)` if nothing is stored
    /// * `Err(StoreError::Corrupt)` if the file does not parse as JSON
    pub async fn read(&self, username: &Username) -> Result<Snapshot, StoreError> {
        let bytes = match fs::read(self.snapshot_path(username)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(username.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            username: username.clone(),
            source,
        })
    }

    /// Writes `snapshot` for `username`, replacing any previous document
    ///
    /// Creates the store directory if it is missing. The document is written
    /// to a temporary file, synced, then renamed over the target.
    pub async fn write(&self, username: &Username, snapshot: &Snapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp = self.temp_path(username);
        if let Err(err) = write_synced(&temp, &json).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&temp, self.snapshot_path(username)).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }

        Ok(())
    }

    /// Lists every username with a stored snapshot, sorted
    ///
    /// Files whose stem is not a valid username (including in-progress
    /// temporary files) are skipped. A missing directory lists as empty.
    pub async fn list_keys(&self) -> Result<Vec<Username>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(username) = Username::parse(stem) {
                keys.push(username);
            }
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

async fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
