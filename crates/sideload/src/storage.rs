//! The sideload storage abstraction: a keyed blob store indexed by Raft
//! `(index, term)`, with an on-disk and an in-memory implementation sharing
//! one contract.

use crate::config::{entry_path, parse_entry_filename, SideloadConfig, SideloadIdentity};
use crate::error::{SideloadError, SideloadResult};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Result of a [`SideloadStorage::truncate_to`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TruncateStats {
    pub freed_bytes: u64,
    pub retained_bytes: u64,
}

/// A keyed blob store for sideloaded payloads, indexed by `(index, term)`.
///
/// Implementations are expected to be called under a per-replica mutex held
/// by the Raft processing loop (see the crate-level concurrency notes);
/// this trait itself only guarantees that its own bookkeeping (directory
/// creation on the disk variant) is internally synchronized.
pub trait SideloadStorage: Send + Sync {
    /// Writes `payload` at `(index, term)`, overwriting any existing value.
    fn put(&self, index: u64, term: u64, payload: Vec<u8>) -> SideloadResult<()>;

    /// Reads the payload at `(index, term)`. Never creates backing storage;
    /// an absent key is `SideloadError::NotFound`, not an I/O error.
    fn get(&self, index: u64, term: u64) -> SideloadResult<Vec<u8>>;

    /// Deletes one entry. Does not remove the backing directory even if it
    /// becomes empty as a result (disk variant).
    fn purge(&self, index: u64, term: u64) -> SideloadResult<()>;

    /// Deletes every entry with `index < first_index`, at every term. If no
    /// entries remain afterward, removes the backing directory (disk
    /// variant). A no-op, not an error, if the backing directory never
    /// existed.
    fn truncate_to(&self, first_index: u64) -> SideloadResult<TruncateStats>;

    /// Removes every entry and the backing directory.
    fn clear(&self) -> SideloadResult<()>;

    /// The absolute path backing `(index, term)`. Disk-only.
    fn filename(&self, index: u64, term: u64) -> SideloadResult<PathBuf>;

    /// The storage's root path (disk variant) or a diagnostic stand-in
    /// (in-memory variant).
    fn dir(&self) -> PathBuf;
}

/// On-disk sideload storage, rooted at a directory deterministically named
/// after the replica identity.
pub struct DiskSideloadStorage {
    config: SideloadConfig,
    /// Tracks whether the root directory is known to exist, so repeated
    /// `put`s don't re-issue `create_dir_all`. Starts `false` even when
    /// opening over an existing on-disk layout; the directory is
    /// discovered lazily on first use, never assumed from construction.
    dir_created: Mutex<bool>,
}

impl DiskSideloadStorage {
    pub fn new(config: SideloadConfig) -> Self {
        Self {
            config,
            dir_created: Mutex::new(false),
        }
    }

    pub fn identity(&self) -> SideloadIdentity {
        self.config.identity
    }

    pub fn config(&self) -> &SideloadConfig {
        &self.config
    }

    fn ensure_dir(&self) -> SideloadResult<()> {
        let mut created = self.dir_created.lock().unwrap();
        if !*created {
            fs::create_dir_all(self.config.dir())?;
            *created = true;
        }
        Ok(())
    }

    fn mark_dir_absent(&self) {
        *self.dir_created.lock().unwrap() = false;
    }
}

impl SideloadStorage for DiskSideloadStorage {
    fn put(&self, index: u64, term: u64, payload: Vec<u8>) -> SideloadResult<()> {
        self.ensure_dir()?;
        let dir = self.config.dir();
        let path = entry_path(&dir, index, term);
        let tmp_path = dir.join(format!(".i{index}t{term}.tmp"));
        fs::write(&tmp_path, &payload)?;
        fs::rename(&tmp_path, &path)?;
        tracing::trace!(index, term, bytes = payload.len(), "sideload payload put");
        Ok(())
    }

    fn get(&self, index: u64, term: u64) -> SideloadResult<Vec<u8>> {
        let path = entry_path(&self.config.dir(), index, term);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SideloadError::NotFound { index, term })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn purge(&self, index: u64, term: u64) -> SideloadResult<()> {
        let path = entry_path(&self.config.dir(), index, term);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::trace!(index, term, "sideload payload purged");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SideloadError::NotFound { index, term })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn truncate_to(&self, first_index: u64) -> SideloadResult<TruncateStats> {
        let dir = self.config.dir();
        if !dir.exists() {
            return Ok(TruncateStats::default());
        }

        let mut stats = TruncateStats::default();
        let mut retained_entries = 0u64;
        let mut foreign_present = false;

        for dir_entry in fs::read_dir(&dir)? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name();
            let name = name.to_string_lossy();
            match parse_entry_filename(&name) {
                Some((index, _term)) => {
                    let len = dir_entry.metadata()?.len();
                    if index < first_index {
                        fs::remove_file(dir_entry.path())?;
                        stats.freed_bytes += len;
                    } else {
                        stats.retained_bytes += len;
                        retained_entries += 1;
                    }
                }
                None => foreign_present = true,
            }
        }

        if retained_entries == 0 {
            match fs::remove_dir(&dir) {
                Ok(()) => self.mark_dir_absent(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => self.mark_dir_absent(),
                Err(_) if foreign_present => {
                    return Err(SideloadError::DirectoryNotEmpty { path: dir });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(
            first_index,
            freed_bytes = stats.freed_bytes,
            retained_bytes = stats.retained_bytes,
            "sideload storage truncated"
        );
        Ok(stats)
    }

    fn clear(&self) -> SideloadResult<()> {
        let dir = self.config.dir();
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.mark_dir_absent();
        Ok(())
    }

    fn filename(&self, index: u64, term: u64) -> SideloadResult<PathBuf> {
        let path = entry_path(&self.config.dir(), index, term);
        if path.exists() {
            Ok(path)
        } else {
            Err(SideloadError::NotFound { index, term })
        }
    }

    fn dir(&self) -> PathBuf {
        self.config.dir()
    }
}

/// In-memory sideload storage. Identical externally observable semantics to
/// [`DiskSideloadStorage`], except there is no backing directory to create
/// or remove, and [`SideloadStorage::filename`] is unsupported.
pub struct MemSideloadStorage {
    identity: SideloadIdentity,
    entries: Mutex<BTreeMap<(u64, u64), Vec<u8>>>,
}

impl MemSideloadStorage {
    pub fn new(identity: SideloadIdentity) -> Self {
        Self {
            identity,
            entries: Mutex::new(BTreeMap::new()),
        }
    }
}

impl SideloadStorage for MemSideloadStorage {
    fn put(&self, index: u64, term: u64, payload: Vec<u8>) -> SideloadResult<()> {
        self.entries.lock().unwrap().insert((index, term), payload);
        Ok(())
    }

    fn get(&self, index: u64, term: u64) -> SideloadResult<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(&(index, term))
            .cloned()
            .ok_or(SideloadError::NotFound { index, term })
    }

    fn purge(&self, index: u64, term: u64) -> SideloadResult<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(index, term))
            .map(|_| ())
            .ok_or(SideloadError::NotFound { index, term })
    }

    fn truncate_to(&self, first_index: u64) -> SideloadResult<TruncateStats> {
        let mut entries = self.entries.lock().unwrap();
        let mut stats = TruncateStats::default();
        let stale: Vec<(u64, u64)> = entries
            .keys()
            .filter(|(index, _term)| *index < first_index)
            .copied()
            .collect();
        for key in stale {
            if let Some(bytes) = entries.remove(&key) {
                stats.freed_bytes += bytes.len() as u64;
            }
        }
        stats.retained_bytes = entries.values().map(|b| b.len() as u64).sum();
        Ok(stats)
    }

    fn clear(&self) -> SideloadResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }

    fn filename(&self, _index: u64, _term: u64) -> SideloadResult<PathBuf> {
        Err(SideloadError::FilenameUnsupported)
    }

    fn dir(&self) -> PathBuf {
        PathBuf::from(format!(
            "mem://sideload_{}_{}",
            self.identity.range_id, self.identity.replica_id
        ))
    }
}
