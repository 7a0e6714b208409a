//! Glue between sideload storage and the surrounding replica lifecycle:
//! log truncation and replica-identity changes.

use crate::config::SideloadIdentity;
use crate::error::SideloadResult;
use crate::storage::{DiskSideloadStorage, SideloadStorage, TruncateStats};
use std::fs;

/// Reclaims sideloaded payloads for entries the log truncation machinery
/// has dropped. A thin, named wrapper over
/// [`SideloadStorage::truncate_to`] so callers have one obvious place to
/// call from.
pub fn truncate(storage: &dyn SideloadStorage, first_kept_index: u64) -> SideloadResult<TruncateStats> {
    storage.truncate_to(first_kept_index)
}

/// Relocates a replica's sideload storage to a new identity, preserving
/// every payload already written.
///
/// If the old directory was never created (nothing has been sideloaded
/// yet for this replica), there is nothing to move; the returned storage
/// simply starts fresh at the new identity's directory.
pub fn rekey(
    storage: DiskSideloadStorage,
    new_identity: SideloadIdentity,
) -> SideloadResult<DiskSideloadStorage> {
    let old_dir = storage.dir();
    let new_config = storage.config().with_identity(new_identity);
    let new_dir = new_config.dir();

    if old_dir.exists() {
        if let Some(parent) = new_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&old_dir, &new_dir)?;
        tracing::debug!(
            old = %old_dir.display(),
            new = %new_dir.display(),
            "sideload storage rekeyed"
        );
    }

    Ok(DiskSideloadStorage::new(new_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SideloadConfig;
    use tempfile::tempdir;

    fn disk_storage(base: &std::path::Path, range_id: u64, replica_id: u64) -> DiskSideloadStorage {
        let config = SideloadConfig::builder()
            .base_dir(base.to_path_buf())
            .identity(SideloadIdentity::new(range_id, replica_id))
            .build();
        DiskSideloadStorage::new(config)
    }

    #[test]
    fn truncate_delegates_to_storage() {
        let dir = tempdir().unwrap();
        let storage = disk_storage(dir.path(), 1, 1);
        storage.put(1, 1, vec![1]).unwrap();
        storage.put(5, 1, vec![2]).unwrap();
        let stats = truncate(&storage, 5).unwrap();
        assert_eq!(stats.freed_bytes, 1);
        assert!(storage.get(1, 1).is_err());
        assert!(storage.get(5, 1).is_ok());
    }

    #[test]
    fn rekey_preserves_payloads_under_new_identity() {
        let dir = tempdir().unwrap();
        let storage = disk_storage(dir.path(), 1, 1);
        storage.put(1, 1, b"keep-me".to_vec()).unwrap();
        let old_dir = storage.dir();

        let rekeyed = rekey(storage, SideloadIdentity::new(1, 2)).unwrap();

        assert!(!old_dir.exists());
        assert_eq!(rekeyed.get(1, 1).unwrap(), b"keep-me");
        assert_eq!(rekeyed.identity(), SideloadIdentity::new(1, 2));
    }

    #[test]
    fn rekey_with_no_prior_writes_starts_fresh() {
        let dir = tempdir().unwrap();
        let storage = disk_storage(dir.path(), 1, 1);
        let rekeyed = rekey(storage, SideloadIdentity::new(1, 2)).unwrap();
        assert!(rekeyed.get(1, 1).is_err());
    }
}
