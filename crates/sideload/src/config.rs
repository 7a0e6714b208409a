//! Replica identity and sideload storage configuration.

use std::path::{Path, PathBuf};

/// Identifies the replica a sideload storage instance belongs to.
///
/// Immutable for the lifetime of one storage instance; a change of
/// identity (e.g. a replica gaining a non-zero `replica_id`) is handled by
/// [`crate::lifecycle::rekey`], not by mutating this struct in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SideloadIdentity {
    pub range_id: u64,
    pub replica_id: u64,
}

impl SideloadIdentity {
    pub fn new(range_id: u64, replica_id: u64) -> Self {
        Self {
            range_id,
            replica_id,
        }
    }

    /// The deterministic directory name for this identity, rooted at some
    /// replica base directory.
    pub fn dir_name(&self) -> String {
        format!("sideload_{}_{}", self.range_id, self.replica_id)
    }
}

/// Configuration for a sideload storage instance.
///
/// # Example
/// ```
/// use sideload::SideloadConfig;
/// use sideload::SideloadIdentity;
/// use std::path::PathBuf;
///
/// let config = SideloadConfig::builder()
///     .base_dir(PathBuf::from("/var/lib/store/replicas"))
///     .identity(SideloadIdentity::new(42, 1))
///     .build();
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct SideloadConfig {
    /// Directory under which every replica's sideload directory is rooted.
    pub base_dir: PathBuf,
    /// The identity of the replica this storage serves.
    pub identity: SideloadIdentity,
}

impl SideloadConfig {
    /// The deterministic root directory this configuration resolves to:
    /// `{base_dir}/sideload_{range_id}_{replica_id}`.
    pub fn dir(&self) -> PathBuf {
        self.base_dir.join(self.identity.dir_name())
    }

    /// Builds a config for `identity` rooted at the same base directory.
    pub fn with_identity(&self, identity: SideloadIdentity) -> Self {
        Self {
            base_dir: self.base_dir.clone(),
            identity,
        }
    }
}

/// Parses `i<index>t<term>` back into `(index, term)`. Returns `None` for
/// anything that doesn't match the exact pattern, so directory listing can
/// skip foreign files rather than choke on them.
pub(crate) fn parse_entry_filename(name: &str) -> Option<(u64, u64)> {
    let rest = name.strip_prefix('i')?;
    let (index_str, term_str) = rest.split_once('t')?;
    let index = index_str.parse().ok()?;
    let term = term_str.parse().ok()?;
    Some((index, term))
}

/// The deterministic file name for one sideloaded payload.
pub(crate) fn entry_filename(index: u64, term: u64) -> String {
    format!("i{index}t{term}")
}

pub(crate) fn entry_path(dir: &Path, index: u64, term: u64) -> PathBuf {
    dir.join(entry_filename(index, term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_name_is_deterministic() {
        let id = SideloadIdentity::new(7, 3);
        assert_eq!(id.dir_name(), "sideload_7_3");
    }

    #[test]
    fn config_dir_joins_base_and_identity() {
        let config = SideloadConfig::builder()
            .base_dir(PathBuf::from("/data"))
            .identity(SideloadIdentity::new(1, 2))
            .build();
        assert_eq!(config.dir(), PathBuf::from("/data/sideload_1_2"));
    }

    #[test]
    fn filename_round_trips() {
        let name = entry_filename(42, 7);
        assert_eq!(name, "i42t7");
        assert_eq!(parse_entry_filename(&name), Some((42, 7)));
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert_eq!(parse_entry_filename("cantremove.xx"), None);
        assert_eq!(parse_entry_filename("i42"), None);
        assert_eq!(parse_entry_filename("i42tX"), None);
    }
}
