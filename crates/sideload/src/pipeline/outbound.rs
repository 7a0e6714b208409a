//! Strips bulk-ingest payloads out of outbound entries before they reach
//! the replicated log.

use crate::codec::{self, CommandId, EntryVersion, IngestPayload, ReplicatedCommand};
use crate::entry::RaftEntry;
use crate::error::SideloadResult;
use crate::storage::SideloadStorage;

/// Strips the `ingest` payload out of every fat `Sideloaded` entry in
/// `entries`, writing each payload to `storage` and returning thin
/// replacements alongside the total number of bytes stripped.
///
/// `maybe_cmd` lets a caller that already holds a decoded command matching
/// an entry's command id (e.g. the command it just proposed) hand it over
/// directly, skipping a redundant unmarshal of `command_bytes`. Return
/// `None` to fall back to decoding the envelope's command bytes.
///
/// Never mutates its input: `entries` is borrowed, the result is a fresh
/// `Vec`. Entries that are not `Sideloaded`, or whose command carries no
/// (or an already-empty) ingest payload, are cloned through unchanged.
///
/// A `storage.put` failure aborts the batch immediately; entries already
/// written before the failing one are left in storage rather than rolled
/// back; the caller is expected to treat this as a fatal replica error and
/// rely on later truncation to reclaim the orphaned files.
pub fn maybe_sideload_entries<F>(
    entries: &[RaftEntry],
    storage: &dyn SideloadStorage,
    maybe_cmd: F,
) -> SideloadResult<(Vec<RaftEntry>, u64)>
where
    F: Fn(&CommandId) -> Option<ReplicatedCommand>,
{
    let mut out = Vec::with_capacity(entries.len());
    let mut stripped_bytes = 0u64;

    for entry in entries {
        if !codec::sniff_sideloaded(&entry.data) {
            out.push(entry.clone());
            continue;
        }

        let (command_id, command_bytes) = codec::decode(&entry.data)?;
        let mut cmd = match maybe_cmd(&command_id) {
            Some(cmd) => cmd,
            None => codec::decode_command(command_bytes)?,
        };

        let ingest = match cmd.ingest.take() {
            Some(ingest) if !ingest.is_empty() => ingest,
            other => {
                cmd.ingest = other;
                out.push(entry.clone());
                continue;
            }
        };

        storage.put(entry.index, entry.term, ingest.data.clone())?;
        stripped_bytes += ingest.data.len() as u64;
        tracing::debug!(
            index = entry.index,
            term = entry.term,
            bytes = ingest.data.len(),
            "sideloaded ingest payload"
        );

        cmd.ingest = Some(IngestPayload {
            data: Vec::new(),
            checksum: ingest.checksum,
        });
        let command_bytes = codec::encode_command(&cmd)?;
        let data = codec::encode(EntryVersion::Sideloaded, command_id, &command_bytes);
        out.push(RaftEntry::new(entry.index, entry.term, data));
    }

    Ok((out, stripped_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CommandId, ReplicatedCommand, COMMAND_ID_LEN};
    use crate::config::{SideloadConfig, SideloadIdentity};
    use crate::storage::{DiskSideloadStorage, MemSideloadStorage};
    use tempfile::tempdir;

    fn cmd_id(n: u8) -> CommandId {
        [n; COMMAND_ID_LEN]
    }

    fn fat_entry(index: u64, term: u64, ingest_data: &[u8]) -> RaftEntry {
        let cmd = ReplicatedCommand {
            ingest: Some(IngestPayload::new(ingest_data.to_vec())),
        };
        let command_bytes = codec::encode_command(&cmd).unwrap();
        let data = codec::encode(EntryVersion::Sideloaded, cmd_id(index as u8), &command_bytes);
        RaftEntry::new(index, term, data)
    }

    fn standard_entry(index: u64, term: u64) -> RaftEntry {
        let data = codec::encode(EntryVersion::Standard, cmd_id(index as u8), b"plain command");
        RaftEntry::new(index, term, data)
    }

    #[test]
    fn standard_entries_pass_through_unchanged() {
        let storage = MemSideloadStorage::new(SideloadIdentity::new(1, 1));
        let entries = vec![standard_entry(1, 1)];
        let (out, stripped) = maybe_sideload_entries(&entries, &storage, |_| None).unwrap();
        assert_eq!(out, entries);
        assert_eq!(stripped, 0);
    }

    #[test]
    fn fat_entry_is_stripped_and_stored() {
        let storage = MemSideloadStorage::new(SideloadIdentity::new(1, 1));
        let entries = vec![fat_entry(5, 2, b"sstable-bytes")];
        let before = entries.clone();

        let (out, stripped) = maybe_sideload_entries(&entries, &storage, |_| None).unwrap();

        assert_eq!(entries, before, "input must not be mutated");
        assert_eq!(stripped, "sstable-bytes".len() as u64);
        assert_eq!(storage.get(5, 2).unwrap(), b"sstable-bytes");

        let (_, command_bytes) = codec::decode(&out[0].data).unwrap();
        let cmd = codec::decode_command(command_bytes).unwrap();
        assert!(cmd.ingest.unwrap().is_empty());
    }

    #[test]
    fn entry_with_no_ingest_passes_through_unchanged() {
        let storage = MemSideloadStorage::new(SideloadIdentity::new(1, 1));
        let cmd = ReplicatedCommand { ingest: None };
        let command_bytes = codec::encode_command(&cmd).unwrap();
        let data = codec::encode(EntryVersion::Sideloaded, cmd_id(1), &command_bytes);
        let entries = vec![RaftEntry::new(1, 1, data)];

        let (out, stripped) = maybe_sideload_entries(&entries, &storage, |_| None).unwrap();
        assert_eq!(out, entries);
        assert_eq!(stripped, 0);
    }

    #[test]
    fn mixed_batch_strips_only_fat_entries() {
        let storage = MemSideloadStorage::new(SideloadIdentity::new(1, 1));
        let entries = vec![
            standard_entry(1, 1),
            fat_entry(2, 1, b"payload-a"),
            standard_entry(3, 1),
            fat_entry(4, 1, b"payload-b"),
        ];
        let (out, stripped) = maybe_sideload_entries(&entries, &storage, |_| None).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(stripped, ("payload-a".len() + "payload-b".len()) as u64);
        assert_eq!(storage.get(2, 1).unwrap(), b"payload-a");
        assert_eq!(storage.get(4, 1).unwrap(), b"payload-b");
    }

    #[test]
    fn maybe_cmd_is_preferred_over_decoding_command_bytes() {
        let storage = MemSideloadStorage::new(SideloadIdentity::new(1, 1));
        // The envelope's own command bytes carry no ingest payload; the
        // in-memory command supplied via `maybe_cmd` does. If the pipeline
        // decoded `command_bytes` instead of using the callback, nothing
        // would be stripped.
        let stale_cmd = ReplicatedCommand { ingest: None };
        let stale_bytes = codec::encode_command(&stale_cmd).unwrap();
        let id = cmd_id(1);
        let data = codec::encode(EntryVersion::Sideloaded, id, &stale_bytes);
        let entries = vec![RaftEntry::new(1, 1, data)];

        let fresh_cmd = ReplicatedCommand {
            ingest: Some(IngestPayload::new(b"in-memory-bytes".to_vec())),
        };
        let (out, stripped) = maybe_sideload_entries(&entries, &storage, |candidate| {
            (*candidate == id).then(|| fresh_cmd.clone())
        })
        .unwrap();

        assert_eq!(stripped, b"in-memory-bytes".len() as u64);
        assert_eq!(storage.get(1, 1).unwrap(), b"in-memory-bytes");

        let (_, command_bytes) = codec::decode(&out[0].data).unwrap();
        let cmd = codec::decode_command(command_bytes).unwrap();
        assert!(cmd.ingest.unwrap().is_empty());
    }

    #[test]
    fn writes_land_in_disk_storage_too() {
        let dir = tempdir().unwrap();
        let config = SideloadConfig::builder()
            .base_dir(dir.path().to_path_buf())
            .identity(SideloadIdentity::new(9, 1))
            .build();
        let storage = DiskSideloadStorage::new(config);
        let entries = vec![fat_entry(1, 1, b"on-disk-bytes")];
        maybe_sideload_entries(&entries, &storage, |_| None).unwrap();
        assert_eq!(storage.get(1, 1).unwrap(), b"on-disk-bytes");
    }
}
