//! Restores bulk-ingest payloads into thin entries read back off the log.

use crate::codec::{self, EntryVersion, IngestPayload};
use crate::entry::RaftEntry;
use crate::entry_cache::EntryCache;
use crate::error::{MustRetrySnapshotDueToTruncation, SideloadError, SideloadResult};
use crate::storage::SideloadStorage;

/// Restores `entry`'s ingest payload if it was sideloaded, consulting
/// `cache` before falling back to `storage`.
///
/// Never mutates `entry`; always returns an owned, independent
/// [`RaftEntry`]. Four cases, each traced at `trace` level with the exact
/// tag text noted, mirror the contract this pipeline is responsible for:
///
/// - Not a `Sideloaded` entry, or no ingest sub-message at all: returned
///   unchanged, untraced.
/// - Already carries a populated `ingest.data` (nothing to restore):
///   `"already inlined"`.
/// - `storage` is `None`: the entry is returned as-is, sideloaded or not.
///   Callers passing a null storage must neither inline nor populate the
///   cache.
/// - A cache hit on `(range_id, entry.index)` whose cached term matches
///   `entry.term`: `"using cache hit"`, the cached (already-fat) entry is
///   returned directly.
/// - A cache miss (absent, or present at a different term), or no cache at
///   all: `"inlined entry not cached"`, the
///   payload is fetched from `storage` and the result is recorded into
///   `cache` (if present) for next time.
pub fn maybe_inline(
    entry: &RaftEntry,
    range_id: u64,
    storage: Option<&dyn SideloadStorage>,
    cache: Option<&dyn EntryCache>,
) -> SideloadResult<RaftEntry> {
    if !codec::sniff_sideloaded(&entry.data) {
        return Ok(entry.clone());
    }

    let (command_id, command_bytes) = codec::decode(&entry.data)?;
    let mut cmd = codec::decode_command(command_bytes)?;

    let ingest = match &cmd.ingest {
        Some(ingest) => ingest,
        None => return Ok(entry.clone()),
    };

    if !ingest.is_empty() {
        tracing::trace!(index = entry.index, term = entry.term, "already inlined");
        return Ok(entry.clone());
    }

    let storage = match storage {
        Some(storage) => storage,
        None => return Ok(entry.clone()),
    };

    if let Some(cache) = cache {
        if let Some(cached) = cache.get(range_id, entry.index) {
            if cached.term == entry.term {
                tracing::trace!(index = entry.index, term = entry.term, "using cache hit");
                return Ok(cached);
            }
        }
    }

    tracing::trace!(index = entry.index, term = entry.term, "inlined entry not cached");
    let data = storage.get(entry.index, entry.term)?;
    let checksum = crc32fast::hash(&data);
    if checksum != ingest.checksum {
        tracing::warn!(
            index = entry.index,
            term = entry.term,
            stored_checksum = checksum,
            expected_checksum = ingest.checksum,
            "sideloaded payload checksum mismatch"
        );
    }

    cmd.ingest = Some(IngestPayload { data, checksum });
    let command_bytes = codec::encode_command(&cmd)?;
    let data = codec::encode(EntryVersion::Sideloaded, command_id, &command_bytes);
    let inlined = RaftEntry::new(entry.index, entry.term, data);

    if let Some(cache) = cache {
        cache.add_entries(range_id, std::slice::from_ref(&inlined));
    }

    Ok(inlined)
}

/// Batch-inline wrapper for the snapshot path: any payload already
/// truncated away (or any other inlining failure, since this path can only
/// signal the caller one way) aborts the whole batch, telling the caller to
/// restart snapshotting from a fresh engine + log snapshot pair rather than
/// retry this call directly.
pub fn maybe_inline_batch(
    entries: &[RaftEntry],
    range_id: u64,
    storage: &dyn SideloadStorage,
    cache: Option<&dyn EntryCache>,
) -> Result<Vec<RaftEntry>, MustRetrySnapshotDueToTruncation> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match maybe_inline(entry, range_id, Some(storage), cache) {
            Ok(inlined) => out.push(inlined),
            Err(SideloadError::NotFound { index, term }) => {
                return Err(MustRetrySnapshotDueToTruncation { index, term });
            }
            Err(_) => {
                return Err(MustRetrySnapshotDueToTruncation {
                    index: entry.index,
                    term: entry.term,
                });
            }
        }
    }
    Ok(out)
}
