//! Raft log sideloading: strips bulk-ingest payloads out of replicated
//! commands before they reach the log and re-inlines them when entries are
//! read back.
//!
//! ```text
//!                    propose                         apply / snapshot / read
//!                       |                                      ^
//!                       v                                      |
//!              +-----------------+                   +------------------+
//!  RaftEntry -> | pipeline::      | -> thin RaftEntry | pipeline::       | -> fat RaftEntry
//!  (fat)        |   outbound      |    (persisted)    |   inbound        |    (restored)
//!              +--------+--------+                   +--------+---------+
//!                       |                                      ^
//!                       v                                      |
//!                 SideloadStorage::put              EntryCache::get (fast path)
//!                       |                                      |
//!                       +---------------> SideloadStorage::get +
//! ```
//!
//! The Raft consensus engine, the key-value storage engine, the real entry
//! cache, and the bulk ingest command handler are all external
//! collaborators this crate does not define; [`entry::RaftEntry`],
//! [`codec::ReplicatedCommand`], and [`entry_cache::EntryCache`] are this
//! crate's own minimal stand-ins for them, kept just large enough for the
//! sideloading and inlining pipelines to operate against something
//! concrete.
//!
//! [`lifecycle::truncate`] and [`lifecycle::rekey`] are the two places the
//! surrounding replica lifecycle (log truncation, replica identity changes)
//! reaches into this crate; everything else is driven per-entry by the two
//! pipeline modules.

pub mod codec;
pub mod config;
pub mod entry;
pub mod entry_cache;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod storage;

pub use codec::{CommandId, EntryVersion, IngestPayload, ReplicatedCommand};
pub use config::{SideloadConfig, SideloadIdentity};
pub use entry::RaftEntry;
pub use entry_cache::{EntryCache, MemEntryCache};
pub use error::{MustRetrySnapshotDueToTruncation, SideloadError, SideloadResult};
pub use lifecycle::{rekey, truncate};
pub use pipeline::inbound::{maybe_inline, maybe_inline_batch};
pub use pipeline::outbound::maybe_sideload_entries;
pub use storage::{DiskSideloadStorage, MemSideloadStorage, SideloadStorage, TruncateStats};
