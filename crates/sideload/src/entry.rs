//! The abstract Raft log entry this crate operates on.
//!
//! The real consensus engine's entry type is out of scope for this crate
//! (see the crate-level docs); `RaftEntry` is the minimal shape the
//! sideloading and inlining pipelines need: an index, a term, and the
//! framed envelope bytes produced by [`crate::codec`].

/// One Raft log record, carrying a framed envelope in `data`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaftEntry {
    pub index: u64,
    pub term: u64,
    pub data: Vec<u8>,
}

impl RaftEntry {
    pub fn new(index: u64, term: u64, data: Vec<u8>) -> Self {
        Self { index, term, data }
    }
}
