//! Envelope framing for Raft log entry payloads.
//!
//! Every entry's `data` is `version_tag || command_id || command_bytes`.
//! `sniff_sideloaded` is the cheap, copy-free predicate the pipelines use
//! to decide whether an entry is even worth decoding.

use crate::error::{SideloadError, SideloadResult};
use serde::{Deserialize, Serialize};

/// Width, in bytes, of the fixed version tag prefix.
const VERSION_LEN: usize = 1;
/// Width, in bytes, of the fixed command-id field.
pub const COMMAND_ID_LEN: usize = 8;

/// Opaque, fixed-width identifier for an in-flight command.
pub type CommandId = [u8; COMMAND_ID_LEN];

/// The envelope's version tag. Numeric values are stable across crate
/// versions; existing logs must remain decodable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryVersion {
    Standard = 0x01,
    Sideloaded = 0x02,
}

impl EntryVersion {
    fn from_byte(b: u8) -> SideloadResult<Self> {
        match b {
            0x01 => Ok(EntryVersion::Standard),
            0x02 => Ok(EntryVersion::Sideloaded),
            other => Err(SideloadError::DecodeError(format!(
                "unknown envelope version tag {other:#x}"
            ))),
        }
    }
}

/// A bulk-ingest sub-message, as it would be embedded in a replicated
/// command. `checksum` is the CRC32 of `data` at the time it was last
/// written; this crate recomputes it on inline to catch corruption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IngestPayload {
    pub data: Vec<u8>,
    pub checksum: u32,
}

impl IngestPayload {
    pub fn new(data: Vec<u8>) -> Self {
        let checksum = crc32fast::hash(&data);
        Self { data, checksum }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Minimal stand-in for the replicated command type this crate transports.
/// The sideloading pipeline only ever looks at `ingest`; everything else
/// about the command is opaque to this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReplicatedCommand {
    pub ingest: Option<IngestPayload>,
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::legacy()
}

/// Serialize a [`ReplicatedCommand`] to bytes.
pub fn encode_command(cmd: &ReplicatedCommand) -> SideloadResult<Vec<u8>> {
    bincode::serde::encode_to_vec(cmd, bincode_config())
        .map_err(|e| SideloadError::DecodeError(format!("encode command: {e}")))
}

/// Deserialize a [`ReplicatedCommand`] from bytes.
pub fn decode_command(bytes: &[u8]) -> SideloadResult<ReplicatedCommand> {
    bincode::serde::decode_from_slice(bytes, bincode_config())
        .map(|(cmd, _)| cmd)
        .map_err(|e| SideloadError::DecodeError(format!("decode command: {e}")))
}

/// Frame `command_bytes` behind a version tag and fixed-width command id.
pub fn encode(version: EntryVersion, command_id: CommandId, command_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(VERSION_LEN + COMMAND_ID_LEN + command_bytes.len());
    out.push(version as u8);
    out.extend_from_slice(&command_id);
    out.extend_from_slice(command_bytes);
    out
}

/// Inverse of [`encode`]: returns the command id and the raw command bytes.
/// Does not interpret `command_bytes` further; callers decode those with
/// [`decode_command`] if needed.
pub fn decode(data: &[u8]) -> SideloadResult<(CommandId, &[u8])> {
    if data.len() < VERSION_LEN + COMMAND_ID_LEN {
        return Err(SideloadError::DecodeError(format!(
            "envelope too short: {} bytes",
            data.len()
        )));
    }
    // Validate the version tag even though the caller usually already
    // sniffed it, so `decode` is safe to call standalone.
    EntryVersion::from_byte(data[0])?;
    let mut command_id = [0u8; COMMAND_ID_LEN];
    command_id.copy_from_slice(&data[VERSION_LEN..VERSION_LEN + COMMAND_ID_LEN]);
    let command_bytes = &data[VERSION_LEN + COMMAND_ID_LEN..];
    Ok((command_id, command_bytes))
}

/// Cheap, copy-free check for whether an envelope carries the sideloaded
/// version tag. Inspects only the first byte.
pub fn sniff_sideloaded(data: &[u8]) -> bool {
    matches!(data.first(), Some(&b) if b == EntryVersion::Sideloaded as u8)
}
