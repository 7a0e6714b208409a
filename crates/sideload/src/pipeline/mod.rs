//! The two halves of the sideloading contract: stripping payloads out of
//! entries before they're persisted ([`outbound`]), and restoring them when
//! entries are read back ([`inbound`]).

pub mod inbound;
pub mod outbound;
