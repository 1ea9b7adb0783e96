//! Ledger: progress event log, BLAKE3 digests, progress audit.

pub mod digest;
pub mod drift;
pub mod eventlog;
