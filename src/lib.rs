//! Ascend: program progression engine.
//!
//! Lazily loads a two-tier skill catalog with deduplicated concurrent
//! fetches, resolves which skills a user can work on, and builds a bounded
//! queue of next training sessions across the user's active programs.

pub mod cli;
pub mod core;
pub mod ledger;
pub mod source;
