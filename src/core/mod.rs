//! Core engine: catalog types, parsing, loading, resolution, session queues.

pub mod config;
pub mod error;
pub mod loader;
pub mod parser;
pub mod queue;
pub mod resolver;
pub mod state;
pub mod types;
