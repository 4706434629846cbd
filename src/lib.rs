// src/lib.rs
// Public library surface for integration tests (and the CLI binary).

pub mod config;
pub mod dedup;
pub mod ingest;
pub mod notify;
pub mod reconcile;
pub mod store;
pub mod timeparse;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::config::{Gate, Settings};
pub use crate::dedup::DedupCache;
pub use crate::ingest::source::StatusSource;
pub use crate::notify::microblog::MicroblogClient;
pub use crate::store::{JsonFileStore, MemoryStore, Store};
pub use crate::types::{Location, RawRecord, Sport, Update};
