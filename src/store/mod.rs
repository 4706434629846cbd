// src/store/mod.rs
pub mod file;
pub mod memory;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::types::{Location, Update};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Document store holding locations, their status history and per-location
/// notification timestamps. Store errors are fatal for the current cycle and
/// propagate to the caller; all "skip and continue" handling lives above
/// this seam.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn get_location(&self, id: &str) -> Result<Option<Location>>;

    /// Create-if-absent. Locations are immutable identity documents; an
    /// existing document is left untouched.
    async fn put_location(&self, id: &str, location: &Location) -> Result<()>;

    async fn get_update(&self, location_id: &str, key: &str) -> Result<Option<Update>>;

    /// Create-if-absent, never overwrite. Returns true when the update was
    /// newly inserted, false when the key already existed.
    async fn put_update(&self, location_id: &str, key: &str, update: &Update) -> Result<bool>;

    /// Cross-location scan of all updates with `date > since`.
    async fn query_updates_since(&self, since: DateTime<Utc>) -> Result<Vec<Update>>;

    async fn get_last_notified(&self, location_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Upsert merge: advances the notification timestamp without touching
    /// other fields of the location document. Never moves backwards.
    async fn merge_last_notified(&self, location_id: &str, ts: DateTime<Utc>) -> Result<()>;
}
