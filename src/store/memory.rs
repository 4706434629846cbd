// src/store/memory.rs
use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::store::Store;
use crate::types::{Location, Update};

/// In-memory store used in tests and as the reference implementation of the
/// `Store` contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Documents>,
}

#[derive(Debug, Default)]
struct Documents {
    locations: BTreeMap<String, Location>,
    updates: BTreeMap<String, BTreeMap<String, Update>>,
    last_notified: BTreeMap<String, DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location_count(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").locations.len()
    }

    pub fn update_count(&self) -> usize {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .updates
            .values()
            .map(|m| m.len())
            .sum()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get_location(&self, id: &str) -> Result<Option<Location>> {
        let docs = self.inner.lock().expect("store mutex poisoned");
        Ok(docs.locations.get(id).cloned())
    }

    async fn put_location(&self, id: &str, location: &Location) -> Result<()> {
        let mut docs = self.inner.lock().expect("store mutex poisoned");
        docs.locations
            .entry(id.to_string())
            .or_insert_with(|| location.clone());
        Ok(())
    }

    async fn get_update(&self, location_id: &str, key: &str) -> Result<Option<Update>> {
        let docs = self.inner.lock().expect("store mutex poisoned");
        Ok(docs
            .updates
            .get(location_id)
            .and_then(|m| m.get(key))
            .cloned())
    }

    async fn put_update(&self, location_id: &str, key: &str, update: &Update) -> Result<bool> {
        let mut docs = self.inner.lock().expect("store mutex poisoned");
        let per_location = docs.updates.entry(location_id.to_string()).or_default();
        if per_location.contains_key(key) {
            return Ok(false);
        }
        per_location.insert(key.to_string(), update.clone());
        Ok(true)
    }

    async fn query_updates_since(&self, since: DateTime<Utc>) -> Result<Vec<Update>> {
        let docs = self.inner.lock().expect("store mutex poisoned");
        Ok(docs
            .updates
            .values()
            .flat_map(|m| m.values())
            .filter(|u| u.date.is_some_and(|d| d > since))
            .cloned()
            .collect())
    }

    async fn get_last_notified(&self, location_id: &str) -> Result<Option<DateTime<Utc>>> {
        let docs = self.inner.lock().expect("store mutex poisoned");
        Ok(docs.last_notified.get(location_id).copied())
    }

    async fn merge_last_notified(&self, location_id: &str, ts: DateTime<Utc>) -> Result<()> {
        let mut docs = self.inner.lock().expect("store mutex poisoned");
        let entry = docs
            .last_notified
            .entry(location_id.to_string())
            .or_insert(ts);
        if ts > *entry {
            *entry = ts;
        }
        Ok(())
    }
}
