// src/store/file.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::Store;
use crate::types::{Location, Update};

/// Single-file JSON document store. The whole database is loaded on open and
/// rewritten after every mutation; the volume (tens to low hundreds of
/// locations) makes that cheap, and a single writer per invocation means no
/// contention on the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: Mutex<Documents>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Documents {
    #[serde(default)]
    locations: BTreeMap<String, Location>,
    #[serde(default)]
    updates: BTreeMap<String, BTreeMap<String, Update>>,
    #[serde(default)]
    last_notified: BTreeMap<String, DateTime<Utc>>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let docs = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading store file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing store file {}", path.display()))?
        } else {
            info!(path = %path.display(), "store file absent, starting empty");
            Documents::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(docs),
        })
    }

    fn persist(&self, docs: &Documents) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating store dir {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string_pretty(docs).context("serializing store")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing store file {}", self.path.display()))
    }
}

#[async_trait::async_trait]
impl Store for JsonFileStore {
    async fn get_location(&self, id: &str) -> Result<Option<Location>> {
        let docs = self.inner.lock().expect("store mutex poisoned");
        Ok(docs.locations.get(id).cloned())
    }

    async fn put_location(&self, id: &str, location: &Location) -> Result<()> {
        let mut docs = self.inner.lock().expect("store mutex poisoned");
        if docs.locations.contains_key(id) {
            return Ok(());
        }
        docs.locations.insert(id.to_string(), location.clone());
        self.persist(&docs)
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
        self.persist(&docs)?;
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
        self.persist(&docs)
    }
}
