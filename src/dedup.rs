// src/dedup.rs
use std::collections::HashSet;

use metrics::counter;
use tracing::debug;

use crate::types::RawRecord;

/// In-run memory of record fingerprints already processed. Owned explicitly
/// by one pipeline run; a fresh process starts empty. This is an
/// optimization only: the store layer is idempotent on its own.
#[derive(Debug, Default)]
pub struct DedupCache {
    seen: HashSet<String>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fingerprint as seen. Returns true when it was fresh.
    pub fn insert(&mut self, fingerprint: String) -> bool {
        self.seen.insert(fingerprint)
    }

    /// Keep only records not seen before in this run, marking them seen.
    pub fn filter_new(&mut self, records: Vec<RawRecord>) -> Vec<RawRecord> {
        let total = records.len();
        let fresh: Vec<RawRecord> = records
            .into_iter()
            .filter(|rec| self.insert(rec.fingerprint()))
            .collect();

        let dropped = total - fresh.len();
        if dropped > 0 {
            counter!("ingest_dedup_total").increment(dropped as u64);
            debug!(dropped, "dropped already-seen records");
        }
        fresh
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
