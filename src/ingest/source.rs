// src/ingest/source.rs
use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::types::Sport;

/// One parsed status entry, before it is tied to a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatus {
    /// Raw combined status string as published by the source.
    pub text: String,
    pub date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub description: Option<String>,
}

/// Primary feed shape: group (municipality) -> facility name -> status.
pub type Feed = BTreeMap<String, BTreeMap<String, RawStatus>>;

/// Supplementary feed shape: facility name -> status. The supplementary
/// page carries no group information.
pub type NameFeed = BTreeMap<String, RawStatus>;

/// A raw source of maintenance-status feeds for (sport, area) pairs.
///
/// The primary feed is comprehensive and its failure is fatal for the pair;
/// the supplementary feed is best-effort and a failure there degrades to
/// primary-only at the call site.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_primary(&self, sport: Sport, area: &str) -> Result<Feed>;

    /// May legitimately return an empty feed (not every sport has one).
    async fn fetch_supplementary(&self, sport: Sport, area: &str) -> Result<NameFeed>;

    fn name(&self) -> &'static str;
}
