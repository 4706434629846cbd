// src/ingest/mod.rs
pub mod kunto;
pub mod source;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::dedup::DedupCache;
use crate::reconcile;
use crate::store::Store;
use crate::types::{RawRecord, Sport};
use source::{Feed, StatusSource};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_records_total",
            "Records flattened from source feeds."
        );
        describe_counter!(
            "ingest_updates_inserted_total",
            "Update documents newly inserted into the store."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Records dropped by the in-run dedup cache."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Primary feed fetch/validation failures."
        );
    });
}

/// Run one ingestion cycle over the (sport, area) product.
///
/// Per-pair fetch and validation failures are logged and skipped so sibling
/// pairs still run; store errors abort the cycle. Returns the number of
/// update documents newly inserted.
pub async fn run_cycle(
    store: &dyn Store,
    source: &dyn StatusSource,
    sports: &[Sport],
    areas: &[String],
    since: Option<Duration>,
    cache: &mut DedupCache,
) -> Result<usize> {
    ensure_metrics_described();
    let now = Utc::now();
    let cutoff = since.map(|window| now - window);
    info!(?sports, ?areas, source = source.name(), "ingestion cycle start");

    let mut inserted = 0;
    for &sport in sports {
        for area in areas {
            let feed = match fetch_pair(source, sport, area).await {
                Ok(feed) => feed,
                Err(e) => {
                    warn!(%sport, %area, error = ?e, "skipping pair, primary feed failed");
                    counter!("ingest_source_errors_total").increment(1);
                    continue;
                }
            };

            let records = flatten(sport, area, feed, cutoff);
            counter!("ingest_records_total").increment(records.len() as u64);

            for record in cache.filter_new(records) {
                if persist_record(store, &record).await? {
                    inserted += 1;
                }
            }
        }
    }

    counter!("ingest_updates_inserted_total").increment(inserted as u64);
    info!(inserted, "ingestion cycle done");
    Ok(inserted)
}

/// Fetch the primary and supplementary feeds for one pair and reconcile
/// them. A failed supplementary feed degrades to primary-only.
async fn fetch_pair(source: &dyn StatusSource, sport: Sport, area: &str) -> Result<Feed> {
    let mut primary = source.fetch_primary(sport, area).await?;

    let supplementary = match source.fetch_supplementary(sport, area).await {
        Ok(feed) => feed,
        Err(e) => {
            debug!(%sport, %area, error = ?e, "supplementary feed unavailable");
            Default::default()
        }
    };

    reconcile::merge(&mut primary, &supplementary);
    Ok(primary)
}

/// Flatten a reconciled feed into raw records, tagging each with its sport
/// and area. With a cutoff, only records dated after it are kept (dateless
/// records pass; they are skipped at persistence anyway).
fn flatten(
    sport: Sport,
    area: &str,
    feed: Feed,
    cutoff: Option<DateTime<Utc>>,
) -> Vec<RawRecord> {
    let mut records = Vec::new();
    for (group, places) in feed {
        for (name, status) in places {
            if let (Some(cutoff), Some(date)) = (cutoff, status.date) {
                if date <= cutoff {
                    continue;
                }
            }
            records.push(RawRecord {
                sport,
                area: area.to_string(),
                group: group.clone(),
                name,
                text: status.text,
                date: status.date,
                status: status.status,
                description: status.description,
            });
        }
    }
    records
}

/// Persist one record: location create-if-absent, then the update keyed by
/// its timestamp. Dateless updates are not persisted (nothing to key or
/// order on). Returns true when a new update document was written.
async fn persist_record(store: &dyn Store, record: &RawRecord) -> Result<bool> {
    let location = record.location();
    let id = location.id();
    store.put_location(&id, &location).await?;

    let update = record.update(&id);
    let Some(key) = update.key() else {
        debug!(%id, text = %update.text, "no date in update, skip");
        return Ok(false);
    };

    let fresh = store.put_update(&id, &key, &update).await?;
    if fresh {
        debug!(%id, %key, "stored update");
    }
    Ok(fresh)
}
