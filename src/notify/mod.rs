// src/notify/mod.rs
pub mod history;
pub mod message;
pub mod microblog;

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{Gate, Settings};
use crate::store::Store;
use crate::types::Update;
use microblog::MicroblogClient;

/// Posts inspected by the history gate per cycle.
const HISTORY_DEPTH: usize = 50;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("notify_sent_total", "Notifications delivered (or dry-run).");
        describe_counter!(
            "notify_skipped_total",
            "Candidates skipped by staleness or rate-limit gates."
        );
        describe_counter!(
            "notify_delivery_errors_total",
            "Send failures (retried on the next cycle)."
        );
    });
}

/// Run one notification cycle: collect updates inside the window, reduce to
/// the newest per location, apply the staleness and rate-limit gates, send,
/// and record the notification time. Returns the number of notifications
/// sent (dry-run counts as sent).
///
/// A delivery failure is per-update: it is logged, `last_notified` is not
/// advanced, and the cycle continues; the next cycle naturally retries.
/// Store errors abort the cycle.
pub async fn run_cycle(
    store: &dyn Store,
    client: &dyn MicroblogClient,
    settings: &Settings,
    window: Duration,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<usize> {
    ensure_metrics_described();

    let since = now - window;
    let updates = store.query_updates_since(since).await?;
    let candidates = newest_per_location(updates);
    info!(
        candidates = candidates.len(),
        %since,
        gate = ?settings.gate,
        "notification cycle start"
    );

    // One post-history fetch serves the whole cycle.
    let own_posts = match settings.gate {
        Gate::Store => Vec::new(),
        Gate::History => client.recent_own_posts(HISTORY_DEPTH).await?,
    };

    let mut sent = 0;
    for update in candidates {
        let Some(date) = update.date else {
            // query_updates_since only returns dated updates; belt and braces.
            continue;
        };

        if let Some(max_age) = settings.max_update_age {
            let age = now - date;
            if age > max_age {
                debug!(location = %update.location_id, ?age, "skip, update too old");
                counter!("notify_skipped_total").increment(1);
                continue;
            }
        }

        let Some(location) = store.get_location(&update.location_id).await? else {
            warn!(location = %update.location_id, "update without location document");
            continue;
        };

        let allowed = match settings.gate {
            Gate::Store => {
                store_gate(store, &update.location_id, date, settings.min_interval).await?
            }
            Gate::History => history::should_send(
                &own_posts,
                &location.label(),
                date,
                settings.min_interval,
                settings.utc_offset,
            ),
        };
        if !allowed {
            debug!(location = %update.location_id, "skip, notified too recently");
            counter!("notify_skipped_total").increment(1);
            continue;
        }

        let msg = message::build(&location, &update, settings.utc_offset, settings.max_message_len);
        let delivered = if dry_run {
            info!(%msg, "dry-run notification");
            true
        } else {
            match client.post(&msg).await {
                Ok(()) => {
                    info!(%msg, "notification sent");
                    true
                }
                Err(e) => {
                    warn!(location = %update.location_id, error = ?e, "delivery failed");
                    counter!("notify_delivery_errors_total").increment(1);
                    false
                }
            }
        };

        if delivered {
            // With history gating the post itself is the record.
            if settings.gate == Gate::Store {
                store.merge_last_notified(&update.location_id, date).await?;
            }
            counter!("notify_sent_total").increment(1);
            sent += 1;
        }
    }

    info!(sent, "notification cycle done");
    Ok(sent)
}

/// Keep only the newest update per location. Older updates inside the same
/// window are dropped, not queued.
fn newest_per_location(updates: Vec<Update>) -> Vec<Update> {
    let mut newest: HashMap<String, Update> = HashMap::new();
    for update in updates {
        match newest.get(&update.location_id) {
            Some(existing) if existing.date >= update.date => {}
            _ => {
                newest.insert(update.location_id.clone(), update);
            }
        }
    }
    let mut out: Vec<Update> = newest.into_values().collect();
    // Deterministic delivery order.
    out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.location_id.cmp(&b.location_id)));
    out
}

/// Store-backed rate-limit gate: never notified passes; otherwise the
/// update must be at least `min_interval` newer than the previous
/// notification (strictly less than the interval skips).
async fn store_gate(
    store: &dyn Store,
    location_id: &str,
    update_date: DateTime<Utc>,
    min_interval: Duration,
) -> Result<bool> {
    match store.get_last_notified(location_id).await? {
        None => {
            debug!(location = %location_id, "never notified before");
            Ok(true)
        }
        Some(previous) => Ok(update_date - previous >= min_interval),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn update(location_id: &str, date: DateTime<Utc>) -> Update {
        Update {
            date: Some(date),
            status: None,
            description: None,
            text: "Kunnostettu".into(),
            location_id: location_id.into(),
        }
    }

    #[test]
    fn newest_per_location_keeps_max_date() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
        let picked = newest_per_location(vec![
            update("a", t0),
            update("a", t0 + Duration::hours(2)),
            update("a", t0 + Duration::hours(1)),
            update("b", t0),
        ]);
        assert_eq!(picked.len(), 2);
        let a = picked.iter().find(|u| u.location_id == "a").unwrap();
        assert_eq!(a.date, Some(t0 + Duration::hours(2)));
    }
}
