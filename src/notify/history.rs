// src/notify/history.rs
//
// Alternative rate-limit gate for storeless deployments: instead of a
// persisted last_notified timestamp, the last notification time is
// recovered from our own recent posts. Each post starts with the location
// label and renders the maintenance time with the standard verb, so the
// same date parser applies. Kept strictly separate from the store-based
// gate; a deployment picks one.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::debug;

use crate::notify::microblog::OwnPost;
use crate::timeparse;

/// Decide whether an update for `label` at `update_date` may be announced,
/// judging only by the post history (newest first).
///
/// The newest post matching the label is authoritative. A matching post
/// whose rendered time cannot be parsed back is skipped and the scan
/// continues. No matching post at all means never notified: allow.
pub fn should_send(
    posts: &[OwnPost],
    label: &str,
    update_date: DateTime<Utc>,
    min_interval: Duration,
    offset: FixedOffset,
) -> bool {
    for post in posts {
        if !post.text.starts_with(label) {
            continue;
        }
        let Some(previous) = parse_posted_time(&post.text, post.sent_at, offset) else {
            continue;
        };
        let delta = update_date - previous;
        debug!(%label, ?delta, "history gate found previous notification");
        return delta >= min_interval;
    }
    true
}

/// Recover the rendered maintenance time from a post body. The post's own
/// send time anchors the year inference, since rendered dates carry no year.
fn parse_posted_time(
    text: &str,
    sent_at: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let sent_local = timeparse::now_local(offset, sent_at);
    let local = timeparse::parse_maintenance_date(text, sent_local)?;
    timeparse::local_to_utc(local, offset)
}
