// src/notify/message.rs
//
// Message skeleton: "{group}, {name}; {verb} {date}", with the description
// and hashtags appended only while the budget allows. Lengths are counted
// in characters, not bytes (names carry ä/ö).

use chrono::FixedOffset;

use crate::timeparse;
use crate::types::{Location, Update};

/// Verb for a routine maintenance notice.
const MAINTAINED_VERB: &str = "Kunnostettu";
/// Verb for a closure notice.
const CLOSED_VERB: &str = "Suljettu";

pub fn build(location: &Location, update: &Update, offset: FixedOffset, max_len: usize) -> String {
    let mut msg = match update.date {
        Some(date) => {
            let verb = if update.is_closure() {
                CLOSED_VERB
            } else {
                MAINTAINED_VERB
            };
            format!(
                "{}; {} {}",
                location.label(),
                verb,
                timeparse::format_local(date, offset)
            )
        }
        // No structured date: fall back to the raw status text.
        None => format!("{}; {}", location.label(), update.text),
    };

    if let Some(desc) = update.description.as_deref().filter(|d| !d.is_empty()) {
        let with_desc = format!("{msg} ({desc})");
        if char_len(&with_desc) <= max_len {
            msg = with_desc;
        }
    }

    msg = add_hashtags(msg, location, max_len);
    truncate_chars(msg, max_len)
}

/// Append the sport hashtag, then the area hashtag, each only if it still
/// fits within the budget (tried in this declared order).
fn add_hashtags(mut msg: String, location: &Location, max_len: usize) -> String {
    let area_tag = format!("#{}", location.area.to_lowercase());
    for tag in [location.sport.hashtag(), area_tag.as_str()] {
        if char_len(&msg) + char_len(tag) + 1 <= max_len {
            msg.push(' ');
            msg.push_str(tag);
        }
    }
    msg
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate_chars(s: String, max_len: usize) -> String {
    if char_len(&s) <= max_len {
        s
    } else {
        s.chars().take(max_len).collect()
    }
}
