// src/types.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex chars kept from a document id hash. Short ids keep the store layout
/// readable; collisions are negligible at this fleet size (tens to low
/// hundreds of facilities).
const ID_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sport {
    #[serde(rename = "skitrack")]
    SkiTrack,
    #[serde(rename = "skating")]
    SkatingField,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::SkiTrack => "skitrack",
            Sport::SkatingField => "skating",
        }
    }

    /// Fixed per-sport hashtag appended to outgoing messages.
    pub fn hashtag(&self) -> &'static str {
        match self {
            Sport::SkiTrack => "#hiihto",
            Sport::SkatingField => "#luistelu",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latu" | "ski" | "skitrack" => Ok(Sport::SkiTrack),
            "luistelu" | "skate" | "skating" => Ok(Sport::SkatingField),
            other => Err(anyhow::anyhow!("unknown sport {other:?}")),
        }
    }
}

/// Identity of a physical facility. Created on first observation, immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub sport: Sport,
    pub area: String,
    pub group: String,
    pub name: String,
}

impl Location {
    /// Stable document id: hash of the identity tuple, truncated hex.
    /// The same tuple always maps to the same id.
    pub fn id(&self) -> String {
        let parts = [
            self.area.as_str(),
            self.sport.as_str(),
            self.group.as_str(),
            self.name.as_str(),
        ];
        let mut hex = hash_items(parts);
        hex.truncate(ID_LEN);
        hex
    }

    /// Label used in outgoing messages and recognized by the history gate.
    pub fn label(&self) -> String {
        format!("{}, {}", self.group, self.name)
    }
}

/// One maintenance-status observation for a location. Persisted once, keyed
/// by timestamp, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw combined status string; the only content when no date parsed.
    pub text: String,
    pub location_id: String,
}

impl Update {
    /// Document key. Dateless updates have no key and are never persisted.
    pub fn key(&self) -> Option<String> {
        self.date.map(|d| d.timestamp().to_string())
    }

    pub fn is_closure(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("closed"))
    }
}

/// Transient output of a source adapter, before reconciliation and persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub sport: Sport,
    pub area: String,
    pub group: String,
    pub name: String,
    pub text: String,
    pub date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub description: Option<String>,
}

impl RawRecord {
    pub fn location(&self) -> Location {
        Location {
            sport: self.sport,
            area: self.area.clone(),
            group: self.group.clone(),
            name: self.name.clone(),
        }
    }

    pub fn update(&self, location_id: &str) -> Update {
        Update {
            date: self.date,
            status: self.status.clone(),
            description: self.description.clone(),
            text: self.text.clone(),
            location_id: location_id.to_string(),
        }
    }

    /// Order-independent fingerprint over the record's present fields,
    /// used for in-run duplicate detection.
    pub fn fingerprint(&self) -> String {
        let mut pairs: Vec<(&str, String)> = vec![
            ("area", self.area.clone()),
            ("group", self.group.clone()),
            ("name", self.name.clone()),
            ("sport", self.sport.as_str().to_string()),
            ("text", self.text.clone()),
        ];
        if let Some(d) = self.date {
            pairs.push(("date", d.timestamp().to_string()));
        }
        if let Some(s) = &self.status {
            pairs.push(("status", s.clone()));
        }
        if let Some(d) = &self.description {
            pairs.push(("description", d.clone()));
        }
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        hash_items(pairs.iter().map(|(k, v)| format!("{k}={v}")))
    }
}

/// Hash a sequence of strings with a separator byte between items, so that
/// ("ab", "c") and ("a", "bc") never collide.
fn hash_items<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.as_ref().as_bytes());
        hasher.update([0xc0]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn loc() -> Location {
        Location {
            sport: Sport::SkiTrack,
            area: "OULU".into(),
            group: "Oulunsalo".into(),
            name: "Salonpään yhdyslatu".into(),
        }
    }

    #[test]
    fn location_id_is_stable() {
        assert_eq!(loc().id(), loc().id());
        assert_eq!(loc().id().len(), 8);
    }

    #[test]
    fn location_id_changes_with_any_field() {
        let base = loc().id();
        let mut other = loc();
        other.area = "SYOTE".into();
        assert_ne!(other.id(), base);

        let mut other = loc();
        other.sport = Sport::SkatingField;
        assert_ne!(other.id(), base);

        let mut other = loc();
        other.group = "Kempele".into();
        assert_ne!(other.id(), base);

        let mut other = loc();
        other.name = "Iinatti 8km".into();
        assert_ne!(other.id(), base);
    }

    #[test]
    fn fingerprint_ignores_field_order_but_not_values() {
        let rec = RawRecord {
            sport: Sport::SkiTrack,
            area: "OULU".into(),
            group: "Oulu".into(),
            name: "Iinatti 8km".into(),
            text: "Kunnostettu: 05.01. klo 14:30".into(),
            date: Some(Utc.with_ymd_and_hms(2024, 1, 5, 12, 30, 0).unwrap()),
            status: None,
            description: None,
        };
        assert_eq!(rec.fingerprint(), rec.clone().fingerprint());

        let mut changed = rec.clone();
        changed.text = "Suljettu".into();
        assert_ne!(changed.fingerprint(), rec.fingerprint());

        let mut dateless = rec.clone();
        dateless.date = None;
        assert_ne!(dateless.fingerprint(), rec.fingerprint());
    }

    #[test]
    fn update_key_requires_date() {
        let dated = Update {
            date: Some(Utc.with_ymd_and_hms(2024, 1, 5, 12, 30, 0).unwrap()),
            status: None,
            description: None,
            text: "Kunnostettu".into(),
            location_id: "abcd1234".into(),
        };
        assert_eq!(dated.key().as_deref(), Some("1704457800"));

        let dateless = Update { date: None, ..dated };
        assert_eq!(dateless.key(), None);
    }

    #[test]
    fn closure_detection_is_case_insensitive() {
        let mut u = Update {
            date: None,
            status: Some("Closed".into()),
            description: None,
            text: String::new(),
            location_id: String::new(),
        };
        assert!(u.is_closure());
        u.status = Some("OPEN".into());
        assert!(!u.is_closure());
        u.status = None;
        assert!(!u.is_closure());
    }
}
