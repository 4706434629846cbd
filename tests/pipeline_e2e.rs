// tests/pipeline_e2e.rs
//
// End-to-end: the primary feed knows a location but has no parsed date; the
// supplementary feed carries a dated status for the same facility. After
// ingestion the stored record has the supplementary date, one notification
// goes out, and an immediate second cycle stays quiet.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

use latuwatch::config::{Gate, Settings};
use latuwatch::ingest::source::{Feed, NameFeed, RawStatus, StatusSource};
use latuwatch::notify::microblog::MockClient;
use latuwatch::store::{MemoryStore, Store};
use latuwatch::types::{Location, Sport};
use latuwatch::DedupCache;

struct FixtureSource {
    primary: Feed,
    supplementary: NameFeed,
}

#[async_trait::async_trait]
impl StatusSource for FixtureSource {
    async fn fetch_primary(&self, _sport: Sport, _area: &str) -> Result<Feed> {
        Ok(self.primary.clone())
    }

    async fn fetch_supplementary(&self, _sport: Sport, _area: &str) -> Result<NameFeed> {
        Ok(self.supplementary.clone())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

fn settings() -> Settings {
    Settings {
        min_interval: Duration::minutes(30),
        max_update_age: None,
        max_message_len: 140,
        utc_offset: FixedOffset::east_opt(2 * 3600).unwrap(),
        store_path: PathBuf::from("unused"),
        gate: Gate::Store,
        api_base_url: None,
        api_token: None,
    }
}

// 05.01. klo 14:30 local = 12:30 UTC at +02:00.
fn maintained_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 5, 12, 30, 0).unwrap()
}

fn fixture() -> FixtureSource {
    let mut places = BTreeMap::new();
    places.insert(
        "Iinatti 8km".to_string(),
        RawStatus {
            text: "Lumetus käynnissä".into(),
            date: None,
            status: None,
            description: None,
        },
    );
    let mut primary = Feed::new();
    primary.insert("Oulu".to_string(), places);

    let mut supplementary = NameFeed::new();
    supplementary.insert(
        "Iinatti 8km".to_string(),
        RawStatus {
            text: "Kunnostettu 05.01. klo 14:30".into(),
            date: Some(maintained_at()),
            status: None,
            description: None,
        },
    );

    FixtureSource {
        primary,
        supplementary,
    }
}

#[tokio::test]
async fn supplementary_date_wins_then_exactly_one_notification() {
    let store = MemoryStore::new();
    let source = fixture();
    let sports = [Sport::SkiTrack];
    let areas = vec!["OULU".to_string()];

    let mut cache = DedupCache::new();
    let inserted = latuwatch::ingest::run_cycle(&store, &source, &sports, &areas, None, &mut cache)
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    // The stored update carries the supplementary's date and text.
    let loc = Location {
        sport: Sport::SkiTrack,
        area: "OULU".into(),
        group: "Oulu".into(),
        name: "Iinatti 8km".into(),
    };
    let key = maintained_at().timestamp().to_string();
    let stored = store.get_update(&loc.id(), &key).await.unwrap().unwrap();
    assert_eq!(stored.date, Some(maintained_at()));
    assert_eq!(stored.text, "Kunnostettu 05.01. klo 14:30");

    // First notify cycle announces it once.
    let client = MockClient::new();
    let now = maintained_at() + Duration::minutes(10);
    let sent = latuwatch::notify::run_cycle(
        &store,
        &client,
        &settings(),
        Duration::hours(1),
        false,
        now,
    )
    .await
    .unwrap();
    assert_eq!(sent, 1);
    let posts = client.sent();
    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0],
        "Oulu, Iinatti 8km; Kunnostettu 05.01. klo 14:30 #hiihto #oulu"
    );

    // An immediate second cycle selects nothing.
    let sent = latuwatch::notify::run_cycle(
        &store,
        &client,
        &settings(),
        Duration::hours(1),
        false,
        now,
    )
    .await
    .unwrap();
    assert_eq!(sent, 0);
    assert_eq!(client.sent().len(), 1);
}

#[tokio::test]
async fn reingesting_identical_data_is_a_no_op() {
    let store = MemoryStore::new();
    let source = fixture();
    let sports = [Sport::SkiTrack];
    let areas = vec!["OULU".to_string()];

    // Same run: the dedup cache filters the repeat fetch.
    let mut cache = DedupCache::new();
    let first = latuwatch::ingest::run_cycle(&store, &source, &sports, &areas, None, &mut cache)
        .await
        .unwrap();
    let repeat = latuwatch::ingest::run_cycle(&store, &source, &sports, &areas, None, &mut cache)
        .await
        .unwrap();
    assert_eq!(first, 1);
    assert_eq!(repeat, 0);

    // Fresh process, same data: the store's put_update no-ops.
    let mut fresh_cache = DedupCache::new();
    let second =
        latuwatch::ingest::run_cycle(&store, &source, &sports, &areas, None, &mut fresh_cache)
            .await
            .unwrap();
    assert_eq!(second, 0);
    assert_eq!(store.update_count(), 1);
    assert_eq!(store.location_count(), 1);
}
