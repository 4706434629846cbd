// src/ingest/kunto.rs
//
// Adapter for the municipal "kunto" status service. Two page classes per
// (sport, area): the status accordion (primary, grouped by municipality)
// and the new-marks list (supplementary, ski only, facility names without
// grouping). The markup is machine-generated and stable enough for lenient
// regex extraction.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

use crate::ingest::source::{Feed, NameFeed, RawStatus, StatusSource};
use crate::timeparse;
use crate::types::Sport;

const DEFAULT_BASE: &str = "https://kunto.softroi.fi/LATU{area}/";

/// Areas served by the kunto service.
pub const ALL_AREAS: &[&str] = &[
    "HAMEENLINNA",
    "HYVINKAA",
    "IISALMI",
    "KAJAANI",
    "KEMI",
    "KIRKKONUMMI",
    "KOLI",
    "KOUVOLA",
    "KUOPIO",
    "KUUSAMO",
    "MIKKELI",
    "NIVALA",
    "OULU",
    "PIEKSAMAKI",
    "RAASEPORI",
    "SOTKAMOVUOKATTI",
    "SYOTE",
    "TORNIO",
    "VARKAUS",
    "YLIVIESKA",
];

fn primary_path(sport: Sport) -> &'static str {
    match sport {
        Sport::SkiTrack => "latuui/loadLatuStatusListAccordion.html",
        Sport::SkatingField => "latuui/loadLuisteluStatusListAccordion.html",
    }
}

/// The new-marks page exists only for ski tracks.
fn supplementary_path(sport: Sport) -> Option<&'static str> {
    match sport {
        Sport::SkiTrack => Some("latuui/loadLatuNewMarks.html"),
        Sport::SkatingField => None,
    }
}

pub struct KuntoSource {
    client: reqwest::Client,
    base: String,
    offset: FixedOffset,
    timeout: Duration,
}

impl KuntoSource {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: DEFAULT_BASE.to_string(),
            offset,
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the base URL template (`{area}` placeholder), for tests or
    /// mirror deployments.
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn validate_area(&self, area: &str) -> Result<()> {
        if ALL_AREAS.contains(&area) {
            Ok(())
        } else {
            Err(anyhow!("unknown area {area:?}"))
        }
    }

    fn url(&self, area: &str, path: &str) -> String {
        format!("{}{}", self.base.replace("{area}", area), path)
    }

    async fn get(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?;
        let resp = resp
            .error_for_status()
            .with_context(|| format!("fetching {url}"))?;
        let body = resp.text().await.with_context(|| format!("reading {url}"))?;
        debug!(%url, "fetched source page");
        Ok(body)
    }
}

#[async_trait::async_trait]
impl StatusSource for KuntoSource {
    async fn fetch_primary(&self, sport: Sport, area: &str) -> Result<Feed> {
        self.validate_area(area)?;
        let url = self.url(area, primary_path(sport));
        let body = self.get(&url).await?;
        let now_local = timeparse::now_local(self.offset, Utc::now());
        Ok(parse_accordion(&body, now_local, self.offset))
    }

    async fn fetch_supplementary(&self, sport: Sport, area: &str) -> Result<NameFeed> {
        self.validate_area(area)?;
        let Some(path) = supplementary_path(sport) else {
            return Ok(NameFeed::new());
        };
        let url = self.url(area, path);
        let body = self.get(&url).await?;
        let now_local = timeparse::now_local(self.offset, Utc::now());
        Ok(parse_new_marks(&body, now_local, self.offset))
    }

    fn name(&self) -> &'static str {
        "kunto"
    }
}

/// Parse the status accordion page.
///
/// Markup shape: `<h3><a>group</a></h3>` headers, each followed by a panel
/// of facility rows, each row a numbered `<span>`, a name `<span>` and a
/// `<ul>` of status lines.
pub fn parse_accordion(html: &str, now_local: NaiveDateTime, offset: FixedOffset) -> Feed {
    static RE_GROUP: OnceCell<Regex> = OnceCell::new();
    static RE_ITEM: OnceCell<Regex> = OnceCell::new();
    let re_group =
        RE_GROUP.get_or_init(|| Regex::new(r"(?is)<h3[^>]*>\s*<a[^>]*>(.*?)</a>").unwrap());
    let re_item = RE_ITEM.get_or_init(|| {
        Regex::new(r"(?is)<span[^>]*>[^<]*</span>\s*<span[^>]*>(.*?)</span>.*?<ul[^>]*>(.*?)</ul>")
            .unwrap()
    });

    // (header start, panel start, group name) per accordion section.
    let headers: Vec<(usize, usize, String)> = re_group
        .captures_iter(html)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let group = clean_text(&c[1]);
            (!group.is_empty()).then(|| (whole.start(), whole.end(), group))
        })
        .collect();

    let mut feed = Feed::new();
    for (i, (_, start, group)) in headers.iter().enumerate() {
        let end = headers
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(html.len());
        let panel = &html[*start..end];

        let places = feed.entry(group.clone()).or_default();
        for caps in re_item.captures_iter(panel) {
            let name = clean_text(&caps[1]);
            if name.is_empty() {
                continue;
            }
            let status_text = join_list_items(&caps[2]);
            places.insert(name, parse_status_text(&status_text, now_local, offset));
        }
    }
    feed.retain(|_, places| !places.is_empty());
    feed
}

/// Parse the new-marks page: `<a>name</a>` followed by a one-item status list.
pub fn parse_new_marks(html: &str, now_local: NaiveDateTime, offset: FixedOffset) -> NameFeed {
    static RE_MARK: OnceCell<Regex> = OnceCell::new();
    let re_mark = RE_MARK.get_or_init(|| {
        Regex::new(r"(?is)<a[^>]*>(.*?)</a>\s*<ul[^>]*>\s*<li[^>]*>(.*?)</li>").unwrap()
    });

    let mut feed = NameFeed::new();
    for caps in re_mark.captures_iter(html) {
        let name = clean_text(&caps[1]);
        let text = clean_text(&caps[2]);
        if !name.is_empty() && !text.is_empty() {
            feed.insert(name, parse_status_text(&text, now_local, offset));
        }
    }
    feed
}

fn parse_status_text(text: &str, now_local: NaiveDateTime, offset: FixedOffset) -> RawStatus {
    let date = timeparse::parse_maintenance_date(text, now_local)
        .and_then(|local| timeparse::local_to_utc(local, offset));
    let status = text
        .to_lowercase()
        .contains("suljettu")
        .then(|| "CLOSED".to_string());
    RawStatus {
        text: text.to_string(),
        date,
        status,
        description: None,
    }
}

/// Join the non-empty `<li>` texts of a status list with commas, the same
/// combined form the source's own scripts produce.
fn join_list_items(ul_inner: &str) -> String {
    static RE_LI: OnceCell<Regex> = OnceCell::new();
    let re_li = RE_LI.get_or_init(|| Regex::new(r"(?is)<li[^>]*>(.*?)</li>").unwrap());
    let parts: Vec<String> = re_li
        .captures_iter(ul_inner)
        .map(|c| clean_text(&c[1]))
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        clean_text(ul_inner)
    } else {
        parts.join(",")
    }
}

/// Decode entities, strip tags, collapse whitespace.
fn clean_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let decoded = html_escape::decode_html_entities(s).to_string();
    let stripped = re_tags.replace_all(&decoded, " ");
    re_ws.replace_all(&stripped, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const ACCORDION: &str = r##"
    <div id="accordion">
      <h3><a href="#">Oulu</a></h3>
      <div>
        <div id="l_g9">
          <span>1</span><span>Iinatti 8km</span>
          <ul><li>Kunnostettu: 05.01. klo 14:30</li><li>Hyv&auml; kunto</li></ul>
        </div>
        <div id="l_g10">
          <span>2</span><span>Herukka</span>
          <ul><li>Suljettu</li></ul>
        </div>
      </div>
      <h3><a href="#">Oulunsalo</a></h3>
      <div>
        <div id="l_g11">
          <span>3</span><span>Salonp&auml;&auml;n yhdyslatu</span>
          <ul><li></li></ul>
        </div>
      </div>
    </div>
    "##;

    const NEW_MARKS: &str = r##"
    <div>
      <a href="#">Iinatti 8km</a>
      <ul><li>Kunnostettu 05.01. klo 16:45</li></ul>
    </div>
    <div>
      <a href="#">Herukka</a>
      <ul><li>ei tietoa</li></ul>
    </div>
    "##;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    #[test]
    fn accordion_parses_groups_places_and_dates() {
        let feed = parse_accordion(ACCORDION, now(), offset());
        assert_eq!(feed.len(), 2);

        let oulu = &feed["Oulu"];
        assert_eq!(oulu.len(), 2);
        let iinatti = &oulu["Iinatti 8km"];
        assert_eq!(iinatti.text, "Kunnostettu: 05.01. klo 14:30,Hyvä kunto");
        assert!(iinatti.date.is_some());
        assert_eq!(iinatti.status, None);

        let herukka = &oulu["Herukka"];
        assert_eq!(herukka.date, None);
        assert_eq!(herukka.status.as_deref(), Some("CLOSED"));

        // Empty status list still yields the place with empty text.
        assert!(feed["Oulunsalo"].contains_key("Salonpään yhdyslatu"));
    }

    #[test]
    fn new_marks_parses_names_and_dates() {
        let feed = parse_new_marks(NEW_MARKS, now(), offset());
        assert_eq!(feed.len(), 2);
        assert!(feed["Iinatti 8km"].date.is_some());
        assert_eq!(feed["Herukka"].date, None);
    }

    #[test]
    fn garbage_input_parses_to_empty() {
        assert!(parse_accordion("<html></html>", now(), offset()).is_empty());
        assert!(parse_new_marks("not html at all", now(), offset()).is_empty());
    }
}
