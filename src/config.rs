// src/config.rs
//
// Settings come from an optional TOML file overridden by LATUWATCH_* env
// vars; every knob has a hard default so a bare environment still runs
// (dry-run, store gating).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, FixedOffset};
use serde::Deserialize;

const ENV_CONFIG_PATH: &str = "LATUWATCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/latuwatch.toml";

/// Minutes that must pass before notifying the same location again; the
/// source sometimes republishes the same maintenance event within minutes.
const DEFAULT_MIN_INTERVAL_MINS: i64 = 30;
const DEFAULT_MAX_MESSAGE_LEN: usize = 140;
/// Default display offset: UTC+2 (the facilities' local standard time).
const DEFAULT_UTC_OFFSET_MINS: i32 = 120;
const DEFAULT_STORE_PATH: &str = "state/latuwatch.json";

/// Which rate-limit strategy gates notifications. The two are never mixed
/// in one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    /// Persisted `last_notified` per location (canonical).
    Store,
    /// Recover the previous notification time from our own recent posts
    /// (storeless deployments).
    History,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub min_interval: Duration,
    /// Staleness gate threshold; `None` disables the gate (the default).
    pub max_update_age: Option<Duration>,
    pub max_message_len: usize,
    pub utc_offset: FixedOffset,
    pub store_path: PathBuf,
    pub gate: Gate,
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
}

/// File-level shape; all fields optional so a partial file works.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    min_interval_mins: Option<i64>,
    max_update_age_mins: Option<i64>,
    max_message_len: Option<usize>,
    utc_offset_mins: Option<i32>,
    store_path: Option<String>,
    gate: Option<Gate>,
    api_base_url: Option<String>,
    api_token: Option<String>,
}

impl Settings {
    /// Load from the config file (if any), then apply env overrides.
    pub fn load() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let path = PathBuf::from(p);
                if !path.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to a non-existent path"));
                }
                read_file(&path)?
            }
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    read_file(path)?
                } else {
                    FileSettings::default()
                }
            }
        };
        Self::from_parts(file)
    }

    fn from_parts(file: FileSettings) -> Result<Self> {
        let min_interval_mins = env_parse("LATUWATCH_MIN_INTERVAL_MINS")?
            .or(file.min_interval_mins)
            .unwrap_or(DEFAULT_MIN_INTERVAL_MINS);
        if min_interval_mins < 0 {
            return Err(anyhow!("minimum interval must not be negative"));
        }

        // Staleness filtering is opt-in: only a positive threshold enables it.
        let max_update_age_mins: Option<i64> =
            env_parse("LATUWATCH_MAX_UPDATE_AGE_MINS")?.or(file.max_update_age_mins);
        let max_update_age = max_update_age_mins
            .filter(|mins| *mins > 0)
            .map(Duration::minutes);

        let max_message_len = env_parse("LATUWATCH_MAX_MESSAGE_LEN")?
            .or(file.max_message_len)
            .unwrap_or(DEFAULT_MAX_MESSAGE_LEN);

        let offset_mins = env_parse("LATUWATCH_UTC_OFFSET_MINS")?
            .or(file.utc_offset_mins)
            .unwrap_or(DEFAULT_UTC_OFFSET_MINS);
        let utc_offset = FixedOffset::east_opt(offset_mins * 60)
            .ok_or_else(|| anyhow!("invalid UTC offset {offset_mins} minutes"))?;

        let store_path = std::env::var("LATUWATCH_STORE_PATH")
            .ok()
            .or(file.store_path)
            .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string());

        let gate = match std::env::var("LATUWATCH_GATE") {
            Ok(v) => match v.to_ascii_lowercase().as_str() {
                "store" => Gate::Store,
                "history" => Gate::History,
                other => return Err(anyhow!("unknown gate {other:?} (store|history)")),
            },
            Err(_) => file.gate.unwrap_or(Gate::Store),
        };

        let api_base_url = std::env::var("LATUWATCH_API_BASE_URL")
            .ok()
            .or(file.api_base_url);
        let api_token = std::env::var("LATUWATCH_API_TOKEN").ok().or(file.api_token);

        Ok(Self {
            min_interval: Duration::minutes(min_interval_mins),
            max_update_age,
            max_message_len,
            utc_offset,
            store_path: PathBuf::from(store_path),
            gate,
            api_base_url,
            api_token,
        })
    }
}

fn read_file(path: &Path) -> Result<FileSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing settings from {}", path.display()))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("invalid value for {key}: {v:?}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let s = Settings::from_parts(FileSettings::default()).unwrap();
        assert_eq!(s.min_interval, Duration::minutes(30));
        assert_eq!(s.max_update_age, None);
        assert_eq!(s.max_message_len, 140);
        assert_eq!(s.gate, Gate::Store);
    }

    #[test]
    fn file_values_apply() {
        let file: FileSettings = toml::from_str(
            r#"
            min_interval_mins = 45
            max_update_age_mins = 720
            gate = "history"
            "#,
        )
        .unwrap();
        let s = Settings::from_parts(file).unwrap();
        assert_eq!(s.min_interval, Duration::minutes(45));
        assert_eq!(s.max_update_age, Some(Duration::minutes(720)));
        assert_eq!(s.gate, Gate::History);
    }

    #[test]
    fn non_positive_age_threshold_disables_staleness_gate() {
        let file: FileSettings = toml::from_str("max_update_age_mins = 0").unwrap();
        let s = Settings::from_parts(file).unwrap();
        assert_eq!(s.max_update_age, None);

        let file: FileSettings = toml::from_str("max_update_age_mins = -5").unwrap();
        let s = Settings::from_parts(file).unwrap();
        assert_eq!(s.max_update_age, None);
    }
}
