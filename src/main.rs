//! latuwatch — CLI entrypoint.
//!
//! Two commands mirror the two pipeline cycles: `update` ingests status
//! records into the store, `notify` announces fresh updates. Both print the
//! processed count; the exit code is non-zero only on unhandled store or
//! adapter errors.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use latuwatch::config::{Gate, Settings};
use latuwatch::ingest::kunto::KuntoSource;
use latuwatch::notify::microblog::{DisabledClient, HttpMicroblog, MicroblogClient};
use latuwatch::store::JsonFileStore;
use latuwatch::types::Sport;
use latuwatch::{timeparse, DedupCache};

#[derive(Parser)]
#[command(name = "latuwatch", about = "Track trail/rink maintenance and announce changes")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest status records from the source into the store.
    Update {
        /// Comma-separated sports (latu, luistelu).
        #[arg(long, default_value = "latu")]
        sports: String,
        /// Comma-separated area codes.
        #[arg(long, default_value = "OULU,SYOTE")]
        areas: String,
        /// Only keep updates within this window (e.g. 15m, 24h, 7d).
        #[arg(long, default_value = "1d")]
        since: String,
    },
    /// Announce fresh updates from the store.
    Notify {
        /// Window of updates considered (e.g. 15m, 1h).
        #[arg(long, default_value = "1h")]
        since: String,
        /// Actually post; without this flag the cycle is a dry run.
        #[arg(long)]
        post: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "latuwatch=warn",
        1 => "latuwatch=info",
        _ => "latuwatch=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Parse comma-separated sport names, logging and skipping unknown ones.
/// All-unknown input is a hard validation error.
fn parse_sports(raw: &str) -> Result<Vec<Sport>> {
    let mut sports = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match token.parse::<Sport>() {
            Ok(sport) => {
                if !sports.contains(&sport) {
                    sports.push(sport);
                }
            }
            Err(e) => warn!(%token, error = %e, "skipping unknown sport"),
        }
    }
    if sports.is_empty() {
        bail!("no valid sports in {raw:?}");
    }
    Ok(sports)
}

fn parse_areas(raw: &str) -> Result<Vec<String>> {
    let areas: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if areas.is_empty() {
        bail!("no areas in {raw:?}");
    }
    Ok(areas)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load()?;
    let store = JsonFileStore::open(&settings.store_path)?;

    match cli.command {
        Command::Update {
            sports,
            areas,
            since,
        } => {
            let sports = parse_sports(&sports)?;
            let areas = parse_areas(&areas)?;
            let window = timeparse::since_to_duration(&since)?;
            let source = KuntoSource::new(settings.utc_offset);
            let mut cache = DedupCache::new();

            let n = latuwatch::ingest::run_cycle(
                &store,
                &source,
                &sports,
                &areas,
                Some(window),
                &mut cache,
            )
            .await?;
            println!("Loaded {n} updates");
        }
        Command::Notify { since, post } => {
            let window = timeparse::since_to_duration(&since)?;
            let client: Box<dyn MicroblogClient> =
                match (&settings.api_base_url, &settings.api_token) {
                    (Some(base), Some(token)) => {
                        Box::new(HttpMicroblog::new(base.clone(), token.clone()))
                    }
                    _ if post => bail!("--post requires LATUWATCH_API_BASE_URL and _API_TOKEN"),
                    _ if settings.gate == Gate::History => {
                        bail!("history gating requires a configured microblog API")
                    }
                    _ => Box::new(DisabledClient),
                };

            let n = latuwatch::notify::run_cycle(
                &store,
                client.as_ref(),
                &settings,
                window,
                !post,
                Utc::now(),
            )
            .await?;
            println!("Sent {n} notifications from updates since {since}");
        }
    }

    Ok(())
}
