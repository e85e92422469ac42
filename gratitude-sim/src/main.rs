//! Drives the engine against a simulated library page: renders the first
//! title, then navigates through the rest, printing what the engine inserted
//! for each one.

mod page;

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use gratitude_core::{
    ConfigSource, EngineConfig, GratitudeEngine, HostDocument, HydrationOutcome, MemoryBackend,
    PassOutcome, SyncObserver,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use page::LibraryPage;

const SAMPLE_RECORDS: &str = r#"{
    "Dota 2 - Gift": {"date": "9 Jul, 2013", "acquisition": "Gift/Guest Pass"},
    "Portal 2": {"date": "19 Apr, 2011", "acquisition": "Complimentary"},
    "Hades": {"date": "17 Sep, 2020", "acquisition": "Retail"}
}"#;

#[derive(Parser)]
#[command(
    name = "gratitude-sim",
    about = "Replay library navigation against the Gratitude engine"
)]
struct Cli {
    /// JSON file mapping game names to acquisition records
    #[arg(long)]
    records: Option<PathBuf>,

    /// Titles to visit, in order
    #[arg(long, num_args = 1.., required = true)]
    navigate: Vec<String>,

    /// Engine config file (.toml or .json); falls back to the environment
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to stay on each title before reading the page
    #[arg(long, default_value_t = 500)]
    dwell_ms: u64,
}

#[derive(Default)]
struct Tally {
    passes: AtomicUsize,
    inserted: AtomicUsize,
    errors: AtomicUsize,
}

impl SyncObserver for Tally {
    fn on_pass(&self, outcome: &PassOutcome) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        if matches!(outcome, PassOutcome::Inserted { .. }) {
            self.inserted.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_hydration(&self, outcome: &HydrationOutcome) {
        info!(?outcome, "records hydrated");
    }

    fn on_error(&self, error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(error, "engine reported an error");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let (config, source) = match &cli.config {
        Some(path) => (
            EngineConfig::load_from_file(path)?,
            ConfigSource::File(path.clone()),
        ),
        None => EngineConfig::load_from_env()?,
    };
    info!(?source, debounce_ms = config.debounce_window_ms, "configuration loaded");

    let payload = match &cli.records {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading records from {}", path.display()))?;
            let entries = count_records(&raw)
                .with_context(|| format!("validating records in {}", path.display()))?;
            info!(entries, path = %path.display(), "records loaded");
            raw
        }
        None => SAMPLE_RECORDS.to_string(),
    };
    let backend = Arc::new(MemoryBackend::with_payload(payload));
    let tally = Arc::new(Tally::default());
    let engine = GratitudeEngine::with_observer(config.clone(), backend.clone(), tally.clone())?;

    let Some((first, rest)) = cli.navigate.split_first() else {
        bail!("nothing to navigate to");
    };
    let dwell = Duration::from_millis(cli.dwell_ms);

    let page = LibraryPage::render(&config, first)?;
    let document: Arc<dyn HostDocument> = page.doc.clone();
    engine.setup_observer(document);

    tokio::time::sleep(dwell).await;
    report(&page, first);

    for name in rest {
        page.navigate(name)?;
        tokio::time::sleep(dwell).await;
        report(&page, name);
    }

    let status = engine.status();
    engine.disconnect_observer();

    info!(
        passes = tally.passes.load(Ordering::Relaxed),
        inserted = tally.inserted.load(Ordering::Relaxed),
        errors = tally.errors.load(Ordering::Relaxed),
        fetches = backend.fetch_count(),
        cached_entries = status.cached_entries,
        "simulation finished"
    );

    Ok(())
}

/// Number of entries in a records file, which must be a JSON object.
fn count_records(raw: &str) -> Result<usize> {
    let value: serde_json::Value = serde_json::from_str(raw).context("records are not JSON")?;
    match value.as_object() {
        Some(entries) => Ok(entries.len()),
        None => bail!("records must be a JSON object keyed by game name"),
    }
}

fn report(page: &LibraryPage, name: &str) {
    match page.widget_text(name) {
        Some(text) => println!("{name}\t{text}"),
        None => println!("{name}\t-"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_records_are_valid() {
        assert_eq!(count_records(SAMPLE_RECORDS).expect("sample"), 3);
    }

    #[test]
    fn records_must_be_an_object() {
        assert!(count_records("[1, 2]").is_err());
        assert!(count_records("not json").is_err());
        assert_eq!(count_records("{}").expect("empty object"), 0);
    }
}
