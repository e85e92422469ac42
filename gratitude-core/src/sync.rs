//! One synchronization pass: detect the selected game, make sure its widget
//! exists, and never attach data to a game the user already left.
//!
//! A pass walks Idle → Checking → (Hydrating) → Resolving → Inserting → Idle.
//! The only suspension point is the bulk hydration fetch, and everything read
//! from the page before it (the active name, the container) is read again
//! after it. Whatever happens, the pass ends idle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::backend::LicenseBackend;
use crate::cache::{CachedMatch, HydrationOutcome, RecordCache};
use crate::config::{EngineConfig, Selectors};
use crate::detect::{detect_active_name, locate_container};
use crate::display::{DisplayInserter, InsertOutcome};
use crate::document::{HostDocument, NodeId};

/// How a pass ended. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was in flight; nothing was done.
    Busy,
    /// Name label or tooltip container not rendered.
    NoActiveItem,
    AlreadyPresent { name: String },
    /// No record even after hydration.
    NoRecord { name: String },
    /// The selected game changed while the pass was suspended.
    Stale {
        started: String,
        current: Option<String>,
    },
    Inserted {
        name: String,
        key: String,
        node: NodeId,
    },
    NotApplicable { name: String },
    AnchorNotReady { name: String },
}

/// Observer hook for pass outcomes and backend trouble.
pub trait SyncObserver: Send + Sync {
    fn on_pass(&self, outcome: &PassOutcome);
    fn on_hydration(&self, outcome: &HydrationOutcome);
    fn on_error(&self, error: &str);
}

/// No-op observer used when nothing is listening.
pub struct NoopSyncObserver;

impl SyncObserver for NoopSyncObserver {
    fn on_pass(&self, _outcome: &PassOutcome) {}
    fn on_hydration(&self, _outcome: &HydrationOutcome) {}
    fn on_error(&self, _error: &str) {}
}

impl fmt::Debug for NoopSyncObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoopSyncObserver")
    }
}

/// Holds the busy flag for the lifetime of a pass.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Synchronizer<O: SyncObserver = NoopSyncObserver> {
    document: Arc<dyn HostDocument>,
    backend: Arc<dyn LicenseBackend>,
    cache: Arc<RecordCache>,
    selectors: Selectors,
    inserter: DisplayInserter,
    min_match_length: usize,
    busy: AtomicBool,
    observer: Arc<O>,
}

impl<O: SyncObserver + 'static> fmt::Debug for Synchronizer<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("cache", &self.cache)
            .field("selectors", &self.selectors)
            .field("min_match_length", &self.min_match_length)
            .field("busy", &self.is_busy())
            .field("observer_type", &std::any::type_name::<O>())
            .finish()
    }
}

impl<O: SyncObserver + 'static> Synchronizer<O> {
    pub fn new(
        document: Arc<dyn HostDocument>,
        backend: Arc<dyn LicenseBackend>,
        cache: Arc<RecordCache>,
        config: &EngineConfig,
        selectors: Selectors,
        observer: Arc<O>,
    ) -> Self {
        let inserter = DisplayInserter::new(selectors.anchor.clone(), config);
        Self {
            document,
            backend,
            cache,
            selectors,
            inserter,
            min_match_length: config.min_match_length,
            busy: AtomicBool::new(false),
            observer,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Force the flag back to idle. Only meaningful during teardown, after the
    /// pass tasks have been aborted.
    pub fn reset_busy(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub async fn run_pass(&self) -> PassOutcome {
        let outcome = match BusyGuard::acquire(&self.busy) {
            Some(_busy) => self.pass().await,
            None => PassOutcome::Busy,
        };

        log_outcome(&outcome);
        self.observer.on_pass(&outcome);
        outcome
    }

    async fn pass(&self) -> PassOutcome {
        let document = self.document.as_ref();

        let Some(name) = detect_active_name(document, &self.selectors.name) else {
            return PassOutcome::NoActiveItem;
        };
        if locate_container(document, &self.selectors.container).is_none() {
            return PassOutcome::NoActiveItem;
        }

        if self.inserter.existing(document, &name).is_some() {
            return PassOutcome::AlreadyPresent { name };
        }

        let found = match self.cache.lookup(&name, self.min_match_length) {
            Some(found) => Some(found),
            None if !self.cache.is_hydrated() => {
                self.hydrate().await;
                self.cache.lookup(&name, self.min_match_length)
            }
            None => None,
        };

        let Some(CachedMatch { key, record, .. }) = found else {
            return PassOutcome::NoRecord { name };
        };

        // The page may have moved on while we were waiting on the backend.
        let current = detect_active_name(document, &self.selectors.name);
        if current.as_deref() != Some(name.as_str()) {
            return PassOutcome::Stale {
                started: name,
                current,
            };
        }

        let Some(container) = locate_container(document, &self.selectors.container) else {
            return PassOutcome::NoActiveItem;
        };
        if self.inserter.existing(document, &name).is_some() {
            return PassOutcome::AlreadyPresent { name };
        }

        match self.inserter.insert(document, container, &name, &record) {
            InsertOutcome::Inserted(node) => PassOutcome::Inserted { name, key, node },
            InsertOutcome::NotApplicable => PassOutcome::NotApplicable { name },
            InsertOutcome::AnchorNotReady => PassOutcome::AnchorNotReady { name },
        }
    }

    async fn hydrate(&self) {
        match self.cache.hydrate(self.backend.as_ref()).await {
            Ok(outcome) => {
                if outcome == HydrationOutcome::Empty {
                    debug!("backend returned no license records");
                }
                self.observer.on_hydration(&outcome);
            }
            Err(err) => {
                warn!(error = %err, "license hydration failed; treating as no records");
                self.observer.on_error(&err.to_string());
            }
        }
    }
}

fn log_outcome(outcome: &PassOutcome) {
    match outcome {
        PassOutcome::Busy => debug!("pass skipped; another pass is in flight"),
        PassOutcome::NoActiveItem => debug!("no game page rendered"),
        PassOutcome::AlreadyPresent { name } => {
            debug!(game = %name, "display already present")
        }
        PassOutcome::NoRecord { name } => debug!(game = %name, "no license record"),
        PassOutcome::Stale { started, current } => debug!(
            game = %started,
            current = current.as_deref().unwrap_or("<none>"),
            "game changed during fetch; discarding"
        ),
        PassOutcome::Inserted { name, key, node } => {
            info!(game = %name, key = %key, %node, "inserted acquisition display")
        }
        PassOutcome::NotApplicable { name } => {
            debug!(game = %name, "license is not complimentary; nothing to show")
        }
        PassOutcome::AnchorNotReady { name } => {
            debug!(game = %name, "anchor not rendered yet; will retry on next mutation")
        }
    }
}
