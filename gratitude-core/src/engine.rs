//! Engine facade handed to the host shell.
//!
//! One engine serves one page at a time. [`GratitudeEngine::setup_observer`]
//! attaches it (tearing down whatever was attached before), subscribes to the
//! page's mutations and runs an initial pass for content that was rendered
//! before the subscription existed. [`GratitudeEngine::reset_state`] detaches
//! it synchronously.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::LicenseBackend;
use crate::cache::RecordCache;
use crate::config::{EngineConfig, Selectors};
use crate::document::HostDocument;
use crate::error::Result;
use crate::sync::{NoopSyncObserver, PassOutcome, SyncObserver, Synchronizer};
use crate::watch::{ChangeWatcher, QuietTrigger};

type PassHandles = Arc<Mutex<Vec<JoinHandle<PassOutcome>>>>;

/// Snapshot for diagnostics and the settings surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    pub attached: bool,
    /// Whether the page's mutation stream is being watched.
    pub watching: bool,
    pub busy: bool,
    pub hydrated: bool,
    pub cached_entries: usize,
}

struct Attachment<O: SyncObserver + 'static> {
    sync: Arc<Synchronizer<O>>,
    watcher: Option<ChangeWatcher>,
    passes: PassHandles,
}

impl<O: SyncObserver + 'static> Attachment<O> {
    fn shutdown(self) {
        if let Some(watcher) = self.watcher {
            watcher.shutdown();
        }
        for pass in self.passes.lock().drain(..) {
            pass.abort();
        }
        self.sync.reset_busy();
    }
}

pub struct GratitudeEngine<O: SyncObserver + 'static = NoopSyncObserver> {
    config: EngineConfig,
    selectors: Selectors,
    backend: Arc<dyn LicenseBackend>,
    cache: Arc<RecordCache>,
    observer: Arc<O>,
    attachment: Mutex<Option<Attachment<O>>>,
}

impl<O: SyncObserver + 'static> fmt::Debug for GratitudeEngine<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GratitudeEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("observer_type", &std::any::type_name::<O>())
            .field("status", &self.status())
            .finish()
    }
}

impl GratitudeEngine<NoopSyncObserver> {
    pub fn new(config: EngineConfig, backend: Arc<dyn LicenseBackend>) -> Result<Self> {
        Self::with_observer(config, backend, Arc::new(NoopSyncObserver))
    }
}

impl<O: SyncObserver + 'static> GratitudeEngine<O> {
    pub fn with_observer(
        config: EngineConfig,
        backend: Arc<dyn LicenseBackend>,
        observer: Arc<O>,
    ) -> Result<Self> {
        let selectors = config.selectors()?;
        Ok(Self {
            config,
            selectors,
            backend,
            cache: Arc::new(RecordCache::new()),
            observer,
            attachment: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attach to `document` and run the initial pass. Must be called from
    /// within a Tokio runtime.
    pub fn setup_observer(&self, document: Arc<dyn HostDocument>) {
        self.reset_state();

        let sync = Arc::new(Synchronizer::new(
            Arc::clone(&document),
            Arc::clone(&self.backend),
            Arc::clone(&self.cache),
            &self.config,
            self.selectors.clone(),
            Arc::clone(&self.observer),
        ));
        let passes: PassHandles = Arc::new(Mutex::new(Vec::new()));

        let trigger: QuietTrigger = {
            let sync = Arc::clone(&sync);
            let passes = Arc::clone(&passes);
            Arc::new(move || schedule_pass(&sync, &passes))
        };

        let watcher = match document.subscribe() {
            Ok(mutations) => Some(ChangeWatcher::spawn(
                mutations,
                self.config.debounce_window(),
                Arc::clone(&trigger),
            )),
            Err(err) => {
                warn!(error = %err, "page cannot be observed; only the initial pass will run");
                self.observer.on_error(&err.to_string());
                None
            }
        };

        info!(
            debounce_ms = self.config.debounce_window_ms,
            watching = watcher.is_some(),
            "observer attached"
        );

        *self.attachment.lock() = Some(Attachment {
            sync,
            watcher,
            passes,
        });

        trigger();
    }

    pub fn disconnect_observer(&self) {
        self.reset_state();
    }

    /// Detach from the current page: stop the debounce loop, unsubscribe,
    /// abort in-flight passes, clear the cache and the busy flag.
    pub fn reset_state(&self) {
        let attachment = self.attachment.lock().take();
        if let Some(attachment) = attachment {
            attachment.shutdown();
            debug!("observer detached");
        }
        self.cache.clear();
    }

    /// Drop the in-memory records only. The next miss re-hydrates.
    pub fn clear_frontend_cache(&self) {
        self.cache.clear();
        info!("frontend license cache cleared");
    }

    /// Run a pass right away on the attached page, bypassing the debounce
    /// window. `None` when nothing is attached.
    pub async fn sync_now(&self) -> Option<PassOutcome> {
        let sync = self
            .attachment
            .lock()
            .as_ref()
            .map(|attachment| Arc::clone(&attachment.sync))?;
        Some(sync.run_pass().await)
    }

    pub fn status(&self) -> EngineStatus {
        let (attached, watching, busy) = match self.attachment.lock().as_ref() {
            Some(attachment) => (
                true,
                attachment
                    .watcher
                    .as_ref()
                    .is_some_and(ChangeWatcher::is_running),
                attachment.sync.is_busy(),
            ),
            None => (false, false, false),
        };

        EngineStatus {
            attached,
            watching,
            busy,
            hydrated: self.cache.is_hydrated(),
            cached_entries: self.cache.len(),
        }
    }
}

impl<O: SyncObserver + 'static> Drop for GratitudeEngine<O> {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.get_mut().take() {
            attachment.shutdown();
        }
    }
}

fn schedule_pass<O: SyncObserver + 'static>(sync: &Arc<Synchronizer<O>>, passes: &PassHandles) {
    let sync = Arc::clone(sync);
    let handle = tokio::spawn(async move { sync.run_pass().await });

    let mut passes = passes.lock();
    passes.retain(|pass| !pass.is_finished());
    passes.push(handle);
}
