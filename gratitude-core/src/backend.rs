//! Backend seam: one bulk fetch of every acquisition record.
//!
//! The transport is opaque to the engine. A backend answers with the JSON
//! mapping `{"<display name>": {"date", "acquisition", "game_name"?}}` or with
//! nothing at all when it has not scraped the license list yet.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tracing::debug;

use crate::error::{GratitudeError, Result};

#[async_trait]
pub trait LicenseBackend: Send + Sync {
    /// Serialized record mapping, or `None` when the backend holds no data.
    async fn fetch_all(&self) -> Result<Option<String>>;
}

/// Backend holding its payload in memory.
///
/// Counts fetches, can be told to fail the next call, and can be gated so a
/// fetch stays in flight until [`MemoryBackend::release`] is called.
pub struct MemoryBackend {
    payload: Mutex<Option<String>>,
    fail_next: Mutex<Option<String>>,
    fetches: AtomicUsize,
    gate: Option<Semaphore>,
    started: Notify,
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("has_payload", &self.payload.lock().is_some())
            .field("fetches", &self.fetch_count())
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            payload: Mutex::new(None),
            fail_next: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            gate: None,
            started: Notify::new(),
        }
    }

    pub fn with_payload(payload: impl Into<String>) -> Self {
        let backend = Self::new();
        backend.set_payload(Some(payload.into()));
        backend
    }

    /// Every fetch blocks until a matching [`release`](Self::release).
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn set_payload(&self, payload: Option<String>) {
        *self.payload.lock() = payload;
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    /// Let one gated fetch complete.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Resolves once a fetch has begun (immediately if one already has and
    /// nobody waited for it yet).
    pub async fn fetch_started(&self) {
        self.started.notified().await;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LicenseBackend for MemoryBackend {
    async fn fetch_all(&self) -> Result<Option<String>> {
        let call = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(call, "bulk license fetch");
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|err| GratitudeError::Internal(format!("fetch gate closed: {err}")))?
                .forget();
        }

        if let Some(message) = self.fail_next.lock().take() {
            return Err(GratitudeError::Backend(message));
        }

        Ok(self.payload.lock().clone())
    }
}
