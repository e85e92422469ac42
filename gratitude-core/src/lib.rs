//! # Gratitude Core
//!
//! Change-detection and synchronization engine that annotates a live game
//! library page with how the selected game was acquired (gift, guest pass, ...).
//!
//! The page is owned by someone else: it is cleared and re-rendered at any
//! moment. The engine watches its mutations, waits for bursts to settle, reads
//! which game is selected, resolves that name against a lazily hydrated record
//! cache and inserts a small status row exactly once, discarding work for a
//! game the user has already navigated away from.
//!
//! ## Architecture
//!
//! - [`document`]: capability trait over the host page plus an in-memory page
//! - [`backend`]: bulk record fetch seam plus an in-memory backend
//! - [`cache`] / [`resolver`]: session record cache and fuzzy name resolution
//! - [`detect`]: active name and tooltip container lookup
//! - [`display`]: widget construction and anchored, idempotent insertion
//! - [`watch`]: debounced mutation watcher
//! - [`sync`]: the race-safe synchronization pass
//! - [`engine`]: setup / teardown / cache-clear facade
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gratitude_core::{EngineConfig, GratitudeEngine, MemoryBackend, MemoryDocument};
//!
//! # async fn run() -> gratitude_core::Result<()> {
//! let backend = Arc::new(MemoryBackend::with_payload(
//!     r#"{"Dota 2 - Gift": {"date": "9 Jul, 2013", "acquisition": "Gift/Guest Pass"}}"#,
//! ));
//! let engine = GratitudeEngine::new(EngineConfig::default(), backend)?;
//!
//! let page = Arc::new(MemoryDocument::new());
//! engine.setup_observer(page.clone());
//! // ... the host renders, the engine reacts ...
//! engine.reset_state();
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod backend;
pub mod cache;
pub mod config;
pub mod detect;
pub mod display;
pub mod document;
pub mod engine;
pub mod error;
pub mod record;
pub mod resolver;
pub mod sync;
pub mod watch;

pub use backend::{LicenseBackend, MemoryBackend};
pub use cache::{HydrationOutcome, RecordCache};
pub use config::{ConfigSource, EngineConfig};
pub use display::{InsertOutcome, widget_id};
pub use document::{ElementSpec, HostDocument, MemoryDocument, NodeId, Selector};
pub use engine::{EngineStatus, GratitudeEngine};
pub use error::{GratitudeError, Result};
pub use record::{AcquisitionKind, AcquisitionRecord};
pub use resolver::resolve;
pub use sync::{NoopSyncObserver, PassOutcome, SyncObserver};
