//! Reads of the host page: which game is selected, and where its tooltip
//! container lives. Both are synchronous and side-effect free so a pass can
//! call them again after every await.

use tracing::debug;

use crate::document::{HostDocument, NodeId, Selector};

/// Trimmed text of the first element matching `selector`; `None` when the
/// label is missing or blank.
pub fn detect_active_name(document: &dyn HostDocument, selector: &Selector) -> Option<String> {
    let label = document.query_selector(None, selector)?;
    let text = document.text_content(label)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The last element matching `selector`.
///
/// The library renders the tooltip row more than once; the last copy has been
/// the one bound to the visible game. How many copies exist depends on the
/// client version, so any count is accepted.
pub fn locate_container(document: &dyn HostDocument, selector: &Selector) -> Option<NodeId> {
    let candidates = document.query_selector_all(None, selector);
    if candidates.len() > 1 {
        debug!(
            candidates = candidates.len(),
            "multiple tooltip containers; using the last"
        );
    }
    candidates.last().copied()
}
