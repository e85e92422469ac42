//! Widget construction and idempotent placement.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::EngineConfig;
use crate::document::{ElementSpec, HostDocument, NodeId, Selector};
use crate::record::{AcquisitionKind, AcquisitionRecord};

const WIDGET_ID_PREFIX: &str = "gratitude";
const MAX_SLUG_CHARS: usize = 48;

const ROW_CLASSES: &str = "_1kiZKVbDe-9Ikootk57kpA gratitude-status";
const ICON_CLASSES: &str = "_1tIg-QIrwMNtCm7NcYADyi _1GZdosVXnfrf69yU8DWASl gratitude-icon";
const TEXT_CLASSES: &str = "_3m_zjRTQBqcfzCjXLXUHcR";
const LABEL_CLASSES: &str = "_34lrt5-Fc3usZU6trA1P0-";
const VALUE_CLASSES: &str = "_2TYVGoD27ZMfjRirKQNLfk";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(NodeId),
    /// The record is not a complimentary acquisition.
    NotApplicable,
    /// The anchor sibling is not rendered yet (or vanished mid-insert).
    AnchorNotReady,
}

/// Element id for the widget of `name`.
///
/// A readable slug plus a short digest, so names that slug identically
/// ("A: B" and "A - B") still get distinct widgets.
pub fn widget_id(name: &str) -> String {
    let mut slug = String::new();
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_end_matches('-').chars().take(MAX_SLUG_CHARS).collect();
    let digest = encode_hash(&[WIDGET_ID_PREFIX, name]);

    if slug.is_empty() {
        format!("{WIDGET_ID_PREFIX}-{digest}")
    } else {
        format!("{WIDGET_ID_PREFIX}-{slug}-{digest}")
    }
}

fn encode_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    URL_SAFE_NO_PAD.encode(&digest[..6])
}

#[derive(Debug, Clone)]
pub struct DisplayInserter {
    anchor: Selector,
    qualifying_markers: Vec<String>,
    label: String,
}

impl DisplayInserter {
    pub fn new(anchor: Selector, config: &EngineConfig) -> Self {
        Self {
            anchor,
            qualifying_markers: config.qualifying_markers.clone(),
            label: config.widget_label.clone(),
        }
    }

    pub fn existing(&self, document: &dyn HostDocument, name: &str) -> Option<NodeId> {
        document.element_by_id(&widget_id(name))
    }

    pub fn build_widget(&self, name: &str, record: &AcquisitionRecord) -> ElementSpec {
        ElementSpec::new()
            .with_id(widget_id(name))
            .with_class(ROW_CLASSES)
            .with_child(ElementSpec::new().with_class(ICON_CLASSES))
            .with_child(
                ElementSpec::new()
                    .with_class(TEXT_CLASSES)
                    .with_child(
                        ElementSpec::new()
                            .with_class(LABEL_CLASSES)
                            .with_text(&self.label),
                    )
                    .with_child(
                        ElementSpec::new()
                            .with_class(VALUE_CLASSES)
                            .with_text(record.summary()),
                    ),
            )
    }

    /// Place the widget for `name` right after the anchor inside `container`.
    pub fn insert(
        &self,
        document: &dyn HostDocument,
        container: NodeId,
        name: &str,
        record: &AcquisitionRecord,
    ) -> InsertOutcome {
        if record.kind(&self.qualifying_markers) != AcquisitionKind::Complimentary {
            return InsertOutcome::NotApplicable;
        }

        let Some(anchor) = document.query_selector(Some(container), &self.anchor) else {
            return InsertOutcome::AnchorNotReady;
        };

        match document.insert_after(anchor, &self.build_widget(name, record)) {
            Ok(node) => InsertOutcome::Inserted(node),
            Err(err) => {
                debug!(game = name, error = %err, "anchor rejected insertion");
                InsertOutcome::AnchorNotReady
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;

    fn inserter() -> DisplayInserter {
        DisplayInserter::new(
            Selector::parse(".play-time").expect("selector"),
            &EngineConfig::default(),
        )
    }

    fn gift() -> AcquisitionRecord {
        AcquisitionRecord::new("24 Dec, 2019", "Gift/Guest Pass")
    }

    #[test]
    fn widget_ids_are_stable_and_distinct() {
        assert_eq!(widget_id("Dota 2"), widget_id("Dota 2"));
        assert_ne!(widget_id("A: B"), widget_id("A - B"));
        assert!(widget_id("Dota 2").starts_with("gratitude-dota-2-"));
        assert!(widget_id("!!!").starts_with("gratitude-"));
        assert!(widget_id("  Spaced  Out ").starts_with("gratitude-spaced-out-"));
    }

    #[test]
    fn widget_lands_directly_after_anchor() {
        let doc = MemoryDocument::new();
        let container = doc.append(doc.body(), ElementSpec::new()).expect("append");
        let cloud = doc
            .append(container, ElementSpec::new().with_class("cloud"))
            .expect("append");
        let play_time = doc
            .append(container, ElementSpec::new().with_class("play-time"))
            .expect("append");
        let achievements = doc
            .append(container, ElementSpec::new().with_class("achievements"))
            .expect("append");

        let outcome = inserter().insert(&doc, container, "Dota 2", &gift());

        let InsertOutcome::Inserted(widget) = outcome else {
            panic!("expected insertion, got {outcome:?}");
        };
        assert_eq!(
            doc.children(container),
            vec![cloud, play_time, widget, achievements]
        );
        assert_eq!(
            doc.text_content(widget).as_deref(),
            Some("Gift?Acquired on: 24 Dec, 2019 via Gift/Guest Pass")
        );
        assert_eq!(inserter().existing(&doc, "Dota 2"), Some(widget));
    }

    #[test]
    fn purchases_are_not_applicable() {
        let doc = MemoryDocument::new();
        let container = doc.append(doc.body(), ElementSpec::new()).expect("append");
        doc.append(container, ElementSpec::new().with_class("play-time"))
            .expect("append");

        let bought = AcquisitionRecord::new("1 Jan, 2020", "Steam Store");

        assert_eq!(
            inserter().insert(&doc, container, "Bad North", &bought),
            InsertOutcome::NotApplicable
        );
        assert_eq!(inserter().existing(&doc, "Bad North"), None);
    }

    #[test]
    fn missing_anchor_is_transient() {
        let doc = MemoryDocument::new();
        let container = doc.append(doc.body(), ElementSpec::new()).expect("append");

        assert_eq!(
            inserter().insert(&doc, container, "Dota 2", &gift()),
            InsertOutcome::AnchorNotReady
        );
    }
}
