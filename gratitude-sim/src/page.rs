//! Simulated library view built from the configured selectors, so the
//! simulator exercises exactly the markup the engine is told to look for.

use std::sync::Arc;

use anyhow::{Context, Result};
use gratitude_core::{ElementSpec, EngineConfig, HostDocument, MemoryDocument, NodeId, widget_id};

pub struct LibraryPage {
    pub doc: Arc<MemoryDocument>,
    label: NodeId,
    container: NodeId,
    anchor: String,
}

impl LibraryPage {
    pub fn render(config: &EngineConfig, name: &str) -> Result<Self> {
        let doc = Arc::new(MemoryDocument::new());
        let body = doc.body();

        let label = doc
            .append(body, element_matching(&config.name_selector).with_text(name))
            .context("rendering title")?;

        // The client renders the tooltip row twice; only the last copy is live.
        for _ in 0..2 {
            doc.append(body, element_matching(&config.container_selector))
                .context("rendering tooltip row")?;
        }
        let container = *doc
            .children(body)
            .last()
            .context("tooltip row missing after render")?;

        let page = Self {
            doc,
            label,
            container,
            anchor: config.anchor_selector.clone(),
        };
        page.render_rows()?;
        Ok(page)
    }

    /// Swap the title and re-render the tooltip rows from scratch.
    pub fn navigate(&self, name: &str) -> Result<()> {
        self.doc.set_text(self.label, name)?;
        self.doc.clear_children(self.container)?;
        self.render_rows()
    }

    pub fn widget_text(&self, name: &str) -> Option<String> {
        let widget = self.doc.element_by_id(&widget_id(name))?;
        self.doc.text_content(widget)
    }

    fn render_rows(&self) -> Result<()> {
        self.doc.append(
            self.container,
            ElementSpec::new().with_text("Cloud Status: Up to date"),
        )?;
        self.doc.append(
            self.container,
            element_matching(&self.anchor).with_text("Play Time: 15 minutes"),
        )?;
        self.doc
            .append(self.container, ElementSpec::new().with_text("Achievements: 1/85"))?;
        Ok(())
    }
}

/// Element carrying the id and classes named by a compound selector.
fn element_matching(selector: &str) -> ElementSpec {
    let mut spec = ElementSpec::new();
    let mut token = String::new();
    let mut sigil = None;

    for ch in selector.trim().chars().chain(std::iter::once('.')) {
        if ch == '.' || ch == '#' {
            match sigil {
                Some('.') if !token.is_empty() => spec = spec.with_class(&token),
                Some('#') if !token.is_empty() => spec = spec.with_id(token.clone()),
                _ => {}
            }
            token.clear();
            sigil = Some(ch);
        } else {
            token.push(ch);
        }
    }

    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use gratitude_core::Selector;

    #[test]
    fn rendered_page_matches_configured_selectors() {
        let config = EngineConfig::default();
        let page = LibraryPage::render(&config, "Hades").expect("render");

        let anchor = Selector::parse(&config.anchor_selector).expect("selector");
        assert_eq!(
            page.doc.query_selector_all(Some(page.container), &anchor).len(),
            1
        );

        let containers = Selector::parse(&config.container_selector).expect("selector");
        assert_eq!(page.doc.query_selector_all(None, &containers).len(), 2);
    }

    #[test]
    fn element_matching_reads_ids_and_classes() {
        let spec = element_matching("#status.a.b");

        assert_eq!(spec.id.as_deref(), Some("status"));
        assert_eq!(spec.classes, vec!["a".to_string(), "b".to_string()]);
    }
}
