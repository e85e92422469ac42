//! Narrow capability interface over the host page.
//!
//! The engine never touches a concrete DOM. Everything it needs from the page
//! is expressed by [`HostDocument`]: subscribe to structural mutations, look up
//! elements by selector or id, read text content, and insert one element after
//! another. A host that cannot provide one of these answers with "nothing
//! found" (or a [`DocumentError`]) and the engine treats that as a failed
//! detection, never as a fault.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;

pub use memory::MemoryDocument;

/// Opaque handle to an element owned by a [`HostDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node is not attached to a parent: {0}")]
    Detached(NodeId),

    #[error("document does not support mutation subscriptions")]
    SubscriptionUnavailable,

    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

/// One structural change observed under the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Element whose child list changed.
    pub target: NodeId,
    pub added: usize,
    pub removed: usize,
}

/// Receiving half of a mutation subscription. Each message is one batch of
/// records delivered together by the host. Dropping the receiver cancels the
/// subscription.
pub type MutationReceiver = mpsc::UnboundedReceiver<Vec<MutationRecord>>;

/// Compound class/id selector, e.g. `._1kiZKVbDe-9Ikootk57kpA._1aKegVl9_lSdNAyWYZQlr9`
/// or `#gratitude-status`.
///
/// Combinators (descendant, child, sibling) are not supported: every lookup the
/// engine performs is either document-wide or scoped to one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(DocumentError::InvalidSelector(raw.to_string()));
        }

        let mut id = None;
        let mut classes = Vec::new();
        let mut rest = raw;

        while !rest.is_empty() {
            let mut chars = rest.chars();
            let sigil = chars.next();
            let body = chars.as_str();
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let token = &body[..end];
            if token.is_empty() {
                return Err(DocumentError::InvalidSelector(raw.to_string()));
            }

            match sigil {
                Some('.') => classes.push(token.to_string()),
                Some('#') if id.is_none() => id = Some(token.to_string()),
                _ => return Err(DocumentError::InvalidSelector(raw.to_string())),
            }

            rest = &body[end..];
        }

        Ok(Self { id, classes })
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            classes: Vec::new(),
        }
    }

    /// True when an element with the given id attribute and class list
    /// satisfies every part of this selector.
    pub fn matches(&self, element_id: Option<&str>, classes: &[String]) -> bool {
        if let Some(expected) = self.id.as_deref()
            && element_id != Some(expected)
        {
            return false;
        }

        self.classes
            .iter()
            .all(|wanted| classes.iter().any(|class| class == wanted))
    }
}

impl FromStr for Selector {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

/// Declarative description of an element subtree to be created by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSpec {
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: Option<String>,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds every whitespace separated class in `classes`.
    pub fn with_class(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_string));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Capabilities the engine requires from the observed page.
pub trait HostDocument: Send + Sync {
    /// Subscribe to child-list changes anywhere under the document body.
    fn subscribe(&self) -> Result<MutationReceiver, DocumentError>;

    /// Every element matching `selector` in document order. With a `scope`,
    /// only descendants of that element are considered.
    fn query_selector_all(&self, scope: Option<NodeId>, selector: &Selector) -> Vec<NodeId>;

    /// Concatenated text of the element and its descendants.
    fn text_content(&self, node: NodeId) -> Option<String>;

    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// Create `element` as the next sibling of `anchor`.
    fn insert_after(&self, anchor: NodeId, element: &ElementSpec) -> Result<NodeId, DocumentError>;

    fn query_selector(&self, scope: Option<NodeId>, selector: &Selector) -> Option<NodeId> {
        self.query_selector_all(scope, selector).into_iter().next()
    }
}
