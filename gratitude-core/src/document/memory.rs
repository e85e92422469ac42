//! In-memory element tree implementing [`HostDocument`].
//!
//! Every structural change made through the public API (append, insert,
//! remove, clear, text replacement) is reported to subscribers as one
//! mutation batch, after the tree lock has been released. This mirrors how a
//! live DOM delivers `MutationObserver` callbacks, including the notification
//! produced by the engine's own insertions.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::{
    DocumentError, ElementSpec, HostDocument, MutationReceiver, MutationRecord, NodeId, Selector,
};

#[derive(Debug, Clone)]
struct Node {
    id_attr: Option<String>,
    classes: Vec<String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn from_spec(spec: &ElementSpec, parent: Option<NodeId>) -> Self {
        Self {
            id_attr: spec.id.clone(),
            classes: spec.classes.clone(),
            text: spec.text.clone(),
            parent,
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<NodeId, Node>,
    body: NodeId,
    next_id: u64,
}

impl Tree {
    fn new() -> Self {
        let body = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            body,
            Node {
                id_attr: None,
                classes: Vec::new(),
                text: None,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            body,
            next_id: 1,
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, DocumentError> {
        self.nodes.get(&id).ok_or(DocumentError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DocumentError> {
        self.nodes.get_mut(&id).ok_or(DocumentError::NodeNotFound(id))
    }

    /// Materialize `spec` and its children. The returned root is not yet
    /// linked into its parent's child list.
    fn build(&mut self, spec: &ElementSpec, parent: NodeId) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::from_spec(spec, Some(parent)));

        for child in &spec.children {
            let child_id = self.build(child, id);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(child_id);
            }
        }

        id
    }

    fn drop_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }

    fn collect_matches(&self, from: NodeId, selector: &Selector, out: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(&from) else {
            return;
        };
        for child in &node.children {
            if let Some(child_node) = self.nodes.get(child) {
                if selector.matches(child_node.id_attr.as_deref(), &child_node.classes) {
                    out.push(*child);
                }
                self.collect_matches(*child, selector, out);
            }
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if let Some(text) = &node.text {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }
}

/// Thread-safe in-memory page used by tests and the simulator.
pub struct MemoryDocument {
    tree: Mutex<Tree>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Vec<MutationRecord>>>>,
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MemoryDocument");
        match self.tree.try_lock() {
            Some(tree) => {
                debug.field("node_count", &tree.nodes.len());
            }
            None => {
                debug.field("tree", &"<locked>");
            }
        }
        debug
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(Tree::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn body(&self) -> NodeId {
        self.tree.lock().body
    }

    /// Append `spec` as the last child of `parent`.
    pub fn append(&self, parent: NodeId, spec: ElementSpec) -> Result<NodeId, DocumentError> {
        let id = {
            let mut tree = self.tree.lock();
            tree.node(parent)?;
            let id = tree.build(&spec, parent);
            tree.node_mut(parent)?.children.push(id);
            id
        };
        self.notify(parent, 1, 0);
        Ok(id)
    }

    /// Detach and drop `node` with its whole subtree.
    pub fn remove(&self, node: NodeId) -> Result<(), DocumentError> {
        let parent = {
            let mut tree = self.tree.lock();
            let parent = tree.node(node)?.parent.ok_or(DocumentError::Detached(node))?;
            tree.node_mut(parent)?.children.retain(|child| *child != node);
            tree.drop_subtree(node);
            parent
        };
        self.notify(parent, 0, 1);
        Ok(())
    }

    /// Drop every child of `node`, as a renderer does before re-rendering.
    pub fn clear_children(&self, node: NodeId) -> Result<(), DocumentError> {
        let removed = {
            let mut tree = self.tree.lock();
            let children = std::mem::take(&mut tree.node_mut(node)?.children);
            let removed = children.len();
            for child in children {
                tree.drop_subtree(child);
            }
            removed
        };
        if removed > 0 {
            self.notify(node, 0, removed);
        }
        Ok(())
    }

    /// Replace the element's own text. Reported as a child-list change, the
    /// way replacing `textContent` swaps the text node in a DOM.
    pub fn set_text(&self, node: NodeId, text: impl Into<String>) -> Result<(), DocumentError> {
        {
            let mut tree = self.tree.lock();
            tree.node_mut(node)?.text = Some(text.into());
        }
        self.notify(node, 1, 1);
        Ok(())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// The `id` attribute of an element, if it carries one.
    pub fn id_attribute(&self, node: NodeId) -> Option<String> {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.id_attr.clone())
    }

    /// Live subscriptions. Receivers that were dropped are pruned lazily on the
    /// next notification, so they are excluded here explicitly.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn notify(&self, target: NodeId, added: usize, removed: usize) {
        let batch = vec![MutationRecord {
            target,
            added,
            removed,
        }];
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(batch.clone()).is_ok());
        trace!(%target, added, removed, listeners = subscribers.len(), "mutation delivered");
    }
}

impl HostDocument for MemoryDocument {
    fn subscribe(&self) -> Result<MutationReceiver, DocumentError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Ok(rx)
    }

    fn query_selector_all(&self, scope: Option<NodeId>, selector: &Selector) -> Vec<NodeId> {
        let tree = self.tree.lock();
        let from = scope.unwrap_or(tree.body);
        let mut out = Vec::new();
        tree.collect_matches(from, selector, &mut out);
        out
    }

    fn text_content(&self, node: NodeId) -> Option<String> {
        let tree = self.tree.lock();
        tree.nodes.get(&node)?;
        let mut out = String::new();
        tree.collect_text(node, &mut out);
        Some(out)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.query_selector(None, &Selector::id(id))
    }

    fn insert_after(&self, anchor: NodeId, element: &ElementSpec) -> Result<NodeId, DocumentError> {
        let (parent, id) = {
            let mut tree = self.tree.lock();
            let parent = tree
                .node(anchor)?
                .parent
                .ok_or(DocumentError::Detached(anchor))?;
            let id = tree.build(element, parent);
            let siblings = &mut tree.node_mut(parent)?.children;
            let position = siblings
                .iter()
                .position(|child| *child == anchor)
                .map_or(siblings.len(), |idx| idx + 1);
            siblings.insert(position, id);
            (parent, id)
        };
        self.notify(parent, 1, 0);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(class: &str, text: &str) -> ElementSpec {
        ElementSpec::new().with_class(class).with_text(text)
    }

    #[test]
    fn query_returns_matches_in_document_order() {
        let doc = MemoryDocument::new();
        let body = doc.body();
        let first = doc.append(body, item("row", "a")).expect("append");
        let nested_parent = doc.append(body, ElementSpec::new()).expect("append");
        let second = doc.append(nested_parent, item("row", "b")).expect("append");
        let third = doc.append(body, item("row", "c")).expect("append");

        let selector = Selector::parse(".row").expect("selector");
        assert_eq!(
            doc.query_selector_all(None, &selector),
            vec![first, second, third]
        );
        assert_eq!(
            doc.query_selector_all(Some(nested_parent), &selector),
            vec![second]
        );
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let doc = MemoryDocument::new();
        let spec = ElementSpec::new()
            .with_text("Play ")
            .with_child(ElementSpec::new().with_text("Time"));
        let node = doc.append(doc.body(), spec).expect("append");

        assert_eq!(doc.text_content(node).as_deref(), Some("Play Time"));
        assert_eq!(doc.text_content(NodeId(999)), None);
    }

    #[test]
    fn insert_after_places_element_next_to_anchor() {
        let doc = MemoryDocument::new();
        let body = doc.body();
        let a = doc.append(body, item("a", "")).expect("append");
        let b = doc.append(body, item("b", "")).expect("append");

        let inserted = doc
            .insert_after(a, &ElementSpec::new().with_id("new"))
            .expect("insert");

        assert_eq!(doc.children(body), vec![a, inserted, b]);
        assert_eq!(doc.element_by_id("new"), Some(inserted));
        assert_eq!(
            doc.insert_after(NodeId(999), &ElementSpec::new()),
            Err(DocumentError::NodeNotFound(NodeId(999)))
        );
    }

    #[test]
    fn removing_a_node_drops_its_subtree() {
        let doc = MemoryDocument::new();
        let parent = doc
            .append(
                doc.body(),
                ElementSpec::new().with_child(ElementSpec::new().with_id("inner")),
            )
            .expect("append");

        assert!(doc.element_by_id("inner").is_some());
        doc.remove(parent).expect("remove");
        assert!(doc.element_by_id("inner").is_none());
        assert_eq!(doc.remove(doc.body()), Err(DocumentError::Detached(doc.body())));
    }

    #[tokio::test]
    async fn subscribers_receive_one_batch_per_change() {
        let doc = MemoryDocument::new();
        let mut rx = doc.subscribe().expect("subscribe");
        let node = doc.append(doc.body(), item("x", "1")).expect("append");
        doc.set_text(node, "2").expect("set text");

        let first = rx.recv().await.expect("first batch");
        assert_eq!(first[0].target, doc.body());
        assert_eq!(first[0].added, 1);
        let second = rx.recv().await.expect("second batch");
        assert_eq!(second[0].target, node);

        drop(rx);
        assert_eq!(doc.subscriber_count(), 0);
    }
}
