//! In-memory document tree.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Node 0 is always the document node. Detached nodes stay in the
//! arena with no parent.

pub mod markup;
pub mod snapshot;

pub use snapshot::locate_target;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Markup error at byte {position}: {message}")]
    Markup { position: usize, message: String },
    #[error("Document has no root element")]
    Empty,
    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag_name: String,
    /// Attributes in source order.
    attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// First element child of the document node (`<html>`).
    pub fn document_element(&self) -> Option<NodeId> {
        self.child_elements(self.root()).next()
    }

    fn create_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub fn append_element<I, K, V>(&mut self, parent: NodeId, tag_name: &str, attrs: I) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let element = Element {
            tag_name: tag_name.to_string(),
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };
        self.create_node(Some(parent), NodeKind::Element(element))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.create_node(Some(parent), NodeKind::Text(text.to_string()))
    }

    pub fn create_detached_element(&mut self, tag_name: &str) -> NodeId {
        let element = Element {
            tag_name: tag_name.to_string(),
            attrs: Vec::new(),
        };
        self.create_node(None, NodeKind::Element(element))
    }

    /// Remove a node from its parent. The subtree stays intact but detached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
        self.nodes[id.0].parent = None;
    }

    /// Set or replace an attribute, keeping source order for existing names.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(NodeKind::Element(element)) = self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            match element.attrs.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => element.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_document(&self, id: NodeId) -> bool {
        id == self.root()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Parent only when it is an element (`parentElement`).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Element children in order (`children`, as opposed to `childNodes`).
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        self.element(id)
            .map(|e| e.attrs.as_slice())
            .unwrap_or(&[])
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The `id` attribute when present and non-empty.
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.attr(id, "id").filter(|v| !v.is_empty())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// First direct text child, which is what XPath's `text()` yields in a
    /// string context.
    pub fn first_text(&self, id: NodeId) -> Option<&str> {
        self.children(id).iter().find_map(|c| self.text(*c))
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(text) = self.text(id) {
            out.push_str(text);
            return;
        }
        for child in self.children(id) {
            self.collect_text(*child, out);
        }
    }

    /// Whether the node can be reached from the document node.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root() {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Number of element ancestors.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent_element(id);
        while let Some(current) = cursor {
            depth += 1;
            cursor = self.parent_element(current);
        }
        depth
    }

    /// Walk `levels` steps up the parent chain.
    pub fn ancestor(&self, id: NodeId, levels: usize) -> Option<NodeId> {
        let mut current = id;
        for _ in 0..levels {
            current = self.parent(current)?;
        }
        Some(current)
    }

    /// Attached elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(current) = stack.pop() {
            if self.is_element(current) {
                out.push(current);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }
}
