//! Arena-backed document tree.
//!
//! All nodes live in one `Vec` owned by [`Tree`] and are addressed by
//! [`NodeId`]. Nothing outside the tree holds a pointer into it: consumers
//! such as the offset index keep `NodeId`s in their own lookup tables and
//! throw those tables away whenever the tree is replaced.
//!
//! Nodes detached by an edit stay in the arena until the tree is dropped.
//! Trees are short lived (every committed edit re-parses), so the arena is
//! never compacted.

use compact_str::CompactString;
use smallvec::SmallVec;
use std::{fmt::Write as _, ops::Range};

/// Handle to a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single `name="value"` pair on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: CompactString,
    pub value: CompactString,
}

impl Attribute {
    pub fn new(name: impl Into<CompactString>, value: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub type Attributes = SmallVec<[Attribute; 2]>;

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The fragment root. Exactly one per tree.
    Root,
    /// Container with a tag name, attributes and ordered children
    Element {
        tag: CompactString,
        attributes: Attributes,
    },
    /// Text leaf
    Text {
        value: String,
        /// UTF-16 range of the raw source slice this leaf was parsed from.
        /// `None` for leaves created or trimmed by edits.
        position: Option<Range<usize>>,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text { .. })
    }

    /// Text value for leaves, `None` for containers
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Tag name for elements, `None` for the root and leaves
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match &self.kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Source position of a text leaf, if known
    pub fn position(&self) -> Option<Range<usize>> {
        match &self.kind {
            NodeKind::Text { position, .. } => position.clone(),
            _ => None,
        }
    }
}

/// An ordered, rooted hierarchy of elements and text leaves.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree containing only an empty root.
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.alloc(NodeKind::Root);
        tree
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Access a node.
    ///
    /// Panics if `id` was not allocated by this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Create a detached element.
    pub fn create_element(
        &mut self,
        tag: impl Into<CompactString>,
        attributes: Attributes,
    ) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.into(),
            attributes,
        })
    }

    /// Create a detached text leaf.
    pub fn create_text(
        &mut self,
        value: impl Into<String>,
        position: Option<Range<usize>>,
    ) -> NodeId {
        self.alloc(NodeKind::Text {
            value: value.into(),
            position,
        })
    }

    /// Copy a node without its children. Text leaves keep their value but
    /// lose their source position.
    pub fn shallow_clone(&mut self, id: NodeId) -> NodeId {
        let kind = match &self.node(id).kind {
            NodeKind::Text { value, .. } => NodeKind::Text {
                value: value.clone(),
                position: None,
            },
            other => other.clone(),
        };
        self.alloc(kind)
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Replace the children of `parent`. Previous children that are not in
    /// the new list become detached.
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let previous = std::mem::take(&mut self.nodes[parent.index()].children);
        for old in previous {
            if self.nodes[old.index()].parent == Some(parent) {
                self.nodes[old.index()].parent = None;
            }
        }
        for &child in &children {
            self.nodes[child.index()].parent = Some(parent);
        }
        self.nodes[parent.index()].children = children;
    }

    /// Replace the value of a text leaf. The leaf no longer corresponds to its
    /// source slice, so its position is cleared. No-op for containers.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let NodeKind::Text { value, position } = &mut self.nodes[id.index()].kind {
            *value = text.into();
            *position = None;
        }
    }

    /// Replace `id` in its parent's child list with `replacement`.
    pub fn replace_with(&mut self, id: NodeId, replacement: Vec<NodeId>) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let mut children = self.children(parent).to_vec();
        if let Some(index) = children.iter().position(|&c| c == id) {
            children.splice(index..=index, replacement);
            self.set_children(parent, children);
        }
    }

    /// Replace an element with its own children.
    pub fn unwrap(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        self.replace_with(id, children);
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).text()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.node(id).tag()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.node(id).is_text()
    }

    /// Parent chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// True if `node` is `ancestor` or lies below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Deepest node containing both `a` and `b`.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|&candidate| self.contains(candidate, b))
    }

    /// Pre-order traversal of the subtree rooted at `id`, including `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Text leaves below `id` in document order.
    pub fn text_leaves(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(id).filter(move |&n| self.is_text(n))
    }

    /// Depth-first concatenation of every leaf value under `id`.
    pub fn flatten_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        for leaf in self.text_leaves(id) {
            out.push_str(self.text(leaf).unwrap_or_default());
        }
        out
    }

    /// Plain-text projection of the whole tree.
    pub fn flatten(&self) -> String {
        self.flatten_node(self.root)
    }

    /// Same leaf order, leaf text and container nesting. Attribute order and
    /// source positions are ignored.
    pub fn structurally_eq(&self, other: &Tree) -> bool {
        self.node_eq(self.root, other, other.root)
    }

    fn node_eq(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let (left, right) = (self.node(a), other.node(b));
        let same_kind = match (&left.kind, &right.kind) {
            (NodeKind::Root, NodeKind::Root) => true,
            (NodeKind::Text { value: x, .. }, NodeKind::Text { value: y, .. }) => x == y,
            (
                NodeKind::Element {
                    tag: t1,
                    attributes: a1,
                },
                NodeKind::Element {
                    tag: t2,
                    attributes: a2,
                },
            ) => t1 == t2 && a1.len() == a2.len() && a1.iter().all(|attr| a2.contains(attr)),
            _ => false,
        };

        same_kind
            && left.children.len() == right.children.len()
            && left
                .children
                .iter()
                .zip(&right.children)
                .all(|(&x, &y)| self.node_eq(x, other, y))
    }

    /// Indented outline of the tree, one node per line. Used in tests and
    /// debug logging.
    pub fn outline(&self) -> String {
        let mut buffer = String::new();
        self.outline_node(self.root, 0, &mut buffer);
        buffer.trim_end().to_string()
    }

    fn outline_node(&self, id: NodeId, indent: usize, buffer: &mut String) {
        for _ in 0..indent {
            buffer.push_str("  ");
        }
        match &self.node(id).kind {
            NodeKind::Root => buffer.push_str("root"),
            NodeKind::Element { tag, .. } => buffer.push_str(tag),
            NodeKind::Text { value, .. } => {
                let _ = write!(buffer, "{value:?}");
            },
        }
        buffer.push('\n');
        for &child in self.children(id) {
            self.outline_node(child, indent + 1, buffer);
        }
    }
}

/// Iterator returned by [`Tree::descendants`].
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}
