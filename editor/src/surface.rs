//! The live editing surface.
//!
//! A [`Surface`] is whatever actually displays the document and owns the
//! native selection: a browser element, a GUI text view, or the in-memory
//! [`MemorySurface`] used headless and in tests. The editor never holds
//! references into it, only [`LiveNodeId`] handles that are valid until the
//! next render.

use rustc_hash::FxHashMap;
use scribe_markup::{serialize, NodeId, Tree};
use tracing::trace;

/// Handle to a text node on the live surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiveNodeId(u64);

impl LiveNodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A live node plus a UTF-16 offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivePoint {
    pub node: LiveNodeId,
    pub offset: usize,
}

impl LivePoint {
    pub fn new(node: LiveNodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A native selection range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub start: LivePoint,
    pub end: LivePoint,
}

impl LiveRange {
    pub fn new(start: LivePoint, end: LivePoint) -> Self {
        Self { start, end }
    }

    pub fn caret(point: LivePoint) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// What the editor needs from a live surface.
pub trait Surface {
    /// Text nodes in the surface's own document order.
    fn text_nodes(&self) -> Vec<LiveNodeId>;

    /// True while the surface has input focus.
    fn is_active(&self) -> bool;

    /// False once the surface has been torn down.
    fn is_attached(&self) -> bool;

    /// The current native selection, if any.
    fn selection(&self) -> Option<LiveRange>;

    fn set_selection(&mut self, range: LiveRange);

    /// Deepest node containing both ends of `range`.
    fn common_ancestor(&self, range: &LiveRange) -> Option<LiveNodeId>;

    /// Replace the displayed content with `markup`. Invalidates every
    /// [`LiveNodeId`] handed out before.
    fn render(&mut self, markup: &str);

    /// Markup of what is currently displayed.
    fn markup(&self) -> String;

    /// Replace the named highlight layer.
    fn set_highlights(&mut self, name: &str, ranges: Vec<LiveRange>);
}

/// Deterministic in-memory surface.
///
/// Renders by parsing markup into its own tree and handing out fresh live
/// ids for every node. Rendering can be deferred to model a surface that has
/// not yet flushed its DOM update.
#[derive(Debug, Default)]
pub struct MemorySurface {
    tree: Tree,
    live: FxHashMap<NodeId, LiveNodeId>,
    nodes: FxHashMap<LiveNodeId, NodeId>,
    next_id: u64,
    focused: bool,
    detached: bool,
    selection: Option<LiveRange>,
    selection_writes: usize,
    highlights: FxHashMap<String, Vec<LiveRange>>,
    defer_render: bool,
    pending: Option<String>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn detach(&mut self) {
        self.detached = true;
        self.focused = false;
    }

    /// Hold renders back until [`Self::flush_render`] is called.
    pub fn set_deferred_render(&mut self, defer: bool) {
        self.defer_render = defer;
    }

    /// Apply a render held back by deferral. Returns false if none was held.
    pub fn flush_render(&mut self) -> bool {
        match self.pending.take() {
            Some(markup) => {
                self.apply_render(&markup);
                true
            },
            None => false,
        }
    }

    /// Move the native selection as a user would, without counting it as a
    /// programmatic write.
    pub fn place_selection(&mut self, range: Option<LiveRange>) {
        self.selection = range;
    }

    /// How many times [`Surface::set_selection`] has been called.
    pub fn selection_writes(&self) -> usize {
        self.selection_writes
    }

    pub fn highlights(&self, name: &str) -> &[LiveRange] {
        self.highlights.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// The `n`th text node in document order.
    pub fn text_node(&self, n: usize) -> Option<LiveNodeId> {
        self.tree
            .text_leaves(self.tree.root())
            .nth(n)
            .and_then(|leaf| self.live.get(&leaf).copied())
    }

    /// Text displayed by a live node.
    pub fn text_of(&self, node: LiveNodeId) -> Option<&str> {
        self.nodes.get(&node).and_then(|&id| self.tree.text(id))
    }

    /// Change a text node in place, the way native editing or spellcheck
    /// autocorrect mutates a DOM text node.
    pub fn edit_text(&mut self, node: LiveNodeId, text: &str) -> bool {
        match self.nodes.get(&node) {
            Some(&id) if self.tree.is_text(id) => {
                self.tree.set_text(id, text);
                true
            },
            _ => false,
        }
    }

    fn apply_render(&mut self, markup: &str) {
        self.tree = scribe_markup::parse(markup);
        self.live.clear();
        self.nodes.clear();
        for id in self.tree.descendants(self.tree.root()) {
            let live = LiveNodeId(self.next_id);
            self.next_id += 1;
            self.live.insert(id, live);
            self.nodes.insert(live, id);
        }
        // Old handles are gone, so the old selection is too
        self.selection = None;
        trace!(nodes = self.live.len(), "surface rendered");
    }
}

impl Surface for MemorySurface {
    fn text_nodes(&self) -> Vec<LiveNodeId> {
        if self.detached {
            return Vec::new();
        }
        self.tree
            .text_leaves(self.tree.root())
            .filter_map(|leaf| self.live.get(&leaf).copied())
            .collect()
    }

    fn is_active(&self) -> bool {
        self.focused && !self.detached
    }

    fn is_attached(&self) -> bool {
        !self.detached
    }

    fn selection(&self) -> Option<LiveRange> {
        self.selection
    }

    fn set_selection(&mut self, range: LiveRange) {
        self.selection_writes += 1;
        self.selection = Some(range);
    }

    fn common_ancestor(&self, range: &LiveRange) -> Option<LiveNodeId> {
        let start = *self.nodes.get(&range.start.node)?;
        let end = *self.nodes.get(&range.end.node)?;
        let common = self.tree.common_ancestor(start, end)?;
        self.live.get(&common).copied()
    }

    fn render(&mut self, markup: &str) {
        if self.defer_render {
            self.pending = Some(markup.to_string());
            return;
        }
        self.apply_render(markup);
    }

    fn markup(&self) -> String {
        serialize(&self.tree)
    }

    fn set_highlights(&mut self, name: &str, ranges: Vec<LiveRange>) {
        self.highlights.insert(name.to_string(), ranges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_hands_out_fresh_ids() {
        let mut surface = MemorySurface::new();
        surface.render("<p>a<b>b</b></p>");
        let first = surface.text_nodes();
        assert_eq!(first.len(), 2);
        assert_eq!(surface.text_of(first[1]), Some("b"));

        surface.render("<p>a<b>b</b></p>");
        let second = surface.text_nodes();
        assert_eq!(second.len(), 2);
        assert!(first.iter().all(|id| !second.contains(id)));
        assert_eq!(surface.text_of(first[0]), None);
    }

    #[test]
    fn deferred_render_keeps_old_content() {
        let mut surface = MemorySurface::new();
        surface.render("<p>one</p>");
        surface.set_deferred_render(true);
        surface.render("<p>one</p><p>two</p>");
        assert_eq!(surface.text_nodes().len(), 1);
        assert!(surface.flush_render());
        assert_eq!(surface.text_nodes().len(), 2);
        assert!(!surface.flush_render());
    }

    #[test]
    fn common_ancestor_of_range() {
        let mut surface = MemorySurface::new();
        surface.render("<p>a<b>b</b></p><p>c</p>");
        let a = surface.text_node(0).unwrap();
        let b = surface.text_node(1).unwrap();
        let c = surface.text_node(2).unwrap();

        let within = LiveRange::new(LivePoint::new(a, 0), LivePoint::new(b, 1));
        let across = LiveRange::new(LivePoint::new(a, 0), LivePoint::new(c, 1));
        let p = surface.common_ancestor(&within).unwrap();
        let root = surface.common_ancestor(&across).unwrap();
        assert_ne!(p, root);
        assert_eq!(
            surface.common_ancestor(&LiveRange::caret(LivePoint::new(a, 0))),
            Some(a)
        );
    }

    #[test]
    fn edit_text_changes_markup() {
        let mut surface = MemorySurface::new();
        surface.render("<p>teh</p>");
        let node = surface.text_node(0).unwrap();
        assert!(surface.edit_text(node, "the"));
        assert_eq!(surface.markup(), "<p>the</p>");
    }

    #[test]
    fn detached_surface_has_no_nodes() {
        let mut surface = MemorySurface::new();
        surface.render("<p>a</p>");
        surface.focus();
        surface.detach();
        assert!(surface.text_nodes().is_empty());
        assert!(!surface.is_active());
        assert!(!surface.is_attached());
    }
}
