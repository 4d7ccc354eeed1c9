//! Coordinate conversion between the live surface, the markup source and the
//! plain-text projection.
//!
//! [`OffsetIndex::build`] walks the tree's text leaves and the surface's text
//! nodes in document order and pairs them positionally. Each leaf with a
//! known source position becomes one [`IndexNode`]:
//!
//! ```text
//! markup:  <p>ab<b>cd</b></p>
//!             ^^   ^^
//!             3..5 8..10        markup ranges
//! plain:   abcd
//!          ^^^^
//!          0..2 2..4            text ranges
//! ```
//!
//! The index is never patched. Any change to the tree or the surface
//! invalidates it and it is rebuilt from scratch.

use crate::surface::{LiveNodeId, LivePoint, LiveRange, Surface};
use rustc_hash::FxHashMap;
use scribe_markup::{utf16, NodeId, Tree};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// The surface has not rendered the tree it is being paired with.
    #[error("Surface shows {live} text nodes but the tree has {leaves} leaves")]
    Mismatch { live: usize, leaves: usize },
}

/// One text leaf paired with its live node and its ranges in both offset
/// spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNode {
    pub leaf: NodeId,
    pub live: LiveNodeId,
    pub text: Range<usize>,
    pub markup: Range<usize>,
}

impl IndexNode {
    /// Length of the leaf's text in UTF-16 units.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Markup offset of a local text offset.
    fn markup_offset(&self, local: usize) -> usize {
        (self.markup.start + local).min(self.markup.end)
    }
}

/// An index node plus a local offset into its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPoint {
    pub node: IndexNode,
    pub offset: usize,
}

impl IndexPoint {
    pub fn text_offset(&self) -> usize {
        self.node.text.start + self.offset
    }

    pub fn markup_offset(&self) -> usize {
        self.node.markup_offset(self.offset)
    }

    pub fn to_live(&self) -> LivePoint {
        LivePoint::new(self.node.live, self.offset)
    }
}

/// A selection resolved against the index. Unresolvable selections are
/// represented by `None` wherever a `SelectionRange` is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: IndexPoint,
    pub end: IndexPoint,
}

impl SelectionRange {
    pub fn text_offsets(&self) -> Range<usize> {
        self.start.text_offset()..self.end.text_offset()
    }

    pub fn markup_offsets(&self) -> Range<usize> {
        self.start.markup_offset()..self.end.markup_offset()
    }

    pub fn to_live(&self) -> LiveRange {
        LiveRange::new(self.start.to_live(), self.end.to_live())
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    nodes: Vec<IndexNode>,
    by_live: FxHashMap<LiveNodeId, usize>,
}

impl OffsetIndex {
    /// Pair the tree's text leaves with the surface's text nodes.
    ///
    /// Fails when the two sides disagree on the number of text nodes, which
    /// means the surface has not rendered this tree yet. Callers should retry
    /// after the render has flushed instead of pairing the wrong nodes.
    pub fn build<S: Surface + ?Sized>(surface: &S, tree: &Tree) -> Result<Self, IndexError> {
        let live = surface.text_nodes();
        let leaves: Vec<NodeId> = tree.text_leaves(tree.root()).collect();
        if live.len() != leaves.len() {
            return Err(IndexError::Mismatch {
                live: live.len(),
                leaves: leaves.len(),
            });
        }

        let mut index = Self::default();
        let mut offset = 0;
        for (leaf, live) in leaves.into_iter().zip(live) {
            let node = tree.node(leaf);
            let end = offset + utf16::len(node.text().unwrap_or_default());
            if let Some(markup) = node.position() {
                index.by_live.insert(live, index.nodes.len());
                index.nodes.push(IndexNode {
                    leaf,
                    live,
                    text: offset..end,
                    markup,
                });
            }
            offset = end;
        }

        tracing::trace!(nodes = index.nodes.len(), "offset index built");
        Ok(index)
    }

    pub fn nodes(&self) -> &[IndexNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index nodes for the start and end containers of a live range.
    pub fn query(&self, range: &LiveRange) -> (Option<&IndexNode>, Option<&IndexNode>) {
        (self.by_live(range.start.node), self.by_live(range.end.node))
    }

    pub fn by_live(&self, live: LiveNodeId) -> Option<&IndexNode> {
        self.by_live.get(&live).map(|&i| &self.nodes[i])
    }

    /// Resolve a live range into index coordinates.
    pub fn resolve(&self, range: &LiveRange) -> Option<SelectionRange> {
        let (start, end) = self.query(range);
        let (start, end) = (start?, end?);
        Some(SelectionRange {
            start: IndexPoint {
                node: start.clone(),
                offset: range.start.offset.min(start.len()),
            },
            end: IndexPoint {
                node: end.clone(),
                offset: range.end.offset.min(end.len()),
            },
        })
    }

    /// Selection for absolute plain-text offsets. An offset on the boundary
    /// of two nodes resolves to the earlier one.
    pub fn at_text_position(&self, start: usize, end: usize) -> Option<SelectionRange> {
        let point = |offset: usize| {
            let node = self.locate(offset, |n| &n.text)?;
            Some(IndexPoint {
                node: node.clone(),
                offset: offset - node.text.start,
            })
        };
        Some(SelectionRange {
            start: point(start)?,
            end: point(end)?,
        })
    }

    /// Selection for absolute markup offsets. Local offsets that fall past
    /// the leaf's text (inside a character reference, say) are clamped to
    /// its end.
    pub fn at_markup_position(&self, start: usize, end: usize) -> Option<SelectionRange> {
        let point = |offset: usize| {
            let node = self.locate(offset, |n| &n.markup)?;
            Some(IndexPoint {
                node: node.clone(),
                offset: (offset - node.markup.start).min(node.len()),
            })
        };
        Some(SelectionRange {
            start: point(start)?,
            end: point(end)?,
        })
    }

    /// Absolute plain-text offsets of a live range's ends.
    pub fn to_text_offsets(&self, range: &LiveRange) -> (Option<usize>, Option<usize>) {
        let (start, end) = self.query(range);
        (
            start.map(|n| n.text.start + range.start.offset.min(n.len())),
            end.map(|n| n.text.start + range.end.offset.min(n.len())),
        )
    }

    /// Absolute markup offsets of a live range's ends.
    pub fn to_markup_offsets(&self, range: &LiveRange) -> (Option<usize>, Option<usize>) {
        let (start, end) = self.query(range);
        (
            start.map(|n| n.markup_offset(range.start.offset)),
            end.map(|n| n.markup_offset(range.end.offset)),
        )
    }

    /// Live range for absolute plain-text offsets.
    pub fn to_range(&self, start: usize, end: usize) -> Option<LiveRange> {
        self.at_text_position(start, end).map(|s| s.to_live())
    }

    /// Live range for absolute markup offsets.
    pub fn to_range_from_markup(&self, start: usize, end: usize) -> Option<LiveRange> {
        self.at_markup_position(start, end).map(|s| s.to_live())
    }

    /// Earliest node whose `key` range contains `offset`, ends included.
    fn locate(&self, offset: usize, key: impl Fn(&IndexNode) -> &Range<usize>) -> Option<&IndexNode> {
        let i = self.nodes.partition_point(|n| key(n).end < offset);
        let node = self.nodes.get(i)?;
        (key(node).start <= offset).then_some(node)
    }
}
