//! Partitioning a node's children at text cut points.
//!
//! [`split_by`] carves the children of a container into contiguous groups at
//! a list of `(leaf, offset)` cut points. Any child subtree that straddles a
//! cut is divided in two: the left half is a fresh copy of the containers on
//! the path down to the cut leaf, the right half is the original subtree with
//! its leading content removed. The groups, concatenated, hold every piece of
//! the original content exactly once.
//!
//! ```text
//! p                         split at "world" offset 2
//! |- "hello "
//! |- em                     [ "hello ", em > "wo" ]  [ em > "rld", "!" ]
//! |  |- "world"
//! |- "!"
//! ```

use crate::{
    tree::{NodeId, Tree},
    utf16,
};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// A position inside a text leaf, in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutPoint {
    pub leaf: NodeId,
    pub offset: usize,
}

impl CutPoint {
    pub fn new(leaf: NodeId, offset: usize) -> Self {
        Self { leaf, offset }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("Cut leaf {leaf:?} is not below the split container")]
    LeafNotFound { leaf: NodeId },

    #[error("Cut node {node:?} is not a text leaf")]
    NotALeaf { node: NodeId },

    #[error("Cut offset {offset} is past the end of a leaf of length {len}")]
    OffsetOutOfBounds { offset: usize, len: usize },
}

/// Split the children of `parent` at `cuts`, given in ascending document
/// order.
///
/// Returns `cuts.len() + 1` groups. The tree is modified in place: leaves that
/// straddle a cut keep their right half, and left halves are newly allocated.
/// The children list of `parent` itself is left untouched, so callers are
/// expected to splice the groups back with [`Tree::set_children`].
///
/// Several cuts may address the same leaf; their offsets always refer to the
/// leaf's value before any cut was applied.
pub fn split_by(
    tree: &mut Tree,
    parent: NodeId,
    cuts: &[CutPoint],
) -> Result<Vec<Vec<NodeId>>, SplitError> {
    let mut remaining = tree.children(parent).to_vec();
    let mut groups = Vec::with_capacity(cuts.len() + 1);
    // UTF-16 units already cut off the front of a leaf by earlier cut points
    let mut consumed: FxHashMap<NodeId, usize> = FxHashMap::default();

    for cut in cuts {
        let Some(value) = tree.text(cut.leaf) else {
            return Err(SplitError::NotALeaf { node: cut.leaf });
        };
        let len = utf16::len(value);
        let already = consumed.get(&cut.leaf).copied();

        let Some(index) = remaining.iter().position(|&c| tree.contains(c, cut.leaf)) else {
            // Every remaining unit of this leaf went into an earlier group, so
            // a repeated cut at the same spot produces an empty group.
            if already.is_some() {
                groups.push(Vec::new());
                continue;
            }
            return Err(SplitError::LeafNotFound { leaf: cut.leaf });
        };

        let offset = cut
            .offset
            .checked_sub(already.unwrap_or(0))
            .filter(|&offset| offset <= len)
            .ok_or(SplitError::OffsetOutOfBounds {
                offset: cut.offset,
                len: len + already.unwrap_or(0),
            })?;

        let (left, right) = split_node(tree, remaining[index], cut.leaf, offset);
        if offset > 0 && offset < len {
            *consumed.entry(cut.leaf).or_default() += offset;
        } else {
            consumed.entry(cut.leaf).or_default();
        }

        let mut group: Vec<NodeId> = remaining[..index].to_vec();
        group.extend(left);
        groups.push(group);

        let mut rest: Vec<NodeId> = right.into_iter().collect();
        rest.extend_from_slice(&remaining[index + 1..]);
        remaining = rest;
    }

    groups.push(remaining);
    Ok(groups)
}

/// Divide the subtree `node` at `offset` inside `leaf`.
///
/// - offset 0 at the very start of the subtree: `(None, node)`
/// - offset at the very end of the subtree: `(node, None)`
/// - otherwise: `(copy, node)` where the copy holds everything before the cut
fn split_node(
    tree: &mut Tree,
    node: NodeId,
    leaf: NodeId,
    offset: usize,
) -> (Option<NodeId>, Option<NodeId>) {
    if node == leaf {
        let value = tree.text(leaf).unwrap_or_default().to_string();
        let len = utf16::len(&value);
        if offset == 0 {
            return (None, Some(node));
        }
        if offset >= len {
            return (Some(node), None);
        }
        let (head, tail) = utf16::split_at(&value, offset);
        let left = tree.create_text(head, None);
        tree.set_text(leaf, tail);
        return (Some(left), Some(node));
    }

    let children = tree.children(node).to_vec();
    let Some(index) = children.iter().position(|&c| tree.contains(c, leaf)) else {
        return (None, Some(node));
    };
    let (left, right) = split_node(tree, children[index], leaf, offset);

    let mut left_children: Vec<NodeId> = children[..index].to_vec();
    left_children.extend(left);
    let mut right_children: Vec<NodeId> = right.into_iter().collect();
    right_children.extend_from_slice(&children[index + 1..]);

    if left_children.is_empty() {
        return (None, Some(node));
    }
    if right_children.is_empty() {
        return (Some(node), None);
    }

    let copy = tree.shallow_clone(node);
    tree.set_children(copy, left_children);
    tree.set_children(node, right_children);
    (Some(copy), Some(node))
}
