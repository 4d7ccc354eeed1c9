//! Inline formatting of a text range.
//!
//! [`wrap_range`] toggles an inline element (`strong`, `em`, ...) over the
//! content between two cut points. Selections entirely inside an element of
//! the same tag, at any depth, are unwrapped instead, splitting that element
//! around them. A range that crosses block elements is wrapped one block at a
//! time so the inline element always sits inside a block.

use crate::{
    parse::is_block_element,
    split::{split_by, CutPoint, SplitError},
    tree::{Attributes, NodeId, Tree},
    utf16,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Range endpoints {start:?} and {end:?} share no ancestor")]
    NoCommonAncestor { start: NodeId, end: NodeId },

    #[error(transparent)]
    Split(#[from] SplitError),
}

/// Toggle `tag` over the content between `start` and `end`.
///
/// Whitespace at either end of the range is left outside the element. When an
/// endpoint already lies inside a `tag` element below the shared container,
/// the range grows to cover that whole leaf, and `tag` elements inside the
/// range are dissolved so the result has no directly nested duplicates.
///
/// Returns `false` when the range is empty after trimming and nothing was
/// changed.
pub fn wrap_range(
    tree: &mut Tree,
    start: CutPoint,
    end: CutPoint,
    tag: &str,
) -> Result<bool, FormatError> {
    format_range(tree, start, end, tag, Mode::Toggle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Unwrap when the range is already inside `tag`
    Toggle,
    /// Leave ranges already inside `tag` alone
    Apply,
}

fn format_range(
    tree: &mut Tree,
    mut start: CutPoint,
    mut end: CutPoint,
    tag: &str,
    mode: Mode,
) -> Result<bool, FormatError> {
    start.offset += leading_whitespace(tree, start);
    end.offset = end.offset.saturating_sub(trailing_whitespace(tree, end));

    if start.leaf == end.leaf && start.offset >= end.offset {
        return Ok(false);
    }

    let common = tree
        .common_ancestor(start.leaf, end.leaf)
        .ok_or(FormatError::NoCommonAncestor {
            start: start.leaf,
            end: end.leaf,
        })?;
    let container = if tree.is_text(common) {
        tree.parent(common).ok_or(FormatError::NoCommonAncestor {
            start: start.leaf,
            end: end.leaf,
        })?
    } else {
        common
    };

    let formatted = std::iter::once(container)
        .chain(tree.ancestors(container))
        .find(|&n| tree.tag(n) == Some(tag) && tree.parent(n).is_some());
    if let Some(element) = formatted {
        if mode == Mode::Apply {
            return Ok(false);
        }
        unwrap_range(tree, element, start, end)?;
        return Ok(true);
    }

    if let Some(blocks) = crossed_blocks(tree, container, start.leaf, end.leaf) {
        return wrap_blocks(tree, &blocks, start, end, tag);
    }

    if inside_tag(tree, start.leaf, container, tag) {
        start.offset = 0;
    }
    if inside_tag(tree, end.leaf, container, tag) {
        end.offset = tree.text(end.leaf).map(utf16::len).unwrap_or_default();
    }

    let mut groups = split_by(tree, container, &[start, end])?.into_iter();
    let before = groups.next().unwrap_or_default();
    let middle = groups.next().unwrap_or_default();
    let after = groups.next().unwrap_or_default();

    let wrapper = tree.create_element(tag, Attributes::new());
    let mut children = before;
    children.push(wrapper);
    children.extend(after);
    tree.set_children(container, children);
    tree.set_children(wrapper, middle);

    let nested: Vec<NodeId> = tree
        .descendants(wrapper)
        .skip(1)
        .filter(|&n| tree.tag(n) == Some(tag))
        .collect();
    for node in nested {
        tree.unwrap(node);
    }

    tracing::trace!(tag, children = tree.children(wrapper).len(), "wrapped range");
    Ok(true)
}

/// Children of `container` from the one holding `first` to the one holding
/// `last`, if there is more than one and any of them is a block.
fn crossed_blocks(
    tree: &Tree,
    container: NodeId,
    first: NodeId,
    last: NodeId,
) -> Option<Vec<NodeId>> {
    let children = tree.children(container);
    let from = children.iter().position(|&c| tree.contains(c, first))?;
    let to = children.iter().position(|&c| tree.contains(c, last))?;
    if from >= to {
        return None;
    }
    let span = &children[from..=to];
    span.iter()
        .any(|&c| tree.tag(c).is_some_and(is_block_element))
        .then(|| span.to_vec())
}

/// Apply `tag` inside each of `blocks` in turn. The first block starts at
/// `start`, the last ends at `end`, and the ones between are covered whole.
fn wrap_blocks(
    tree: &mut Tree,
    blocks: &[NodeId],
    start: CutPoint,
    end: CutPoint,
    tag: &str,
) -> Result<bool, FormatError> {
    let last = blocks.len() - 1;
    let mut changed = false;

    // Back to front, so cut points in earlier blocks stay valid
    for (i, &block) in blocks.iter().enumerate().rev() {
        let local_start = match i {
            0 => Some(start),
            _ => tree.text_leaves(block).next().map(|leaf| CutPoint::new(leaf, 0)),
        };
        let local_end = if i == last {
            Some(end)
        } else {
            tree.text_leaves(block).last().map(|leaf| {
                CutPoint::new(leaf, tree.text(leaf).map(utf16::len).unwrap_or_default())
            })
        };
        if let (Some(local_start), Some(local_end)) = (local_start, local_end) {
            changed |= format_range(tree, local_start, local_end, tag, Mode::Apply)?;
        }
    }

    tracing::trace!(tag, blocks = blocks.len(), changed, "wrapped range per block");
    Ok(changed)
}

/// Cut the range out of `element`, leaving the content before and after it
/// in copies of `element`.
fn unwrap_range(
    tree: &mut Tree,
    element: NodeId,
    start: CutPoint,
    end: CutPoint,
) -> Result<(), FormatError> {
    let mut groups = split_by(tree, element, &[start, end])?.into_iter();
    let before = groups.next().unwrap_or_default();
    let middle = groups.next().unwrap_or_default();
    let after = groups.next().unwrap_or_default();

    let mut replacement = Vec::with_capacity(middle.len() + 2);
    if !before.is_empty() {
        let head = tree.shallow_clone(element);
        tree.set_children(head, before);
        replacement.push(head);
    }
    replacement.extend(middle);
    if !after.is_empty() {
        let tail = tree.shallow_clone(element);
        tree.set_children(tail, after);
        replacement.push(tail);
    }

    tree.replace_with(element, replacement);
    tracing::trace!("unwrapped range");
    Ok(())
}

/// True if an element tagged `tag` sits between `leaf` and `container`.
fn inside_tag(tree: &Tree, leaf: NodeId, container: NodeId, tag: &str) -> bool {
    tree.ancestors(leaf)
        .take_while(|&a| a != container)
        .any(|a| tree.tag(a) == Some(tag))
}

fn leading_whitespace(tree: &Tree, point: CutPoint) -> usize {
    let value = tree.text(point.leaf).unwrap_or_default();
    let (_, tail) = utf16::split_at(value, point.offset);
    tail.chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf16)
        .sum()
}

fn trailing_whitespace(tree: &Tree, point: CutPoint) -> usize {
    let value = tree.text(point.leaf).unwrap_or_default();
    let (head, _) = utf16::split_at(value, point.offset);
    head.chars()
        .rev()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf16)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse::parse, serialize::serialize};

    fn leaf_with(tree: &Tree, text: &str) -> NodeId {
        tree.text_leaves(tree.root())
            .find(|&l| tree.text(l) == Some(text))
            .unwrap()
    }

    fn bold(markup: &str, start: (&str, usize), end: (&str, usize)) -> String {
        let mut tree = parse(markup);
        let start = CutPoint::new(leaf_with(&tree, start.0), start.1);
        let end = CutPoint::new(leaf_with(&tree, end.0), end.1);
        wrap_range(&mut tree, start, end, "strong").unwrap();
        serialize(&tree)
    }

    #[test]
    fn wraps_part_of_a_leaf() {
        assert_eq!(
            bold("<p>make this bold</p>", ("make this bold", 5), ("make this bold", 9)),
            "<p>make <strong>this</strong> bold</p>"
        );
    }

    #[test]
    fn trims_whitespace_from_the_range() {
        assert_eq!(
            bold("<p>make this bold</p>", ("make this bold", 4), ("make this bold", 10)),
            "<p>make <strong>this</strong> bold</p>"
        );
    }

    #[test]
    fn whitespace_only_range_is_a_no_op() {
        let mut tree = parse("<p>a   b</p>");
        let leaf = leaf_with(&tree, "a   b");
        let changed =
            wrap_range(&mut tree, CutPoint::new(leaf, 1), CutPoint::new(leaf, 4), "strong")
                .unwrap();
        assert!(!changed);
        assert_eq!(serialize(&tree), "<p>a   b</p>");
    }

    #[test]
    fn unwraps_inside_existing_element() {
        assert_eq!(
            bold(
                "<p><strong>all bold here</strong></p>",
                ("all bold here", 4),
                ("all bold here", 8)
            ),
            "<p><strong>all </strong>bold<strong> here</strong></p>"
        );
    }

    #[test]
    fn unwrapping_whole_element_leaves_plain_text() {
        assert_eq!(
            bold("<p>x<strong>bold</strong>y</p>", ("bold", 0), ("bold", 4)),
            "<p>xboldy</p>"
        );
    }

    #[test]
    fn wraps_across_leaves() {
        assert_eq!(
            bold("<p>one <em>two</em> three</p>", ("one ", 1), (" three", 3)),
            "<p>o<strong>ne <em>two</em> th</strong>ree</p>"
        );
    }

    #[test]
    fn extends_over_partially_bold_endpoint_and_merges() {
        assert_eq!(
            bold("<p><strong>ab</strong>cd</p>", ("ab", 1), ("cd", 1)),
            "<p><strong>abc</strong>d</p>"
        );
    }

    #[test]
    fn wraps_across_paragraphs() {
        assert_eq!(
            bold("<p>first</p><p>second</p>", ("first", 2), ("second", 3)),
            "<p>fi<strong>rst</strong></p><p><strong>sec</strong>ond</p>"
        );
    }

    #[test]
    fn wraps_every_block_between_the_ends() {
        assert_eq!(
            bold(
                "<p>one</p>\n<ul><li>two</li><li>three</li></ul><h2>four</h2>",
                ("one", 1),
                ("four", 2)
            ),
            "<p>o<strong>ne</strong></p>\n<ul><li><strong>two</strong></li>\
             <li><strong>three</strong></li></ul><h2><strong>fo</strong>ur</h2>"
        );
    }

    #[test]
    fn block_already_bold_is_left_alone_when_crossing_blocks() {
        assert_eq!(
            bold(
                "<p><strong>first</strong></p><p>second</p>",
                ("first", 0),
                ("second", 6)
            ),
            "<p><strong>first</strong></p><p><strong>second</strong></p>"
        );
    }

    #[test]
    fn unwraps_from_enclosing_element_above_container() {
        assert_eq!(
            bold("<p><strong>a<em>bc</em>d</strong></p>", ("bc", 0), ("bc", 2)),
            "<p><strong>a</strong><em>bc</em><strong>d</strong></p>"
        );
        assert_eq!(
            bold(
                "<p><strong>x<em>one two</em></strong></p>",
                ("one two", 0),
                ("one two", 3)
            ),
            "<p><strong>x</strong><em>one</em><strong><em> two</em></strong></p>"
        );
    }
}
