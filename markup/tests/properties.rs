use proptest::prelude::*;
use scribe_markup::{parse, serialize, serialize_nodes, split_by, utf16, CutPoint, NodeId, Tree};

/// Fragments the parser reads past without producing nodes.
const SKIPPED: &[&str] = &["<!--c-->", "<!DOCTYPE html>", "</i>", "</b>"];

/// A text run, sometimes broken up by a comment, doctype or stray end tag.
fn arb_text(text: &'static str) -> impl Strategy<Value = String> {
    prop_oneof![
        4 => text.prop_map(String::from),
        1 => (text, prop::sample::select(SKIPPED), text)
            .prop_map(|(before, skipped, after)| format!("{before}{skipped}{after}")),
        1 => prop::sample::select(SKIPPED).prop_map(String::from),
    ]
}

/// Inline content: text runs nested inside a few formatting elements.
fn arb_inline(text: &'static str) -> impl Strategy<Value = String> {
    arb_text(text).prop_recursive(3, 24, 4, |inner| {
        (
            prop::sample::select(vec!["strong", "em", "span", "code"]),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, children)| format!("<{tag}>{}</{tag}>", children.concat()))
    })
}

/// A fragment of paragraphs and loose inline content.
fn arb_document(text: &'static str) -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            prop::collection::vec(arb_inline(text), 0..4)
                .prop_map(|children| format!("<p>{}</p>", children.concat())),
            arb_inline(text),
            Just("<br>".to_string()),
        ],
        0..5,
    )
    .prop_map(|blocks| blocks.concat())
}

/// Every valid cut point in document order, at character boundaries.
fn cut_candidates(tree: &Tree) -> Vec<CutPoint> {
    let mut candidates = Vec::new();
    for leaf in tree.text_leaves(tree.root()) {
        let value = tree.text(leaf).unwrap_or_default();
        candidates.push(CutPoint::new(leaf, 0));
        let mut offset = 0;
        for ch in value.chars() {
            offset += ch.len_utf16();
            candidates.push(CutPoint::new(leaf, offset));
        }
    }
    candidates
}

fn detached_flatten(tree: &Tree, nodes: &[NodeId]) -> String {
    nodes.iter().map(|&n| tree.flatten_node(n)).collect()
}

proptest! {
    /// Serializing a parsed tree and parsing it again gives the same tree.
    #[test]
    fn prop_serialize_roundtrip(markup in arb_document("[a-z é😀]{1,6}")) {
        let tree = parse(&markup);
        let serialized = serialize(&tree);
        let reparsed = parse(&serialized);

        prop_assert!(
            tree.structurally_eq(&reparsed),
            "reparse changed structure:\n{}\nvs\n{}",
            tree.outline(),
            reparsed.outline()
        );
        prop_assert_eq!(serialize(&reparsed), serialized);
        prop_assert_eq!(reparsed.flatten(), tree.flatten());
    }

    /// Leaf positions cover exactly the source slices they were parsed from,
    /// including any skipped fragments inside the run.
    #[test]
    fn prop_positions_index_source(markup in arb_document("[a-z é😀]{1,6}")) {
        let tree = parse(&markup);
        for leaf in tree.text_leaves(tree.root()) {
            let position = tree.node(leaf).position();
            prop_assert!(position.is_some());
            let position = position.unwrap_or_default();
            let visible = SKIPPED
                .iter()
                .fold(utf16::slice(&markup, position).to_string(), |s, skipped| s.replace(skipped, ""));
            prop_assert_eq!(visible, tree.text(leaf).unwrap_or_default());
        }
    }

    /// Splitting never loses or duplicates content, whatever the cuts.
    #[test]
    fn prop_split_preserves_content(
        markup in arb_document("[a-zé😀 ]{1,6}"),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let mut tree = parse(&markup);
        let original = tree.flatten();
        let candidates = cut_candidates(&tree);
        prop_assume!(!candidates.is_empty());

        let mut indices: Vec<usize> = picks.iter().map(|i| i.index(candidates.len())).collect();
        indices.sort_unstable();
        let cuts: Vec<CutPoint> = indices.iter().map(|&i| candidates[i]).collect();

        let root = tree.root();
        let groups = split_by(&mut tree, root, &cuts);
        prop_assert!(groups.is_ok(), "split failed: {:?}", groups);
        let groups = groups.unwrap_or_default();

        prop_assert_eq!(groups.len(), cuts.len() + 1);
        let rejoined: String = groups.iter().map(|g| detached_flatten(&tree, g)).collect();
        prop_assert_eq!(rejoined, original);

        // Each group is well formed markup on its own
        for group in &groups {
            let markup = serialize_nodes(&tree, group);
            prop_assert_eq!(parse(&markup).flatten(), detached_flatten(&tree, group));
        }
    }
}
