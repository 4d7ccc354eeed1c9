//! Tree to markup serialization.
//!
//! Output is deterministic but makes no attempt to reproduce the original
//! source formatting: attributes are always double quoted, void elements are
//! written without a closing slash, and only the characters that would change
//! the structure on re-parse are escaped.

use crate::{
    entities,
    parse::is_void_element,
    tree::{NodeId, NodeKind, Tree},
};

/// Serialize the whole tree (the root's children) to markup.
pub fn serialize(tree: &Tree) -> String {
    serialize_nodes(tree, tree.children(tree.root()))
}

/// Serialize a list of sibling nodes, e.g. one group returned by the splitter.
pub fn serialize_nodes(tree: &Tree, nodes: &[NodeId]) -> String {
    let mut out = String::new();
    for &node in nodes {
        write_node(tree, node, &mut out);
    }
    out
}

fn write_node(tree: &Tree, id: NodeId, out: &mut String) {
    match tree.node(id).kind() {
        NodeKind::Root => {
            for &child in tree.children(id) {
                write_node(tree, child, out);
            }
        },
        NodeKind::Text { value, .. } => out.push_str(&entities::escape_text(value)),
        NodeKind::Element { tag, attributes } => {
            out.push('<');
            out.push_str(tag);
            for attribute in attributes {
                out.push(' ');
                out.push_str(&attribute.name);
                out.push_str("=\"");
                out.push_str(&entities::escape_attribute(&attribute.value));
                out.push('"');
            }
            out.push('>');

            if is_void_element(tag) {
                return;
            }

            for &child in tree.children(id) {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        },
    }
}
