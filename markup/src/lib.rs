//! Document model for the scribe editing core.
//!
//! Markup goes in, an arena [`Tree`] comes out, and the tree can be written
//! back out or flattened to the plain text a reader sees. Everything that
//! talks about positions counts UTF-16 code units, matching what an editing
//! surface reports for selections.
//!
//! The key pieces are:
//! - [`parse`] - lenient fragment parser that never fails
//! - [`serialize`] - tree back to markup
//! - [`Tree::flatten`] - plain-text projection
//! - [`split_by`] - partition children at text cut points
//! - [`wrap_range`] - toggle inline formatting over a range

pub mod entities;
pub mod format;
pub mod parse;
pub mod serialize;
pub mod split;
pub mod tree;
pub mod utf16;

pub use format::{wrap_range, FormatError};
pub use parse::{parse, parse_with_diagnostics, Recovery, RecoveryKind};
pub use serialize::{serialize, serialize_nodes};
pub use split::{split_by, CutPoint, SplitError};
pub use tree::{Attribute, Attributes, Node, NodeId, NodeKind, Tree};
