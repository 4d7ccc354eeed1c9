//! Lenient markup parser.
//!
//! Parses an HTML fragment into a [`Tree`]. The parser never fails: the
//! editing surface feeds it every keystroke, so half-typed markup has to
//! produce a usable tree. Each repair is reported as a [`Recovery`]:
//!
//! - An unterminated tag or comment (`<b class="x`, `<!-- ...`) and everything
//!   after it become one plain text leaf, positioned like any other leaf.
//! - An end tag with no matching open element is dropped. The text on
//!   either side of it stays one leaf, as it does on the live surface.
//! - An end tag that skips over open elements closes them implicitly.
//! - Elements still open at the end of input are closed implicitly.
//!
//! Text leaves carry the UTF-16 range of their raw source slice, before
//! character references are decoded. Comments, doctypes and dropped end tags
//! do not end a text run: the leaf's value leaves them out while its range
//! spans them.

use crate::{
    entities,
    tree::{Attribute, Attributes, NodeId, Tree},
};
use compact_str::CompactString;
use memchr::{memchr, memmem};
use std::ops::Range;
use tracing::debug;

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Block elements that implicitly close an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address",
    "blockquote",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "ol",
    "p",
    "pre",
    "table",
    "ul",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Block-level elements. Inline formatting never wraps one of these.
pub fn is_block_element(tag: &str) -> bool {
    matches!(
        tag,
        "address"
            | "blockquote"
            | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
            | "li"
            | "ol"
            | "p"
            | "pre"
            | "table"
            | "td"
            | "th"
            | "tr"
            | "ul"
    )
}

/// A repair the parser made to malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub kind: RecoveryKind,
    /// UTF-16 range of the offending fragment
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryKind {
    /// `<` started a tag that never closed; kept as text
    UnterminatedTag,
    /// `<!--` without `-->`; kept as text
    UnterminatedComment,
    /// End tag without a matching open element; dropped
    StrayEndTag { tag: CompactString },
    /// End tag closed these open elements on its way
    ImplicitlyClosed { tags: Vec<CompactString> },
    /// Element still open at end of input
    Unclosed { tag: CompactString },
}

/// Parse markup into a tree, discarding recovery diagnostics.
pub fn parse(markup: &str) -> Tree {
    parse_with_diagnostics(markup).0
}

/// Parse markup into a tree, returning every recovery that was applied.
pub fn parse_with_diagnostics(markup: &str) -> (Tree, Vec<Recovery>) {
    let mut parser = Parser::new(markup);
    parser.run();
    for recovery in &parser.recoveries {
        debug!(target: "scribe_markup::parse", ?recovery, "recovered malformed markup");
    }
    (parser.tree, parser.recoveries)
}

/// Monotonic byte -> UTF-16 offset conversion.
struct Utf16Cursor<'a> {
    text: &'a str,
    byte: usize,
    units: usize,
}

impl<'a> Utf16Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            units: 0,
        }
    }

    /// UTF-16 offset of `byte`. Calls must not go backwards.
    fn at(&mut self, byte: usize) -> usize {
        if byte > self.byte {
            self.units += crate::utf16::len(&self.text[self.byte..byte]);
            self.byte = byte;
        }
        self.units
    }
}

struct Parser<'a> {
    input: &'a str,
    cursor: Utf16Cursor<'a>,
    tree: Tree,
    stack: Vec<NodeId>,
    recoveries: Vec<Recovery>,
    /// Start of the raw text not yet collected
    text_start: usize,
    /// Decoded text of the run so far, and the UTF-16 range it came from
    pending: String,
    pending_range: Option<Range<usize>>,
}

enum Markup {
    Start {
        name: CompactString,
        attributes: Attributes,
        self_closing: bool,
        end: usize,
    },
    End {
        name: CompactString,
        end: usize,
    },
    /// Comment or doctype, skipped
    Skip { end: usize },
    /// `<` that does not start markup
    Literal,
    Unterminated(RecoveryKind),
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let tree = Tree::new();
        let root = tree.root();
        Self {
            input,
            cursor: Utf16Cursor::new(input),
            tree,
            stack: vec![root],
            recoveries: Vec::new(),
            text_start: 0,
            pending: String::new(),
            pending_range: None,
        }
    }

    fn top(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.tree.root())
    }

    fn top_tag(&self) -> Option<&str> {
        self.tree.tag(self.top())
    }

    fn run(&mut self) {
        let input = self.input;
        let bytes = input.as_bytes();
        let mut pos = 0;

        while let Some(found) = memchr(b'<', &bytes[pos..]) {
            let lt = pos + found;
            match self.classify(lt) {
                Markup::Literal => {
                    pos = lt + 1;
                },
                Markup::Skip { end } => {
                    self.collect_text(lt);
                    pos = end;
                    self.text_start = end;
                },
                Markup::Start {
                    name,
                    attributes,
                    self_closing,
                    end,
                } => {
                    self.flush_text(lt);
                    self.open(name, attributes, self_closing);
                    pos = end;
                    self.text_start = end;
                },
                Markup::End { name, end } => {
                    let matching = self.open_depth(&name);
                    match matching {
                        Some(_) => self.flush_text(lt),
                        None => self.collect_text(lt),
                    }
                    let start = self.cursor.at(lt);
                    let range = start..self.cursor.at(end);
                    match matching {
                        Some(depth) => self.close(depth, range),
                        None => self.recoveries.push(Recovery {
                            kind: RecoveryKind::StrayEndTag { tag: name },
                            range,
                        }),
                    }
                    pos = end;
                    self.text_start = end;
                },
                Markup::Unterminated(kind) => {
                    let start = self.cursor.at(lt);
                    let range = start..self.cursor.at(self.input.len());
                    self.recoveries.push(Recovery { kind, range });
                    break;
                },
            }
        }

        self.flush_text(self.input.len());

        while self.stack.len() > 1 {
            if let Some(open) = self.stack.pop() {
                let tag = CompactString::from(self.tree.tag(open).unwrap_or_default());
                let end = self.cursor.at(self.input.len());
                self.recoveries.push(Recovery {
                    kind: RecoveryKind::Unclosed { tag },
                    range: end..end,
                });
            }
        }
    }

    /// Add the raw text up to `end` to the pending run.
    fn collect_text(&mut self, end: usize) {
        if self.text_start >= end {
            return;
        }
        let raw = &self.input[self.text_start..end];
        let start = self.cursor.at(self.text_start);
        let end_units = self.cursor.at(end);
        let range = self.pending_range.get_or_insert(start..end_units);
        range.end = end_units;
        self.pending.push_str(&entities::decode(raw));
        self.text_start = end;
    }

    /// Emit the pending text run ending at `end` as a leaf.
    fn flush_text(&mut self, end: usize) {
        self.collect_text(end);
        let Some(position) = self.pending_range.take() else {
            return;
        };
        let value = std::mem::take(&mut self.pending);
        let leaf = self.tree.create_text(value, Some(position));
        let parent = self.top();
        self.tree.append(parent, leaf);
    }

    fn open(&mut self, name: CompactString, attributes: Attributes, self_closing: bool) {
        if self.top_tag() == Some("p") && CLOSES_PARAGRAPH.contains(&name.as_str()) {
            self.stack.pop();
        } else if name.as_str() == "li" && self.top_tag() == Some("li") {
            self.stack.pop();
        }

        let void = is_void_element(&name);
        let element = self.tree.create_element(name, attributes);
        let parent = self.top();
        self.tree.append(parent, element);
        if !void && !self_closing {
            self.stack.push(element);
        }
    }

    /// Stack depth of the innermost open element named `name`.
    fn open_depth(&self, name: &str) -> Option<usize> {
        self.stack
            .iter()
            .skip(1)
            .rposition(|&open| self.tree.tag(open) == Some(name))
            .map(|index| index + 1)
    }

    fn close(&mut self, depth: usize, range: Range<usize>) {
        let skipped: Vec<CompactString> = self.stack[depth + 1..]
            .iter()
            .map(|&open| CompactString::from(self.tree.tag(open).unwrap_or_default()))
            .collect();
        self.stack.truncate(depth);

        if !skipped.is_empty() {
            self.recoveries.push(Recovery {
                kind: RecoveryKind::ImplicitlyClosed { tags: skipped },
                range,
            });
        }
    }

    fn classify(&self, lt: usize) -> Markup {
        let bytes = self.input.as_bytes();
        let rest = &bytes[lt..];

        match rest.get(1) {
            Some(b'!') => {
                if rest.starts_with(b"<!--") {
                    return match memmem::find(&rest[4..], b"-->") {
                        Some(close) => Markup::Skip {
                            end: lt + 4 + close + 3,
                        },
                        None => Markup::Unterminated(RecoveryKind::UnterminatedComment),
                    };
                }
                match memchr(b'>', rest) {
                    Some(gt) => Markup::Skip { end: lt + gt + 1 },
                    None => Markup::Unterminated(RecoveryKind::UnterminatedTag),
                }
            },
            Some(b'/') if rest.get(2).is_some_and(u8::is_ascii_alphabetic) => {
                let Some(gt) = memchr(b'>', rest) else {
                    return Markup::Unterminated(RecoveryKind::UnterminatedTag);
                };
                let inner = &self.input[lt + 2..lt + gt];
                Markup::End {
                    name: tag_name(inner).0,
                    end: lt + gt + 1,
                }
            },
            Some(c) if c.is_ascii_alphabetic() => {
                let Some(gt) = find_tag_end(rest) else {
                    return Markup::Unterminated(RecoveryKind::UnterminatedTag);
                };
                let mut inner = &self.input[lt + 1..lt + gt];
                let self_closing = inner.ends_with('/');
                if self_closing {
                    inner = &inner[..inner.len() - 1];
                }
                let (name, attrs) = tag_name(inner);
                Markup::Start {
                    name,
                    attributes: parse_attributes(attrs),
                    self_closing,
                    end: lt + gt + 1,
                }
            },
            _ => Markup::Literal,
        }
    }
}

/// Index of the `>` closing the tag that starts at `tag[0]`, skipping quoted
/// attribute values.
fn find_tag_end(tag: &[u8]) -> Option<usize> {
    let mut quote = None;
    for (index, &byte) in tag.iter().enumerate().skip(1) {
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {},
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b'>' => return Some(index),
            None => {},
        }
    }
    None
}

/// Split a tag body into its lowercased name and the attribute source.
fn tag_name(inner: &str) -> (CompactString, &str) {
    let end = inner
        .find(|c: char| c.is_ascii_whitespace() || c == '/')
        .unwrap_or(inner.len());
    (
        CompactString::from(inner[..end].to_ascii_lowercase()),
        &inner[end..],
    )
}

fn parse_attributes(source: &str) -> Attributes {
    let mut attributes = Attributes::new();
    let mut rest = source.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let mut value = String::new();
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (raw, remaining) = match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    match body.find(q) {
                        Some(close) => (&body[..close], &body[close + 1..]),
                        None => (body, ""),
                    }
                },
                _ => {
                    let end = after_eq
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                },
            };
            value = entities::decode(raw).into_owned();
            rest = remaining;
        }

        if !name.is_empty() {
            attributes.push(Attribute::new(name, value));
        }
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');
    }

    attributes
}
