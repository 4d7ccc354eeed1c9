//! The text conversion boundary.
//!
//! The editor only ever sees display markup. Whatever the user actually
//! writes (markdown here) is converted on the way in and on the way out by a
//! [`Converter`].

use crate::markdown;
use pulldown_cmark::{html, Options, Parser};

/// A pair of conversions between a source format and display markup.
///
/// Implementations must be structurally stable: converting display markup to
/// source and back must give markup that parses to an equivalent tree.
pub trait Converter {
    /// Render source text as display markup.
    fn to_display(&self, source: &str) -> String;

    /// Write display markup back out as source text.
    fn to_source(&self, markup: &str) -> String;
}

/// CommonMark in, HTML out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownConverter {
    bullet: char,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self { bullet: '-' }
    }
}

impl MarkdownConverter {
    /// Converter that writes unordered list items with `bullet`.
    pub fn new(bullet: char) -> Self {
        Self { bullet }
    }

    pub fn bullet(&self) -> char {
        self.bullet
    }
}

impl Converter for MarkdownConverter {
    fn to_display(&self, source: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        let parser = Parser::new_ext(source, options);

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out.truncate(out.trim_end_matches('\n').len());
        out
    }

    fn to_source(&self, markup: &str) -> String {
        let tree = scribe_markup::parse(markup);
        markdown::write(&tree, self.bullet)
    }
}
