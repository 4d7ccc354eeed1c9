//! Source document state.
//!
//! A [`Source`] keeps three views of one document in step: the text the user
//! writes (`input`), the display markup the editor renders (`output`), and
//! the flattened plain text (`plain`) that search and annotators run over.
//! Setting either `input` or `output` recomputes the other two.

use crate::convert::{Converter, MarkdownConverter};
use regex::{Regex, RegexBuilder};
use scribe_markup::utf16;
use std::{fmt, ops::Range};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid search query {term:?}: {source}")]
    InvalidQuery {
        term: String,
        #[source]
        source: regex::Error,
    },
}

/// Produces annotated ranges over plain text, e.g. spelling or grammar
/// errors. Ranges are UTF-16 `[start, end)` offsets into the text.
pub trait Annotator {
    fn annotate(&self, plain: &str) -> Vec<Range<usize>>;
}

impl<F> Annotator for F
where
    F: Fn(&str) -> Vec<Range<usize>>,
{
    fn annotate(&self, plain: &str) -> Vec<Range<usize>> {
        self(plain)
    }
}

/// A compiled search term.
#[derive(Clone)]
pub struct Query {
    term: String,
    case_insensitive: bool,
    regex: Option<Regex>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("term", &self.term)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}

impl Default for Query {
    fn default() -> Self {
        Self {
            term: String::new(),
            case_insensitive: true,
            regex: None,
        }
    }
}

impl Query {
    /// Compile `term` as a regular expression. An empty term matches nothing.
    pub fn new(term: &str, case_insensitive: bool) -> Result<Self, SourceError> {
        let regex = if term.is_empty() {
            None
        } else {
            let regex = RegexBuilder::new(term)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|source| SourceError::InvalidQuery {
                    term: term.to_string(),
                    source,
                })?;
            Some(regex)
        };

        Ok(Self {
            term: term.to_string(),
            case_insensitive,
            regex,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Every match in `text` as UTF-16 ranges.
    pub fn find_all(&self, text: &str) -> Vec<Range<usize>> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };

        let mut results = Vec::new();
        // Matches are ordered, so offsets convert incrementally
        let (mut byte, mut unit) = (0, 0);
        for found in regex.find_iter(text) {
            unit += utf16::len(&text[byte..found.start()]);
            let start = unit;
            unit += utf16::len(found.as_str());
            byte = found.end();
            results.push(start..unit);
        }
        results
    }
}

/// Document state shared between the editor and whatever feeds it text.
pub struct Source<C = MarkdownConverter> {
    converter: C,
    input: String,
    output: String,
    plain: String,
    query: Query,
    query_results: Vec<Range<usize>>,
    spelling: Option<Box<dyn Annotator>>,
    grammar: Option<Box<dyn Annotator>>,
    spelling_errors: Vec<Range<usize>>,
    grammar_errors: Vec<Range<usize>>,
}

impl Default for Source {
    fn default() -> Self {
        Self::new(MarkdownConverter::default())
    }
}

impl<C: Converter> Source<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            input: String::new(),
            output: String::new(),
            plain: String::new(),
            query: Query::default(),
            query_results: Vec::new(),
            spelling: None,
            grammar: None,
            spelling_errors: Vec::new(),
            grammar_errors: Vec::new(),
        }
    }

    /// Attach a spelling annotator. Re-annotates the current text.
    pub fn with_spelling(mut self, annotator: impl Annotator + 'static) -> Self {
        self.spelling = Some(Box::new(annotator));
        self.annotate();
        self
    }

    /// Attach a grammar annotator. Re-annotates the current text.
    pub fn with_grammar(mut self, annotator: impl Annotator + 'static) -> Self {
        self.grammar = Some(Box::new(annotator));
        self.annotate();
        self
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Source text as the user writes it.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the source text, recomputing display markup and plain text.
    pub fn set_input(&mut self, input: &str) {
        let output = self.converter.to_display(input);
        self.plain = scribe_markup::parse(&output).flatten();
        self.input = input.to_string();
        self.output = output;
        trace!(len = self.input.len(), "source input updated");
        self.refresh();
    }

    /// Display markup, as rendered by the editor.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Replace the display markup, recomputing source and plain text.
    pub fn set_output(&mut self, output: &str) {
        let tree = scribe_markup::parse(output);
        self.input = self.converter.to_source(output).trim().to_string();
        self.plain = tree.flatten();
        self.output = output.to_string();
        trace!(len = self.output.len(), "source output updated");
        self.refresh();
    }

    /// Flattened plain text of the display markup.
    pub fn plain(&self) -> &str {
        &self.plain
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn set_query(&mut self, query: Query) {
        self.query = query;
        self.query_results = self.query.find_all(&self.plain);
    }

    /// Matches of the current query in [`Self::plain`].
    pub fn query_results(&self) -> &[Range<usize>] {
        &self.query_results
    }

    pub fn spelling_errors(&self) -> &[Range<usize>] {
        &self.spelling_errors
    }

    pub fn grammar_errors(&self) -> &[Range<usize>] {
        &self.grammar_errors
    }

    fn refresh(&mut self) {
        self.annotate();
        self.query_results = self.query.find_all(&self.plain);
    }

    fn annotate(&mut self) {
        self.spelling_errors = self
            .spelling
            .as_ref()
            .map(|a| a.annotate(&self.plain))
            .unwrap_or_default();
        self.grammar_errors = self
            .grammar
            .as_ref()
            .map(|a| a.annotate(&self.plain))
            .unwrap_or_default();
    }
}
