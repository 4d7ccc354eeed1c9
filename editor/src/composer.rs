//! Source text bound to an editor.
//!
//! A [`Composer`] keeps a [`Source`] and an [`Editor`] in agreement. Setting
//! the value converts it to display markup and renders it; committed edits in
//! the editor are converted back, and the new source value is published.

use crate::{
    editor::Editor,
    highlight::{GRAMMAR_ERROR, SEARCH_RESULTS, SPELLING_ERROR},
    input::{EditorError, InputEvent, InputSettings, Outcome, Platform},
    observable::{Observable, Subscription},
    surface::Surface,
};
use scribe_markup::FormatError;
use scribe_source::{Converter, MarkdownConverter, Query, Source};
use tracing::debug;

pub struct Composer<S, C = MarkdownConverter> {
    source: Source<C>,
    editor: Editor<S>,
    value: Observable<String>,
}

impl<S: Surface, C: Converter> Composer<S, C> {
    pub fn new(
        surface: S,
        mut source: Source<C>,
        value: &str,
        platform: Platform,
        settings: InputSettings,
    ) -> Result<Self, EditorError> {
        source.set_input(value);
        let editor = Editor::new(surface, source.output(), platform, settings)?;
        let value = Observable::new(source.input().to_string());
        let mut composer = Self {
            source,
            editor,
            value,
        };
        composer.refresh_highlights();
        Ok(composer)
    }

    /// The current source value.
    pub fn value(&self) -> String {
        self.value.get()
    }

    /// Call `handler` with the new source value after every committed edit.
    pub fn on_input(
        &self,
        handler: impl Fn(&String) + Send + Sync + 'static,
    ) -> Subscription<String> {
        self.value.subscribe(handler)
    }

    pub fn source(&self) -> &Source<C> {
        &self.source
    }

    pub fn editor(&self) -> &Editor<S> {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor<S> {
        &mut self.editor
    }

    /// Replace the source value from outside.
    pub fn set_value(&mut self, value: &str) {
        if self.source.input() == value {
            return;
        }
        self.source.set_input(value);
        self.editor.set_value(self.source.output());
        self.refresh_highlights();
        self.value.set(self.source.input().to_string());
    }

    pub fn handle_event(&mut self, event: InputEvent) -> Outcome {
        let outcome = self.editor.handle_event(event);
        if matches!(outcome, Outcome::Committed { .. }) {
            self.sync();
        }
        outcome
    }

    pub fn on_surface_mutated(&mut self) {
        self.editor.on_surface_mutated();
        self.sync();
    }

    pub fn format_selection(&mut self, tag: &str) -> Result<bool, FormatError> {
        let changed = self.editor.format_selection(tag)?;
        if changed {
            self.sync();
        }
        Ok(changed)
    }

    /// Replace every match of the current query. Returns the number of text
    /// leaves changed.
    pub fn replace_all(&mut self, replacement: &str) -> usize {
        let changed = self.editor.replace_all(self.source.query(), replacement);
        if changed > 0 {
            self.sync();
        }
        changed
    }

    pub fn set_query(&mut self, query: Query) {
        self.source.set_query(query);
        self.refresh_highlights();
    }

    /// Push the source's search results and annotations to the editor.
    pub fn refresh_highlights(&mut self) {
        self.editor
            .highlight(SEARCH_RESULTS, self.source.query_results().to_vec());
        self.editor
            .highlight(SPELLING_ERROR, self.source.spelling_errors().to_vec());
        self.editor
            .highlight(GRAMMAR_ERROR, self.source.grammar_errors().to_vec());
    }

    pub fn flush(&mut self) {
        self.editor.flush();
    }

    /// Pull the editor's markup into the source after an edit.
    fn sync(&mut self) {
        let markup = self.editor.current_text();
        if markup == self.source.output() {
            return;
        }
        self.source.set_output(&markup);
        self.refresh_highlights();
        debug!(len = self.source.input().len(), "source value updated from editor");
        self.value.set(self.source.input().to_string());
    }
}
