//! The editor facade.
//!
//! [`Editor`] owns the markup text, its tree, the offset index and the
//! selection, and keeps them consistent with a live [`Surface`]. Every change
//! to the text runs the same pipeline, in this order:
//!
//! 1. update the markup text
//! 2. re-parse it into a tree
//! 3. render it on the surface
//! 4. rebuild the offset index (deferred if the surface is behind)
//! 5. remap the selection into the new index
//!
//! Listeners registered with [`Editor::on_input`] see the new text last.

use crate::{
    highlight::Highlights,
    index::{IndexError, IndexPoint, OffsetIndex, SelectionRange},
    input::{EditSurfaceController, EditorError, InputEvent, InputSettings, Outcome, Platform},
    observable::{Observable, Subscription},
    scheduler::{Scheduler, Task},
    selection::{Anchor, SelectionBridge},
    surface::{LiveRange, Surface},
};
use regex::NoExpand;
use scribe_markup::{parse, serialize, wrap_range, CutPoint, FormatError, Tree};
use scribe_source::Query;
use std::{convert::Infallible, ops::Range};
use tracing::{debug, trace, warn};

pub struct Editor<S> {
    surface: S,
    controller: EditSurfaceController,
    tree: Tree,
    index: OffsetIndex,
    bridge: SelectionBridge,
    scheduler: Scheduler,
    highlights: Highlights,
    text: Observable<String>,
    /// Where the selection should land once a deferred rebuild succeeds
    pending_anchor: Option<Anchor>,
    /// A deferred rebuild already ran once for the current text
    retried: bool,
}

impl<S: Surface> Editor<S> {
    /// Create an editor over `surface` showing `value`.
    ///
    /// Fails only when `platform` is interactive but lacks structured text
    /// input. A headless platform gives a read-only editor instead.
    pub fn new(
        surface: S,
        value: &str,
        platform: Platform,
        settings: InputSettings,
    ) -> Result<Self, EditorError> {
        let input = platform.into_input()?;
        let controller = EditSurfaceController::new(value, input, settings);
        let mut editor = Self {
            surface,
            controller,
            tree: parse(value),
            index: OffsetIndex::default(),
            bridge: SelectionBridge::new(),
            scheduler: Scheduler::new(),
            highlights: Highlights::default(),
            text: Observable::new(value.to_string()),
            pending_anchor: None,
            retried: false,
        };

        if !editor.is_passthrough() {
            editor.surface.render(value);
            editor.rebuild(None);
        }
        Ok(editor)
    }

    /// The current markup text.
    pub fn current_text(&self) -> String {
        self.text.get()
    }

    /// The text as an observable value.
    pub fn text(&self) -> &Observable<String> {
        &self.text
    }

    /// Call `handler` with the new markup after every change.
    pub fn on_input(
        &self,
        handler: impl Fn(&String) + Send + Sync + 'static,
    ) -> Subscription<String> {
        self.text.subscribe(handler)
    }

    /// True when the platform has no structured input. The editor then shows
    /// its value unmodified and tracks no selection.
    pub fn is_passthrough(&self) -> bool {
        self.controller.is_passthrough()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn controller(&self) -> &EditSurfaceController {
        &self.controller
    }

    /// The last known selection, `None` when there is none or it could not be
    /// mapped.
    pub fn selection(&self) -> Option<&SelectionRange> {
        self.bridge.current()
    }

    /// Select a live range, pushing it to the surface unless it already shows
    /// that exact range.
    pub fn select(&mut self, range: LiveRange) {
        if self.is_passthrough() {
            return;
        }
        let resolved = self.index.resolve(&range);
        self.bridge.set(resolved, self.controller.input_mut());
        self.bridge.apply(&mut self.surface);
    }

    /// Select absolute plain-text offsets. Returns false if they do not map.
    pub fn select_text(&mut self, range: Range<usize>) -> bool {
        match self.index.to_range(range.start, range.end) {
            Some(live) => {
                self.select(live);
                true
            },
            None => false,
        }
    }

    /// Call when the surface reports a native selection change.
    pub fn on_selection_change(&mut self) {
        if self.is_passthrough() {
            return;
        }
        self.bridge
            .on_selection_change(&self.surface, &self.index, self.controller.input_mut());
    }

    /// Feed a platform input event through the controller.
    pub fn handle_event(&mut self, event: InputEvent) -> Outcome {
        let outcome = self.controller.handle(event);
        if let Outcome::Committed { caret } = outcome {
            let text = self.controller.text().to_string();
            self.commit(&text, Some(Anchor::Markup(caret..caret)));
        }
        outcome
    }

    /// Replace the whole text from outside, e.g. when the bound value changes.
    /// The selection keeps its plain-text offsets where possible.
    pub fn set_value(&mut self, value: &str) {
        if self.controller.text() == value {
            return;
        }
        self.controller.set_text(value);
        if self.is_passthrough() {
            self.tree = parse(value);
            self.text.set(value.to_string());
            return;
        }
        self.commit(value, None);
    }

    /// Apply a structural edit to the tree and re-serialize it.
    ///
    /// Ignored in passthrough mode.
    pub fn mutate(&mut self, transform: impl FnOnce(&mut Tree)) {
        let _ = self.try_mutate(|tree| -> Result<bool, Infallible> {
            transform(tree);
            Ok(true)
        });
    }

    /// Like [`Self::mutate`], for edits that can fail or turn out to be
    /// no-ops. Nothing is committed unless `transform` returns `Ok(true)`.
    pub fn try_mutate<E>(
        &mut self,
        transform: impl FnOnce(&mut Tree) -> Result<bool, E>,
    ) -> Result<bool, E> {
        if self.is_passthrough() {
            return Ok(false);
        }

        let mut tree = self.tree.clone();
        if !transform(&mut tree)? {
            return Ok(false);
        }

        let markup = serialize(&tree);
        self.controller.set_text(&markup);
        self.commit(&markup, None);
        Ok(true)
    }

    /// Toggle an inline `tag` over the current selection.
    pub fn format_selection(&mut self, tag: &str) -> Result<bool, FormatError> {
        let Some(selection) = self.bridge.current() else {
            return Ok(false);
        };
        let start = if selection.is_collapsed() {
            CutPoint::new(selection.start.node.leaf, selection.start.offset)
        } else {
            self.leading_cut(&selection.start)
        };
        let end = CutPoint::new(selection.end.node.leaf, selection.end.offset);
        self.try_mutate(|tree| wrap_range(tree, start, end, tag))
    }

    /// A start at the very end of a leaf belongs to the next non-empty leaf.
    fn leading_cut(&self, point: &IndexPoint) -> CutPoint {
        if point.offset == point.node.len() {
            let next = self
                .index
                .nodes()
                .iter()
                .find(|n| n.text.start == point.node.text.end && !n.is_empty());
            if let Some(next) = next {
                return CutPoint::new(next.leaf, 0);
            }
        }
        CutPoint::new(point.node.leaf, point.offset)
    }

    /// Replace every match of `query` inside each text leaf. Matches never
    /// span leaves. Returns the number of leaves changed.
    pub fn replace_all(&mut self, query: &Query, replacement: &str) -> usize {
        let Some(regex) = query.regex() else {
            return 0;
        };

        let mut changed = 0;
        let _ = self.try_mutate(|tree| -> Result<bool, Infallible> {
            let leaves: Vec<_> = tree.text_leaves(tree.root()).collect();
            for leaf in leaves {
                let value = tree.text(leaf).unwrap_or_default();
                let replaced = regex.replace_all(value, NoExpand(replacement));
                if replaced != value {
                    let replaced = replaced.into_owned();
                    tree.set_text(leaf, replaced);
                    changed += 1;
                }
            }
            Ok(changed > 0)
        });
        changed
    }

    /// Call when the surface's content was changed behind the editor's back.
    ///
    /// If the surface now shows different markup, that markup becomes the
    /// text. The index rebuild is deferred to the next [`Self::flush`] so a
    /// batch of mutations is handled once.
    pub fn on_surface_mutated(&mut self) {
        if self.is_passthrough() {
            return;
        }

        let markup = self.surface.markup();
        if serialize(&self.tree) == markup {
            return;
        }

        debug!("adopting markup from surface");
        self.controller.set_text(&markup);
        self.tree = parse(&markup);
        self.index = OffsetIndex::default();
        self.pending_anchor = self
            .bridge
            .current()
            .map(|current| Anchor::Text(current.text_offsets()));
        self.retried = false;
        self.scheduler.schedule(Task::RebuildIndex);
        self.text.set(markup);
    }

    /// Replace a highlight layer. Rendering waits for the next flush.
    pub fn highlight(&mut self, name: &str, ranges: Vec<Range<usize>>) {
        self.highlights.set(name, ranges);
        self.scheduler.schedule(Task::RenderHighlights);
    }

    pub fn highlights(&self) -> &Highlights {
        &self.highlights
    }

    /// True when deferred work is waiting for [`Self::flush`].
    pub fn has_pending_work(&self) -> bool {
        !self.scheduler.is_idle()
    }

    /// Run deferred work until none is left.
    pub fn flush(&mut self) {
        while !self.scheduler.is_idle() {
            for task in self.scheduler.drain() {
                trace!(?task, "running deferred task");
                match task {
                    Task::RebuildIndex => {
                        let anchor = self.pending_anchor.take();
                        self.rebuild(anchor);
                    },
                    Task::RenderHighlights => {
                        self.highlights.render(&self.index, &mut self.surface);
                    },
                }
            }
        }
    }

    /// Steps 2 to 5 of the pipeline for `markup`.
    fn commit(&mut self, markup: &str, anchor: Option<Anchor>) {
        let anchor = anchor.or_else(|| {
            self.bridge
                .current()
                .map(|current| Anchor::Text(current.text_offsets()))
        });

        self.tree = parse(markup);
        self.surface.render(markup);
        self.retried = false;
        self.rebuild(anchor);
        self.text.set(markup.to_string());
    }

    /// Rebuild the index and remap the selection into it.
    ///
    /// If the surface has not caught up with the tree, the index is left
    /// empty and one rebuild is scheduled. A second mismatch gives up and
    /// leaves the editor without a mapping until the next change.
    fn rebuild(&mut self, anchor: Option<Anchor>) {
        if !self.surface.is_attached() {
            debug!("surface detached, leaving index empty");
            self.index = OffsetIndex::default();
            self.bridge.clear();
            return;
        }

        match OffsetIndex::build(&self.surface, &self.tree) {
            Ok(index) => {
                self.index = index;
                if anchor.is_some() || self.bridge.current().is_some() {
                    self.bridge
                        .remap(&self.index, anchor, self.controller.input_mut());
                    self.bridge.apply(&mut self.surface);
                }
                if !self.highlights.is_empty() {
                    self.scheduler.schedule(Task::RenderHighlights);
                }
            },
            Err(IndexError::Mismatch { live, leaves }) if !self.retried => {
                debug!(live, leaves, "surface behind tree, deferring index rebuild");
                self.index = OffsetIndex::default();
                self.bridge.clear();
                self.pending_anchor = anchor;
                self.retried = true;
                self.scheduler.schedule(Task::RebuildIndex);
            },
            Err(err) => {
                warn!(%err, "index rebuild failed after deferral");
                self.index = OffsetIndex::default();
                self.bridge.clear();
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{input::Key, surface::MemorySurface};
    use std::sync::Arc;

    fn editor(markup: &str) -> Editor<MemorySurface> {
        let mut surface = MemorySurface::new();
        surface.focus();
        Editor::new(surface, markup, Platform::in_memory(), InputSettings::default()).unwrap()
    }

    fn text_update(start: usize, end: usize, text: &str) -> InputEvent {
        InputEvent::TextUpdate {
            range: start..end,
            text: text.to_string(),
        }
    }

    #[test]
    fn builds_index_on_construction() {
        let editor = editor("<p>hello <b>world</b></p>");
        assert_eq!(editor.index().nodes().len(), 2);
        assert_eq!(editor.current_text(), "<p>hello <b>world</b></p>");
        assert!(editor.selection().is_none());
    }

    #[test]
    fn typing_moves_selection_to_caret() {
        let mut editor = editor("<p>hello</p>");
        editor.handle_event(text_update(8, 8, "!"));

        assert_eq!(editor.current_text(), "<p>hello!</p>");
        assert_eq!(editor.tree().flatten(), "hello!");
        let selection = editor.selection().unwrap();
        assert_eq!(selection.text_offsets(), 6..6);
        assert_eq!(selection.markup_offsets(), 9..9);
        assert_eq!(editor.controller().input().selection(), 9..9);
        assert_eq!(editor.surface().selection(), Some(selection.to_live()));
    }

    #[test]
    fn enter_splits_paragraph() {
        let mut surface = MemorySurface::new();
        surface.focus();
        let settings = InputSettings {
            tab: "\t".to_string(),
            enter: "</p><p>".to_string(),
        };
        let mut editor = Editor::new(surface, "<p>ab</p>", Platform::in_memory(), settings).unwrap();
        editor.select_text(1..1);
        assert_eq!(editor.controller().input().selection(), 4..4);

        editor.handle_event(InputEvent::KeyDown {
            key: Key::Enter,
            key_code: 13,
        });

        assert_eq!(editor.current_text(), "<p>a</p><p>b</p>");
        assert_eq!(editor.tree().flatten(), "ab");
        let selection = editor.selection().unwrap();
        assert_eq!(selection.markup_offsets(), 11..11);
        assert_eq!(selection.start.node.markup, 11..12);
    }

    #[test]
    fn composition_commits_once() {
        let mut editor = editor("<p>x</p>");
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        editor.on_input(move |text| sink.lock().push(text.clone()));

        editor.handle_event(InputEvent::CompositionStart);
        assert_eq!(editor.handle_event(text_update(4, 4, "n")), Outcome::Pending);
        editor.handle_event(text_update(4, 5, "に"));
        assert!(seen.lock().is_empty());
        assert_eq!(editor.tree().flatten(), "x");

        editor.handle_event(InputEvent::CompositionEnd);
        assert_eq!(*seen.lock(), vec!["<p>xに</p>".to_string()]);
        assert_eq!(editor.tree().flatten(), "xに");
    }

    #[test]
    fn selection_change_ignored_when_unfocused() {
        let mut editor = editor("<p>abc</p>");
        editor.surface_mut().blur();
        let range = editor.index().to_range(0, 2);
        editor.surface_mut().place_selection(range);
        editor.on_selection_change();
        assert!(editor.selection().is_none());

        editor.surface_mut().focus();
        editor.on_selection_change();
        assert_eq!(editor.selection().unwrap().text_offsets(), 0..2);
    }

    #[test]
    fn select_does_not_echo() {
        let mut editor = editor("<p>abc</p>");
        assert!(editor.select_text(0..2));
        let writes = editor.surface().selection_writes();
        editor.select_text(0..2);
        assert_eq!(editor.surface().selection_writes(), writes);
        assert!(!editor.select_text(10..12));
    }

    #[test]
    fn mutate_reserializes_and_keeps_selection() {
        let mut editor = editor("<p>one two</p>");
        editor.select_text(4..7);
        editor.mutate(|tree| {
            let leaf = tree.text_leaves(tree.root()).next().unwrap();
            tree.set_text(leaf, "one TWO");
        });

        assert_eq!(editor.current_text(), "<p>one TWO</p>");
        assert_eq!(editor.selection().unwrap().text_offsets(), 4..7);
        assert!(editor.index().nodes()[0].markup == (3..10));
    }

    #[test]
    fn format_selection_wraps_in_tag() {
        let mut editor = editor("<p>make this bold</p>");
        editor.select_text(5..9);
        assert_eq!(editor.format_selection("strong"), Ok(true));
        assert_eq!(
            editor.current_text(),
            "<p>make <strong>this</strong> bold</p>"
        );
        assert_eq!(editor.selection().unwrap().text_offsets(), 5..9);

        // Toggling again removes it
        assert_eq!(editor.format_selection("strong"), Ok(true));
        assert_eq!(editor.selection().unwrap().text_offsets(), 5..9);
        assert_eq!(editor.current_text(), "<p>make this bold</p>");
    }

    #[test]
    fn replace_all_works_per_leaf() {
        let mut editor = editor("<p>cat <em>cat</em> dog</p>");
        let query = Query::new("cat", true).unwrap();
        assert_eq!(editor.replace_all(&query, "bird"), 2);
        assert_eq!(editor.current_text(), "<p>bird <em>bird</em> dog</p>");
        assert_eq!(editor.replace_all(&Query::default(), "x"), 0);
    }

    #[test]
    fn deferred_render_defers_index_rebuild() {
        let mut editor = editor("<p>one</p>");
        editor.surface_mut().set_deferred_render(true);
        editor.set_value("<p>one</p><p>two</p>");

        assert!(editor.index().is_empty());
        assert!(editor.has_pending_work());

        editor.surface_mut().flush_render();
        editor.flush();
        assert_eq!(editor.index().nodes().len(), 2);
        assert!(!editor.has_pending_work());
    }

    #[test]
    fn gives_up_after_one_deferred_rebuild() {
        let mut editor = editor("<p>one</p>");
        editor.surface_mut().set_deferred_render(true);
        editor.set_value("<p>one</p><p>two</p>");
        editor.flush();

        assert!(editor.index().is_empty());
        assert!(editor.selection().is_none());
        assert!(!editor.has_pending_work());
    }

    #[test]
    fn detached_surface_leaves_no_mapping() {
        let mut editor = editor("<p>one</p>");
        editor.select_text(0..1);
        editor.surface_mut().detach();
        editor.set_value("<p>two</p>");
        assert!(editor.index().is_empty());
        assert!(editor.selection().is_none());
        assert!(!editor.has_pending_work());
    }

    #[test]
    fn adopts_markup_mutated_on_surface() {
        let mut editor = editor("<p>teh</p>");
        let node = editor.surface().text_node(0).unwrap();
        editor.surface_mut().edit_text(node, "the");
        editor.on_surface_mutated();

        assert_eq!(editor.current_text(), "<p>the</p>");
        assert!(editor.has_pending_work());
        editor.flush();
        assert_eq!(editor.index().nodes().len(), 1);
        assert_eq!(editor.index().nodes()[0].live, node);
    }

    #[test]
    fn passthrough_is_read_only() {
        let surface = MemorySurface::new();
        let mut editor =
            Editor::new(surface, "<p>x</p>", Platform::Headless, InputSettings::default())
                .unwrap();

        assert!(editor.is_passthrough());
        assert_eq!(editor.handle_event(text_update(3, 3, "y")), Outcome::Ignored);
        editor.mutate(|tree| {
            let leaf = tree.text_leaves(tree.root()).next().unwrap();
            tree.set_text(leaf, "changed");
        });
        assert_eq!(editor.current_text(), "<p>x</p>");
        assert!(!editor.select_text(0..1));
        assert!(editor.selection().is_none());

        editor.set_value("<p>raw</p>");
        assert_eq!(editor.current_text(), "<p>raw</p>");
    }

    #[test]
    fn missing_capability_fails() {
        let result = Editor::new(
            MemorySurface::new(),
            "",
            Platform::Interactive { input: None },
            InputSettings::default(),
        );
        assert!(matches!(
            result,
            Err(EditorError::MissingCapability { capability: "EditContext" })
        ));
    }
}
