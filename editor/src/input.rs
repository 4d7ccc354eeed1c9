//! Structured text input and IME composition.
//!
//! The platform reports edits as replacements over the markup buffer
//! (`range`, `text`) plus composition boundaries. [`EditSurfaceController`]
//! applies them to its own copy of the markup and decides when an edit is
//! committed and the document must be re-parsed.
//!
//! ```text
//!            CompositionStart
//!   Idle  ---------------------> Composing
//!     ^                              |
//!     +------------------------------+
//!            CompositionEnd (commits pending text)
//! ```

use scribe_markup::utf16;
use std::{fmt, ops::Range};
use thiserror::Error;
use tracing::{debug, trace};

/// Key code platforms report for key events that belong to an IME.
pub const IME_KEY_CODE: u32 = 229;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("Required platform capability `{capability}` is not available")]
    MissingCapability { capability: &'static str },
}

/// Named keys the controller cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Char(char),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Replace `range` of the markup buffer with `text`.
    TextUpdate { range: Range<usize>, text: String },
    CompositionStart,
    CompositionEnd,
    KeyDown { key: Key, key_code: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompositionState {
    #[default]
    Idle,
    Composing,
}

/// Result of feeding an event to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed.
    Ignored,
    /// Text changed mid-composition; the document is not re-parsed yet.
    Pending,
    /// Text changed and is final. `caret` is the markup offset just after the
    /// inserted text.
    Committed { caret: usize },
}

/// The platform's structured text input capability.
///
/// Holds the platform's view of the text and selection, both in markup
/// coordinates.
pub trait TextInput: fmt::Debug {
    fn text(&self) -> &str;

    fn update_text(&mut self, range: Range<usize>, text: &str);

    fn selection(&self) -> Range<usize>;

    fn update_selection(&mut self, range: Range<usize>);

    /// True for the no-op implementation used when the platform has no
    /// structured input. The editor is read-only in that mode.
    fn is_passthrough(&self) -> bool {
        false
    }
}

/// In-memory structured input.
#[derive(Debug, Clone, Default)]
pub struct EditBuffer {
    text: String,
    selection: Range<usize>,
}

impl EditBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            selection: 0..0,
        }
    }
}

impl TextInput for EditBuffer {
    fn text(&self) -> &str {
        &self.text
    }

    fn update_text(&mut self, range: Range<usize>, text: &str) {
        let caret = range.start + utf16::len(text);
        self.text = utf16::splice(&self.text, range, text);
        self.selection = caret..caret;
    }

    fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    fn update_selection(&mut self, range: Range<usize>) {
        self.selection = range;
    }
}

/// Input for platforms without structured editing. Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TextInput for Passthrough {
    fn text(&self) -> &str {
        ""
    }

    fn update_text(&mut self, _range: Range<usize>, _text: &str) {}

    fn selection(&self) -> Range<usize> {
        0..0
    }

    fn update_selection(&mut self, _range: Range<usize>) {}

    fn is_passthrough(&self) -> bool {
        true
    }
}

/// The host the editor runs on.
pub enum Platform {
    /// No live surface at all, e.g. rendering on a server. Always passthrough.
    Headless,
    /// An interactive host. `input` is `None` when the host lacks structured
    /// text input.
    Interactive { input: Option<Box<dyn TextInput>> },
}

impl Platform {
    /// Interactive platform backed by an in-memory [`EditBuffer`].
    pub fn in_memory() -> Self {
        Self::Interactive {
            input: Some(Box::new(EditBuffer::default())),
        }
    }

    /// Pick the input implementation for this platform.
    pub fn into_input(self) -> Result<Box<dyn TextInput>, EditorError> {
        match self {
            Self::Headless => Ok(Box::new(Passthrough)),
            Self::Interactive { input: Some(input) } => Ok(input),
            Self::Interactive { input: None } => Err(EditorError::MissingCapability {
                capability: "EditContext",
            }),
        }
    }
}

/// Markup inserted for keys the controller handles itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSettings {
    pub tab: String,
    pub enter: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self::from(&scribe_config::EditorConfig::default())
    }
}

impl From<&scribe_config::EditorConfig> for InputSettings {
    fn from(config: &scribe_config::EditorConfig) -> Self {
        Self {
            tab: config.tab.clone(),
            enter: config.enter.clone(),
        }
    }
}

/// Input state machine over the markup buffer.
pub struct EditSurfaceController {
    state: CompositionState,
    text: String,
    caret: usize,
    /// Text changed during the current composition
    dirty: bool,
    settings: InputSettings,
    input: Box<dyn TextInput>,
}

impl fmt::Debug for EditSurfaceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSurfaceController")
            .field("state", &self.state)
            .field("caret", &self.caret)
            .field("dirty", &self.dirty)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl EditSurfaceController {
    pub fn new(text: &str, mut input: Box<dyn TextInput>, settings: InputSettings) -> Self {
        let len = utf16::len(input.text());
        input.update_text(0..len, text);
        Self {
            state: CompositionState::Idle,
            text: text.to_string(),
            caret: 0,
            dirty: false,
            settings,
            input,
        }
    }

    pub fn state(&self) -> CompositionState {
        self.state
    }

    /// The markup buffer.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Markup offset just after the last applied edit.
    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn is_passthrough(&self) -> bool {
        self.input.is_passthrough()
    }

    pub fn input(&self) -> &dyn TextInput {
        self.input.as_ref()
    }

    pub fn input_mut(&mut self) -> &mut dyn TextInput {
        self.input.as_mut()
    }

    /// Replace the whole buffer from outside, e.g. after a structural edit.
    pub fn set_text(&mut self, text: &str) {
        let len = utf16::len(&self.text);
        self.input.update_text(0..len, text);
        self.text = text.to_string();
        self.caret = self.caret.min(utf16::len(text));
    }

    pub fn handle(&mut self, event: InputEvent) -> Outcome {
        if self.is_passthrough() {
            return Outcome::Ignored;
        }

        match event {
            InputEvent::TextUpdate { range, text } => self.text_update(range, &text),
            InputEvent::CompositionStart => {
                trace!("composition started");
                self.state = CompositionState::Composing;
                Outcome::Ignored
            },
            InputEvent::CompositionEnd => {
                trace!(dirty = self.dirty, "composition ended");
                self.state = CompositionState::Idle;
                if std::mem::take(&mut self.dirty) {
                    Outcome::Committed { caret: self.caret }
                } else {
                    Outcome::Ignored
                }
            },
            InputEvent::KeyDown { key, key_code } => self.key_down(key, key_code),
        }
    }

    fn text_update(&mut self, range: Range<usize>, text: &str) -> Outcome {
        let len = utf16::len(&self.text);
        let end = range.end.min(len);
        let start = range.start.min(end);

        self.text = utf16::splice(&self.text, start..end, text);
        self.input.update_text(start..end, text);
        self.caret = start + utf16::len(text);
        trace!(start, end, caret = self.caret, "text update");

        match self.state {
            CompositionState::Composing => {
                self.dirty = true;
                Outcome::Pending
            },
            CompositionState::Idle => Outcome::Committed { caret: self.caret },
        }
    }

    fn key_down(&mut self, key: Key, key_code: u32) -> Outcome {
        if key_code == IME_KEY_CODE || self.state == CompositionState::Composing {
            return Outcome::Ignored;
        }

        let text = match key {
            Key::Tab => self.settings.tab.clone(),
            Key::Enter => self.settings.enter.clone(),
            _ => return Outcome::Ignored,
        };

        let selection = self.input.selection();
        let range = selection.start.min(selection.end)..selection.start.max(selection.end);
        debug!(?key, ?range, "synthesizing text update");
        self.text_update(range, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(text: &str) -> EditSurfaceController {
        EditSurfaceController::new(
            text,
            Box::new(EditBuffer::default()),
            InputSettings::default(),
        )
    }

    fn update(start: usize, end: usize, text: &str) -> InputEvent {
        InputEvent::TextUpdate {
            range: start..end,
            text: text.to_string(),
        }
    }

    #[test]
    fn text_update_splices_and_moves_caret() {
        let mut c = controller("<p>hello</p>");
        assert_eq!(c.handle(update(8, 8, " world")), Outcome::Committed { caret: 14 });
        assert_eq!(c.text(), "<p>hello world</p>");

        assert_eq!(c.handle(update(3, 8, "bye")), Outcome::Committed { caret: 6 });
        assert_eq!(c.text(), "<p>bye world</p>");
    }

    #[test]
    fn text_updates_reach_the_input() {
        let mut c = controller("<p>hello</p>");
        c.handle(update(8, 8, "!"));
        assert_eq!(c.input().text(), "<p>hello!</p>");
        assert_eq!(c.input().selection(), 9..9);

        c.handle(InputEvent::CompositionStart);
        c.handle(update(9, 9, "か"));
        assert_eq!(c.input().text(), c.text());

        // Ranges past the end are clamped the same way on both sides
        c.handle(InputEvent::CompositionEnd);
        c.handle(update(40, 50, "x"));
        assert_eq!(c.text(), "<p>hello!か</p>x");
        assert_eq!(c.input().text(), c.text());
    }

    #[test]
    fn composition_defers_commit() {
        let mut c = controller("<p></p>");
        assert_eq!(c.handle(InputEvent::CompositionStart), Outcome::Ignored);
        assert_eq!(c.state(), CompositionState::Composing);

        assert_eq!(c.handle(update(3, 3, "k")), Outcome::Pending);
        assert_eq!(c.handle(update(3, 4, "か")), Outcome::Pending);
        assert_eq!(c.text(), "<p>か</p>");

        assert_eq!(c.handle(InputEvent::CompositionEnd), Outcome::Committed { caret: 4 });
        assert_eq!(c.state(), CompositionState::Idle);
        // Nothing left to commit
        assert_eq!(c.handle(InputEvent::CompositionEnd), Outcome::Ignored);
    }

    #[test]
    fn tab_and_enter_become_text_updates() {
        let mut c = controller("<p>ab</p>");
        c.input_mut().update_selection(4..4);
        assert_eq!(
            c.handle(InputEvent::KeyDown { key: Key::Tab, key_code: 9 }),
            Outcome::Committed { caret: 28 }
        );
        assert_eq!(c.text(), "<p>a&nbsp;&nbsp;&nbsp;&nbsp;b</p>");
        assert_eq!(c.input().text(), c.text());

        c.input_mut().update_selection(29..28);
        c.handle(InputEvent::KeyDown { key: Key::Enter, key_code: 13 });
        assert_eq!(c.text(), "<p>a&nbsp;&nbsp;&nbsp;&nbsp;</p><p>&nbsp;</p>");
    }

    #[test]
    fn ime_keys_and_composing_keys_are_left_alone() {
        let mut c = controller("<p>ab</p>");
        let tab = |key_code| InputEvent::KeyDown { key: Key::Tab, key_code };
        assert_eq!(c.handle(tab(IME_KEY_CODE)), Outcome::Ignored);

        c.handle(InputEvent::CompositionStart);
        assert_eq!(c.handle(tab(9)), Outcome::Ignored);
        assert_eq!(c.text(), "<p>ab</p>");

        assert_eq!(
            c.handle(InputEvent::KeyDown { key: Key::Char('x'), key_code: 88 }),
            Outcome::Ignored
        );
    }

    #[test]
    fn out_of_range_updates_are_clamped() {
        let mut c = controller("abc");
        assert_eq!(c.handle(update(10, 20, "!")), Outcome::Committed { caret: 4 });
        assert_eq!(c.text(), "abc!");
    }

    #[test]
    fn passthrough_ignores_input() {
        let input = Platform::Headless.into_input().unwrap();
        let mut c = EditSurfaceController::new("<p>x</p>", input, InputSettings::default());
        assert!(c.is_passthrough());
        assert_eq!(c.handle(update(0, 0, "y")), Outcome::Ignored);
        assert_eq!(c.text(), "<p>x</p>");
    }

    #[test]
    fn missing_capability_fails_construction() {
        let err = Platform::Interactive { input: None }.into_input().unwrap_err();
        assert_eq!(err, EditorError::MissingCapability { capability: "EditContext" });
        assert_eq!(
            err.to_string(),
            "Required platform capability `EditContext` is not available"
        );
    }
}
