//! Live editing over a markup document.
//!
//! The [`Editor`] keeps three views of one document in step: the markup text,
//! the parsed tree, and whatever a [`Surface`] currently displays. The
//! [`OffsetIndex`] maps between them, and the [`SelectionBridge`] keeps the
//! native selection pointing at the right text across re-renders.
//!
//! [`Composer`] binds an editor to a [`scribe_source::Source`] so edits flow
//! back into source text such as markdown.

pub mod composer;
pub mod editor;
pub mod highlight;
pub mod index;
pub mod input;
pub mod observable;
pub mod scheduler;
pub mod selection;
pub mod surface;

pub use composer::Composer;
pub use editor::Editor;
pub use highlight::{Highlights, GRAMMAR_ERROR, SEARCH_RESULTS, SPELLING_ERROR};
pub use index::{IndexError, IndexNode, IndexPoint, OffsetIndex, SelectionRange};
pub use input::{
    CompositionState, EditBuffer, EditSurfaceController, EditorError, InputEvent, InputSettings,
    Key, Outcome, Passthrough, Platform, TextInput, IME_KEY_CODE,
};
pub use observable::{Observable, Subscription};
pub use scheduler::{Scheduler, Task};
pub use selection::{Anchor, SelectionBridge};
pub use surface::{LiveNodeId, LivePoint, LiveRange, MemorySurface, Surface};
