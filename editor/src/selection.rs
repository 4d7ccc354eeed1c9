//! Keeping the native selection and the index selection in step.

use crate::{
    index::{OffsetIndex, SelectionRange},
    input::TextInput,
    surface::{LiveRange, Surface},
};
use std::ops::Range;
use tracing::trace;

/// What a remap should aim for in the new index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Absolute plain-text offsets
    Text(Range<usize>),
    /// Absolute markup offsets
    Markup(Range<usize>),
}

/// Tracks the last known selection in index coordinates.
#[derive(Debug, Default)]
pub struct SelectionBridge {
    current: Option<SelectionRange>,
}

impl SelectionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SelectionRange> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Handle a native selection change.
    ///
    /// Ignored while the surface is not focused. Otherwise the selection is
    /// resolved through `index`, stored, and its markup offsets are passed on
    /// to `input`. A selection that does not resolve clears the stored one.
    pub fn on_selection_change<S: Surface + ?Sized>(
        &mut self,
        surface: &S,
        index: &OffsetIndex,
        input: &mut dyn TextInput,
    ) -> Option<&SelectionRange> {
        if !surface.is_active() {
            trace!("selection change on inactive surface ignored");
            return self.current.as_ref();
        }

        self.current = surface.selection().and_then(|range| index.resolve(&range));
        self.forward(input);
        self.current.as_ref()
    }

    /// Store `range` as the current selection.
    pub fn set(&mut self, range: Option<SelectionRange>, input: &mut dyn TextInput) {
        self.current = range;
        self.forward(input);
    }

    /// Re-resolve the selection against a rebuilt index.
    ///
    /// With no explicit `anchor` the previous selection's plain-text offsets
    /// are used. If either end no longer resolves, the selection is cleared.
    pub fn remap(
        &mut self,
        index: &OffsetIndex,
        anchor: Option<Anchor>,
        input: &mut dyn TextInput,
    ) -> Option<&SelectionRange> {
        let anchor = anchor.or_else(|| {
            self.current
                .as_ref()
                .map(|current| Anchor::Text(current.text_offsets()))
        });

        self.current = match anchor {
            Some(Anchor::Text(range)) => index.at_text_position(range.start, range.end),
            Some(Anchor::Markup(range)) => index.at_markup_position(range.start, range.end),
            None => None,
        };
        if self.current.is_none() {
            trace!("selection cleared by remap");
        }
        self.forward(input);
        self.current.as_ref()
    }

    /// Push the current selection to the surface, unless the surface already
    /// shows exactly that range. Returns true if the surface was written.
    pub fn apply<S: Surface + ?Sized>(&self, surface: &mut S) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        let target = current.to_live();
        if let Some(existing) = surface.selection() {
            if same_range(surface, &target, &existing) {
                return false;
            }
        }
        surface.set_selection(target);
        true
    }

    fn forward(&self, input: &mut dyn TextInput) {
        if let Some(current) = &self.current {
            input.update_selection(current.markup_offsets());
        }
    }
}

fn same_range<S: Surface + ?Sized>(surface: &S, a: &LiveRange, b: &LiveRange) -> bool {
    a.start.offset == b.start.offset
        && a.end.offset == b.end.offset
        && a.start.node == b.start.node
        && a.end.node == b.end.node
        && surface.common_ancestor(a) == surface.common_ancestor(b)
}
