//! Named highlight layers over plain-text ranges.

use crate::{
    index::OffsetIndex,
    surface::{LiveRange, Surface},
};
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use std::ops::Range;

pub const SPELLING_ERROR: &str = "spelling-error";
pub const GRAMMAR_ERROR: &str = "grammar-error";
pub const SEARCH_RESULTS: &str = "search-results";

/// Plain-text ranges per layer. Kept in plain-text coordinates so they
/// survive index rebuilds and are converted to live ranges on every render.
#[derive(Debug, Default, Clone)]
pub struct Highlights {
    layers: FxHashMap<CompactString, Vec<Range<usize>>>,
}

impl Highlights {
    pub fn set(&mut self, name: &str, ranges: Vec<Range<usize>>) {
        self.layers.insert(CompactString::from(name), ranges);
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, name: &str) -> &[Range<usize>] {
        self.layers.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Hand every layer to the surface. Ranges the index cannot resolve are
    /// dropped.
    pub fn render<S: Surface + ?Sized>(&self, index: &OffsetIndex, surface: &mut S) {
        for (name, ranges) in &self.layers {
            let live = to_live_ranges(index, ranges);
            tracing::trace!(layer = %name, ranges = live.len(), "rendering highlights");
            surface.set_highlights(name, live);
        }
    }
}

/// Convert plain-text ranges to live ranges, skipping unresolvable ones.
pub fn to_live_ranges(index: &OffsetIndex, ranges: &[Range<usize>]) -> Vec<LiveRange> {
    ranges
        .iter()
        .filter_map(|range| index.to_range(range.start, range.end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use scribe_markup::parse;

    #[test]
    fn renders_layers_as_live_ranges() {
        let markup = "<p>teh cat</p><p>sat</p>";
        let mut surface = MemorySurface::new();
        surface.render(markup);
        let index = OffsetIndex::build(&surface, &parse(markup)).unwrap();

        let mut highlights = Highlights::default();
        highlights.set(SPELLING_ERROR, vec![0..3, 50..60]);
        highlights.set(SEARCH_RESULTS, vec![7..10]);
        highlights.render(&index, &mut surface);

        let spelling = surface.highlights(SPELLING_ERROR);
        assert_eq!(spelling.len(), 1);
        assert_eq!(surface.text_of(spelling[0].start.node), Some("teh cat"));
        assert_eq!((spelling[0].start.offset, spelling[0].end.offset), (0, 3));

        let search = surface.highlights(SEARCH_RESULTS);
        assert_eq!(search.len(), 1);
        assert_eq!(surface.text_of(search[0].start.node), Some("teh cat"));
        assert_eq!(surface.text_of(search[0].end.node), Some("sat"));
        assert!(surface.highlights(GRAMMAR_ERROR).is_empty());
    }
}
