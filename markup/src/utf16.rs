//! UTF-16 addressing over Rust strings.
//!
//! The live surface addresses text in UTF-16 code units, so every offset that
//! crosses the crate boundary (leaf positions, cut points, plain-text ranges)
//! is expressed in those units. These helpers translate between code units and
//! byte offsets into `str`.

use std::ops::Range;

/// Length of `text` in UTF-16 code units.
pub fn len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Byte offset of the UTF-16 offset `offset` within `text`.
///
/// Offsets past the end clamp to `text.len()`. An offset that lands between
/// the two halves of a surrogate pair rounds down to the start of that
/// character.
pub fn byte_offset(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        let next = units + ch.len_utf16();
        if next > offset {
            return index;
        }
        units = next;
    }
    text.len()
}

/// UTF-16 offset of the byte offset `byte` within `text`.
///
/// `byte` must lie on a char boundary; otherwise the offset of the containing
/// character's start is returned.
pub fn from_byte_offset(text: &str, byte: usize) -> usize {
    let byte = byte.min(text.len());
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        if index >= byte {
            break;
        }
        if index + ch.len_utf8() > byte {
            break;
        }
        units += ch.len_utf16();
    }
    units
}

/// Sub-slice of `text` addressed in UTF-16 code units.
pub fn slice(text: &str, range: Range<usize>) -> &str {
    let start = byte_offset(text, range.start);
    let end = byte_offset(text, range.end.max(range.start));
    &text[start..end]
}

/// Split `text` at the UTF-16 offset `offset`.
pub fn split_at(text: &str, offset: usize) -> (&str, &str) {
    text.split_at(byte_offset(text, offset))
}

/// Replace the UTF-16 range `range` of `text` with `replacement`.
///
/// This is the splice used for every text update: `text[..start] +
/// replacement + text[end..]`. Ranges past the end clamp to the end.
pub fn splice(text: &str, range: Range<usize>, replacement: &str) -> String {
    let start = byte_offset(text, range.start);
    let end = byte_offset(text, range.end.max(range.start));
    let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    out
}
