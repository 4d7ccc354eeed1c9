//! Source text handling for scribe.
//!
//! Converts between the format people write (markdown) and the display
//! markup the editor works on, and keeps search results and annotations over
//! the plain-text projection current.

pub mod convert;
pub mod markdown;
pub mod source;

pub use convert::{Converter, MarkdownConverter};
pub use source::{Annotator, Query, Source, SourceError};
