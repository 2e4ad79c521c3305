//! Extractor adapters.
//!
//! Each adapter is gated by a cargo feature and reports its availability
//! through `is_available()`. A build without the feature still compiles the
//! adapter; it degrades to an empty result with an explanatory note.

#[cfg(any(feature = "layout", feature = "tables"))]
pub(crate) mod content;
pub mod fallback;
pub mod layout;
pub mod tables;

pub use fallback::FallbackExtractor;
pub use layout::LayoutExtractor;
pub use tables::HeuristicTableExtractor;

/// Trim every line and join the non-empty ones with single spaces.
#[cfg(any(feature = "layout", feature = "fallback"))]
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
