//! Adapter output envelope.

use serde::{Deserialize, Serialize};

/// What one extractor adapter returns: items in page order plus notes.
///
/// Notes record every strategy attempt, successful or not, in the order the
/// attempts happened. An adapter that degrades returns no items and at least
/// one note explaining why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction<T> {
    pub items: Vec<T>,
    pub notes: Vec<String>,
}

impl<T> Extraction<T> {
    pub fn new(items: Vec<T>, notes: Vec<String>) -> Self {
        Self { items, notes }
    }

    /// An empty result carrying a single explanatory note.
    pub fn degraded(note: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            notes: vec![note.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Extraction<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            notes: Vec::new(),
        }
    }
}
