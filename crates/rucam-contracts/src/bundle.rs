//! Case bundle types: the canonical evidence artifact built from one document.
//!
//! A `CaseBundle` is constructed exactly once per document by the bundle
//! builder and is read-only afterwards. Its serde representation is the
//! canonical wire format handed to every analysis stage, so field names on
//! the wire follow the established `case_bundle_json` contract rather than
//! the Rust field names.

use serde::{Deserialize, Serialize};

/// Element-kind tags produced by the extractor adapters.
///
/// Kinds are plain strings on the wire and are compared lexicographically
/// when blocks are ordered, so the constants below carry no priority.
pub mod element_kind {
    pub const TITLE: &str = "Title";
    pub const NARRATIVE_TEXT: &str = "NarrativeText";
    pub const LIST_ITEM: &str = "ListItem";
    pub const CAPTION: &str = "Caption";
    /// Placeholder for a page that was visited but yielded no text.
    pub const UNKNOWN: &str = "Unknown";
}

/// One paragraph or segment of document content.
///
/// Two blocks are duplicates when they share `(page_number, text)`,
/// regardless of which adapter produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBlock {
    /// Categorical tag, e.g. "NarrativeText" or "Title".
    #[serde(rename = "element_type")]
    pub element_kind: String,
    /// 1-based physical page number.
    pub page_number: u32,
    /// Block text. Empty only for `element_kind::UNKNOWN` placeholders.
    pub text: String,
}

impl EvidenceBlock {
    pub fn new(element_kind: impl Into<String>, page_number: u32, text: impl Into<String>) -> Self {
        Self {
            element_kind: element_kind.into(),
            page_number,
            text: text.into(),
        }
    }

    /// The "page seen but empty" marker.
    pub fn empty_page(page_number: u32) -> Self {
        Self::new(element_kind::UNKNOWN, page_number, "")
    }

    /// Key used for cross-adapter deduplication.
    pub fn dedup_key(&self) -> (u32, &str) {
        (self.page_number, self.text.as_str())
    }
}

/// One detected tabular region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceTable {
    pub page_number: u32,
    /// 1-based, unique within a bundle, assigned in extraction order.
    pub table_index: u32,
    /// Rows of trimmed, non-empty cells. Never contains an empty row.
    pub raw_rows: Vec<Vec<String>>,
    /// First row joined with " | ".
    pub preview: String,
}

impl EvidenceTable {
    /// Build a table from raw cell text, dropping empty cells and rows.
    ///
    /// Returns `None` when nothing survives the cleanup, so callers never
    /// hold a table without content.
    pub fn from_cells(page_number: u32, table_index: u32, rows: Vec<Vec<String>>) -> Option<Self> {
        let raw_rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.trim().to_string())
                    .filter(|cell| !cell.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();

        let preview = raw_rows.first()?.join(" | ");

        Some(Self {
            page_number,
            table_index,
            raw_rows,
            preview,
        })
    }
}

/// Provenance and confidence summary for a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Number of blocks produced by the primary (layout-aware) adapter.
    #[serde(rename = "unstructured_total_score")]
    pub primary_extractor_score: usize,
    /// Pages covered by blocks from the fallback adapter, ascending.
    pub fallback_pages: Vec<u32>,
    /// Number of fallback blocks produced, whether or not they were merged.
    #[serde(rename = "fallback_total_score")]
    pub fallback_score: usize,
}

/// The canonical evidence artifact for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBundle {
    #[serde(rename = "pdf_path")]
    pub document_path: String,
    /// Adapter-level events in the order they happened.
    pub extraction_notes: Vec<String>,
    /// Deduplicated and sorted by `(page_number, element_kind)`.
    pub blocks: Vec<EvidenceBlock>,
    pub normalized_text: String,
    pub tables: Vec<EvidenceTable>,
    /// Reserved for extraction ambiguities. Currently always empty.
    pub unknowns: Vec<String>,
    pub quality: QualityMetrics,
}

impl CaseBundle {
    /// Newline-join of the non-empty block texts, trimmed.
    pub fn normalize_text(blocks: &[EvidenceBlock]) -> String {
        blocks
            .iter()
            .filter(|b| !b.text.is_empty())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Serialize to the canonical wire format.
    pub fn to_json(&self) -> serde_json::Value {
        // Every field is a plain string, integer, or nested vector of those.
        serde_json::to_value(self).expect("CaseBundle must always be serializable to JSON")
    }

    /// Pretty-printed wire format, as embedded in analysis prompts.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("CaseBundle must always be serializable to JSON")
    }
}
