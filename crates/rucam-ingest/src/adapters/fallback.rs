//! Raw-text fallback adapter.
//!
//! Reads each page's plain text with pdf-extract, or with lopdf when
//! pdf-extract cannot parse the file, and emits one `NarrativeText` block per
//! page that has any text. Lines are trimmed and joined with single spaces.
//! Empty pages produce nothing here; only the layout adapter marks them.

use std::path::Path;

use rucam_contracts::{bundle::EvidenceBlock, error::RucamResult, extract::Extraction};
use rucam_core::traits::BlockExtractor;

pub const FALLBACK_ADAPTER: &str = "fallback";

#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackExtractor;

impl BlockExtractor for FallbackExtractor {
    fn name(&self) -> &str {
        FALLBACK_ADAPTER
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "fallback")
    }

    #[cfg(feature = "fallback")]
    fn extract(&self, document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
        imp::extract(document)
    }

    #[cfg(not(feature = "fallback"))]
    fn extract(&self, _document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
        Ok(Extraction::degraded(
            "fallback extraction skipped: built without the `fallback` feature",
        ))
    }
}

#[cfg(feature = "fallback")]
mod imp {
    use std::path::Path;

    use tracing::{debug, warn};

    use rucam_contracts::{
        bundle::{element_kind, EvidenceBlock},
        error::{RucamError, RucamResult},
        extract::Extraction,
    };

    use super::FALLBACK_ADAPTER;
    use crate::adapters::collapse_whitespace;

    pub(super) fn extract(document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
        let bytes = std::fs::read(document).map_err(|e| RucamError::ExtractionFailed {
            adapter: FALLBACK_ADAPTER.to_string(),
            reason: e.to_string(),
        })?;

        let mut notes = Vec::new();
        let pages = match pdf_extract::extract_text_from_mem_by_pages(&bytes) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(adapter = FALLBACK_ADAPTER, error = %e, "pdf-extract failed, trying lopdf");
                notes.push(format!("fallback pdf-extract failed: {e}"));
                match lopdf_pages(&bytes) {
                    Ok(pages) => {
                        notes.push("fallback lopdf text strategy".to_string());
                        pages
                    }
                    Err(e2) => {
                        notes.push(format!("fallback lopdf failed: {e2}"));
                        return Ok(Extraction::new(Vec::new(), notes));
                    }
                }
            }
        };

        let blocks = page_blocks(&pages);
        if blocks.is_empty() {
            notes.push("fallback found no text".to_string());
        } else {
            notes.push("fallback blocks generated".to_string());
        }

        debug!(adapter = FALLBACK_ADAPTER, pages = pages.len(), blocks = blocks.len(), "fallback extraction finished");
        Ok(Extraction::new(blocks, notes))
    }

    fn lopdf_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
        doc.get_pages()
            .keys()
            .map(|&n| doc.extract_text(&[n]).map_err(|e| format!("page {n}: {e}")))
            .collect()
    }

    /// One block per non-empty page, numbered by position.
    pub(super) fn page_blocks(pages: &[String]) -> Vec<EvidenceBlock> {
        pages
            .iter()
            .enumerate()
            .filter_map(|(i, text)| {
                let joined = collapse_whitespace(text);
                (!joined.is_empty()).then(|| {
                    EvidenceBlock::new(element_kind::NARRATIVE_TEXT, i as u32 + 1, joined)
                })
            })
            .collect()
    }

}

#[cfg(all(test, feature = "fallback"))]
mod tests {
    use rucam_core::traits::BlockExtractor;

    use super::FallbackExtractor;
    use crate::fixtures;

    #[test]
    fn reads_page_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_pdf(
            &dir,
            "case.pdf",
            &["BT /F1 12 Tf 72 700 Td (Hepatotoxicity suspected) Tj ET"],
        );

        let extraction = FallbackExtractor.extract(&path).unwrap();
        assert_eq!(extraction.items.len(), 1);
        assert!(extraction.items[0].text.contains("Hepatotoxicity"));
        assert_eq!(extraction.notes.last().map(String::as_str), Some("fallback blocks generated"));
    }

    #[test]
    fn blank_document_produces_no_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_pdf(&dir, "blank.pdf", &[""]);

        let extraction = FallbackExtractor.extract(&path).unwrap();
        assert!(extraction.items.is_empty());
        assert!(!extraction.notes.iter().any(|n| n == "fallback blocks generated"));
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        let result = FallbackExtractor.extract(std::path::Path::new("/nonexistent/case.pdf"));
        assert!(result.is_err());
    }
}
