//! Layout-aware primary adapter.
//!
//! Strategy order:
//!
//! 1. `hi_res`: walk each page's content stream, rebuild lines, classify
//!    them by font size and lead-in (`Title`, `ListItem`, `Caption`,
//!    `NarrativeText`), then group consecutive lines into paragraphs.
//! 2. `fast`: lopdf's plain page text, one `NarrativeText` block per
//!    blank-line-separated paragraph.
//!
//! A page visited without any text yields one `Unknown` placeholder block.

use std::path::Path;

use rucam_contracts::{bundle::EvidenceBlock, error::RucamResult, extract::Extraction};
use rucam_core::traits::BlockExtractor;

pub const LAYOUT_ADAPTER: &str = "layout";

/// The primary, layout-aware block extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayoutExtractor;

impl BlockExtractor for LayoutExtractor {
    fn name(&self) -> &str {
        LAYOUT_ADAPTER
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "layout")
    }

    #[cfg(feature = "layout")]
    fn extract(&self, document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
        imp::extract(document)
    }

    #[cfg(not(feature = "layout"))]
    fn extract(&self, _document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
        Ok(Extraction::degraded(
            "layout partition skipped: built without the `layout` feature",
        ))
    }
}

#[cfg(feature = "layout")]
mod imp {
    use std::collections::HashMap;
    use std::path::Path;

    use lopdf::Document;
    use tracing::{debug, warn};

    use rucam_contracts::{
        bundle::{element_kind, EvidenceBlock},
        error::{RucamError, RucamResult},
        extract::Extraction,
    };

    use super::LAYOUT_ADAPTER;
    use crate::adapters::collapse_whitespace;
    use crate::adapters::content::{page_lines, TextLine};

    /// Lines this much larger than the body size are headings.
    const TITLE_SCALE: f32 = 1.25;
    const TITLE_MAX_CHARS: usize = 200;

    pub(super) fn extract(document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
        let doc = Document::load(document).map_err(|e| RucamError::ExtractionFailed {
            adapter: LAYOUT_ADAPTER.to_string(),
            reason: e.to_string(),
        })?;

        let mut notes = Vec::new();
        let blocks = match hi_res(&doc) {
            Ok(blocks) => {
                notes.push("layout partition hi_res strategy".to_string());
                blocks
            }
            Err(e) => {
                warn!(adapter = LAYOUT_ADAPTER, error = %e, "hi_res strategy failed");
                notes.push(format!("layout hi_res failed: {e}"));
                match fast(&doc) {
                    Ok(blocks) => {
                        notes.push("layout partition fast strategy fallback".to_string());
                        blocks
                    }
                    Err(e2) => {
                        warn!(adapter = LAYOUT_ADAPTER, error = %e2, "fast strategy failed");
                        notes.push(format!("layout fast failed: {e2}"));
                        return Ok(Extraction::new(Vec::new(), notes));
                    }
                }
            }
        };

        notes.push(format!("extracted_blocks={}", blocks.len()));
        debug!(adapter = LAYOUT_ADAPTER, blocks = blocks.len(), "layout extraction finished");
        Ok(Extraction::new(blocks, notes))
    }

    // ── hi_res ───────────────────────────────────────────────────────────────

    fn hi_res(doc: &Document) -> Result<Vec<EvidenceBlock>, String> {
        let mut blocks = Vec::new();
        for (page_number, page_id) in doc.get_pages() {
            let lines = page_lines(doc, page_id).map_err(|e| format!("page {page_number}: {e}"))?;
            let page_blocks = partition(page_number, &lines);
            if page_blocks.is_empty() {
                blocks.push(EvidenceBlock::empty_page(page_number));
            } else {
                blocks.extend(page_blocks);
            }
        }
        Ok(blocks)
    }

    /// Dominant font size, weighted by characters. Ties go to the smaller size.
    fn body_size(lines: &[TextLine]) -> f32 {
        let mut weights: HashMap<i32, usize> = HashMap::new();
        for line in lines {
            // Half-point buckets.
            let bucket = (line.font_size * 2.0).round() as i32;
            *weights.entry(bucket).or_default() += line.text.trim().chars().count();
        }
        weights
            .into_iter()
            .max_by(|(size_a, w_a), (size_b, w_b)| w_a.cmp(w_b).then(size_b.cmp(size_a)))
            .map(|(bucket, _)| bucket as f32 / 2.0)
            .unwrap_or(12.0)
    }

    pub(super) fn is_list_item(text: &str) -> bool {
        if text.starts_with(['•', '◦', '▪', '‣', '–', '-', '*']) {
            return text.chars().nth(1).map_or(false, char::is_whitespace);
        }
        // "1. ", "12) ", "a) "
        let marker: String = text.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
        let rest = &text[marker.len()..];
        let numbered = !marker.is_empty()
            && (marker.chars().all(|c| c.is_ascii_digit())
                || (marker.len() == 1 && marker.chars().all(|c| c.is_ascii_lowercase())));
        numbered
            && (rest.starts_with(". ") || rest.starts_with(") "))
    }

    pub(super) fn is_caption(text: &str) -> bool {
        let lower = text.to_lowercase();
        ["figure ", "fig. ", "table "].iter().any(|prefix| {
            lower
                .strip_prefix(prefix)
                .and_then(|rest| rest.chars().next())
                .map_or(false, |c| c.is_ascii_digit())
        })
    }

    fn classify(line: &TextLine, body: f32) -> &'static str {
        let text = line.text.trim();
        if is_caption(text) {
            element_kind::CAPTION
        } else if is_list_item(text) {
            element_kind::LIST_ITEM
        } else if line.font_size >= body * TITLE_SCALE && text.chars().count() <= TITLE_MAX_CHARS {
            element_kind::TITLE
        } else {
            element_kind::NARRATIVE_TEXT
        }
    }

    /// Group classified lines into blocks.
    ///
    /// Consecutive `Title` or `NarrativeText` lines without a gap join into
    /// one block; list items and captions always start a new block.
    fn partition(page_number: u32, lines: &[TextLine]) -> Vec<EvidenceBlock> {
        let body = body_size(lines);
        let mut blocks: Vec<EvidenceBlock> = Vec::new();
        let mut open: Option<(&'static str, Vec<&str>)> = None;

        for line in lines {
            let kind = classify(line, body);
            let joins = matches!(kind, element_kind::TITLE | element_kind::NARRATIVE_TEXT)
                && !line.gap_before
                && open.as_ref().map_or(false, |(k, _)| *k == kind);

            if joins {
                if let Some((_, parts)) = open.as_mut() {
                    parts.push(line.text.as_str());
                }
            } else {
                close_block(&mut open, page_number, &mut blocks);
                open = Some((kind, vec![line.text.as_str()]));
            }
        }
        close_block(&mut open, page_number, &mut blocks);
        blocks
    }

    fn close_block(
        open: &mut Option<(&'static str, Vec<&str>)>,
        page_number: u32,
        blocks: &mut Vec<EvidenceBlock>,
    ) {
        if let Some((kind, parts)) = open.take() {
            let text = collapse_whitespace(&parts.join(" "));
            if !text.is_empty() {
                blocks.push(EvidenceBlock::new(kind, page_number, text));
            }
        }
    }

    // ── fast ─────────────────────────────────────────────────────────────────

    fn fast(doc: &Document) -> Result<Vec<EvidenceBlock>, String> {
        let mut blocks = Vec::new();
        for page_number in doc.get_pages().keys().copied() {
            let text = doc
                .extract_text(&[page_number])
                .map_err(|e| format!("page {page_number}: {e}"))?;

            let mut page_blocks = Vec::new();
            for paragraph in text.split("\n\n") {
                let joined = collapse_whitespace(paragraph);
                if !joined.is_empty() {
                    page_blocks.push(EvidenceBlock::new(element_kind::NARRATIVE_TEXT, page_number, joined));
                }
            }

            if page_blocks.is_empty() {
                blocks.push(EvidenceBlock::empty_page(page_number));
            } else {
                blocks.extend(page_blocks);
            }
        }
        Ok(blocks)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn line(size: f32, text: &str, gap: bool) -> TextLine {
            TextLine {
                font_size: size,
                text: text.to_string(),
                gap_before: gap,
            }
        }

        #[test]
        fn list_and_caption_detection() {
            assert!(is_list_item("• Jaundice"));
            assert!(is_list_item("2. Amoxicillin-clavulanate"));
            assert!(is_list_item("b) prior hepatitis"));
            assert!(!is_list_item("2.5 mg daily"));
            assert!(!is_list_item("-12 days"));
            assert!(is_caption("Figure 1 ALT trend"));
            assert!(is_caption("Table 2: Laboratory values"));
            assert!(!is_caption("Tablet 2 taken"));
        }

        #[test]
        fn partition_classifies_and_groups_lines() {
            let lines = vec![
                line(18.0, "Case Report", false),
                line(10.0, "A 54-year-old woman presented", false),
                line(10.0, "with jaundice after 21 days.", false),
                line(10.0, "• ALT 1200 U/L", false),
                line(10.0, "Figure 1 Enzyme trend", true),
                line(10.0, "Treatment was withdrawn.", true),
            ];

            let blocks = partition(1, &lines);
            let kinds: Vec<&str> = blocks.iter().map(|b| b.element_kind.as_str()).collect();
            assert_eq!(kinds, vec!["Title", "NarrativeText", "ListItem", "Caption", "NarrativeText"]);
            assert_eq!(blocks[1].text, "A 54-year-old woman presented with jaundice after 21 days.");
            assert!(blocks.iter().all(|b| b.page_number == 1));
        }

        #[test]
        fn uniform_font_has_no_titles() {
            let lines = vec![line(11.0, "Only body text", false), line(11.0, "More body", true)];
            let blocks = partition(3, &lines);
            assert_eq!(blocks.len(), 2);
            assert!(blocks.iter().all(|b| b.element_kind == "NarrativeText"));
        }
    }
}

#[cfg(all(test, feature = "layout"))]
mod tests {
    use rucam_core::traits::BlockExtractor;

    use super::LayoutExtractor;
    use crate::fixtures;

    #[test]
    fn extracts_title_and_narrative_from_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_pdf(
            &dir,
            "case.pdf",
            &[concat!(
                "BT /F1 20 Tf 72 720 Td (Case Report) Tj ET ",
                "BT /F1 11 Tf 72 690 Td (Patient developed jaundice.) Tj ET"
            )],
        );

        let extraction = LayoutExtractor.extract(&path).unwrap();
        let kinds: Vec<&str> = extraction.items.iter().map(|b| b.element_kind.as_str()).collect();
        assert_eq!(kinds, vec!["Title", "NarrativeText"]);
        assert_eq!(extraction.items[1].text, "Patient developed jaundice.");
        assert_eq!(
            extraction.notes,
            vec!["layout partition hi_res strategy".to_string(), "extracted_blocks=2".to_string()]
        );
    }

    #[test]
    fn empty_page_yields_unknown_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_pdf(&dir, "blank.pdf", &["", "BT /F1 11 Tf 72 700 Td (Page two) Tj ET"]);

        let extraction = LayoutExtractor.extract(&path).unwrap();
        assert_eq!(extraction.items.len(), 2);
        assert_eq!(extraction.items[0].element_kind, "Unknown");
        assert_eq!(extraction.items[0].page_number, 1);
        assert!(extraction.items[0].text.is_empty());
        assert_eq!(extraction.items[1].page_number, 2);
    }

    #[test]
    fn unreadable_file_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        assert!(LayoutExtractor.extract(&path).is_err());
    }
}
