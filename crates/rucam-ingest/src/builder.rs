//! Case Bundle Builder.
//!
//! Holds a priority-ordered registry of block adapters plus any number of
//! table adapters. The first *available* block adapter is the primary; every
//! other available block adapter is a fallback.
//!
//! Fallbacks always run so their scores reach the quality metrics. Their
//! blocks are merged only when the primary produced none.

use std::path::Path;

use tracing::{debug, info, warn};

use rucam_contracts::{
    bundle::{CaseBundle, EvidenceBlock, EvidenceTable, QualityMetrics},
    error::{RucamError, RucamResult},
    extract::Extraction,
};
use rucam_core::traits::{BlockExtractor, BundleSource, TableExtractor};

use crate::adapters::{FallbackExtractor, HeuristicTableExtractor, LayoutExtractor};
use crate::merge::merge_blocks;

/// Assembles a [`CaseBundle`] from registered adapters.
pub struct CaseBundleBuilder {
    block_extractors: Vec<Box<dyn BlockExtractor>>,
    table_extractors: Vec<Box<dyn TableExtractor>>,
}

impl CaseBundleBuilder {
    /// An empty registry. Register adapters in priority order.
    pub fn new() -> Self {
        Self {
            block_extractors: Vec::new(),
            table_extractors: Vec::new(),
        }
    }

    /// Layout adapter as primary, raw-text fallback, heuristic tables.
    pub fn with_default_adapters() -> Self {
        Self::new()
            .with_block_extractor(Box::new(LayoutExtractor))
            .with_block_extractor(Box::new(FallbackExtractor))
            .with_table_extractor(Box::new(HeuristicTableExtractor))
    }

    pub fn with_block_extractor(mut self, extractor: Box<dyn BlockExtractor>) -> Self {
        self.block_extractors.push(extractor);
        self
    }

    pub fn with_table_extractor(mut self, extractor: Box<dyn TableExtractor>) -> Self {
        self.table_extractors.push(extractor);
        self
    }

    /// Build the bundle for `document`.
    ///
    /// Fails only with [`RucamError::DocumentNotFound`]. Adapter errors are
    /// recorded as extraction notes and the adapter contributes nothing.
    pub fn build(&self, document: &Path) -> RucamResult<CaseBundle> {
        if !document.is_file() {
            return Err(RucamError::DocumentNotFound {
                path: document.display().to_string(),
            });
        }

        let mut notes = Vec::new();

        // Registry order: the first available adapter is primary, the rest are
        // fallbacks. Notes are appended as each adapter is visited.
        let mut primary: Option<Vec<EvidenceBlock>> = None;
        let mut fallback_blocks = Vec::new();
        for adapter in &self.block_extractors {
            if !adapter.is_available() {
                warn!(adapter = adapter.name(), "block adapter unavailable");
                notes.push(format!("{} unavailable, skipped", adapter.name()));
                continue;
            }
            let extraction = run_adapter(adapter.name(), adapter.extract(document));
            notes.extend(extraction.notes);
            if primary.is_none() {
                primary = Some(extraction.items);
            } else {
                fallback_blocks.extend(extraction.items);
            }
        }
        let primary = primary.unwrap_or_else(|| {
            notes.push("no block adapter available".to_string());
            Vec::new()
        });

        let mut fallback_pages: Vec<u32> = fallback_blocks.iter().map(|b| b.page_number).collect();
        fallback_pages.sort_unstable();
        fallback_pages.dedup();

        let quality = QualityMetrics {
            primary_extractor_score: primary.len(),
            fallback_pages,
            fallback_score: fallback_blocks.len(),
        };

        let blocks = if primary.is_empty() {
            debug!(fallback_blocks = fallback_blocks.len(), "primary empty, using fallback blocks");
            merge_blocks(&[], &fallback_blocks)
        } else {
            merge_blocks(&primary, &[])
        };

        let tables = self.collect_tables(document, &mut notes);
        let normalized_text = CaseBundle::normalize_text(&blocks);

        info!(
            document = %document.display(),
            blocks = blocks.len(),
            tables = tables.len(),
            primary_score = quality.primary_extractor_score,
            fallback_score = quality.fallback_score,
            "case bundle built"
        );

        Ok(CaseBundle {
            document_path: document.display().to_string(),
            extraction_notes: notes,
            blocks,
            normalized_text,
            tables,
            unknowns: Vec::new(),
            quality,
        })
    }

    /// Run every available table adapter. Indices are reassigned 1-based
    /// across adapters so they stay unique within the bundle.
    fn collect_tables(&self, document: &Path, notes: &mut Vec<String>) -> Vec<EvidenceTable> {
        let mut tables = Vec::new();
        for adapter in &self.table_extractors {
            if !adapter.is_available() {
                warn!(adapter = adapter.name(), "table adapter unavailable");
                notes.push(format!("{} unavailable, skipped", adapter.name()));
                continue;
            }
            let extraction = run_adapter(adapter.name(), adapter.extract(document));
            notes.extend(extraction.notes);
            tables.extend(extraction.items);
        }
        for (i, table) in tables.iter_mut().enumerate() {
            table.table_index = i as u32 + 1;
        }
        tables
    }
}

impl Default for CaseBundleBuilder {
    fn default() -> Self {
        Self::with_default_adapters()
    }
}

impl BundleSource for CaseBundleBuilder {
    fn build(&self, document: &Path) -> RucamResult<CaseBundle> {
        CaseBundleBuilder::build(self, document)
    }
}

/// Turn an adapter error into a note-only extraction.
fn run_adapter<T>(name: &str, result: RucamResult<Extraction<T>>) -> Extraction<T> {
    match result {
        Ok(extraction) => extraction,
        Err(e) => {
            warn!(adapter = name, error = %e, "adapter failed");
            Extraction::degraded(format!("{name} failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rucam_contracts::{
        bundle::{element_kind, EvidenceBlock, EvidenceTable},
        error::{RucamError, RucamResult},
        extract::Extraction,
    };
    use rucam_core::traits::{BlockExtractor, TableExtractor};

    use super::CaseBundleBuilder;

    // ── Fakes ────────────────────────────────────────────────────────

    struct FixedBlocks {
        name: &'static str,
        available: bool,
        blocks: Vec<EvidenceBlock>,
        note: &'static str,
    }

    impl FixedBlocks {
        fn new(name: &'static str, blocks: Vec<EvidenceBlock>, note: &'static str) -> Self {
            Self { name, available: true, blocks, note }
        }
    }

    impl BlockExtractor for FixedBlocks {
        fn name(&self) -> &str {
            self.name
        }
        fn is_available(&self) -> bool {
            self.available
        }
        fn extract(&self, _document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
            Ok(Extraction::new(self.blocks.clone(), vec![self.note.to_string()]))
        }
    }

    struct BrokenBlocks;

    impl BlockExtractor for BrokenBlocks {
        fn name(&self) -> &str {
            "broken"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn extract(&self, _document: &Path) -> RucamResult<Extraction<EvidenceBlock>> {
            Err(RucamError::ExtractionFailed {
                adapter: "broken".into(),
                reason: "corrupt xref".into(),
            })
        }
    }

    struct FixedTables(Vec<EvidenceTable>);

    impl TableExtractor for FixedTables {
        fn name(&self) -> &str {
            "fixed-tables"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn extract(&self, _document: &Path) -> RucamResult<Extraction<EvidenceTable>> {
            Ok(Extraction::new(self.0.clone(), vec!["tables extracted".into()]))
        }
    }

    fn narrative(page: u32, text: &str) -> EvidenceBlock {
        EvidenceBlock::new(element_kind::NARRATIVE_TEXT, page, text)
    }

    fn table(page: u32, index: u32) -> EvidenceTable {
        EvidenceTable::from_cells(page, index, vec![vec!["ALT".into(), "1200".into()]]).unwrap()
    }

    fn existing_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        (dir, path)
    }

    // ── Tests ────────────────────────────────────────────────────────

    #[test]
    fn missing_document_is_not_found() {
        let builder = CaseBundleBuilder::new();
        match builder.build(Path::new("/nonexistent/case.pdf")) {
            Err(RucamError::DocumentNotFound { path }) => assert!(path.contains("case.pdf")),
            other => panic!("expected DocumentNotFound, got {:?}", other),
        }
    }

    #[test]
    fn directory_is_not_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let result = CaseBundleBuilder::new().build(dir.path());
        assert!(matches!(result, Err(RucamError::DocumentNotFound { .. })));
    }

    #[test]
    fn non_empty_primary_excludes_fallback_blocks() {
        let (_dir, path) = existing_file();
        let builder = CaseBundleBuilder::new()
            .with_block_extractor(Box::new(FixedBlocks::new(
                "primary",
                vec![narrative(1, "Primary text")],
                "primary ran",
            )))
            .with_block_extractor(Box::new(FixedBlocks::new(
                "fallback",
                vec![narrative(1, "Fallback text"), narrative(2, "More fallback")],
                "fallback ran",
            )));

        let bundle = builder.build(&path).unwrap();
        assert_eq!(bundle.blocks.len(), 1);
        assert_eq!(bundle.blocks[0].text, "Primary text");
        assert_eq!(bundle.normalized_text, "Primary text");
        assert_eq!(bundle.quality.primary_extractor_score, 1);
        assert_eq!(bundle.quality.fallback_score, 2);
        assert_eq!(bundle.quality.fallback_pages, vec![1, 2]);
        assert_eq!(bundle.extraction_notes, vec!["primary ran", "fallback ran"]);
    }

    #[test]
    fn empty_primary_uses_fallback_blocks() {
        let (_dir, path) = existing_file();
        let builder = CaseBundleBuilder::new()
            .with_block_extractor(Box::new(FixedBlocks::new("primary", vec![], "primary ran")))
            .with_block_extractor(Box::new(FixedBlocks::new(
                "fallback",
                vec![narrative(2, "Second"), narrative(1, "First"), narrative(1, "First")],
                "fallback ran",
            )));

        let bundle = builder.build(&path).unwrap();
        let texts: Vec<&str> = bundle.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Second"]);
        assert_eq!(bundle.normalized_text, "First\nSecond");
        assert_eq!(bundle.quality.primary_extractor_score, 0);
        assert_eq!(bundle.quality.fallback_score, 3);
    }

    #[test]
    fn unavailable_adapter_is_skipped_with_note() {
        let (_dir, path) = existing_file();
        let mut missing = FixedBlocks::new("missing", vec![narrative(1, "never")], "never");
        missing.available = false;
        let builder = CaseBundleBuilder::new()
            .with_block_extractor(Box::new(missing))
            .with_block_extractor(Box::new(FixedBlocks::new(
                "second",
                vec![narrative(1, "Second is primary")],
                "second ran",
            )));

        let bundle = builder.build(&path).unwrap();
        assert_eq!(bundle.extraction_notes[0], "missing unavailable, skipped");
        assert_eq!(bundle.blocks[0].text, "Second is primary");
        assert_eq!(bundle.quality.primary_extractor_score, 1);
        assert_eq!(bundle.quality.fallback_score, 0);
    }

    #[test]
    fn notes_follow_registry_order() {
        let (_dir, path) = existing_file();
        let mut later = FixedBlocks::new("later", vec![narrative(2, "never")], "later ran");
        later.available = false;
        let builder = CaseBundleBuilder::new()
            .with_block_extractor(Box::new(FixedBlocks::new(
                "primary",
                vec![narrative(1, "Primary text")],
                "primary ran",
            )))
            .with_block_extractor(Box::new(later))
            .with_block_extractor(Box::new(FixedBlocks::new("fallback", vec![], "fallback ran")));

        let bundle = builder.build(&path).unwrap();
        assert_eq!(
            bundle.extraction_notes,
            vec!["primary ran", "later unavailable, skipped", "fallback ran"]
        );
    }

    #[test]
    fn adapter_error_becomes_note() {
        let (_dir, path) = existing_file();
        let builder = CaseBundleBuilder::new()
            .with_block_extractor(Box::new(BrokenBlocks))
            .with_block_extractor(Box::new(FixedBlocks::new(
                "fallback",
                vec![narrative(1, "Recovered")],
                "fallback ran",
            )));

        let bundle = builder.build(&path).unwrap();
        assert!(bundle.extraction_notes[0].starts_with("broken failed:"));
        assert!(bundle.extraction_notes[0].contains("corrupt xref"));
        assert_eq!(bundle.blocks[0].text, "Recovered");
    }

    #[test]
    fn tables_are_appended_and_reindexed() {
        let (_dir, path) = existing_file();
        let builder = CaseBundleBuilder::new()
            .with_table_extractor(Box::new(FixedTables(vec![table(1, 1), table(3, 2)])))
            .with_table_extractor(Box::new(FixedTables(vec![table(2, 1)])));

        let bundle = builder.build(&path).unwrap();
        let indices: Vec<u32> = bundle.tables.iter().map(|t| t.table_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(bundle.tables[2].page_number, 2);
        assert!(bundle.blocks.is_empty());
        assert!(bundle.unknowns.is_empty());
    }

    #[cfg(all(feature = "layout", feature = "fallback", feature = "tables"))]
    #[test]
    fn blank_single_page_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::fixtures::write_pdf(&dir, "blank.pdf", &[""]);

        let bundle = CaseBundleBuilder::with_default_adapters().build(&path).unwrap();

        assert_eq!(bundle.blocks.len(), 1);
        assert_eq!(bundle.blocks[0].element_kind, "Unknown");
        assert_eq!(bundle.blocks[0].page_number, 1);
        assert!(bundle.normalized_text.is_empty());
        assert!(bundle.tables.is_empty());
        assert!(bundle.quality.fallback_pages.is_empty());
        assert_eq!(bundle.quality.primary_extractor_score, 1);
        assert!(bundle.extraction_notes.iter().any(|n| n == "extracted_blocks=1"));
    }

    #[cfg(all(feature = "layout", feature = "fallback", feature = "tables"))]
    #[test]
    fn default_adapters_build_from_generated_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::fixtures::write_pdf(
            &dir,
            "case.pdf",
            &[concat!(
                "BT /F1 20 Tf 72 720 Td (Drug-Induced Liver Injury) Tj ET ",
                "BT /F1 11 Tf 72 690 Td (ALT rose to 1200 U/L on day 21.) Tj ET"
            )],
        );

        let bundle = CaseBundleBuilder::with_default_adapters().build(&path).unwrap();
        assert_eq!(bundle.quality.primary_extractor_score, 2);
        assert!(bundle.normalized_text.contains("ALT rose to 1200 U/L"));
        assert_eq!(bundle.quality.fallback_pages, vec![1]);
        assert_eq!(bundle.document_path, path.display().to_string());
    }
}
