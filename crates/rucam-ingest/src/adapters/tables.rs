//! Heuristic table adapter.
//!
//! Works over the visual lines of each page. A line is tabular when it has
//! two or more tabs, two or more pipes, or two or more runs of three or more
//! spaces. Two or more consecutive tabular lines form one table.

use std::path::Path;

use rucam_contracts::{bundle::EvidenceTable, error::RucamResult, extract::Extraction};
use rucam_core::traits::TableExtractor;

pub const TABLE_ADAPTER: &str = "tables";

/// Minimum consecutive tabular lines that make a table.
pub const MIN_TABLE_ROWS: usize = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicTableExtractor;

impl TableExtractor for HeuristicTableExtractor {
    fn name(&self) -> &str {
        TABLE_ADAPTER
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "tables")
    }

    #[cfg(feature = "tables")]
    fn extract(&self, document: &Path) -> RucamResult<Extraction<EvidenceTable>> {
        imp::extract(document)
    }

    #[cfg(not(feature = "tables"))]
    fn extract(&self, _document: &Path) -> RucamResult<Extraction<EvidenceTable>> {
        Ok(Extraction::degraded(
            "table extraction skipped: built without the `tables` feature",
        ))
    }
}

/// The cell separator a tabular line uses, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Tab,
    Pipe,
    Spaces,
}

fn separator(line: &str) -> Option<Separator> {
    let trimmed = line.trim();
    if trimmed.len() < 5 {
        return None;
    }
    if trimmed.matches('\t').count() >= 2 {
        return Some(Separator::Tab);
    }
    if trimmed.matches('|').count() >= 2 {
        return Some(Separator::Pipe);
    }
    if count_multi_space_gaps(trimmed) >= 2 {
        return Some(Separator::Spaces);
    }
    None
}

/// Count runs of 3+ consecutive spaces.
fn count_multi_space_gaps(text: &str) -> usize {
    let mut count = 0;
    let mut gap_len = 0;

    for ch in text.chars() {
        if ch == ' ' {
            gap_len += 1;
            if gap_len == 3 {
                count += 1;
            }
        } else {
            gap_len = 0;
        }
    }

    count
}

fn split_cells(line: &str, sep: Separator) -> Vec<String> {
    let cells: Vec<&str> = match sep {
        Separator::Tab => line.split('\t').collect(),
        Separator::Pipe => line.split('|').collect(),
        Separator::Spaces => {
            let mut cells = Vec::new();
            let mut start = 0;
            let mut run_start = None;
            for (i, ch) in line.char_indices() {
                match (ch == ' ', run_start) {
                    (true, None) => run_start = Some(i),
                    (false, Some(rs)) => {
                        if i - rs >= 3 {
                            cells.push(&line[start..rs]);
                            start = i;
                        }
                        run_start = None;
                    }
                    _ => {}
                }
            }
            cells.push(&line[start..]);
            cells
        }
    };
    cells.into_iter().map(str::to_string).collect()
}

/// Find tables in one page's lines. Indices continue from `next_index`.
fn detect_tables(page_number: u32, lines: &[&str], next_index: &mut u32) -> Vec<EvidenceTable> {
    let mut tables = Vec::new();
    let mut run: Vec<Vec<String>> = Vec::new();

    for line in lines {
        match separator(line) {
            Some(sep) => run.push(split_cells(line, sep)),
            None => close_run(page_number, &mut run, &mut tables, next_index),
        }
    }
    close_run(page_number, &mut run, &mut tables, next_index);
    tables
}

fn close_run(
    page_number: u32,
    run: &mut Vec<Vec<String>>,
    tables: &mut Vec<EvidenceTable>,
    next_index: &mut u32,
) {
    let rows = std::mem::take(run);
    if rows.len() < MIN_TABLE_ROWS {
        return;
    }
    if let Some(table) = EvidenceTable::from_cells(page_number, *next_index, rows) {
        *next_index += 1;
        tables.push(table);
    }
}

#[cfg(feature = "tables")]
mod imp {
    use std::path::Path;

    use lopdf::Document;
    use tracing::{debug, warn};

    use rucam_contracts::{
        bundle::EvidenceTable,
        error::{RucamError, RucamResult},
        extract::Extraction,
    };

    use super::{detect_tables, TABLE_ADAPTER};
    use crate::adapters::content::page_lines;

    pub(super) fn extract(document: &Path) -> RucamResult<Extraction<EvidenceTable>> {
        let doc = Document::load(document).map_err(|e| RucamError::ExtractionFailed {
            adapter: TABLE_ADAPTER.to_string(),
            reason: e.to_string(),
        })?;

        let mut notes = Vec::new();
        let mut tables = Vec::new();
        let mut next_index = 1;

        for (page_number, page_id) in doc.get_pages() {
            match page_lines(&doc, page_id) {
                Ok(lines) => {
                    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
                    tables.extend(detect_tables(page_number, &texts, &mut next_index));
                }
                Err(e) => {
                    warn!(adapter = TABLE_ADAPTER, page = page_number, error = %e, "page skipped");
                    notes.push(format!("tables page {page_number} failed: {e}"));
                }
            }
        }

        notes.push(format!("tables extracted={}", tables.len()));
        debug!(adapter = TABLE_ADAPTER, tables = tables.len(), "table extraction finished");
        Ok(Extraction::new(tables, notes))
    }
}
