//! Block deduplication and canonical ordering.

use std::collections::HashSet;

use rucam_contracts::bundle::EvidenceBlock;

/// Merge block sequences into the canonical bundle order.
///
/// Inputs are scanned in the order given, `primary` before `fallback`. The
/// first block seen for each `(page_number, text)` key is kept, later
/// duplicates are dropped. Survivors are then sorted by `(page_number,
/// element_kind)`, comparing kinds as plain strings. The sort is stable, so
/// blocks sharing both keys keep their first-seen order.
pub fn merge_blocks(primary: &[EvidenceBlock], fallback: &[EvidenceBlock]) -> Vec<EvidenceBlock> {
    let mut seen: HashSet<(u32, &str)> = HashSet::new();
    let mut merged: Vec<EvidenceBlock> = primary
        .iter()
        .chain(fallback)
        .filter(|block| seen.insert(block.dedup_key()))
        .cloned()
        .collect();

    merged.sort_by(|a, b| {
        a.page_number
            .cmp(&b.page_number)
            .then_with(|| a.element_kind.cmp(&b.element_kind))
    });
    merged
}

#[cfg(test)]
mod tests {
    use rucam_contracts::bundle::{element_kind, EvidenceBlock};

    use super::merge_blocks;

    fn block(kind: &str, page: u32, text: &str) -> EvidenceBlock {
        EvidenceBlock::new(kind, page, text)
    }

    #[test]
    fn merged_order_is_page_then_kind() {
        let primary = vec![block(element_kind::NARRATIVE_TEXT, 2, "Details A")];
        let fallback = vec![
            block(element_kind::TITLE, 1, "Case Report"),
            block(element_kind::CAPTION, 3, "Figure 1"),
        ];

        let merged = merge_blocks(&primary, &fallback);
        let order: Vec<(&str, u32)> = merged
            .iter()
            .map(|b| (b.element_kind.as_str(), b.page_number))
            .collect();
        assert_eq!(order, vec![("Title", 1), ("NarrativeText", 2), ("Caption", 3)]);
    }

    /// Kinds sort lexicographically, not by reading order.
    #[test]
    fn same_page_sorts_kind_as_string() {
        let blocks = vec![
            block(element_kind::TITLE, 1, "Case Report"),
            block(element_kind::NARRATIVE_TEXT, 1, "Body"),
            block(element_kind::LIST_ITEM, 1, "• ALT"),
            block(element_kind::CAPTION, 1, "Figure 1"),
        ];
        let kinds: Vec<String> = merge_blocks(&blocks, &[])
            .into_iter()
            .map(|b| b.element_kind)
            .collect();
        assert_eq!(kinds, vec!["Caption", "ListItem", "NarrativeText", "Title"]);
    }

    #[test]
    fn duplicate_keeps_first_occurrence() {
        let primary = vec![block(element_kind::TITLE, 1, "Case Report")];
        let fallback = vec![
            block(element_kind::NARRATIVE_TEXT, 1, "Case Report"),
            block(element_kind::NARRATIVE_TEXT, 2, "Case Report"),
        ];

        let merged = merge_blocks(&primary, &fallback);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].element_kind, "Title");
        assert_eq!(merged[1].page_number, 2);

        // Reversing the argument order flips which copy survives.
        let merged = merge_blocks(&fallback, &primary);
        assert_eq!(merged[0].element_kind, "NarrativeText");
    }

    #[test]
    fn duplicates_within_one_source_collapse() {
        let blocks = vec![
            block(element_kind::NARRATIVE_TEXT, 4, "repeated"),
            block(element_kind::NARRATIVE_TEXT, 4, "repeated"),
        ];
        assert_eq!(merge_blocks(&blocks, &[]).len(), 1);
    }

    #[test]
    fn empty_inputs_merge_to_empty() {
        assert!(merge_blocks(&[], &[]).is_empty());
    }
}
