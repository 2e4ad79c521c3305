//! Locating the structured result inside free-form report text.
//!
//! A text that is itself one JSON object is taken as is. Otherwise the last
//! fenced ```json block wins, then the last balanced `{...}` object; in
//! both cases only objects carrying a `rucam_scores` key are candidates.

use serde_json::Value;

use rucam_contracts::verdict::ValidationFailure;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Find the structured verdict payload in `text`.
pub fn payload_from_text(text: &str) -> Result<Value, ValidationFailure> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        if value.is_object() {
            return Ok(value);
        }
    }

    last_candidate(fenced_blocks(text))
        .or_else(|| last_candidate(balanced_objects(text)))
        .ok_or_else(|| ValidationFailure::MalformedPayload {
            reason: "no JSON object containing rucam_scores found in report".into(),
        })
}

fn last_candidate<'t>(chunks: impl DoubleEndedIterator<Item = &'t str>) -> Option<Value> {
    chunks
        .rev()
        .filter_map(|chunk| serde_json::from_str::<Value>(chunk.trim()).ok())
        .find(|value| value.get("rucam_scores").is_some())
}

/// Bodies of every ```json fenced block, in order.
fn fenced_blocks(text: &str) -> std::vec::IntoIter<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(FENCE_OPEN) {
        let body = &rest[open + FENCE_OPEN.len()..];
        match body.find(FENCE_CLOSE) {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + FENCE_CLOSE.len()..];
            }
            None => break,
        }
    }
    blocks.into_iter()
}

/// Every balanced `{...}` span, ordered by where it opens. Braces inside
/// JSON strings are ignored.
///
/// Each `{` is tried as a start of its own, so an unmatched brace in the
/// surrounding prose does not hide an object that follows it.
fn balanced_objects(text: &str) -> std::vec::IntoIter<&str> {
    let spans: Vec<&str> = text
        .char_indices()
        .filter(|&(_, ch)| ch == '{')
        .filter_map(|(start, _)| matching_close(text, start).map(|end| &text[start..=end]))
        .collect();
    spans.into_iter()
}

/// Byte index of the `}` closing the `{` at `start`, if there is one.
fn matching_close(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}
