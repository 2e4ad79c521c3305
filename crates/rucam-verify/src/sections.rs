//! Arbiter report structure.
//!
//! A report has four parts, each opened by a `SECTION <letter>` heading:
//! A narrative, B per-item scoring table, C structured result, and D the
//! justification of any disagreement between analysts.

use serde_json::Value;

use crate::extract::payload_from_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    A,
    B,
    C,
    D,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::A, Section::B, Section::C, Section::D];

    pub fn heading(&self) -> &'static str {
        match self {
            Section::A => "SECTION A",
            Section::B => "SECTION B",
            Section::C => "SECTION C",
            Section::D => "SECTION D",
        }
    }
}

/// Which section headings a report contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSections {
    present: [bool; 4],
}

impl ReportSections {
    /// Headings match case-insensitively and must not run into a following
    /// letter or digit (`SECTION DATA` is not section D).
    pub fn scan(report: &str) -> Self {
        let upper = report.to_uppercase();
        let mut present = [false; 4];
        for (slot, section) in present.iter_mut().zip(Section::ALL) {
            let heading = section.heading();
            *slot = upper.match_indices(heading).any(|(at, _)| {
                upper[at + heading.len()..]
                    .chars()
                    .next()
                    .map_or(true, |next| !next.is_alphanumeric())
            });
        }
        Self { present }
    }

    pub fn has(&self, section: Section) -> bool {
        self.present[section as usize]
    }

    pub fn missing(&self) -> Vec<Section> {
        Section::ALL.into_iter().filter(|s| !self.has(*s)).collect()
    }
}

/// True when two or more analyst reports carry a parseable structured result
/// and those results differ in any field. Numbers compare by value, so `3`
/// and `3.0` agree.
pub fn analysts_disagree(analyst_reports: &[&str]) -> bool {
    let parsed: Vec<Value> = analyst_reports
        .iter()
        .filter_map(|report| payload_from_text(report).ok())
        .collect();

    match parsed.split_first() {
        Some((first, rest)) if !rest.is_empty() => rest.iter().any(|other| !values_agree(first, other)),
        _ => false,
    }
}

fn values_agree(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, value)| y.get(key).is_some_and(|other| values_agree(value, other)))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_agree(p, q))
        }
        _ => a == b,
    }
}
