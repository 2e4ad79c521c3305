//! Final structured verdict types and the validation failure taxonomy.
//!
//! A `RucamVerdict` is only ever produced by an arbiter stage and only ever
//! accepted after the validator has checked it. The types here are the
//! typed end state; the untyped JSON that precedes them is handled by the
//! verify crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Liver injury pattern derived from the R-ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjuryPattern {
    Hepatocellular,
    Mixed,
    Cholestatic,
}

impl InjuryPattern {
    pub const ALL: [InjuryPattern; 3] = [Self::Hepatocellular, Self::Mixed, Self::Cholestatic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hepatocellular => "hepatocellular",
            Self::Mixed => "mixed",
            Self::Cholestatic => "cholestatic",
        }
    }

    /// Exact, case-sensitive match against the wire value.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl fmt::Display for InjuryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RUCAM causality category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CausalityCategory {
    Excluded,
    Unlikely,
    Possible,
    Probable,
    #[serde(rename = "Highly probable")]
    HighlyProbable,
}

impl CausalityCategory {
    pub const ALL: [CausalityCategory; 5] = [
        Self::Excluded,
        Self::Unlikely,
        Self::Possible,
        Self::Probable,
        Self::HighlyProbable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excluded => "Excluded",
            Self::Unlikely => "Unlikely",
            Self::Possible => "Possible",
            Self::Probable => "Probable",
            Self::HighlyProbable => "Highly probable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl fmt::Display for CausalityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive bounds for one RUCAM item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemBounds {
    pub field: &'static str,
    pub min: i64,
    pub max: i64,
}

/// The seven RUCAM items in wire order, with their documented ranges.
pub const RUCAM_ITEMS: [ItemBounds; 7] = [
    ItemBounds { field: "time_to_onset", min: -3, max: 3 },
    ItemBounds { field: "course", min: -3, max: 3 },
    ItemBounds { field: "risk_factors", min: -2, max: 2 },
    ItemBounds { field: "concomitant_drugs", min: -3, max: 3 },
    ItemBounds { field: "alternative_causes_excluded", min: -3, max: 3 },
    ItemBounds { field: "known_hepatotoxicity", min: -3, max: 3 },
    ItemBounds { field: "rechallenge", min: -3, max: 3 },
];

/// Per-item RUCAM scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RucamScores {
    pub time_to_onset: i64,
    pub course: i64,
    pub risk_factors: i64,
    pub concomitant_drugs: i64,
    pub alternative_causes_excluded: i64,
    pub known_hepatotoxicity: i64,
    pub rechallenge: i64,
}

impl RucamScores {
    /// Values in `RUCAM_ITEMS` order.
    pub fn values(&self) -> [i64; 7] {
        [
            self.time_to_onset,
            self.course,
            self.risk_factors,
            self.concomitant_drugs,
            self.alternative_causes_excluded,
            self.known_hepatotoxicity,
            self.rechallenge,
        ]
    }

    pub fn total(&self) -> i64 {
        self.values().iter().sum()
    }
}

/// The final, validated RUCAM decision.
///
/// Invariant: `total_score == rucam_scores.total()`. Instances are only
/// built by the validator, which rejects any payload breaking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RucamVerdict {
    pub injury_pattern: InjuryPattern,
    #[serde(rename = "R_ratio")]
    pub r_ratio: f64,
    pub rucam_scores: RucamScores,
    pub total_score: i64,
    pub category: CausalityCategory,
}

/// Why a candidate verdict was rejected.
///
/// Every variant names the offending field and the expected vs. actual
/// values so a failure can be diagnosed without re-running the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    /// The payload could not be parsed as a JSON object at all.
    #[error("malformed verdict payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("required field '{field}' is missing")]
    MissingField { field: String },

    #[error("field '{field}' must be {expected}, found {found}")]
    WrongType {
        field: String,
        expected: String,
        found: String,
    },

    /// A structural JSON Schema check failed.
    #[error("schema violation at '{path}': {message}")]
    SchemaViolation { path: String, message: String },

    #[error("invalid enumeration value {value:?} for '{field}'; allowed: {}", allowed.join(", "))]
    InvalidEnumeration {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("range violation: '{field}' = {value} is outside [{min}, {max}]")]
    RangeViolation {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("score inconsistency: declared total_score {declared} but items sum to {computed}")]
    ScoreInconsistency { declared: i64, computed: i64 },

    /// An arbiter report is missing a section the contract requires.
    #[error("report is missing required section {section}")]
    MissingSection { section: String },
}
