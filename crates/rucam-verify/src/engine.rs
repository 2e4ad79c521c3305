//! Verdict validator.
//!
//! `RucamValidator` checks a candidate verdict in two phases:
//!
//! 1. **Structural**: the payload is validated against a JSON Schema that
//!    fixes which keys must be present and the shape of `rucam_scores`.
//! 2. **Semantic**: per-field type checks, closed enumerations, the R-ratio
//!    lower bound, per-item bounds, and the `total_score` sum invariant.
//!
//! Semantic failures are accumulated so `check` reports the full set in one
//! pass. `validate` returns a single failure: the score inconsistency when
//! the declared total disagrees with the item sum, otherwise the first
//! failure found.

use serde_json::{json, Value};
use tracing::{debug, warn};

use rucam_contracts::verdict::{
    CausalityCategory, InjuryPattern, RucamScores, RucamVerdict, ValidationFailure, RUCAM_ITEMS,
};
use rucam_core::traits::VerdictValidator;

use crate::extract::payload_from_text;
use crate::sections::{analysts_disagree, ReportSections, Section};

/// Structural schema for a verdict payload.
pub fn verdict_schema() -> Value {
    let items: Vec<&str> = RUCAM_ITEMS.iter().map(|item| item.field).collect();
    // Item types and bounds are checked in phase 2; the schema only names them.
    let item_properties: serde_json::Map<String, Value> =
        items.iter().map(|field| (field.to_string(), json!({}))).collect();
    json!({
        "type": "object",
        "required": ["injury_pattern", "R_ratio", "rucam_scores", "total_score", "category"],
        "properties": {
            "rucam_scores": {
                "type": "object",
                "required": items,
                "properties": item_properties,
                "additionalProperties": false
            }
        }
    })
}

/// The trusted verdict checker.
pub struct RucamValidator {
    schema: jsonschema::Validator,
}

impl RucamValidator {
    pub fn new() -> Self {
        let schema = jsonschema::validator_for(&verdict_schema())
            .expect("the built-in verdict schema is a valid JSON Schema document");
        Self { schema }
    }

    /// Every failure in `payload`. Empty means the payload is a valid verdict.
    pub fn check(&self, payload: &Value) -> Vec<ValidationFailure> {
        match self.evaluate(payload) {
            Ok(_) => Vec::new(),
            Err(failures) => failures,
        }
    }

    /// Validate `payload` and return the typed verdict.
    ///
    /// A total mismatch takes precedence over other failures so the declared
    /// and computed totals are always reported.
    pub fn validate(&self, payload: &Value) -> Result<RucamVerdict, ValidationFailure> {
        self.evaluate(payload).map_err(|mut failures| {
            let index = failures
                .iter()
                .position(|f| matches!(f, ValidationFailure::ScoreInconsistency { .. }))
                .unwrap_or(0);
            failures.remove(index)
        })
    }

    /// Extract the structured result from report text, then validate it.
    pub fn validate_text(&self, text: &str) -> Result<RucamVerdict, ValidationFailure> {
        let payload = payload_from_text(text)?;
        self.validate(&payload)
    }

    // ── Internal helpers ──────────────────────────────────────────────────

    /// Err always carries at least one failure.
    fn evaluate(&self, payload: &Value) -> Result<RucamVerdict, Vec<ValidationFailure>> {
        let Some(object) = payload.as_object() else {
            return Err(vec![ValidationFailure::MalformedPayload {
                reason: format!("expected a JSON object, found {}", type_name(payload)),
            }]);
        };

        // ── Phase 1: structure ───────────────────────────────────────────
        let structural: Vec<ValidationFailure> = self
            .schema
            .iter_errors(payload)
            .map(|error| match &error.kind {
                jsonschema::error::ValidationErrorKind::Required { property } => {
                    let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                    let parent = error.instance_path.to_string();
                    let field = if parent.is_empty() {
                        name
                    } else {
                        format!("{}.{}", parent.trim_start_matches('/').replace('/', "."), name)
                    };
                    ValidationFailure::MissingField { field }
                }
                _ => ValidationFailure::SchemaViolation {
                    path: error.instance_path.to_string(),
                    message: error.to_string(),
                },
            })
            .collect();
        if !structural.is_empty() {
            for failure in &structural {
                warn!(%failure, "structural validation failure");
            }
            return Err(structural);
        }

        // ── Phase 2: semantics ───────────────────────────────────────────
        let mut failures = Vec::new();

        let injury_pattern = read_str(object, "injury_pattern", &mut failures).and_then(|value| {
            let parsed = InjuryPattern::parse(value);
            if parsed.is_none() {
                failures.push(ValidationFailure::InvalidEnumeration {
                    field: "injury_pattern".into(),
                    value: value.to_string(),
                    allowed: InjuryPattern::ALL.iter().map(|p| p.as_str().to_string()).collect(),
                });
            }
            parsed
        });

        let r_ratio = match object.get("R_ratio").and_then(Value::as_f64) {
            Some(r) if r >= 0.0 => Some(r),
            Some(r) => {
                failures.push(ValidationFailure::RangeViolation {
                    field: "R_ratio".into(),
                    value: r,
                    min: 0.0,
                    max: f64::INFINITY,
                });
                None
            }
            None => {
                failures.push(wrong_type(object, "R_ratio", "a number"));
                None
            }
        };

        let scores = read_scores(object.get("rucam_scores").unwrap_or(&Value::Null), &mut failures);

        let total_score = match object.get("total_score").and_then(Value::as_i64) {
            Some(total) => Some(total),
            None => {
                failures.push(wrong_type(object, "total_score", "an integer"));
                None
            }
        };

        if let (Some(scores), Some(declared)) = (scores, total_score) {
            let computed = scores.total();
            if declared != computed {
                failures.push(ValidationFailure::ScoreInconsistency { declared, computed });
            }
        }

        let category = read_str(object, "category", &mut failures).and_then(|value| {
            let parsed = CausalityCategory::parse(value);
            if parsed.is_none() {
                failures.push(ValidationFailure::InvalidEnumeration {
                    field: "category".into(),
                    value: value.to_string(),
                    allowed: CausalityCategory::ALL.iter().map(|c| c.as_str().to_string()).collect(),
                });
            }
            parsed
        });

        match (injury_pattern, r_ratio, scores, total_score, category) {
            (Some(injury_pattern), Some(r_ratio), Some(rucam_scores), Some(total_score), Some(category))
                if failures.is_empty() =>
            {
                debug!(total_score, category = %category, "verdict accepted");
                Ok(RucamVerdict {
                    injury_pattern,
                    r_ratio,
                    rucam_scores,
                    total_score,
                    category,
                })
            }
            _ => {
                for failure in &failures {
                    warn!(%failure, "semantic validation failure");
                }
                Err(failures)
            }
        }
    }
}

impl Default for RucamValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictValidator for RucamValidator {
    fn check_arbiter_report(
        &self,
        report: &str,
        analyst_reports: &[&str],
    ) -> Result<RucamVerdict, ValidationFailure> {
        let verdict = self.validate_text(report)?;

        if analysts_disagree(analyst_reports) && !ReportSections::scan(report).has(Section::D) {
            warn!("analysts disagree but the arbiter report has no justification section");
            return Err(ValidationFailure::MissingSection {
                section: Section::D.heading().to_string(),
            });
        }

        Ok(verdict)
    }
}

/// Validate a payload with a fresh [`RucamValidator`].
pub fn validate(payload: &Value) -> Result<RucamVerdict, ValidationFailure> {
    RucamValidator::new().validate(payload)
}

fn read_str<'v>(
    object: &'v serde_json::Map<String, Value>,
    field: &str,
    failures: &mut Vec<ValidationFailure>,
) -> Option<&'v str> {
    let value = object.get(field).and_then(Value::as_str);
    if value.is_none() {
        failures.push(wrong_type(object, field, "a string"));
    }
    value
}

fn read_scores(value: &Value, failures: &mut Vec<ValidationFailure>) -> Option<RucamScores> {
    let mut values = [0i64; 7];
    let mut complete = true;

    for (slot, item) in values.iter_mut().zip(RUCAM_ITEMS.iter()) {
        let field = format!("rucam_scores.{}", item.field);
        let raw = &value[item.field];
        match raw.as_i64() {
            Some(score) if (item.min..=item.max).contains(&score) => *slot = score,
            Some(score) => {
                failures.push(ValidationFailure::RangeViolation {
                    field,
                    value: score as f64,
                    min: item.min as f64,
                    max: item.max as f64,
                });
                // Out-of-range scores still count toward the sum check.
                *slot = score;
            }
            None => {
                failures.push(ValidationFailure::WrongType {
                    field,
                    expected: "an integer".into(),
                    found: type_name(raw).into(),
                });
                complete = false;
            }
        }
    }

    complete.then(|| {
        let [time_to_onset, course, risk_factors, concomitant_drugs, alternative_causes_excluded, known_hepatotoxicity, rechallenge] =
            values;
        RucamScores {
            time_to_onset,
            course,
            risk_factors,
            concomitant_drugs,
            alternative_causes_excluded,
            known_hepatotoxicity,
            rechallenge,
        }
    })
}

fn wrong_type(object: &serde_json::Map<String, Value>, field: &str, expected: &str) -> ValidationFailure {
    ValidationFailure::WrongType {
        field: field.to_string(),
        expected: expected.to_string(),
        found: object.get(field).map(type_name).unwrap_or("nothing").to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "an integer",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use rucam_contracts::verdict::{CausalityCategory, InjuryPattern, ValidationFailure};
    use rucam_core::traits::VerdictValidator;

    use super::RucamValidator;

    fn valid_payload() -> Value {
        json!({
            "injury_pattern": "hepatocellular",
            "R_ratio": 6.4,
            "rucam_scores": {
                "time_to_onset": 2,
                "course": 2,
                "risk_factors": 1,
                "concomitant_drugs": 0,
                "alternative_causes_excluded": 2,
                "known_hepatotoxicity": 2,
                "rechallenge": 1
            },
            "total_score": 10,
            "category": "Highly probable"
        })
    }

    fn report_with(payload: &Value, extra: &str) -> String {
        format!(
            "SECTION A: narrative\n\nSECTION B: scores\n\nSECTION C: structured result\n```json\n{}\n```\n{extra}",
            serde_json::to_string_pretty(payload).unwrap()
        )
    }

    #[test]
    fn valid_payload_produces_typed_verdict() {
        let verdict = RucamValidator::new().validate(&valid_payload()).unwrap();
        assert_eq!(verdict.injury_pattern, InjuryPattern::Hepatocellular);
        assert_eq!(verdict.category, CausalityCategory::HighlyProbable);
        assert_eq!(verdict.total_score, 10);
        assert_eq!(verdict.r_ratio, 6.4);
        assert_eq!(verdict.rucam_scores.total(), 10);
    }

    #[test]
    fn total_mismatch_reports_both_totals() {
        let mut payload = valid_payload();
        payload["total_score"] = json!(12);

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::ScoreInconsistency { declared, computed }) => {
                assert_eq!(declared, 12);
                assert_eq!(computed, 10);
            }
            other => panic!("expected ScoreInconsistency, got {:?}", other),
        }
    }

    #[test]
    fn negative_r_ratio_is_a_range_violation() {
        let mut payload = valid_payload();
        payload["R_ratio"] = json!(-0.1);

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::RangeViolation { field, value, min, .. }) => {
                assert_eq!(field, "R_ratio");
                assert_eq!(value, -0.1);
                assert_eq!(min, 0.0);
            }
            other => panic!("expected RangeViolation, got {:?}", other),
        }
    }

    #[test]
    fn zero_r_ratio_is_accepted() {
        let mut payload = valid_payload();
        payload["R_ratio"] = json!(0);
        assert!(RucamValidator::new().validate(&payload).is_ok());
    }

    #[test]
    fn unknown_category_is_invalid_enumeration() {
        let mut payload = valid_payload();
        payload["category"] = json!("Certain");

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::InvalidEnumeration { field, value, allowed }) => {
                assert_eq!(field, "category");
                assert_eq!(value, "Certain");
                assert_eq!(allowed.len(), 5);
                assert!(allowed.contains(&"Highly probable".to_string()));
            }
            other => panic!("expected InvalidEnumeration, got {:?}", other),
        }
    }

    #[test]
    fn enumerations_are_case_sensitive() {
        let mut payload = valid_payload();
        payload["injury_pattern"] = json!("Hepatocellular");
        let failures = RucamValidator::new().check(&payload);
        assert!(matches!(
            failures.as_slice(),
            [ValidationFailure::InvalidEnumeration { field, .. }] if field == "injury_pattern"
        ));
    }

    #[test]
    fn risk_factors_bounds_are_narrower() {
        let mut payload = valid_payload();
        payload["rucam_scores"]["risk_factors"] = json!(3);
        payload["total_score"] = json!(12);

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::RangeViolation { field, value, min, max }) => {
                assert_eq!(field, "rucam_scores.risk_factors");
                assert_eq!(value, 3.0);
                assert_eq!((min, max), (-2.0, 2.0));
            }
            other => panic!("expected RangeViolation, got {:?}", other),
        }

        payload["rucam_scores"]["risk_factors"] = json!(-2);
        payload["total_score"] = json!(7);
        assert!(RucamValidator::new().validate(&payload).is_ok());
    }

    #[test]
    fn every_schema_item_is_a_known_property() {
        let payload = valid_payload();
        assert!(RucamValidator::new().check(&payload).is_empty());
        let schema = super::verdict_schema();
        let properties = schema["properties"]["rucam_scores"]["properties"].as_object().unwrap();
        assert_eq!(properties.len(), 7);
        assert!(properties.contains_key("alternative_causes_excluded"));
    }

    #[test]
    fn out_of_range_item_with_wrong_total_reports_both_totals() {
        let mut payload = valid_payload();
        payload["rucam_scores"]["course"] = json!(5);
        payload["total_score"] = json!(10);

        let failures = RucamValidator::new().check(&payload);
        assert!(failures.iter().any(|f| matches!(
            f,
            ValidationFailure::RangeViolation { field, .. } if field == "rucam_scores.course"
        )));
        assert!(failures.contains(&ValidationFailure::ScoreInconsistency { declared: 10, computed: 13 }));

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::ScoreInconsistency { declared, computed }) => {
                assert_eq!((declared, computed), (10, 13));
            }
            other => panic!("expected ScoreInconsistency, got {:?}", other),
        }
    }

    #[test]
    fn check_accumulates_every_failure() {
        let mut payload = valid_payload();
        payload["R_ratio"] = json!(-1.0);
        payload["category"] = json!("Maybe");
        payload["total_score"] = json!(3);

        let failures = RucamValidator::new().check(&payload);
        assert_eq!(failures.len(), 3, "failures: {:?}", failures);
    }

    #[test]
    fn missing_field_is_named() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("category");

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::MissingField { field }) => assert_eq!(field, "category"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn missing_item_is_named_with_its_parent() {
        let mut payload = valid_payload();
        payload["rucam_scores"].as_object_mut().unwrap().remove("rechallenge");

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::MissingField { field }) => {
                assert_eq!(field, "rucam_scores.rechallenge")
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn unexpected_item_is_a_schema_violation() {
        let mut payload = valid_payload();
        payload["rucam_scores"]["dechallenge"] = json!(1);
        let failures = RucamValidator::new().check(&payload);
        assert!(matches!(failures[0], ValidationFailure::SchemaViolation { .. }));
    }

    #[test]
    fn fractional_score_is_wrong_type() {
        let mut payload = valid_payload();
        payload["rucam_scores"]["course"] = json!(1.5);

        match RucamValidator::new().validate(&payload) {
            Err(ValidationFailure::WrongType { field, expected, found }) => {
                assert_eq!(field, "rucam_scores.course");
                assert_eq!(expected, "an integer");
                assert_eq!(found, "a number");
            }
            other => panic!("expected WrongType, got {:?}", other),
        }
    }

    #[test]
    fn non_object_is_malformed() {
        let result = RucamValidator::new().validate(&json!([1, 2, 3]));
        assert!(matches!(result, Err(ValidationFailure::MalformedPayload { .. })));
    }

    #[test]
    fn arbiter_report_validates_embedded_result() {
        let report = report_with(&valid_payload(), "");
        let verdict = RucamValidator::new().check_arbiter_report(&report, &[]).unwrap();
        assert_eq!(verdict.total_score, 10);
    }

    #[test]
    fn disagreement_requires_justification_section() {
        let validator = RucamValidator::new();
        let first = report_with(&valid_payload(), "");
        let mut other = valid_payload();
        other["category"] = json!("Probable");
        other["rucam_scores"]["rechallenge"] = json!(-1);
        other["total_score"] = json!(8);
        let second = report_with(&other, "");

        let arbiter = report_with(&valid_payload(), "");
        match validator.check_arbiter_report(&arbiter, &[&first, &second]) {
            Err(ValidationFailure::MissingSection { section }) => assert_eq!(section, "SECTION D"),
            other => panic!("expected MissingSection, got {:?}", other),
        }

        let justified = report_with(&valid_payload(), "SECTION D: the rechallenge evidence was misread.");
        assert!(validator.check_arbiter_report(&justified, &[&first, &second]).is_ok());
    }

    #[test]
    fn agreeing_analysts_need_no_justification() {
        let analyst = report_with(&valid_payload(), "");
        let arbiter = report_with(&valid_payload(), "");
        let result = RucamValidator::new().check_arbiter_report(&arbiter, &[&analyst, &analyst]);
        assert!(result.is_ok());
    }

    #[test]
    fn arbiter_report_without_result_is_malformed() {
        let result = RucamValidator::new().check_arbiter_report("SECTION A only prose", &[]);
        assert!(matches!(result, Err(ValidationFailure::MalformedPayload { .. })));
    }
}
