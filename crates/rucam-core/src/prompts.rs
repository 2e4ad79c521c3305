//! Prompt rendering for analysis and arbitration stages.
//!
//! Analysis prompts carry the bundle and the instruction template. Arbiter
//! prompts carry only analyst reports; the bundle never reaches an arbiter
//! directly.

use crate::template::InstructionTemplate;

pub const PROMPT_BEGIN: &str = "--- BEGIN PRODUCTION PROMPT ---";
pub const PROMPT_END: &str = "--- END PRODUCTION PROMPT ---";

/// Render the prompt for one analysis stage.
///
/// The template text is inserted byte-for-byte between the markers.
pub fn analysis_prompt(label: &str, template: &InstructionTemplate, bundle_json: &str) -> String {
    format!(
        "You are the {label} RUCAM Analyst. Consume the shared case_bundle_json exactly as produced.\n\
         Follow every instruction in the production prompt below without deviation.\n\
         \n\
         {PROMPT_BEGIN}\n\
         {template}\n\
         {PROMPT_END}\n\
         \n\
         Temperature must remain 0.\n\
         \n\
         case_bundle_json:\n\
         {bundle_json}\n",
        template = template.text(),
    )
}

/// Render the prompt for one arbiter stage.
///
/// `analyses` pairs each analyst label with its full report text, in
/// schedule order.
pub fn arbiter_prompt(label: &str, analyses: &[(&str, &str)]) -> String {
    let names = analyses
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(" and ");

    let mut prompt = format!(
        "You are {label}, Senior Hepatology Arbiter.\n\
         Review the {names} reports. Identify disagreements in extracted facts, R-ratio,\n\
         injury pattern, and each RUCAM item. Resolve conflicts strictly according to the case evidence\n\
         cited in the reports.\n\
         Produce a final report in the same SECTION A/B/C format plus SECTION D: Arbiter Justification\n\
         explaining why you selected each final score whenever discrepancies existed.\n"
    );

    for (name, report) in analyses {
        prompt.push_str(&format!("\n=== {name} report ===\n{report}\n=== end of {name} report ===\n"));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_embeds_template_verbatim() {
        let template = InstructionTemplate::from_text("  line one\n\n\tline two  ");
        let prompt = analysis_prompt("GPT-5.2", &template, "{\"pdf_path\": \"case.pdf\"}");

        let expected_block = format!("{PROMPT_BEGIN}\n  line one\n\n\tline two  \n{PROMPT_END}");
        assert!(prompt.contains(&expected_block));
        assert!(prompt.contains("GPT-5.2 RUCAM Analyst"));
        assert!(prompt.contains("\"pdf_path\": \"case.pdf\""));
    }

    #[test]
    fn arbiter_prompt_labels_each_analysis() {
        let prompt = arbiter_prompt(
            "Arbiter Alpha",
            &[("GPT-5.2", "SECTION A gpt"), ("Gemini 3.0", "SECTION A gemini")],
        );

        assert!(prompt.contains("Review the GPT-5.2 and Gemini 3.0 reports"));
        assert!(prompt.contains("=== GPT-5.2 report ===\nSECTION A gpt\n"));
        assert!(prompt.contains("=== Gemini 3.0 report ===\nSECTION A gemini\n"));
        assert!(prompt.contains("SECTION D"));
        assert!(!prompt.contains("case_bundle_json"));
    }
}
