//! Pipeline configuration.
//!
//! `PipelineConfig` is built once at startup and passed by reference into
//! every component. Layers are applied in order:
//!
//! 1. Built-in defaults (`PipelineConfig::default()`)
//! 2. An environment snapshot via `from_lookup` (the binary supplies the closure)
//! 3. An optional TOML file via `merge_toml_str` / `merge_file`
//! 4. CLI flags, applied by the binary directly on the struct
//!
//! No component reads the environment itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use rucam_contracts::error::{RucamError, RucamResult};

use crate::routing::{RouteRule, RoutingTable};

// ── Environment keys ─────────────────────────────────────────────────────────

pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_ARBITER_MODEL: &str = "ARBITER_MODEL";
pub const ENV_ARBITER_ALPHA_MODEL: &str = "ARBITER_ALPHA_MODEL";
pub const ENV_ARBITER_BETA_MODEL: &str = "ARBITER_BETA_MODEL";
pub const ENV_ARBITER_GAMMA_MODEL: &str = "ARBITER_GAMMA_MODEL";

const DEFAULT_GPT_MODEL: &str = "gpt-5.2";
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_ALPHA_MODEL: &str = "deepseek-reasoner";

// ── Stage configuration ──────────────────────────────────────────────────────

/// One analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Stage identity, e.g. `gpt_52`.
    pub key: String,
    /// Human-readable label used in prompts, e.g. "GPT-5.2".
    pub label: String,
    pub model: String,
    /// File name used when reports are persisted.
    pub report_file: String,
}

/// One arbiter in the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Lower-case ensemble name, e.g. `alpha`.
    pub name: String,
    pub model: String,
    pub enabled: bool,
}

impl ArbiterConfig {
    /// "Arbiter Alpha".
    pub fn label(&self) -> String {
        let mut chars = self.name.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        format!("Arbiter {capitalized}")
    }

    /// `arbiter_alpha`: the label in snake case.
    pub fn stage_key(&self) -> String {
        self.label().to_lowercase().replace(' ', "_")
    }

    /// `arbiter-alpha_report.md`.
    pub fn report_file(&self) -> String {
        format!("arbiter-{}_report.md", self.name.to_lowercase().replace(' ', "_"))
    }
}

// ── PipelineConfig ───────────────────────────────────────────────────────────

/// Everything the pipeline needs to know before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Analysis stages in declaration order.
    pub analysts: Vec<AnalystConfig>,
    /// The arbiter ensemble; only `enabled` entries run.
    pub arbiters: Vec<ArbiterConfig>,
    /// Sampling temperature for every invocation.
    pub temperature: f64,
    /// Run the stages of one tier on worker threads.
    pub parallel_stages: bool,
    /// Validate every arbiter's structured verdict before completing its stage.
    pub validate_verdicts: bool,
    /// Instruction template override. `None` uses the embedded template.
    pub prompt_path: Option<PathBuf>,
    /// Where to persist per-stage reports. `None` disables persistence.
    pub output_dir: Option<PathBuf>,
    /// Routing overrides consulted before the built-in rules.
    pub routes: Vec<RouteRule>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysts: vec![
                AnalystConfig {
                    key: "gpt_52".to_string(),
                    label: "GPT-5.2".to_string(),
                    model: DEFAULT_GPT_MODEL.to_string(),
                    report_file: "gpt-5.2_report.md".to_string(),
                },
                AnalystConfig {
                    key: "gemini_30".to_string(),
                    label: "Gemini 3.0".to_string(),
                    model: DEFAULT_GEMINI_MODEL.to_string(),
                    report_file: "gemini-3.0_report.md".to_string(),
                },
            ],
            arbiters: vec![
                ArbiterConfig {
                    name: "alpha".to_string(),
                    model: DEFAULT_ALPHA_MODEL.to_string(),
                    enabled: true,
                },
                ArbiterConfig {
                    name: "beta".to_string(),
                    model: DEFAULT_GPT_MODEL.to_string(),
                    enabled: false,
                },
                ArbiterConfig {
                    name: "gamma".to_string(),
                    model: DEFAULT_GPT_MODEL.to_string(),
                    enabled: false,
                },
            ],
            temperature: 0.0,
            parallel_stages: false,
            validate_verdicts: true,
            prompt_path: None,
            output_dir: None,
            routes: Vec::new(),
        }
    }
}

/// The optional TOML layer. Every field is optional; absent fields keep the
/// value from the layers below.
///
/// ```toml
/// parallel_stages = true
///
/// [[arbiters]]
/// name = "beta"
/// model = "claude-sonnet-4"
/// enabled = true
///
/// [[routes]]
/// pattern = "llama"
/// base_url = "http://localhost:11434/v1"
/// provider = "ollama"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    temperature: Option<f64>,
    parallel_stages: Option<bool>,
    validate_verdicts: Option<bool>,
    prompt_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    /// Replaces the analyst list entirely when present.
    analysts: Option<Vec<AnalystConfig>>,
    #[serde(default)]
    arbiters: Vec<ArbiterOverride>,
    #[serde(default)]
    routes: Vec<RouteRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArbiterOverride {
    name: String,
    model: Option<String>,
    enabled: Option<bool>,
}

impl PipelineConfig {
    /// Defaults overlaid with an environment snapshot.
    ///
    /// Empty values count as unset. Each arbiter's model falls back through
    /// its own variable, then `ARBITER_MODEL`, then `OPENAI_MODEL`, then its
    /// built-in default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        for analyst in &mut config.analysts {
            let env_key = match analyst.key.as_str() {
                "gpt_52" => ENV_OPENAI_MODEL,
                "gemini_30" => ENV_GEMINI_MODEL,
                _ => continue,
            };
            if let Some(model) = get(env_key) {
                analyst.model = model;
            }
        }

        for arbiter in &mut config.arbiters {
            let own_key = match arbiter.name.as_str() {
                "alpha" => ENV_ARBITER_ALPHA_MODEL,
                "beta" => ENV_ARBITER_BETA_MODEL,
                "gamma" => ENV_ARBITER_GAMMA_MODEL,
                _ => continue,
            };
            if let Some(model) = get(own_key)
                .or_else(|| get(ENV_ARBITER_MODEL))
                .or_else(|| get(ENV_OPENAI_MODEL))
            {
                arbiter.model = model;
            }
        }

        config
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml_str(s: &str) -> RucamResult<Self> {
        Self::default().merge_toml_str(s)
    }

    /// Defaults overlaid with the TOML file at `path`.
    pub fn from_file(path: &Path) -> RucamResult<Self> {
        Self::default().merge_file(path)
    }

    /// Overlay a TOML document on top of `self`.
    ///
    /// Returns `RucamError::ConfigError` if the TOML is malformed, carries
    /// unknown keys, or produces an invalid configuration.
    pub fn merge_toml_str(mut self, s: &str) -> RucamResult<Self> {
        let file: ConfigFile = toml::from_str(s).map_err(|e| RucamError::ConfigError {
            reason: format!("failed to parse pipeline TOML: {}", e),
        })?;

        if let Some(t) = file.temperature {
            self.temperature = t;
        }
        if let Some(p) = file.parallel_stages {
            self.parallel_stages = p;
        }
        if let Some(v) = file.validate_verdicts {
            self.validate_verdicts = v;
        }
        if file.prompt_path.is_some() {
            self.prompt_path = file.prompt_path;
        }
        if file.output_dir.is_some() {
            self.output_dir = file.output_dir;
        }
        if let Some(analysts) = file.analysts {
            self.analysts = analysts;
        }

        for ov in file.arbiters {
            let name = ov.name.to_lowercase();
            match self.arbiters.iter_mut().find(|a| a.name == name) {
                Some(existing) => {
                    if let Some(model) = ov.model {
                        existing.model = model;
                    }
                    if let Some(enabled) = ov.enabled {
                        existing.enabled = enabled;
                    }
                }
                None => {
                    let model = ov.model.ok_or_else(|| RucamError::ConfigError {
                        reason: format!("new arbiter '{}' must declare a model", name),
                    })?;
                    self.arbiters.push(ArbiterConfig {
                        name,
                        model,
                        enabled: ov.enabled.unwrap_or(true),
                    });
                }
            }
        }

        self.routes.extend(file.routes);

        debug!(
            analysts = self.analysts.len(),
            arbiters = self.enabled_arbiters().count(),
            routes = self.routes.len(),
            "pipeline TOML merged"
        );

        self.validate()?;
        Ok(self)
    }

    /// Read the file at `path` and overlay it.
    pub fn merge_file(self, path: &Path) -> RucamResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RucamError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        self.merge_toml_str(&contents)
    }

    /// Enable or disable a named arbiter. Unknown names are a `ConfigError`.
    pub fn set_arbiter_enabled(&mut self, name: &str, enabled: bool) -> RucamResult<()> {
        match self.arbiters.iter_mut().find(|a| a.name == name) {
            Some(arbiter) => {
                arbiter.enabled = enabled;
                Ok(())
            }
            None => Err(RucamError::ConfigError {
                reason: format!("unknown arbiter '{}'", name),
            }),
        }
    }

    pub fn enabled_arbiters(&self) -> impl Iterator<Item = &ArbiterConfig> {
        self.arbiters.iter().filter(|a| a.enabled)
    }

    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::new(self.routes.clone())
    }

    /// Check the invariants the orchestrator relies on.
    ///
    /// - at least one analyst
    /// - every stage key non-empty and unique across analysts and enabled arbiters
    /// - temperature finite and non-negative
    pub fn validate(&self) -> RucamResult<()> {
        if self.analysts.is_empty() {
            return Err(RucamError::ConfigError {
                reason: "at least one analyst must be configured".to_string(),
            });
        }

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(RucamError::ConfigError {
                reason: format!("temperature must be a non-negative number, got {}", self.temperature),
            });
        }

        let mut seen = HashSet::new();
        seen.insert("case_bundle".to_string());
        let keys = self
            .analysts
            .iter()
            .map(|a| a.key.clone())
            .chain(self.enabled_arbiters().map(|a| a.stage_key()));
        for key in keys {
            if key.trim().is_empty() {
                return Err(RucamError::ConfigError {
                    reason: "stage keys must not be empty".to_string(),
                });
            }
            if !seen.insert(key.clone()) {
                return Err(RucamError::ConfigError {
                    reason: format!("duplicate stage key '{}'", key),
                });
            }
        }

        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment() {
        let config = PipelineConfig::default();
        assert_eq!(config.analysts[0].key, "gpt_52");
        assert_eq!(config.analysts[1].model, "gemini-3-pro-preview");
        assert_eq!(config.temperature, 0.0);
        assert!(!config.parallel_stages);
        assert!(config.validate_verdicts);

        let enabled: Vec<String> = config.enabled_arbiters().map(|a| a.stage_key()).collect();
        assert_eq!(enabled, vec!["arbiter_alpha".to_string()]);
        assert_eq!(config.arbiters[0].model, "deepseek-reasoner");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn arbiter_naming() {
        let arbiter = ArbiterConfig {
            name: "gamma".to_string(),
            model: "gpt-5.2".to_string(),
            enabled: true,
        };
        assert_eq!(arbiter.label(), "Arbiter Gamma");
        assert_eq!(arbiter.stage_key(), "arbiter_gamma");
        assert_eq!(arbiter.report_file(), "arbiter-gamma_report.md");
    }

    #[test]
    fn arbiter_model_fallback_chain() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("ARBITER_BETA_MODEL", "claude-sonnet-4"),
            ("ARBITER_MODEL", "gpt-5.1"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]));

        assert_eq!(config.arbiters[0].model, "gpt-5.1");
        assert_eq!(config.arbiters[1].model, "claude-sonnet-4");
        assert_eq!(config.arbiters[2].model, "gpt-5.1");
        assert_eq!(config.analysts[0].model, "gpt-4o");
    }

    #[test]
    fn openai_model_is_last_env_fallback_and_empty_values_are_unset() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("ARBITER_ALPHA_MODEL", ""),
            ("ARBITER_MODEL", "  "),
            ("OPENAI_MODEL", "gpt-4o"),
        ]));
        assert_eq!(config.arbiters[0].model, "gpt-4o");
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let config = PipelineConfig::from_lookup(|_| None);
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn toml_overrides_env_layer() {
        let base = PipelineConfig::from_lookup(lookup_from(&[("ARBITER_MODEL", "gpt-5.1")]));
        let config = base
            .merge_toml_str(
                r#"
                parallel_stages = true
                output_dir = "reports"

                [[arbiters]]
                name = "beta"
                model = "claude-sonnet-4"
                enabled = true

                [[routes]]
                pattern = "llama"
                base_url = "http://localhost:11434/v1"
                provider = "ollama"
                "#,
            )
            .unwrap();

        assert!(config.parallel_stages);
        assert_eq!(config.output_dir, Some(PathBuf::from("reports")));
        assert_eq!(config.arbiters[0].model, "gpt-5.1");
        assert_eq!(config.arbiters[1].model, "claude-sonnet-4");
        assert!(config.arbiters[1].enabled);
        assert_eq!(
            config.routing_table().resolve("llama3").provider.as_deref(),
            Some("ollama")
        );
    }

    #[test]
    fn toml_can_add_a_new_arbiter() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [[arbiters]]
            name = "delta"
            model = "kimi-k2-thinking"
            "#,
        )
        .unwrap();

        let delta = config.arbiters.iter().find(|a| a.name == "delta").unwrap();
        assert!(delta.enabled);
        assert_eq!(delta.stage_key(), "arbiter_delta");
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let result = PipelineConfig::from_toml_str("parallel_stages = [");
        assert!(matches!(result, Err(RucamError::ConfigError { .. })));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = PipelineConfig::from_toml_str("paralel_stages = true");
        assert!(matches!(result, Err(RucamError::ConfigError { .. })));
    }

    #[test]
    fn empty_analyst_list_is_rejected() {
        let result = PipelineConfig::from_toml_str("analysts = []");
        match result {
            Err(RucamError::ConfigError { reason }) => assert!(reason.contains("analyst")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_stage_keys_are_rejected() {
        let result = PipelineConfig::from_toml_str(
            r#"
            [[analysts]]
            key = "arbiter_alpha"
            label = "Shadow"
            model = "gpt-5.2"
            report_file = "shadow.md"
            "#,
        );
        match result {
            Err(RucamError::ConfigError { reason }) => assert!(reason.contains("arbiter_alpha")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn set_arbiter_enabled_rejects_unknown_names() {
        let mut config = PipelineConfig::default();
        config.set_arbiter_enabled("gamma", true).unwrap();
        assert_eq!(config.enabled_arbiters().count(), 2);
        assert!(config.set_arbiter_enabled("omega", true).is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "validate_verdicts = false").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert!(!config.validate_verdicts);

        let missing = PipelineConfig::from_file(Path::new("/nonexistent/rucam.toml"));
        assert!(matches!(missing, Err(RucamError::ConfigError { .. })));
    }
}
