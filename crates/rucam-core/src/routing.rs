//! Model identifier → endpoint routing.
//!
//! `resolve_endpoint` is a pure function over a static rule set. A
//! `RoutingTable` layers configured `[[routes]]` overrides on top of it;
//! overrides are consulted in declaration order and the first match wins.

use serde::{Deserialize, Serialize};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model names served through OpenRouter, compared against the `:` parts of the final segment.
const OPENROUTER_MODELS: [&str; 3] = ["kimi-k2-thinking", "glm-4.7", "qwen-max"];

/// Where to send a model invocation.
///
/// Both fields `None` means "use the default provider".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub base_url: Option<String>,
    pub provider: Option<String>,
}

impl Endpoint {
    fn named(base_url: &str, provider: &str) -> Self {
        Self {
            base_url: Some(base_url.to_string()),
            provider: Some(provider.to_string()),
        }
    }

    pub fn is_default(&self) -> bool {
        self.base_url.is_none() && self.provider.is_none()
    }

    pub fn is_anthropic(&self) -> bool {
        self.provider.as_deref() == Some("anthropic")
    }
}

/// The final path segment: everything after the last `/`.
///
/// A `:` inside it separates a provider prefix or a version tag from the
/// model name (`bedrock:claude-haiku`, `claude-sonnet:20250101`), so callers
/// match against the segment as a whole or against its `:` parts.
fn name_segment(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}

/// Resolve a model identifier against the built-in rules.
///
/// Matching is case-insensitive and independent of which stage asks.
pub fn resolve_endpoint(model: &str) -> Endpoint {
    let normalized = model.trim().to_lowercase();
    let name = name_segment(&normalized);

    if normalized.contains("anthropic") || name.contains("claude") {
        return Endpoint::named(ANTHROPIC_BASE_URL, "anthropic");
    }
    if normalized.contains("deepseek") {
        return Endpoint::named(DEEPSEEK_BASE_URL, "deepseek");
    }
    if name.split(':').any(|part| OPENROUTER_MODELS.contains(&part)) {
        return Endpoint::named(OPENROUTER_BASE_URL, "openrouter");
    }
    Endpoint::default()
}

/// One configured routing override, loaded from `[[routes]]`.
///
/// ```toml
/// [[routes]]
/// pattern = "llama"
/// base_url = "http://localhost:11434/v1"
/// provider = "ollama"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Case-insensitive substring of the model identifier. `"*"` matches anything.
    pub pattern: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl RouteRule {
    pub fn matches(&self, model: &str) -> bool {
        self.pattern == "*" || model.to_lowercase().contains(&self.pattern.to_lowercase())
    }
}

/// Overrides first, built-in rules second.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    overrides: Vec<RouteRule>,
}

impl RoutingTable {
    pub fn new(overrides: Vec<RouteRule>) -> Self {
        Self { overrides }
    }

    pub fn resolve(&self, model: &str) -> Endpoint {
        match self.overrides.iter().find(|rule| rule.matches(model)) {
            Some(rule) => Endpoint {
                base_url: rule.base_url.clone(),
                provider: rule.provider.clone(),
            },
            None => resolve_endpoint(model),
        }
    }
}
