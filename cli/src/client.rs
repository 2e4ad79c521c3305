//! Blocking HTTP implementation of `ModelClient`.
//!
//! Anthropic endpoints get a Messages API request. Every other endpoint gets
//! an OpenAI-compatible chat-completions request. The endpoint comes from
//! the configured `RoutingTable`; API keys come from a `Credentials`
//! snapshot taken once at startup.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rucam_contracts::error::{RucamError, RucamResult};
use rucam_core::{routing::RoutingTable, traits::ModelClient};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_TIMEOUT_SECS: u64 = 600;

// ── Credentials ──────────────────────────────────────────────────────────────

/// API keys by provider name, read once.
///
/// A provider's key lives in `<PROVIDER>_API_KEY` (`OPENAI_API_KEY`,
/// `ANTHROPIC_API_KEY`, ...). The default provider is `openai`, except for
/// `gemini*` models, which use `gemini`.
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
    openai_base_url: Option<String>,
}

impl Credentials {
    pub const BUILT_IN_PROVIDERS: [&'static str; 5] =
        ["openai", "anthropic", "deepseek", "openrouter", "gemini"];

    /// Snapshot the keys for the built-in providers plus `extra_providers`.
    /// `OPENAI_BASE_URL` overrides the default endpoint.
    pub fn from_lookup<F>(lookup: F, extra_providers: &[String]) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut keys = HashMap::new();
        let providers = Self::BUILT_IN_PROVIDERS
            .iter()
            .map(|p| p.to_string())
            .chain(extra_providers.iter().map(|p| p.to_lowercase()));
        for provider in providers {
            if let Some(key) = get(&env_key(&provider)) {
                keys.insert(provider, key);
            }
        }
        Self {
            keys,
            openai_base_url: get("OPENAI_BASE_URL"),
        }
    }

    pub fn with_key(mut self, provider: &str, key: impl Into<String>) -> Self {
        self.keys.insert(provider.to_lowercase(), key.into());
        self
    }

    pub fn key(&self, provider: &str) -> Option<&str> {
        self.keys.get(&provider.to_lowercase()).map(String::as_str)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<&String> = self.keys.keys().collect();
        providers.sort();
        f.debug_struct("Credentials")
            .field("providers", &providers)
            .field("openai_base_url", &self.openai_base_url)
            .finish()
    }
}

fn env_key(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"))
}

// ── Resolved target ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Protocol {
    Anthropic,
    ChatCompletions,
}

/// Everything needed to send one request.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    protocol: Protocol,
    url: String,
    provider: String,
    /// The identifier sent on the wire, without a `<provider>/` prefix.
    model: String,
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────────

/// The production `ModelClient`.
pub struct HttpModelClient {
    http: reqwest::blocking::Client,
    routes: RoutingTable,
    credentials: Credentials,
    max_tokens: u32,
}

impl HttpModelClient {
    pub fn new(routes: RoutingTable, credentials: Credentials) -> RucamResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RucamError::ConfigError {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            routes,
            credentials,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn target(&self, model: &str) -> Target {
        let endpoint = self.routes.resolve(model);
        let provider = match &endpoint.provider {
            Some(provider) => provider.to_lowercase(),
            None if is_gemini(model) => "gemini".to_string(),
            None => "openai".to_string(),
        };
        let base = match (&endpoint.base_url, provider.as_str()) {
            (Some(url), _) => url.clone(),
            (None, "gemini") => GEMINI_BASE_URL.to_string(),
            (None, _) => self
                .credentials
                .openai_base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        };
        let base = base.trim_end_matches('/');
        let wire_model = model
            .strip_prefix(&format!("{provider}/"))
            .unwrap_or(model)
            .to_string();

        if endpoint.is_anthropic() {
            let url = if base.ends_with("/v1") {
                format!("{base}/messages")
            } else {
                format!("{base}/v1/messages")
            };
            Target { protocol: Protocol::Anthropic, url, provider, model: wire_model }
        } else {
            Target {
                protocol: Protocol::ChatCompletions,
                url: format!("{base}/chat/completions"),
                provider,
                model: wire_model,
            }
        }
    }

    fn send_anthropic(&self, target: &Target, key: &str, prompt: &str, temperature: f64) -> Result<String, String> {
        let request = AnthropicRequest {
            model: &target.model,
            max_tokens: self.max_tokens,
            temperature,
            messages: vec![Message { role: "user", content: prompt }],
        };
        let response = self
            .http
            .post(&target.url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }

        let parsed: AnthropicResponse =
            response.json().map_err(|e| format!("failed to parse response: {e}"))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|c| c.kind == "text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        Ok(text)
    }

    fn send_chat(&self, target: &Target, key: &str, prompt: &str, temperature: f64) -> Result<String, String> {
        let request = ChatRequest {
            model: &target.model,
            temperature,
            messages: vec![Message { role: "user", content: prompt }],
        };
        let response = self
            .http
            .post(&target.url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }

        let parsed: ChatResponse =
            response.json().map_err(|e| format!("failed to parse response: {e}"))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| "response has no message content".to_string())
    }
}

impl ModelClient for HttpModelClient {
    fn invoke(&self, model: &str, prompt: &str, temperature: f64) -> RucamResult<String> {
        let target = self.target(model);
        let key = self.credentials.key(&target.provider).ok_or_else(|| RucamError::ModelInvocation {
            model: model.to_string(),
            reason: format!("no API key for provider '{}'; set {}", target.provider, env_key(&target.provider)),
        })?;

        info!(model, provider = %target.provider, url = %target.url, "invoking model");
        let result = match target.protocol {
            Protocol::Anthropic => self.send_anthropic(&target, key, prompt, temperature),
            Protocol::ChatCompletions => self.send_chat(&target, key, prompt, temperature),
        };

        let text = result.map_err(|reason| RucamError::ModelInvocation {
            model: model.to_string(),
            reason,
        })?;
        debug!(model, chars = text.len(), "model responded");
        Ok(text)
    }
}

fn is_gemini(model: &str) -> bool {
    let lower = model.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    name.starts_with("gemini")
}
