//! LLM client configuration.
//!
//! Env vars: DOCEXTRACT_PROVIDER, DOCEXTRACT_ENDPOINT, DOCEXTRACT_MODEL,
//! DOCEXTRACT_API_KEY (LLM_* names accepted as fallback, OPENAI_API_KEY last)

use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible completions API (OpenAI, Lambda, Groq, Together.ai, vLLM, etc.)
    #[default]
    #[serde(alias = "groq", alias = "together", alias = "lambda")]
    #[value(alias = "groq", alias = "together", alias = "lambda")]
    OpenAI,
    /// Ollama API (local)
    Ollama,
}

impl LlmProvider {
    /// Endpoint used when none is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "https://api.lambdalabs.com/v1",
            LlmProvider::Ollama => "http://localhost:11434",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" | "lambda" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

/// Connection settings for the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (openai or ollama)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API base URL (provider default when unset); a trailing `/v1` is
    /// optional for OpenAI-compatible APIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bearer token for OpenAI-compatible providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response (service default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_model() -> String {
    "llama3.3-70b-instruct-fp8".to_string()
}

fn default_request_timeout() -> u64 {
    300 // 5 min for slow models
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: None,
            api_key: None,
            model: default_model(),
            max_tokens: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl LlmConfig {
    /// Apply overrides from process environment variables.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to read variables.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k));

        if let Some(provider) =
            first(&["DOCEXTRACT_PROVIDER", "LLM_PROVIDER"]).and_then(|v| LlmProvider::from_str(&v))
        {
            self.provider = provider;
        }

        // Explicit endpoint always wins, then OLLAMA_HOST for Ollama provider
        if let Some(endpoint) = first(&["DOCEXTRACT_ENDPOINT", "LLM_ENDPOINT"]) {
            self.endpoint = Some(endpoint);
        } else if self.provider == LlmProvider::Ollama && self.endpoint.is_none() {
            self.endpoint = lookup("OLLAMA_HOST");
        }

        if let Some(key) = first(&["DOCEXTRACT_API_KEY", "LLM_API_KEY", "OPENAI_API_KEY"]) {
            self.api_key = Some(key);
        }

        if let Some(model) = first(&["DOCEXTRACT_MODEL", "LLM_MODEL"]) {
            self.model = model;
        }

        self
    }

    /// Effective endpoint.
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }

    /// Get the provider name for display.
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "Ollama",
            LlmProvider::OpenAI => {
                let endpoint = self.endpoint();
                if endpoint.contains("groq.com") {
                    "Groq"
                } else if endpoint.contains("together.xyz") {
                    "Together.ai"
                } else if endpoint.contains("lambdalabs.com") {
                    "Lambda"
                } else {
                    "OpenAI-compatible"
                }
            }
        }
    }

    /// Get a provider-aware availability hint for error messages.
    pub fn availability_hint(&self) -> String {
        match self.provider {
            LlmProvider::Ollama => format!(
                "Ollama not available at {}. Make sure Ollama is running: ollama serve",
                self.endpoint()
            ),
            LlmProvider::OpenAI => {
                if self.api_key.is_none() {
                    "API key not set. Pass --api-key or set DOCEXTRACT_API_KEY".to_string()
                } else {
                    format!("API not available at {}", self.endpoint())
                }
            }
        }
    }
}
