// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Named provider configurations.
    ///
    /// Define custom endpoints, local models, or additional accounts here
    /// and reference them by name when constructing a provider.
    ///
    /// ```yaml
    /// providers:
    ///   my_ollama:
    ///     provider: ollama
    ///     name: llama3.2
    ///   work_openai:
    ///     provider: openai
    ///     api_key_env: WORK_OPENAI_KEY
    ///     name: gpt-4o
    /// ```
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier.
    /// Common values: "openai" | "azure" | "ollama" | "lmstudio" | "custom" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override.  Required for the "custom" provider; for hosted
    /// providers the correct default is auto-selected.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
    /// Wall-clock timeout for a single completion request, in seconds.
    ///
    /// Form turns wait synchronously on the model, so this bounds the worst
    /// case a user sits on a spinner.  The engine retries within its own
    /// budget; the transport may cancel earlier.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // ── Azure OpenAI ─────────────────────────────────────────────────────────
    /// Azure resource name (the subdomain of `.openai.azure.com`).
    /// Required when provider = "azure" and base_url is not set.
    pub azure_resource: Option<String>,
    /// Azure deployment name.  Defaults to `name` when not set.
    pub azure_deployment: Option<String>,
    /// Azure REST API version string, e.g. `"2024-02-01"`.
    pub azure_api_version: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
            request_timeout_secs: default_request_timeout_secs(),
            azure_resource: None,
            azure_deployment: None,
            azure_api_version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum model calls per turn when the output violates the JSON or
    /// behaviour contract.  Each failed attempt appends a corrective message
    /// before retrying; exhaustion degrades to a fallback MESSAGE action.
    #[serde(default = "default_max_llm_attempts")]
    pub max_llm_attempts: u32,
    /// Maximum conversation history entries included in the model context.
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
    /// Form bodies longer than this many lines are condensed before being
    /// injected into system prompts.
    #[serde(default = "default_condense_threshold_lines")]
    pub condense_threshold_lines: usize,
    /// Lines kept from each end when condensation falls back to head + tail.
    #[serde(default = "default_condense_keep_lines")]
    pub condense_keep_lines: usize,
}

fn default_max_llm_attempts() -> u32 {
    4
}
fn default_max_history_messages() -> usize {
    30
}
fn default_condense_threshold_lines() -> usize {
    120
}
fn default_condense_keep_lines() -> usize {
    40
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_llm_attempts: default_max_llm_attempts(),
            max_history_messages: default_max_history_messages(),
            condense_threshold_lines: default_condense_threshold_lines(),
            condense_keep_lines: default_condense_keep_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle sessions older than this are expired by the store.
    #[serde(default = "default_session_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_session_timeout_secs() -> u64 {
    30 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout_secs(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_provider_is_openai() {
        let cfg = Config::default();
        assert_eq!(cfg.model.provider, "openai");
    }

    #[test]
    fn default_engine_knobs() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_llm_attempts, 4);
        assert_eq!(cfg.max_history_messages, 30);
    }

    #[test]
    fn default_request_timeout_is_five_minutes() {
        let cfg = ModelConfig::default();
        assert_eq!(cfg.request_timeout_secs, 300);
    }

    #[test]
    fn default_session_timeout_is_thirty_minutes() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.timeout_secs, 1800);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let cfg: Config = serde_yaml::from_str("model:\n  provider: ollama\n  name: llama3.2").unwrap();
        assert_eq!(cfg.model.provider, "ollama");
        assert_eq!(cfg.model.request_timeout_secs, 300);
        assert_eq!(cfg.engine.max_llm_attempts, 4);
    }

    #[test]
    fn engine_knobs_overridable_from_yaml() {
        let cfg: Config =
            serde_yaml::from_str("engine:\n  max_llm_attempts: 2\n  max_history_messages: 10")
                .unwrap();
        assert_eq!(cfg.engine.max_llm_attempts, 2);
        assert_eq!(cfg.engine.max_history_messages, 10);
    }

    #[test]
    fn named_providers_deserialize() {
        let cfg: Config = serde_yaml::from_str(
            "providers:\n  local:\n    provider: ollama\n    name: llama3.2",
        )
        .unwrap();
        assert_eq!(cfg.providers["local"].provider, "ollama");
    }
}
