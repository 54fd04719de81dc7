// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub(crate) mod openai_compat;
mod mock;
mod provider;
mod types;

pub use mock::{FailingProvider, MockProvider, ScriptedMockProvider};
pub use provider::ModelProvider;
pub use types::*;

use anyhow::bail;
use freja_config::ModelConfig;
use openai_compat::{AuthStyle, OpenAiCompatProvider};

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Selects the driver implementation based on `cfg.provider`.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    let key = resolve_api_key(cfg);

    // Helper that reads `base_url` from config or falls back to a static default.
    let base_url = |default: &str| -> String {
        cfg.base_url.clone().unwrap_or_else(|| default.into())
    };

    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiCompatProvider::new(
            "openai",
            cfg.name.clone(),
            key,
            &base_url("https://api.openai.com/v1"),
            cfg.max_tokens,
            cfg.temperature,
            cfg.request_timeout_secs,
            vec![],
            AuthStyle::Bearer,
        ))),

        // ── Azure OpenAI (OpenAI-compat with special URL + api-key header) ────
        "azure" => {
            let chat_url = if let Some(b) = &cfg.base_url {
                let api_ver = cfg.azure_api_version.as_deref().unwrap_or("2024-02-01");
                format!("{}/chat/completions?api-version={}", b.trim_end_matches('/'), api_ver)
            } else {
                let resource = match cfg.azure_resource.as_deref() {
                    Some(r) => r,
                    None => bail!("azure provider requires azure_resource or base_url in config"),
                };
                let deployment = cfg.azure_deployment.as_deref().unwrap_or(&cfg.name);
                let api_ver = cfg.azure_api_version.as_deref().unwrap_or("2024-02-01");
                format!(
                    "https://{resource}.openai.azure.com/openai/deployments/{deployment}/chat/completions?api-version={api_ver}"
                )
            };
            Ok(Box::new(OpenAiCompatProvider::with_full_chat_url(
                "azure",
                cfg.name.clone(),
                key,
                chat_url,
                cfg.max_tokens,
                cfg.temperature,
                cfg.request_timeout_secs,
                vec![],
                AuthStyle::ApiKeyHeader,
            )))
        }

        // ── Local / OSS servers ───────────────────────────────────────────────
        "ollama" => Ok(Box::new(OpenAiCompatProvider::new(
            "ollama",
            cfg.name.clone(),
            None, // no key needed
            &base_url("http://localhost:11434/v1"),
            cfg.max_tokens,
            cfg.temperature,
            cfg.request_timeout_secs,
            vec![],
            AuthStyle::None,
        ))),
        "lmstudio" => Ok(Box::new(OpenAiCompatProvider::new(
            "lmstudio",
            cfg.name.clone(),
            None,
            &base_url("http://localhost:1234/v1"),
            cfg.max_tokens,
            cfg.temperature,
            cfg.request_timeout_secs,
            vec![],
            AuthStyle::None,
        ))),

        // ── Any OpenAI-compatible endpoint ────────────────────────────────────
        "custom" => {
            let b = match cfg.base_url.as_deref() {
                Some(b) => b,
                None => bail!("custom provider requires base_url in config"),
            };
            // Strip a /chat/completions suffix if present — it is re-appended.
            let b = b.trim_end_matches('/');
            let b = b.strip_suffix("/chat/completions").unwrap_or(b);
            let auth = if key.is_some() { AuthStyle::Bearer } else { AuthStyle::None };
            Ok(Box::new(OpenAiCompatProvider::new(
                "custom",
                cfg.name.clone(),
                key,
                b,
                cfg.max_tokens,
                cfg.temperature,
                cfg.request_timeout_secs,
                vec![],
                auth,
            )))
        }

        // ── Testing / Mock ────────────────────────────────────────────────────
        "mock" => Ok(Box::new(MockProvider)),

        other => bail!(
            "unknown model provider: {other:?}\n\
             Known providers: openai, azure, ollama, lmstudio, custom, mock"
        ),
    }
}

fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok();
    }
    // Provider-default env var when neither is set.
    let default_env = match cfg.provider.as_str() {
        "openai" => "OPENAI_API_KEY",
        "azure" => "AZURE_OPENAI_API_KEY",
        "custom" => "CUSTOM_LLM_API_KEY",
        _ => return None,
    };
    std::env::var(default_env).ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
