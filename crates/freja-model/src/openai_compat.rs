// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared implementation for OpenAI-compatible chat completion APIs.
//!
//! OpenAI, Azure, and the common local servers (Ollama, LM Studio, vLLM)
//! all speak the same `/chat/completions` wire format.  This module provides
//! a single `OpenAiCompatProvider` that each driver configures with its own
//! defaults (URL, auth style, headers).
//!
//! # Auth styles
//! - `Bearer` — `Authorization: Bearer <key>` (most providers)
//! - `ApiKeyHeader` — `api-key: <key>` (Azure OpenAI)
//! - `None` — no authentication (local servers)

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{CompletionRequest, ModelProvider, Role};

/// How to send the API key in HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — standard for most providers.
    Bearer,
    /// `api-key: <key>` — Azure OpenAI style.
    ApiKeyHeader,
    /// No authentication header — local servers (Ollama, vLLM, LM Studio).
    None,
}

/// OpenAI-compatible chat completion provider.
pub struct OpenAiCompatProvider {
    /// Provider id returned by `ModelProvider::name()`.
    driver_name: &'static str,
    /// Model id forwarded to the API.
    model: String,
    /// API key (pre-resolved from config or env).
    api_key: Option<String>,
    /// Full chat completions URL, e.g. `https://api.openai.com/v1/chat/completions`.
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
    /// Additional HTTP headers sent on every request.
    extra_headers: Vec<(String, String)>,
    auth_style: AuthStyle,
}

impl OpenAiCompatProvider {
    /// Construct a provider from its API base URL and auth configuration.
    ///
    /// `base_url` ends **before** `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver_name: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout_secs: u64,
        extra_headers: Vec<(String, String)>,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::with_full_chat_url(
            driver_name,
            model,
            api_key,
            format!("{base}/chat/completions"),
            max_tokens,
            temperature,
            timeout_secs,
            extra_headers,
            auth_style,
        )
    }

    /// Construct a provider from a **pre-built** chat completions URL.
    ///
    /// Use this when the full URL cannot be derived by appending
    /// `/chat/completions` to a base — e.g. Azure OpenAI, which encodes the
    /// deployment name and API version into the path and query string.
    #[allow(clippy::too_many_arguments)]
    pub fn with_full_chat_url(
        driver_name: &'static str,
        model: String,
        api_key: Option<String>,
        chat_url: String,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout_secs: u64,
        extra_headers: Vec<(String, String)>,
        auth_style: AuthStyle,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            driver_name,
            model,
            api_key,
            chat_url,
            max_tokens: max_tokens.unwrap_or(1024),
            temperature: temperature.unwrap_or(0.0),
            client,
            extra_headers,
            auth_style,
        }
    }

    fn request_body(&self, req: &CompletionRequest) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();
        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.driver_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        let body = self.request_body(&req);
        debug!(
            provider = self.driver_name,
            model = %self.model,
            messages = req.messages.len(),
            "sending completion request"
        );

        let mut builder = self.client.post(&self.chat_url).json(&body);
        match (&self.auth_style, &self.api_key) {
            (AuthStyle::Bearer, Some(key)) => {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }
            (AuthStyle::ApiKeyHeader, Some(key)) => {
                builder = builder.header("api-key", key.clone());
            }
            _ => {}
        }
        for (name, value) in &self.extra_headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.chat_url))?;

        let status = response.status();
        let text = response.text().await.context("reading response body")?;
        if !status.is_success() {
            let snippet: String = text.chars().take(400).collect();
            bail!("{} returned {status}: {snippet}", self.driver_name);
        }

        let parsed: Value =
            serde_json::from_str(&text).context("response body is not valid JSON")?;
        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
