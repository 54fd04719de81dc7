// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::CompletionRequest;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return the full response text.
    ///
    /// An `Ok` with an empty string is treated by callers as a failed
    /// attempt, the same as an `Err`.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String>;
}
