// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

use freja_form::FormError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The form definition could not be parsed; no session is created.
    #[error(transparent)]
    MalformedDefinition(#[from] FormError),
}
