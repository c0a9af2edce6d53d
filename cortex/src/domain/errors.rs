// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

use super::pattern::PatternId;
use crate::infrastructure::hnsw::IndexError;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Pattern not found: {0}")]
    PatternNotFound(PatternId),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("Embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
}
