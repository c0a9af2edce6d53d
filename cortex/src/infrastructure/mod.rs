// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the cortex: the ANN index and text embeddings

pub mod embedding;
pub mod hnsw;

pub use embedding::{EmbeddingProvider, HashingEmbedding};
pub use hnsw::{euclidean_distance, HnswIndex, IndexError, SearchHit};
