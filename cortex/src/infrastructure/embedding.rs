// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Text embeddings
//!
//! [`EmbeddingProvider`] is the seam for a real embedding model.
//! [`HashingEmbedding`] is the deterministic fallback: lowercase alphanumeric
//! tokens are hashed with SHA-256 onto `dimensions` buckets with a hash-derived
//! sign, and the result is L2-normalised.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a vector of [`EmbeddingProvider::dimensions`] length.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_and_normalised() {
        let embedder = HashingEmbedding::new(64);
        let a = embedder.embed_sync("Fix the flaky retry loop");
        let b = embedder.embed_sync("fix THE flaky, retry-loop!");

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashingEmbedding::new(16).embed_sync("  ... ");
        assert_eq!(v, vec![0.0; 16]);
    }

    #[tokio::test]
    async fn test_provider_reports_dimensions() {
        let embedder = HashingEmbedding::new(32);
        assert_eq!(embedder.dimensions(), 32);
        assert_eq!(embedder.embed("hello world").await.unwrap().len(), 32);
    }
}
