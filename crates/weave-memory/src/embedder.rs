// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! A deterministic, local embedder.
//!
//! There is no model behind this: every dimension of the output vector is
//! derived from a SHA256 hash of the input text concatenated with the
//! dimension index, so the same text always embeds to the same vector and
//! semantically similar strings land nowhere near each other. It exists so
//! the vector store has something to index and search against without a
//! network call or a bundled model file. The dimension count is an
//! implementation detail, not a contract other crates should rely on.

use sha2::{Digest, Sha256};

/// Output vector width. Internal only — callers must not assume a fixed size
/// across versions of this crate.
pub const DIMENSIONS: usize = 256;

/// Embed `text` into a deterministic, L2-normalized vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut out = Vec::with_capacity(DIMENSIONS);
    for dim in 0..DIMENSIONS {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(dim.to_le_bytes());
        let digest = hasher.finalize();
        // Fold 8 bytes of the digest into a u64, then map to [-1, 1).
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest[0..8]);
        let n = u64::from_le_bytes(buf);
        let unit = (n as f64) / (u64::MAX as f64); // [0, 1)
        out.push((unit * 2.0 - 1.0) as f32);
    }
    normalize(&mut out);
    out
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 for
/// mismatched lengths or zero vectors rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_embeds_identically() {
        let a = embed("hello world");
        let b = embed("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_embeds_differently() {
        let a = embed("hello world");
        let b = embed("goodbye world");
        assert_ne!(a, b);
    }

    #[test]
    fn output_has_expected_dimension_and_is_normalized() {
        let v = embed("anything");
        assert_eq!(v.len(), DIMENSIONS);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = embed("same text twice");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_of_empty_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_similarity_of_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
