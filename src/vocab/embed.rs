//! Dense-vector seam for the hybrid mapper
//!
//! Real deployments inject a model-backed [`Embedder`]; the crate ships a
//! deterministic hashed bag-of-words embedder so that tests and
//! embedder-free runs need no ML runtime. All vectors are L2-normalized at
//! the seam so cosine reduces to a dot product.

use sha2::{Digest, Sha256};

use crate::vocab::normalize::tokenize;

/// Produces dense representations for vocabulary terms and proposal
/// surfaces. Implementations must be deterministic for reproducible runs;
/// nondeterministic backends forfeit the byte-identical artifact guarantee.
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the run manifest.
    fn model_id(&self) -> &str;

    fn dim(&self) -> usize;

    /// Embed one text. Must return a vector of exactly `dim()` components;
    /// it is L2-normalized by the caller.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// L2-normalize in place; zero vectors stay zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Dot product of two equal-length vectors; callers hold the normalization
/// invariant, so this is cosine similarity.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Deterministic token-hashed bag-of-words embedder.
///
/// Each normalized token is hashed with SHA-256; the first eight bytes pick
/// a bucket, the ninth picks a sign. Stable across platforms and releases,
/// unlike `std`'s default hasher.
#[derive(Debug, Clone)]
pub struct HashedBowEmbedder {
    dim: usize,
}

impl HashedBowEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Default for HashedBowEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Embedder for HashedBowEmbedder {
    fn model_id(&self) -> &str {
        "hashed-bow"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dim as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let e = HashedBowEmbedder::default();
        assert_eq!(e.embed("bone fracture"), e.embed("bone fracture"));
    }

    #[test]
    fn normalization_is_invariant() {
        let e = HashedBowEmbedder::default();
        // Same token bag after normalization
        assert_eq!(e.embed("Bone-Fracture!"), e.embed("bone fracture"));
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let e = HashedBowEmbedder::default();
        let mut a = e.embed("myocardial infarction");
        let mut b = e.embed("myocardial infarction");
        l2_normalize(&mut a);
        l2_normalize(&mut b);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn related_terms_score_above_unrelated() {
        let e = HashedBowEmbedder::default();
        let mut q = e.embed("bone fracture");
        let mut related = e.embed("fracture of bone");
        let mut unrelated = e.embed("liver enzyme panel");
        l2_normalize(&mut q);
        l2_normalize(&mut related);
        l2_normalize(&mut unrelated);
        assert!(cosine(&q, &related) > cosine(&q, &unrelated));
    }

    #[test]
    fn zero_vector_stays_zero() {
        let mut v = vec![0.0f32; 8];
        l2_normalize(&mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }
}
