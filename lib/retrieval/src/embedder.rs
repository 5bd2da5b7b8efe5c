//! Hashing-trick text embedder
//!
//! Each token is hashed into one of `dim` buckets and counted; the count vector
//! is L2-normalized. No vocabulary, no model: the same text always maps to the
//! same vector.

use agrisage_core::Vector;
use sha2::{Digest, Sha256};

pub const DEFAULT_EMBEDDING_DIM: usize = 192;

/// ASCII alphanumerics plus the Devanagari and Telugu blocks
#[inline]
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || ('\u{0900}'..='\u{097F}').contains(&c) || ('\u{0C00}'..='\u{0C7F}').contains(&c)
}

/// Lower-case the text and split it into maximal runs of token characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_token_char(c))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dim: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl HashingEmbedder {
    /// `dim` must be positive; a zero dimension is raised to 1
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Bucket of a token: first 8 bytes of its SHA-256 digest, big-endian, mod dim
    pub fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.dim as u64) as usize
    }

    /// Unit-length bag-of-words vector; text without tokens embeds to the zero vector
    pub fn embed(&self, text: &str) -> Vector {
        let mut vector = Vector::zeros(self.dim);
        let counts = vector.as_mut_slice();
        for token in tokenize(text) {
            counts[self.bucket(&token)] += 1.0;
        }
        vector.normalize();
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_tokenize_mixed_scripts() {
        assert_eq!(tokenize("PM-KISAN: ₹6,000/year"), vec!["pm", "kisan", "6", "000", "year"]);
        assert_eq!(tokenize("फसल बीमा योजना"), vec!["फसल", "बीमा", "योजना"]);
        assert_eq!(tokenize("రైతు బంధు"), vec!["రైతు", "బంధు"]);
        assert!(tokenize("  ,.;  ").is_empty());
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed("crop insurance for rice farmers");
        assert_eq!(v.dim(), 192);
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_repeated_tokens_count() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("seed seed");
        let bucket = embedder.bucket("seed");
        assert_relative_eq!(v.as_slice()[bucket], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_no_tokens_is_zero_vector() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed("!!! ---");
        assert!(v.is_zero());
        assert_eq!(v.dim(), 192);
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = HashingEmbedder::default();
        assert_eq!(embedder.embed("Soil Health Card"), embedder.embed("soil health card"));
    }

    proptest! {
        /// Property: embedding is deterministic and either unit length or zero.
        #[test]
        fn embedding_deterministic(text in "\\PC{0,80}") {
            let embedder = HashingEmbedder::new(64);
            let a = embedder.embed(&text);
            let b = embedder.embed(&text);
            prop_assert_eq!(&a, &b);
            prop_assert!(a.is_zero() || (a.norm() - 1.0).abs() < 1e-5);
        }
    }
}
