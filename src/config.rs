//! Pipeline configuration
//!
//! All tunables live here: negation scope, lexicon thresholds, fusion
//! weights, validation gates. Every struct has serde defaults so a partial
//! YAML file (or none at all) yields a fully working configuration, and
//! [`PipelineConfig::validate`] rejects parameter combinations that would
//! break the determinism or monotonicity contracts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// Canonicalization and negation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalConfig {
    /// Byte window on each side of a span within which a negation cue
    /// flips polarity
    pub negation_window: usize,

    /// Negation cue phrases, matched case-insensitively on word boundaries
    pub negation_cues: Vec<String>,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            negation_window: 60,
            negation_cues: [
                "no evidence of",
                "negative for",
                "free of",
                "absence of",
                "denies",
                "without",
                "not",
                "no",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Lexicon proposal source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    /// Maximum n-gram size scanned against the vocabulary
    pub max_ngram: usize,
    /// Minimum lookup score to keep a span
    pub min_score: f32,
    /// Minimum token overlap ratio for fuzzy matching
    pub min_overlap: f32,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            max_ngram: 5,
            min_score: 0.30,
            min_overlap: 0.34,
        }
    }
}

/// Neural extractor settings (applies only when an extractor is injected)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralConfig {
    /// Timeout for one extraction call; on expiry the source contributes
    /// no proposals for the document
    pub timeout_ms: u64,
    /// Confidences below this are dropped
    pub min_confidence: f32,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            min_confidence: 0.0,
        }
    }
}

/// Fixed fusion weights for the hybrid mapper.
///
/// The fused score is `exact * w_exact + lexical * w_lexical +
/// vector * w_vector`. Validation requires the weights to sum to 1 and
/// `w_exact >= w_lexical + w_vector`, which guarantees an exact match can
/// never be outscored by a non-exact candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub w_exact: f32,
    pub w_lexical: f32,
    pub w_vector: f32,
    /// Best candidates fusing below this are reported as unmapped
    pub floor: f32,
    /// Candidates pulled from each retrieval channel before fusion
    pub top_k: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            w_exact: 0.5,
            w_lexical: 0.3,
            w_vector: 0.2,
            floor: 0.35,
            top_k: 10,
        }
    }
}

/// Validator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Byte window on each side of the span used as gate premise and
    /// coherence context
    pub context_window: usize,
    /// Entailment probabilities below this reject the mapping
    /// (only when a gate is injected)
    pub min_entailment: f32,
    /// Timeout for one gate call; on expiry the gate is skipped
    pub gate_timeout_ms: u64,
    /// Context/entry token overlap below this downgrades the verdict
    pub min_coherence: f32,
    /// Multiplier applied to the fused score when coherence is low;
    /// stored as an adjusted confidence, the fused score is never mutated
    pub coherence_penalty: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            context_window: 200,
            min_entailment: 0.5,
            gate_timeout_ms: 10_000,
            min_coherence: 0.05,
            coherence_penalty: 0.5,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub canonical: CanonicalConfig,
    pub lexicon: LexiconConfig,
    pub neural: NeuralConfig,
    pub fusion: FusionConfig,
    pub validation: ValidationConfig,
}

impl PipelineConfig {
    /// Load from a YAML file; missing keys fall back to defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = serde_yaml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the parameter invariants the scoring contracts depend on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.fusion;
        let sum = f.w_exact + f.w_lexical + f.w_vector;
        if (sum - 1.0).abs() > 1e-4 {
            return Err(ConfigError::WeightSum { sum });
        }
        if f.w_exact < f.w_lexical + f.w_vector {
            return Err(ConfigError::ExactDominance {
                exact: f.w_exact,
                lexical: f.w_lexical,
                vector: f.w_vector,
            });
        }
        if !(0.0..=1.0).contains(&f.floor) {
            return Err(ConfigError::FloorRange { floor: f.floor });
        }
        Ok(())
    }

    /// Stable SHA-256 over the canonical JSON form, recorded in the run
    /// manifest so artifacts can be traced back to exact parameters.
    pub fn content_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("config serializes");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn weight_sum_enforced() {
        let mut cfg = PipelineConfig::default();
        cfg.fusion.w_vector = 0.4;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WeightSum { .. })
        ));
    }

    #[test]
    fn exact_dominance_enforced() {
        let mut cfg = PipelineConfig::default();
        cfg.fusion.w_exact = 0.4;
        cfg.fusion.w_lexical = 0.4;
        cfg.fusion.w_vector = 0.2;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ExactDominance { .. })
        ));
    }

    #[test]
    fn content_hash_is_stable() {
        let a = PipelineConfig::default();
        let b = PipelineConfig::default();
        assert_eq!(a.content_hash(), b.content_hash());

        let mut c = PipelineConfig::default();
        c.fusion.floor = 0.5;
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let cfg: PipelineConfig =
            serde_yaml::from_str("fusion:\n  floor: 0.4\n").expect("parses");
        assert_eq!(cfg.fusion.floor, 0.4);
        assert_eq!(cfg.lexicon.max_ngram, 5);
        assert_eq!(cfg.canonical.negation_window, 60);
    }
}
