//! Run manifest
//!
//! Records what produced a set of artifacts: configuration hash, vocabulary
//! hash, collaborator identifiers, and run counters. The manifest carries a
//! fresh run id and wall-clock timestamp, so it is the one artifact outside
//! the byte-identical determinism guarantee; everything needed to *compare*
//! runs (the hashes) is stable.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::ExportError;
use crate::export::write_json;
use crate::pipeline::RunStats;
use crate::vocab::Vocabulary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub config_hash: String,
    pub vocab_hash: String,
    pub vocab_entries: usize,
    /// Model identifiers of the injected collaborators, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neural_extractor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entailment_gate: Option<String>,
    pub stats: RunStats,
}

impl RunManifest {
    pub fn new(config: &PipelineConfig, vocab: &Vocabulary, stats: RunStats) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: config.content_hash(),
            vocab_hash: vocab.hash().to_string(),
            vocab_entries: vocab.len(),
            embedder: vocab.embedder_id().map(str::to_string),
            neural_extractor: None,
            entailment_gate: None,
            stats,
        }
    }

    pub fn with_neural_extractor(mut self, model_id: impl Into<String>) -> Self {
        self.neural_extractor = Some(model_id.into());
        self
    }

    pub fn with_entailment_gate(mut self, model_id: impl Into<String>) -> Self {
        self.entailment_gate = Some(model_id.into());
        self
    }

    pub fn write(&self, path: &Path) -> Result<(), ExportError> {
        write_json(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::VocabEntry;

    fn vocab() -> Vocabulary {
        Vocabulary::build(vec![VocabEntry::new("X1", "Example")], None).unwrap()
    }

    #[test]
    fn hashes_are_reproducible_ids_are_not() {
        let cfg = PipelineConfig::default();
        let v = vocab();
        let a = RunManifest::new(&cfg, &v, RunStats::default());
        let b = RunManifest::new(&cfg, &v, RunStats::default());

        assert_eq!(a.config_hash, b.config_hash);
        assert_eq!(a.vocab_hash, b.vocab_hash);
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn writes_json_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run/manifest.json");
        let manifest = RunManifest::new(&PipelineConfig::default(), &vocab(), RunStats::default())
            .with_neural_extractor("gliner-test");
        manifest.write(&path).unwrap();

        let parsed: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.neural_extractor.as_deref(), Some("gliner-test"));
        assert_eq!(parsed.vocab_entries, 1);
    }
}
