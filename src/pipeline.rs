//! Per-document orchestration
//!
//! Wires the canonicalizer, proposal sources, mapper, and validator into one
//! flow and enforces the isolation contract: a canonicalization failure
//! skips that document only, a failing source drops that source's output
//! only, and no document's failure can affect another. Each document yields
//! exactly one [`DocumentRecord`] regardless of outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::canonical::{Canonicalizer, Polarity};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::mapper::HybridMapper;
use crate::propose::{
    merge_proposals, LexiconSource, NeuralExtractor, NeuralSource, Proposal, ProposalSource,
    RegexSource, SourceKind,
};
use crate::validate::{EntailmentGate, Validator, Verdict, Verdicted};
use crate::vocab::embed::Embedder;
use crate::vocab::Vocabulary;

/// Outcome of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocStatus {
    Processed,
    Skipped { reason: String },
}

/// A proposal source dropped for one document, with the failure text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedSource {
    pub source: SourceKind,
    pub reason: String,
}

/// One validated entity row in the output artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub polarity: Polarity,
    pub source: SourceKind,
    pub source_confidence: f32,
    pub entry_id: Option<String>,
    pub label: Option<String>,
    pub exact: f32,
    pub lexical: f32,
    pub vector: f32,
    pub fused: f32,
    pub verdict: Verdict,
    pub reason: crate::validate::ReasonCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_confidence: Option<f32>,
}

/// Full per-document output record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    #[serde(flatten)]
    pub status: DocStatus,
    /// SHA-256 of the canonical text, for provenance; empty when skipped
    pub canonical_hash: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dropped_sources: Vec<DroppedSource>,
    pub entities: Vec<EntityRecord>,
}

/// Aggregate counters over a corpus run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub documents: usize,
    pub skipped: usize,
    pub proposals: usize,
    pub accepted: usize,
    pub adjusted: usize,
    pub rejected: usize,
    pub unmapped: usize,
}

/// The assembled pipeline. Construction validates the configuration; the
/// optional collaborators are injected, each with a deterministic absent
/// behavior.
pub struct Pipeline {
    config: PipelineConfig,
    canonicalizer: Canonicalizer,
    sources: Vec<Box<dyn ProposalSource>>,
    neural: Option<NeuralSource>,
    mapper: HybridMapper,
    validator: Validator,
    vocab: Arc<Vocabulary>,
}

impl Pipeline {
    /// Build a pipeline with the lexicon source only. Regex patterns and
    /// the optional collaborators attach via the `with_*` methods.
    pub fn new(config: PipelineConfig, vocab: Arc<Vocabulary>) -> Result<Self, PipelineError> {
        config.validate()?;
        let canonicalizer = Canonicalizer::new(&config.canonical)?;
        let lexicon = LexiconSource::new(vocab.clone(), config.lexicon.clone());
        let mapper = HybridMapper::new(config.fusion);
        let validator = Validator::new(config.validation.clone());

        Ok(Self {
            config,
            canonicalizer,
            sources: vec![Box::new(lexicon)],
            neural: None,
            mapper,
            validator,
            vocab,
        })
    }

    /// Add a labelled-regex source.
    pub fn with_regex_patterns(mut self, patterns: &[(&str, &str)]) -> Result<Self, PipelineError> {
        self.sources.push(Box::new(RegexSource::new(patterns)?));
        Ok(self)
    }

    /// Attach a neural extractor. Its absence leaves every other source's
    /// behavior unchanged.
    pub fn with_neural(mut self, extractor: Arc<dyn NeuralExtractor>) -> Self {
        self.neural = Some(NeuralSource::new(extractor, self.config.neural.clone()));
        self
    }

    /// Attach an embedder for the mapper's vector channel.
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.mapper = self.mapper.with_embedder(embedder);
        self
    }

    /// Attach an entailment gate to the validator.
    pub fn with_entailment_gate(mut self, gate: Arc<dyn EntailmentGate>) -> Self {
        self.validator = self.validator.with_gate(gate);
        self
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one document end to end. Never fails: failures become the
    /// record's status or dropped-source notes.
    #[instrument(skip(self, raw_text), fields(doc_id = %doc_id))]
    pub async fn process_document(&self, doc_id: &str, raw_text: &str) -> DocumentRecord {
        let doc = match self.canonicalizer.canonicalize(raw_text) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(%err, "canonicalization failed; skipping document");
                return DocumentRecord {
                    doc_id: doc_id.to_string(),
                    status: DocStatus::Skipped {
                        reason: err.to_string(),
                    },
                    canonical_hash: String::new(),
                    dropped_sources: Vec::new(),
                    entities: Vec::new(),
                };
            }
        };

        let mut proposals: Vec<Proposal> = Vec::new();
        let mut dropped: Vec<DroppedSource> = Vec::new();

        for source in &self.sources {
            match source.propose(&doc) {
                Ok(mut ps) => proposals.append(&mut ps),
                Err(err) => {
                    warn!(source = source.kind().as_str(), %err, "source dropped");
                    dropped.push(DroppedSource {
                        source: source.kind(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        if let Some(neural) = &self.neural {
            match neural.propose(&doc).await {
                Ok(mut ps) => proposals.append(&mut ps),
                Err(err) => {
                    dropped.push(DroppedSource {
                        source: SourceKind::Neural,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let proposals = merge_proposals(proposals);

        let mut entities = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            let mapping = self.mapper.map(&proposal, &self.vocab);
            let verdicted = self.validator.validate(mapping, &doc, &self.vocab).await;
            entities.push(entity_record(&verdicted, &self.vocab));
        }
        sort_entities(&mut entities);

        DocumentRecord {
            doc_id: doc_id.to_string(),
            status: DocStatus::Processed,
            canonical_hash: sha256_hex(doc.text()),
            dropped_sources: dropped,
            entities,
        }
    }

    /// Fold a corpus into records plus aggregate stats. Documents are
    /// independent; output order follows input order.
    pub async fn process_corpus<I, S>(&self, docs: I) -> (Vec<DocumentRecord>, RunStats)
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut records = Vec::new();
        let mut stats = RunStats::default();

        for (doc_id, raw) in docs {
            let record = self.process_document(doc_id.as_ref(), raw.as_ref()).await;
            stats.documents += 1;
            if matches!(record.status, DocStatus::Skipped { .. }) {
                stats.skipped += 1;
            }
            stats.proposals += record.entities.len();
            for e in &record.entities {
                match e.verdict {
                    Verdict::Accepted => stats.accepted += 1,
                    Verdict::AcceptedWithAdjustment => stats.adjusted += 1,
                    Verdict::Rejected => stats.rejected += 1,
                }
                if e.entry_id.is_none() {
                    stats.unmapped += 1;
                }
            }
            records.push(record);
        }

        info!(
            documents = stats.documents,
            skipped = stats.skipped,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "corpus processed"
        );
        (records, stats)
    }
}

fn entity_record(v: &Verdicted, vocab: &Vocabulary) -> EntityRecord {
    let label = v
        .mapping
        .entry
        .and_then(|ord| vocab.entry(ord))
        .map(|e| e.label.clone());
    EntityRecord {
        start: v.mapping.proposal.span.start,
        end: v.mapping.proposal.span.end,
        text: v.mapping.proposal.text.clone(),
        polarity: v.mapping.proposal.polarity,
        source: v.mapping.proposal.source,
        source_confidence: v.mapping.proposal.confidence,
        entry_id: v.mapping.entry_id.clone(),
        label,
        exact: v.mapping.breakdown.exact,
        lexical: v.mapping.breakdown.lexical,
        vector: v.mapping.breakdown.vector,
        fused: v.mapping.fused,
        verdict: v.verdict,
        reason: v.reason,
        adjusted_confidence: v.adjusted_confidence,
    }
}

/// Stable export order: accepted first, then by mapped id, then position.
fn sort_entities(entities: &mut [EntityRecord]) {
    entities.sort_by(|a, b| {
        a.verdict
            .rank()
            .cmp(&b.verdict.rank())
            .then_with(|| a.entry_id.cmp(&b.entry_id))
            .then_with(|| a.start.cmp(&b.start))
            .then_with(|| a.end.cmp(&b.end))
            .then_with(|| a.text.cmp(&b.text))
    });
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
