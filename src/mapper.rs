//! Hybrid mapper: exact + lexical + vector scoring with deterministic fusion
//!
//! For each proposal the mapper gathers candidates from three retrieval
//! channels, computes the three sub-scores in a fixed order, and fuses them
//! with fixed weights. Ties break on ascending entry id, giving a total
//! order; a best candidate below the floor yields an unmapped result (a
//! value, not an error). Nothing here is stochastic: the same proposal and
//! vocabulary always produce the same mapping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::FusionConfig;
use crate::propose::Proposal;
use crate::vocab::embed::{cosine, l2_normalize, Embedder};
use crate::vocab::normalize::normalize_term;
use crate::vocab::Vocabulary;

/// Per-channel sub-scores, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// 1.0 iff the normalized surface equals a label/synonym of the entry
    pub exact: f32,
    /// BM25 squashed by `s / (1 + s)`
    pub lexical: f32,
    /// Cosine mapped to `[0, 1]`; 0 without an embedder
    pub vector: f32,
}

/// A proposal bound to at most one vocabulary entry.
///
/// Created by the mapper and read-only afterwards; the validator attaches
/// its verdict elsewhere and never touches the fused score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    pub proposal: Proposal,
    /// Entry ordinal in the vocabulary; `None` when unmapped
    pub entry: Option<u32>,
    /// Canonical identifier of the mapped entry
    pub entry_id: Option<String>,
    pub fused: f32,
    pub breakdown: ScoreBreakdown,
}

impl Mapping {
    pub fn is_mapped(&self) -> bool {
        self.entry.is_some()
    }
}

/// Deterministic three-channel mapper.
pub struct HybridMapper {
    config: FusionConfig,
    embedder: Option<Box<dyn Embedder>>,
}

impl HybridMapper {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Attach an embedder for the vector channel. Must match the embedder
    /// the vocabulary was compiled with for meaningful cosines.
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn embedder_id(&self) -> Option<&str> {
        self.embedder.as_deref().map(Embedder::model_id)
    }

    /// Map one proposal against the vocabulary.
    pub fn map(&self, proposal: &Proposal, vocab: &Vocabulary) -> Mapping {
        let normalized = normalize_term(&proposal.text);

        // Candidate union across channels; BTreeSet gives a stable
        // iteration order regardless of which channel found an entry first
        let mut candidates: BTreeSet<u32> = BTreeSet::new();

        if let Some(ids) = vocab.lookup_exact(&normalized) {
            candidates.extend(ids.iter().copied());
        }
        let bm25_hits = vocab.bm25().search(&proposal.text, self.config.top_k);
        candidates.extend(bm25_hits.iter().map(|&(id, _)| id));

        let query_vector = self.embedder.as_ref().filter(|_| vocab.has_vectors()).map(|e| {
            let mut v = e.embed(&proposal.text);
            l2_normalize(&mut v);
            v
        });
        if let Some(qv) = &query_vector {
            let mut by_cosine: Vec<(u32, f32)> = (0..vocab.len() as u32)
                .filter_map(|id| vocab.vector(id).map(|ev| (id, cosine(qv, ev))))
                .collect();
            by_cosine.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            candidates.extend(by_cosine.iter().take(self.config.top_k).map(|&(id, _)| id));
        }

        let mut best: Option<(f32, ScoreBreakdown, u32, &str)> = None;

        for id in candidates {
            let Some(entry) = vocab.entry(id) else {
                continue;
            };

            // Sub-scores in fixed order: exact, lexical, vector
            let exact = if entry
                .terms()
                .any(|t| normalize_term(t) == normalized && !normalized.is_empty())
            {
                1.0
            } else {
                0.0
            };

            let raw_bm25 = bm25_hits
                .iter()
                .find(|&&(hit, _)| hit == id)
                .map(|&(_, s)| s)
                .unwrap_or(0.0);
            let lexical = raw_bm25 / (1.0 + raw_bm25);

            let vector = match (&query_vector, vocab.vector(id)) {
                (Some(qv), Some(ev)) => ((cosine(qv, ev) + 1.0) / 2.0).clamp(0.0, 1.0),
                _ => 0.0,
            };

            let breakdown = ScoreBreakdown {
                exact,
                lexical,
                vector,
            };
            let fused = self.config.w_exact * exact
                + self.config.w_lexical * lexical
                + self.config.w_vector * vector;

            // Higher fused wins; ties break on ascending entry id
            let replace = match &best {
                None => true,
                Some((best_fused, _, best_id, _)) => {
                    fused > *best_fused
                        || (fused == *best_fused && entry.id.as_str() < vocab.entry(*best_id).map(|e| e.id.as_str()).unwrap_or(""))
                }
            };
            if replace {
                best = Some((fused, breakdown, id, entry.id.as_str()));
            }
        }

        match best {
            Some((fused, breakdown, id, entry_id)) if fused >= self.config.floor => {
                tracing::debug!(surface = %proposal.text, entry = entry_id, fused, "mapped proposal");
                Mapping {
                    proposal: proposal.clone(),
                    entry: Some(id),
                    entry_id: Some(entry_id.to_string()),
                    fused,
                    breakdown,
                }
            }
            Some((fused, breakdown, _, _)) => Mapping {
                proposal: proposal.clone(),
                entry: None,
                entry_id: None,
                fused,
                breakdown,
            },
            None => Mapping {
                proposal: proposal.clone(),
                entry: None,
                entry_id: None,
                fused: 0.0,
                breakdown: ScoreBreakdown::default(),
            },
        }
    }
}
