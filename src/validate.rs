//! Mapping validation: negation consistency, entailment gate, coherence
//!
//! Checks run in a fixed order so verdicts are reproducible. The entailment
//! gate is an optional injected collaborator; when absent the gate is a
//! deterministic pass-through, and when it times out or fails the verdict
//! proceeds with a recorded `gate_skipped` reason instead of blocking the
//! document. Coherence is a soft signal: it can downgrade a verdict but
//! never reject on its own, and the original fused score is never mutated.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::canonical::CanonicalDoc;
use crate::config::ValidationConfig;
use crate::mapper::Mapping;
use crate::vocab::normalize::tokenize;
use crate::vocab::{PolarityRule, Vocabulary};

/// Final validation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected,
    AcceptedWithAdjustment,
}

impl Verdict {
    /// Export sort rank: accepted outcomes first.
    pub fn rank(self) -> u8 {
        match self {
            Verdict::Accepted => 0,
            Verdict::AcceptedWithAdjustment => 1,
            Verdict::Rejected => 2,
        }
    }
}

/// Why the validator decided what it decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Accepted with no caveats
    Clean,
    /// Negated span mapped to an affirmed-only entry
    NegationConflict,
    /// Entailment gate scored below the threshold
    EntailmentFailed,
    /// Gate configured but unavailable; treated as pass-through
    GateSkipped,
    /// Context/entry coherence below the floor; confidence downgraded
    LowCoherence,
    /// No vocabulary candidate cleared the score floor
    Unmapped,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::Clean => "clean",
            ReasonCode::NegationConflict => "negation_conflict",
            ReasonCode::EntailmentFailed => "entailment_failed",
            ReasonCode::GateSkipped => "gate_skipped",
            ReasonCode::LowCoherence => "low_coherence",
            ReasonCode::Unmapped => "unmapped",
        }
    }
}

/// A mapping with its verdict attached. The wrapped mapping is unchanged;
/// adjustments live in `adjusted_confidence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdicted {
    pub mapping: Mapping,
    pub verdict: Verdict,
    pub reason: ReasonCode,
    /// Present only for `AcceptedWithAdjustment`
    pub adjusted_confidence: Option<f32>,
}

/// External entailment model: does the context entail the concept?
#[async_trait]
pub trait EntailmentGate: Send + Sync {
    fn model_id(&self) -> &str;

    /// Probability in `[0, 1]` that `premise` entails `hypothesis`.
    async fn entailment(&self, premise: &str, hypothesis: &str) -> anyhow::Result<f32>;
}

/// Stateless per-mapping validator; safe to share across parallel callers.
pub struct Validator {
    config: ValidationConfig,
    gate: Option<Arc<dyn EntailmentGate>>,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config, gate: None }
    }

    pub fn with_gate(mut self, gate: Arc<dyn EntailmentGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn gate_id(&self) -> Option<&str> {
        self.gate.as_deref().map(EntailmentGate::model_id)
    }

    /// Validate one mapping against its document and the vocabulary.
    pub async fn validate(
        &self,
        mapping: Mapping,
        doc: &CanonicalDoc,
        vocab: &Vocabulary,
    ) -> Verdicted {
        let Some(ordinal) = mapping.entry else {
            return Verdicted {
                mapping,
                verdict: Verdict::Rejected,
                reason: ReasonCode::Unmapped,
                adjusted_confidence: None,
            };
        };
        let Some(entry) = vocab.entry(ordinal) else {
            // Ordinal out of range can only mean a vocabulary/mapping
            // mismatch; treat like unmapped rather than panic
            return Verdicted {
                mapping,
                verdict: Verdict::Rejected,
                reason: ReasonCode::Unmapped,
                adjusted_confidence: None,
            };
        };

        // 1. Negation consistency
        if mapping.proposal.polarity.is_negated() && entry.polarity == PolarityRule::AffirmedOnly {
            return Verdicted {
                mapping,
                verdict: Verdict::Rejected,
                reason: ReasonCode::NegationConflict,
                adjusted_confidence: None,
            };
        }

        let context = doc.context_window(&mapping.proposal.span, self.config.context_window);

        // 2. Optional entailment gate
        let mut gate_skipped = false;
        if let Some(gate) = &self.gate {
            let timeout = Duration::from_millis(self.config.gate_timeout_ms);
            match tokio::time::timeout(timeout, gate.entailment(context, &entry.label)).await {
                Ok(Ok(p)) if p < self.config.min_entailment => {
                    return Verdicted {
                        mapping,
                        verdict: Verdict::Rejected,
                        reason: ReasonCode::EntailmentFailed,
                        adjusted_confidence: None,
                    };
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    warn!(model = gate.model_id(), %err, "entailment gate failed; skipping");
                    gate_skipped = true;
                }
                Err(_) => {
                    warn!(
                        model = gate.model_id(),
                        timeout_ms = self.config.gate_timeout_ms,
                        "entailment gate timed out; skipping"
                    );
                    gate_skipped = true;
                }
            }
        }

        // 3. Soft coherence: downgrades, never rejects
        let coherence = coherence_score(context, entry.terms(), entry.definition.as_deref());
        if coherence < self.config.min_coherence {
            let adjusted = mapping.fused * self.config.coherence_penalty;
            return Verdicted {
                mapping,
                verdict: Verdict::AcceptedWithAdjustment,
                reason: ReasonCode::LowCoherence,
                adjusted_confidence: Some(adjusted),
            };
        }

        Verdicted {
            mapping,
            verdict: Verdict::Accepted,
            reason: if gate_skipped {
                ReasonCode::GateSkipped
            } else {
                ReasonCode::Clean
            },
            adjusted_confidence: None,
        }
    }
}

/// Jaccard overlap between the context token set and the entry's
/// label/synonym/definition token set.
fn coherence_score<'a>(
    context: &str,
    terms: impl Iterator<Item = &'a str>,
    definition: Option<&str>,
) -> f32 {
    let context_tokens: BTreeSet<String> = tokenize(context).into_iter().collect();
    let mut entry_tokens: BTreeSet<String> = BTreeSet::new();
    for term in terms {
        entry_tokens.extend(tokenize(term));
    }
    if let Some(def) = definition {
        entry_tokens.extend(tokenize(def));
    }

    if context_tokens.is_empty() || entry_tokens.is_empty() {
        return 0.0;
    }
    let intersection = context_tokens.intersection(&entry_tokens).count() as f32;
    let union = context_tokens.union(&entry_tokens).count() as f32;
    intersection / union
}
