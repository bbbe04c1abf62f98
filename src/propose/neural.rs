//! Optional neural proposal source
//!
//! The extractor model is an injected collaborator behind the
//! [`NeuralExtractor`] trait; the crate never loads a model itself. It is
//! the only source permitted nondeterminism, and the only one expected to
//! block on external compute, so every call goes through a timeout. A
//! timeout or backend failure degrades to "no proposals" for the document —
//! the other sources are unaffected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::canonical::{CanonicalDoc, Span};
use crate::config::NeuralConfig;
use crate::error::SourceError;
use crate::propose::{Proposal, SourceKind};

/// A raw span as reported by the extractor backend, in canonical-text byte
/// offsets. Bounds are re-validated here; backends are not trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralSpan {
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

/// External span-extraction model.
#[async_trait]
pub trait NeuralExtractor: Send + Sync {
    /// Identifier recorded in the manifest and in error reports.
    fn model_id(&self) -> &str;

    async fn extract(&self, canonical_text: &str) -> Result<Vec<NeuralSpan>, SourceError>;
}

/// Timeout wrapper turning an extractor into a proposal producer.
pub struct NeuralSource {
    extractor: Arc<dyn NeuralExtractor>,
    config: NeuralConfig,
}

impl NeuralSource {
    pub fn new(extractor: Arc<dyn NeuralExtractor>, config: NeuralConfig) -> Self {
        Self { extractor, config }
    }

    pub fn kind(&self) -> SourceKind {
        SourceKind::Neural
    }

    /// Run the extractor behind the configured timeout. Errors and
    /// timeouts surface as `Err` so the pipeline can record the dropped
    /// source; invalid spans from the backend are discarded individually.
    pub async fn propose(&self, doc: &CanonicalDoc) -> Result<Vec<Proposal>, SourceError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let raw = match tokio::time::timeout(timeout, self.extractor.extract(doc.text())).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    model = self.extractor.model_id(),
                    timeout_ms = self.config.timeout_ms,
                    "neural extractor timed out"
                );
                return Err(SourceError::Timeout {
                    model: self.extractor.model_id().to_string(),
                    timeout_ms: self.config.timeout_ms,
                });
            }
        };

        let text = doc.text();
        let mut out = Vec::new();
        for ns in raw {
            if ns.confidence < self.config.min_confidence {
                continue;
            }
            match Span::new(ns.start, ns.end, text) {
                Ok(span) => {
                    out.push(Proposal::from_span(doc, span, SourceKind::Neural, ns.confidence));
                }
                Err(err) => {
                    warn!(
                        model = self.extractor.model_id(),
                        start = ns.start,
                        end = ns.end,
                        %err,
                        "dropping invalid neural span"
                    );
                }
            }
        }
        Ok(out)
    }
}
