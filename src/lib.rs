//! spanlink - deterministic text-to-entity mapping
//!
//! Maps free text onto a fixed target vocabulary in four stages, each
//! consuming only canonical-text offsets:
//!
//! 1. **Canonicalize**: one normalized text per document, with a total
//!    raw/canonical offset map and a precomputed negation index.
//! 2. **Propose**: independent candidate-span sources (regex, lexicon,
//!    optional neural extractor).
//! 3. **Map**: exact + BM25 + vector sub-scores fused by fixed weights
//!    into at most one vocabulary entry per proposal.
//! 4. **Validate**: negation consistency, optional entailment gating, and
//!    soft coherence scoring, yielding a verdict with a reason code.
//!
//! Everything except the injected neural collaborators is deterministic:
//! two runs over the same input produce byte-identical artifacts.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use spanlink::config::PipelineConfig;
//! use spanlink::pipeline::Pipeline;
//! use spanlink::vocab::{VocabEntry, Vocabulary};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), spanlink::error::PipelineError> {
//! let vocab = Arc::new(Vocabulary::build(
//!     vec![VocabEntry::new("FRACTURE", "Fracture")],
//!     None,
//! )?);
//! let pipeline = Pipeline::new(PipelineConfig::default(), vocab)?;
//!
//! let record = pipeline
//!     .process_document("doc-1", "no evidence of fracture")
//!     .await;
//! assert_eq!(record.entities[0].reason.as_str(), "negation_conflict");
//! # Ok(())
//! # }
//! ```

pub mod canonical;
pub mod config;
pub mod error;
pub mod export;
pub mod manifest;
pub mod mapper;
pub mod pipeline;
pub mod propose;
pub mod validate;
pub mod vocab;

pub use canonical::{CanonicalDoc, Canonicalizer, OffsetMap, Polarity, Span};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use mapper::{HybridMapper, Mapping, ScoreBreakdown};
pub use pipeline::{DocumentRecord, EntityRecord, Pipeline, RunStats};
pub use propose::{Proposal, ProposalSource, SourceKind};
pub use validate::{ReasonCode, Validator, Verdict, Verdicted};
pub use vocab::{PolarityRule, VocabEntry, Vocabulary};
