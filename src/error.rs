//! Error taxonomy for the mapping pipeline
//!
//! One enum per failure domain, aggregated into [`PipelineError`]. The
//! severity contract follows the pipeline design: canonicalization errors
//! are fatal for a single document, source errors drop one source's output,
//! and "no candidate above the floor" is not an error at all (it is an
//! unmapped [`crate::mapper::Mapping`]).

use thiserror::Error;

/// Top-level error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Canonicalization error: {0}")]
    Canonicalize(#[from] CanonicalizeError),

    #[error("Proposal source error: {0}")]
    Source(#[from] SourceError),

    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Canonicalization failures. Fatal for the affected document: the document
/// is skipped and the failure recorded in its output record.
#[derive(Error, Debug)]
pub enum CanonicalizeError {
    #[error("Unmappable character {ch:?} at byte offset {offset}")]
    UnmappableChar { ch: char, offset: usize },

    #[error("Span [{start}, {end}) out of bounds for canonical text of length {len}")]
    SpanOutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Empty span at offset {start}")]
    EmptySpan { start: usize },

    #[error("Span boundary at byte {offset} is not a character boundary")]
    NotCharBoundary { offset: usize },
}

/// Proposal source failures. Non-fatal: the failing source's output is
/// dropped for the document and the remaining sources continue.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid pattern for label '{label}': {source}")]
    Pattern {
        label: String,
        #[source]
        source: regex::Error,
    },

    #[error("Neural extractor '{model}' failed: {message}")]
    Backend { model: String, message: String },

    #[error("Neural extractor '{model}' timed out after {timeout_ms}ms")]
    Timeout { model: String, timeout_ms: u64 },
}

/// Vocabulary construction and snapshot failures
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Duplicate vocabulary entry id '{id}'")]
    DuplicateId { id: String },

    #[error("Vocabulary entry '{id}' has an empty label")]
    EmptyLabel { id: String },

    #[error("Embedding dimension mismatch for entry '{id}': expected {expected}, got {got}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        got: usize,
    },

    #[error("Snapshot version mismatch: expected {expected}, got {got}")]
    SnapshotVersion { expected: u32, got: u32 },

    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot decode error: {0}")]
    Decode(#[from] bincode::Error),
}

/// Configuration loading and validation failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Fusion weights must sum to 1.0 (got {sum})")]
    WeightSum { sum: f32 },

    #[error(
        "Exact weight {exact} must be >= lexical {lexical} + vector {vector} \
         for exact-match dominance"
    )]
    ExactDominance {
        exact: f32,
        lexical: f32,
        vector: f32,
    },

    #[error("Score floor {floor} must be within [0, 1]")]
    FloorRange { floor: f32 },

    #[error("Invalid negation cue pattern: {0}")]
    CuePattern(#[from] regex::Error),

    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Artifact export failures
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encode error: {0}")]
    Csv(#[from] csv::Error),
}
