//! Labelled regex proposal source
//!
//! Deterministic and dependency-free: a set of named patterns compiled
//! once, scanned over canonical text. Useful on its own for well-formed
//! identifiers and as the smoke-test source.

use regex::RegexBuilder;

use crate::canonical::{CanonicalDoc, Span};
use crate::error::SourceError;
use crate::propose::{Proposal, ProposalSource, SourceKind};

/// One compiled pattern with its label.
#[derive(Debug)]
struct LabelledPattern {
    label: String,
    regex: regex::Regex,
}

/// Regex-based proposal source.
#[derive(Debug)]
pub struct RegexSource {
    patterns: Vec<LabelledPattern>,
    confidence: f32,
}

impl RegexSource {
    /// Compile labelled patterns, case-insensitively. Patterns are scanned
    /// in the given order; output order is normalized by the merge step.
    pub fn new(patterns: &[(&str, &str)]) -> Result<Self, SourceError> {
        let compiled = patterns
            .iter()
            .map(|(label, pattern)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|regex| LabelledPattern {
                        label: label.to_string(),
                        regex,
                    })
                    .map_err(|source| SourceError::Pattern {
                        label: label.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns: compiled,
            confidence: 1.0,
        })
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.label.as_str())
    }
}

impl ProposalSource for RegexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Regex
    }

    fn propose(&self, doc: &CanonicalDoc) -> Result<Vec<Proposal>, SourceError> {
        let text = doc.text();
        let mut out = Vec::new();

        for pattern in &self.patterns {
            for m in pattern.regex.find_iter(text) {
                if m.start() == m.end() {
                    continue;
                }
                // find_iter yields in-bounds matches on char boundaries
                if let Ok(span) = Span::new(m.start(), m.end(), text) {
                    out.push(Proposal::from_span(doc, span, SourceKind::Regex, self.confidence));
                }
            }
        }

        tracing::debug!(
            patterns = self.patterns.len(),
            proposals = out.len(),
            "regex source scan"
        );
        Ok(out)
    }
}
