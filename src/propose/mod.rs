//! Candidate span proposal sources
//!
//! Three source kinds produce proposals independently from the canonical
//! text: labelled regexes, the vocabulary lexicon scan, and an optional
//! neural extractor. No source observes another's output, so the merge is
//! independent of source evaluation order.

pub mod lexicon;
pub mod neural;
pub mod regex_source;

pub use lexicon::LexiconSource;
pub use neural::{NeuralExtractor, NeuralSource, NeuralSpan};
pub use regex_source::RegexSource;

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalDoc, Polarity, Span};
use crate::error::SourceError;

/// Which source produced a proposal. Ordering doubles as the dedup
/// priority: regex beats lexicon beats neural for identical spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Regex,
    Lexicon,
    Neural,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Regex => "regex",
            SourceKind::Lexicon => "lexicon",
            SourceKind::Neural => "neural",
        }
    }
}

/// A candidate entity span. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub span: Span,
    /// Surface text, resolved from canonical text at construction
    pub text: String,
    pub polarity: Polarity,
    pub source: SourceKind,
    /// Source confidence in `[0, 1]`
    pub confidence: f32,
}

impl Proposal {
    /// Build a proposal from a validated span, resolving surface text and
    /// polarity against the canonical document.
    pub fn from_span(doc: &CanonicalDoc, span: Span, source: SourceKind, confidence: f32) -> Self {
        Self {
            text: span.slice(doc.text()).to_string(),
            polarity: doc.polarity_of(&span),
            span,
            source,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A synchronous, deterministic proposal source. Reads only the canonical
/// document; implementations must not hold mutable state across calls.
pub trait ProposalSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn propose(&self, doc: &CanonicalDoc) -> Result<Vec<Proposal>, SourceError>;
}

/// Merge per-source outputs into one deterministic stream: sort by
/// `(start, end, source priority, text)` and keep the highest-priority
/// source for exactly duplicated spans.
pub fn merge_proposals(mut proposals: Vec<Proposal>) -> Vec<Proposal> {
    proposals.sort_by(|a, b| {
        a.span
            .cmp(&b.span)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.text.cmp(&b.text))
    });
    proposals.dedup_by(|next, kept| next.span == kept.span);
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Canonicalizer;
    use crate::config::CanonicalConfig;

    fn doc(text: &str) -> CanonicalDoc {
        Canonicalizer::new(&CanonicalConfig::default())
            .unwrap()
            .canonicalize(text)
            .unwrap()
    }

    fn proposal(doc: &CanonicalDoc, start: usize, end: usize, source: SourceKind) -> Proposal {
        let span = Span::new(start, end, doc.text()).unwrap();
        Proposal::from_span(doc, span, source, 1.0)
    }

    #[test]
    fn merge_is_order_independent() {
        let d = doc("fracture and pneumonia observed");
        let a = proposal(&d, 0, 8, SourceKind::Lexicon);
        let b = proposal(&d, 13, 22, SourceKind::Regex);

        let merged_ab = merge_proposals(vec![a.clone(), b.clone()]);
        let merged_ba = merge_proposals(vec![b, a]);
        assert_eq!(merged_ab, merged_ba);
        assert_eq!(merged_ab[0].span.start, 0);
    }

    #[test]
    fn duplicate_span_keeps_priority_source() {
        let d = doc("fracture observed");
        let lex = proposal(&d, 0, 8, SourceKind::Lexicon);
        let neural = proposal(&d, 0, 8, SourceKind::Neural);
        let rx = proposal(&d, 0, 8, SourceKind::Regex);

        let merged = merge_proposals(vec![neural, lex, rx]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, SourceKind::Regex);
    }

    #[test]
    fn polarity_stamped_from_document() {
        let d = doc("no evidence of fracture");
        let p = proposal(&d, 15, 23, SourceKind::Lexicon);
        assert_eq!(p.text, "fracture");
        assert_eq!(p.polarity, Polarity::Negated);
    }

    #[test]
    fn confidence_clamped() {
        let d = doc("fracture");
        let span = Span::new(0, 8, d.text()).unwrap();
        let p = Proposal::from_span(&d, span, SourceKind::Neural, 3.0);
        assert_eq!(p.confidence, 1.0);
    }
}
