//! Lexicon proposal source: n-gram scan against the vocabulary
//!
//! Scans canonical text with a sliding n-gram window, looking terms up in
//! the vocabulary's exact index and falling back to token-overlap scoring.
//! Greedy non-overlapping selection keeps the strongest spans. Fully
//! deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use crate::canonical::{CanonicalDoc, Span};
use crate::config::LexiconConfig;
use crate::error::SourceError;
use crate::propose::{Proposal, ProposalSource, SourceKind};
use crate::vocab::normalize::{normalize_term, tokenize};
use crate::vocab::Vocabulary;

/// Vocabulary-backed proposal source.
pub struct LexiconSource {
    vocab: Arc<Vocabulary>,
    config: LexiconConfig,
}

/// An intermediate candidate span before non-overlap selection.
struct ScanCandidate {
    span: Span,
    score: f32,
}

impl LexiconSource {
    pub fn new(vocab: Arc<Vocabulary>, config: LexiconConfig) -> Self {
        Self { vocab, config }
    }

    /// Tokenize with byte positions: `(start, end, normalized token)`.
    fn tokenize_with_positions(text: &str) -> Vec<(usize, usize, String)> {
        let mut result = Vec::new();
        let mut in_word = false;
        let mut word_start = 0;

        for (i, c) in text.char_indices() {
            if c.is_alphanumeric() {
                if !in_word {
                    word_start = i;
                    in_word = true;
                }
            } else if in_word {
                result.push((word_start, i, text[word_start..i].to_lowercase()));
                in_word = false;
            }
        }
        if in_word {
            result.push((word_start, text.len(), text[word_start..].to_lowercase()));
        }

        result
    }

    /// Score one n-gram against the vocabulary: exact term hit scores 1.0,
    /// otherwise token overlap `hits / max(|query|, |entry|)` filtered by
    /// the overlap floor. The max denominator penalizes n-grams that drag
    /// in tokens the entry does not have.
    fn score_ngram(&self, normalized: &str, tokens: &[String]) -> f32 {
        if self.vocab.lookup_exact(normalized).is_some() {
            return 1.0;
        }

        let mut entry_hits: HashMap<u32, usize> = HashMap::new();
        for token in tokens {
            if let Some(ids) = self.vocab.lookup_token(token) {
                for id in ids.iter().take(50) {
                    *entry_hits.entry(*id).or_insert(0) += 1;
                }
            }
        }
        if entry_hits.is_empty() {
            return 0.0;
        }

        let mut best = 0.0f32;
        for (id, hits) in entry_hits {
            let Some(entry) = self.vocab.entry(id) else {
                continue;
            };
            let entry_tokens = tokenize(&entry.label);
            if entry_tokens.is_empty() {
                continue;
            }
            let max_len = tokens.len().max(entry_tokens.len());
            let overlap = hits as f32 / max_len as f32;
            if overlap >= self.config.min_overlap && overlap > best {
                best = overlap;
            }
        }
        best
    }

    /// Greedy non-overlapping selection by score desc, then length desc,
    /// then position asc for a total order.
    fn select_non_overlapping(mut candidates: Vec<ScanCandidate>) -> Vec<ScanCandidate> {
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.span.len().cmp(&a.span.len()))
                .then_with(|| a.span.cmp(&b.span))
        });

        let mut selected: Vec<ScanCandidate> = Vec::new();
        for candidate in candidates {
            if !selected.iter().any(|s| candidate.span.overlaps(&s.span)) {
                selected.push(candidate);
            }
        }
        selected.sort_by_key(|c| c.span);
        selected
    }
}

impl ProposalSource for LexiconSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Lexicon
    }

    fn propose(&self, doc: &CanonicalDoc) -> Result<Vec<Proposal>, SourceError> {
        let text = doc.text();
        let words = Self::tokenize_with_positions(text);
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<ScanCandidate> = Vec::new();

        for start_idx in 0..words.len() {
            let max_len = self.config.max_ngram.min(words.len() - start_idx);
            for ngram_len in 1..=max_len {
                let end_idx = start_idx + ngram_len;
                let char_start = words[start_idx].0;
                let char_end = words[end_idx - 1].1;

                let surface = &text[char_start..char_end];
                let normalized = normalize_term(surface);
                if normalized.is_empty() {
                    continue;
                }
                let tokens: Vec<String> =
                    words[start_idx..end_idx].iter().map(|(_, _, t)| t.clone()).collect();

                let score = self.score_ngram(&normalized, &tokens);
                if score >= self.config.min_score {
                    if let Ok(span) = Span::new(char_start, char_end, text) {
                        candidates.push(ScanCandidate { span, score });
                    }
                }
            }
        }

        let selected = Self::select_non_overlapping(candidates);
        tracing::debug!(proposals = selected.len(), "lexicon source scan");

        Ok(selected
            .into_iter()
            .map(|c| Proposal::from_span(doc, c.span, SourceKind::Lexicon, c.score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{Canonicalizer, Polarity};
    use crate::config::CanonicalConfig;
    use crate::vocab::{PolarityRule, VocabEntry};

    fn vocab() -> Arc<Vocabulary> {
        let entries = vec![
            VocabEntry::new("C0016658", "Fracture").with_synonyms(&["bone fracture"]),
            VocabEntry::new("C0027051", "Myocardial Infarction")
                .with_synonyms(&["heart attack"]),
            VocabEntry::new("C0032285", "Pneumonia").with_polarity(PolarityRule::Any),
        ];
        Arc::new(Vocabulary::build(entries, None).unwrap())
    }

    fn source() -> LexiconSource {
        LexiconSource::new(vocab(), LexiconConfig::default())
    }

    fn doc(text: &str) -> CanonicalDoc {
        Canonicalizer::new(&CanonicalConfig::default())
            .unwrap()
            .canonicalize(text)
            .unwrap()
    }

    #[test]
    fn finds_single_term() {
        let proposals = source().propose(&doc("patient presents with fracture")).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].text, "fracture");
        assert_eq!(proposals[0].confidence, 1.0);
    }

    #[test]
    fn prefers_longer_exact_match() {
        let proposals = source().propose(&doc("suspected bone fracture here")).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].text, "bone fracture");
    }

    #[test]
    fn finds_multiple_terms_in_position_order() {
        let proposals = source()
            .propose(&doc("heart attack then pneumonia"))
            .unwrap();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].text, "heart attack");
        assert_eq!(proposals[1].text, "pneumonia");
    }

    #[test]
    fn no_hits_no_proposals() {
        assert!(source().propose(&doc("entirely unrelated words")).unwrap().is_empty());
        assert!(source().propose(&doc("")).unwrap().is_empty());
    }

    #[test]
    fn negation_stamped() {
        let proposals = source().propose(&doc("no evidence of fracture")).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].polarity, Polarity::Negated);
    }

    #[test]
    fn byte_offsets_resolve_in_canonical_text() {
        let d = doc("The patient has pneumonia today");
        let proposals = source().propose(&d).unwrap();
        let p = &proposals[0];
        assert_eq!(p.span.slice(d.text()), p.text);
    }
}
