//! Negation cue detection over canonical text
//!
//! A fixed cue set is compiled into one alternation matched on word
//! boundaries. Cue positions are computed once per document at
//! canonicalization time; polarity queries are then pure window checks, so
//! two runs on the same input always agree.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::canonical::span::{Polarity, Span};
use crate::config::CanonicalConfig;
use crate::error::ConfigError;

/// Byte range of one negation cue match in canonical text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueMatch {
    pub start: usize,
    pub end: usize,
}

/// Compiled negation cue matcher
#[derive(Debug, Clone)]
pub struct NegationRule {
    pattern: Regex,
    window: usize,
}

impl NegationRule {
    /// Compile the cue set into a single word-bounded alternation.
    ///
    /// Longer cues must come first in the alternation so that
    /// "no evidence of" wins over "no"; the default cue list is ordered
    /// that way and user-supplied lists are sorted here by length.
    pub fn compile(cfg: &CanonicalConfig) -> Result<Self, ConfigError> {
        let mut cues: Vec<&str> = cfg
            .negation_cues
            .iter()
            .map(String::as_str)
            .filter(|c| !c.trim().is_empty())
            .collect();
        cues.sort_by_key(|c| std::cmp::Reverse(c.len()));

        let alternation = cues
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            pattern,
            window: cfg.negation_window,
        })
    }

    /// All cue matches in document order.
    pub fn find_cues(&self, canonical_text: &str) -> Vec<CueMatch> {
        self.pattern
            .find_iter(canonical_text)
            .map(|m| CueMatch {
                start: m.start(),
                end: m.end(),
            })
            .collect()
    }

    /// Polarity of a span given the precomputed cue positions.
    pub fn polarity(&self, cues: &[CueMatch], span: &Span) -> Polarity {
        polarity_in_window(cues, span, self.window)
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Negated iff any cue overlaps the window extending `window` bytes on each
/// side of the span.
pub fn polarity_in_window(cues: &[CueMatch], span: &Span, window: usize) -> Polarity {
    let lo = span.start.saturating_sub(window);
    let hi = span.end + window;
    if cues.iter().any(|c| c.start < hi && c.end > lo) {
        Polarity::Negated
    } else {
        Polarity::Affirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> NegationRule {
        NegationRule::compile(&CanonicalConfig::default()).expect("compiles")
    }

    #[test]
    fn finds_simple_cue() {
        let cues = rule().find_cues("no evidence of fracture");
        assert_eq!(cues.len(), 1);
        assert_eq!((cues[0].start, cues[0].end), (0, 14));
    }

    #[test]
    fn longest_cue_wins() {
        // "no evidence of" should match as one cue, not bare "no"
        let text = "no evidence of infection, negative for sepsis";
        let cues = rule().find_cues(text);
        assert_eq!(cues.len(), 2);
        assert_eq!(&text[cues[0].start..cues[0].end], "no evidence of");
        assert_eq!(&text[cues[1].start..cues[1].end], "negative for");
    }

    #[test]
    fn word_boundary_respected() {
        // "nothing" and "knot" must not trip the "no"/"not" cues
        let cues = rule().find_cues("nothing about the knot");
        assert!(cues.is_empty());
    }

    #[test]
    fn span_inside_window_is_negated() {
        let r = rule();
        let text = "no evidence of fracture";
        let cues = r.find_cues(text);
        let span = Span::new(15, 23, text).unwrap();
        assert_eq!(r.polarity(&cues, &span), Polarity::Negated);
    }

    #[test]
    fn span_beyond_window_is_affirmed() {
        let r = rule();
        let filler = "x".repeat(100);
        let text = format!("not here {filler} fracture");
        let start = text.len() - 8;
        let cues = r.find_cues(&text);
        assert!(!cues.is_empty());
        let span = Span::new(start, text.len(), &text).unwrap();
        assert_eq!(r.polarity(&cues, &span), Polarity::Affirmed);
    }

    #[test]
    fn no_cues_means_affirmed() {
        let r = rule();
        let text = "clear fracture of the distal radius";
        let cues = r.find_cues(text);
        let span = Span::new(6, 14, text).unwrap();
        assert!(cues.is_empty());
        assert_eq!(r.polarity(&cues, &span), Polarity::Affirmed);
    }
}
