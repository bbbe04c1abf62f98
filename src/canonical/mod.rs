//! Deterministic text canonicalization
//!
//! Produces the single normalized representation every downstream component
//! consumes. All spans in the system refer to canonical-text byte offsets;
//! the [`OffsetMap`] projects between raw and canonical coordinates and is
//! total by construction — canonicalization fails with a
//! [`CanonicalizeError`] rather than dropping characters silently.
//!
//! The transform is NFKC folding plus whitespace normalization (any Unicode
//! whitespace becomes one ASCII space, runs collapse, leading/trailing runs
//! drop). It is idempotent: canonical text canonicalizes to itself with an
//! identity map.

pub mod negation;
pub mod span;

pub use negation::{CueMatch, NegationRule};
pub use span::{Polarity, Span};

use unicode_normalization::UnicodeNormalization;

use crate::config::CanonicalConfig;
use crate::error::{CanonicalizeError, ConfigError};

/// Total projection between raw and canonical byte offsets.
///
/// Raw bytes inside a collapsed whitespace run project to the offset the
/// run collapsed into; canonical bytes project back to the raw byte that
/// produced them (the first byte of the originating character).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetMap {
    /// One entry per raw byte plus a final sentinel: canonical offset
    raw_to_canon: Vec<usize>,
    /// One entry per canonical byte plus a final sentinel: raw offset
    canon_to_raw: Vec<usize>,
}

impl OffsetMap {
    /// Project a raw byte offset into canonical coordinates.
    pub fn to_canonical(&self, raw_offset: usize) -> Option<usize> {
        self.raw_to_canon.get(raw_offset).copied()
    }

    /// Project a canonical byte offset back into raw coordinates.
    pub fn to_raw(&self, canon_offset: usize) -> Option<usize> {
        self.canon_to_raw.get(canon_offset).copied()
    }

    /// True when every offset maps to itself (already-canonical input).
    pub fn is_identity(&self) -> bool {
        self.raw_to_canon.len() == self.canon_to_raw.len()
            && self.raw_to_canon.iter().enumerate().all(|(i, &c)| i == c)
    }
}

/// A document in canonical form: the offset source of truth downstream.
#[derive(Debug, Clone)]
pub struct CanonicalDoc {
    raw: String,
    text: String,
    map: OffsetMap,
    cues: Vec<CueMatch>,
    negation_window: usize,
}

impl CanonicalDoc {
    /// Canonical text; all spans index into this.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Original raw text, kept for provenance.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn offset_map(&self) -> &OffsetMap {
        &self.map
    }

    /// Negation cue matches in canonical coordinates, document order.
    pub fn cues(&self) -> &[CueMatch] {
        &self.cues
    }

    /// Polarity of a span under the document's precomputed cue index.
    pub fn polarity_of(&self, span: &Span) -> Polarity {
        negation::polarity_in_window(&self.cues, span, self.negation_window)
    }

    /// Context window of `window` bytes on each side of the span, clamped
    /// to char boundaries.
    pub fn context_window(&self, span: &Span, window: usize) -> &str {
        let mut lo = span.start.saturating_sub(window);
        while lo > 0 && !self.text.is_char_boundary(lo) {
            lo -= 1;
        }
        let mut hi = (span.end + window).min(self.text.len());
        while hi < self.text.len() && !self.text.is_char_boundary(hi) {
            hi += 1;
        }
        &self.text[lo..hi]
    }
}

/// Canonicalizer: compiled negation rule plus the transform itself.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    rule: NegationRule,
}

impl Canonicalizer {
    pub fn new(cfg: &CanonicalConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            rule: NegationRule::compile(cfg)?,
        })
    }

    pub fn negation_rule(&self) -> &NegationRule {
        &self.rule
    }

    /// Canonicalize raw text, producing the canonical text, a total offset
    /// map, and the document's negation cue index.
    pub fn canonicalize(&self, raw: &str) -> Result<CanonicalDoc, CanonicalizeError> {
        let mut text = String::with_capacity(raw.len());
        let mut raw_to_canon = vec![0usize; raw.len() + 1];
        let mut canon_to_raw: Vec<usize> = Vec::with_capacity(raw.len() + 1);

        // Raw byte index of the first whitespace char of a pending
        // (not yet emitted) collapsed run
        let mut pending_space: Option<usize> = None;

        for (i, ch) in raw.char_indices() {
            if ch.is_whitespace() {
                // Whitespace bytes project to the offset of the single
                // space the run becomes (the end of text for a trailing
                // run); text does not grow until the run closes, so
                // text.len() is that offset for every byte of the run.
                for b in i..i + ch.len_utf8() {
                    raw_to_canon[b] = text.len();
                }
                if !text.is_empty() {
                    pending_space.get_or_insert(i);
                }
                continue;
            }
            if ch.is_control() {
                return Err(CanonicalizeError::UnmappableChar { ch, offset: i });
            }

            // Canonical offset where this char's output begins, known only
            // after any pending space is flushed ahead of it
            let mut out_start: Option<usize> = None;

            for folded in ch.nfkc() {
                if folded.is_whitespace() {
                    // NFKC can only surface whitespace from compatibility
                    // characters; treat it like raw whitespace
                    if !text.is_empty() {
                        pending_space.get_or_insert(i);
                    }
                    continue;
                }
                if folded.is_control() {
                    return Err(CanonicalizeError::UnmappableChar { ch, offset: i });
                }
                if let Some(ws_raw) = pending_space.take() {
                    text.push(' ');
                    canon_to_raw.push(ws_raw);
                }
                out_start.get_or_insert(text.len());
                let at = text.len();
                text.push(folded);
                for _ in at..text.len() {
                    canon_to_raw.push(i);
                }
            }

            // Chars folding to nothing but whitespace project like a run
            let start = out_start.unwrap_or(text.len());
            for b in i..i + ch.len_utf8() {
                raw_to_canon[b] = start;
            }
        }

        // Sentinels; bytes of a trailing whitespace run already point here
        raw_to_canon[raw.len()] = text.len();
        canon_to_raw.push(raw.len());

        debug_assert_eq!(canon_to_raw.len(), text.len() + 1);

        let cues = self.rule.find_cues(&text);
        tracing::debug!(
            raw_len = raw.len(),
            canonical_len = text.len(),
            cue_count = cues.len(),
            "canonicalized document"
        );

        Ok(CanonicalDoc {
            raw: raw.to_string(),
            text,
            map: OffsetMap {
                raw_to_canon,
                canon_to_raw,
            },
            cues,
            negation_window: self.rule.window(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonicalizer() -> Canonicalizer {
        Canonicalizer::new(&CanonicalConfig::default()).expect("default config compiles")
    }

    #[test]
    fn whitespace_collapses() {
        let doc = canonicalizer()
            .canonicalize("  no \t evidence \n of  fracture  ")
            .unwrap();
        assert_eq!(doc.text(), "no evidence of fracture");
    }

    #[test]
    fn nfkc_fold_applied() {
        // Full-width characters fold to ASCII under NFKC
        let doc = canonicalizer().canonicalize("ｆｒａｃｔｕｒｅ").unwrap();
        assert_eq!(doc.text(), "fracture");
    }

    #[test]
    fn idempotent_with_identity_map() {
        let c = canonicalizer();
        let doc = c.canonicalize("  Some   raw\u{00A0}text ").unwrap();
        let again = c.canonicalize(doc.text()).unwrap();
        assert_eq!(again.text(), doc.text());
        assert!(again.offset_map().is_identity());
    }

    #[test]
    fn control_chars_are_fatal() {
        let err = canonicalizer().canonicalize("abc\u{0007}def").unwrap_err();
        assert!(matches!(
            err,
            CanonicalizeError::UnmappableChar { ch: '\u{0007}', offset: 3 }
        ));
    }

    #[test]
    fn offset_map_is_total() {
        let raw = "  a  b c  ";
        let doc = canonicalizer().canonicalize(raw).unwrap();
        assert_eq!(doc.text(), "a b c");
        for off in 0..=raw.len() {
            let c = doc.offset_map().to_canonical(off).expect("total");
            assert!(c <= doc.text().len());
        }
        // Mapping is monotone
        let projected: Vec<usize> = (0..=raw.len())
            .map(|o| doc.offset_map().to_canonical(o).unwrap())
            .collect();
        assert!(projected.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn already_canonical_input_yields_identity_map() {
        let doc = canonicalizer().canonicalize("a b").unwrap();
        assert_eq!(doc.text(), "a b");
        assert!(doc.offset_map().is_identity());
        // the char after a space maps to itself, not to the space
        assert_eq!(doc.offset_map().to_canonical(2), Some(2));
        assert_eq!(doc.offset_map().to_raw(2), Some(2));
    }

    #[test]
    fn first_char_after_collapsed_run_maps_past_the_space() {
        let doc = canonicalizer().canonicalize("no   evidence").unwrap();
        assert_eq!(doc.text(), "no evidence");
        // raw 'e' of "evidence" sits at byte 5, canonical at byte 3
        assert_eq!(doc.offset_map().to_canonical(5), Some(3));
        assert_eq!(doc.offset_map().to_raw(3), Some(5));
    }

    #[test]
    fn roundtrip_through_collapsed_run() {
        let raw = "a   b";
        let doc = canonicalizer().canonicalize(raw).unwrap();
        assert_eq!(doc.text(), "a b");
        // canonical 'b' is at offset 2, raw 'b' at offset 4
        assert_eq!(doc.offset_map().to_raw(2), Some(4));
        // every raw byte of the run projects onto the single space
        assert_eq!(doc.offset_map().to_canonical(1), Some(1));
        assert_eq!(doc.offset_map().to_canonical(2), Some(1));
        assert_eq!(doc.offset_map().to_canonical(3), Some(1));
    }

    #[test]
    fn negation_index_precomputed() {
        let doc = canonicalizer()
            .canonicalize("no  evidence of fracture")
            .unwrap();
        let span = Span::new(15, 23, doc.text()).unwrap();
        assert_eq!(span.slice(doc.text()), "fracture");
        assert_eq!(doc.polarity_of(&span), Polarity::Negated);
    }

    #[test]
    fn context_window_clamps_to_bounds() {
        let doc = canonicalizer().canonicalize("tiny fracture text").unwrap();
        let span = Span::new(5, 13, doc.text()).unwrap();
        assert_eq!(doc.context_window(&span, 1000), doc.text());
        assert_eq!(doc.context_window(&span, 0), "fracture");
    }
}
