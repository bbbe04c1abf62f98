//! Spans over canonical text

use serde::{Deserialize, Serialize};

use crate::error::CanonicalizeError;

/// Negation polarity of a span, fixed at proposal time from the document's
/// negation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Affirmed,
    Negated,
}

impl Polarity {
    pub fn is_negated(self) -> bool {
        matches!(self, Polarity::Negated)
    }
}

/// A half-open byte range `[start, end)` into canonical text.
///
/// Invariant: `0 <= start < end <= text.len()` and both ends sit on UTF-8
/// character boundaries. Construction goes through [`Span::new`], which
/// checks the invariant against the text the span refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span, validating it against the canonical text it indexes.
    pub fn new(start: usize, end: usize, text: &str) -> Result<Self, CanonicalizeError> {
        if start >= end {
            return if start == end {
                Err(CanonicalizeError::EmptySpan { start })
            } else {
                Err(CanonicalizeError::SpanOutOfBounds {
                    start,
                    end,
                    len: text.len(),
                })
            };
        }
        if end > text.len() {
            return Err(CanonicalizeError::SpanOutOfBounds {
                start,
                end,
                len: text.len(),
            });
        }
        if !text.is_char_boundary(start) {
            return Err(CanonicalizeError::NotCharBoundary { offset: start });
        }
        if !text.is_char_boundary(end) {
            return Err(CanonicalizeError::NotCharBoundary { offset: end });
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        false // enforced non-empty at construction
    }

    /// Byte overlap test against another span
    pub fn overlaps(&self, other: &Span) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }

    /// Resolve the span against its canonical text.
    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}
