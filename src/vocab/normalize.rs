//! Text normalization for vocabulary matching
//!
//! The matching-side counterpart of canonicalization: NFKC fold, lowercase,
//! punctuation stripped to spaces, whitespace collapsed. Applied to both
//! vocabulary terms at index time and proposal surfaces at lookup time so
//! the two sides always agree.

use unicode_normalization::UnicodeNormalization;

/// Normalize a term for matching.
pub fn normalize_term(s: &str) -> String {
    let folded: String = s.nfkc().collect();

    let mut stripped = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_alphanumeric() {
            stripped.extend(c.to_lowercase());
        } else {
            stripped.push(' ');
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokenize into normalized tokens for index lookup and overlap scoring.
pub fn tokenize(s: &str) -> Vec<String> {
    normalize_term(s)
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(normalize_term("Bone Fracture (closed)"), "bone fracture closed");
        assert_eq!(normalize_term("T-cell, activated"), "t cell activated");
    }

    #[test]
    fn unicode_folding() {
        assert_eq!(normalize_term("Ｆｒａｃｔｕｒｅ"), "fracture");
        // NFKC keeps diacritics; "œdème" and "oedeme" stay distinct terms
        assert_eq!(normalize_term("Œdème"), "œdème");
    }

    #[test]
    fn whitespace_collapse() {
        assert_eq!(normalize_term("  bone   fracture  "), "bone fracture");
    }

    #[test]
    fn tokenize_splits_normalized_form() {
        assert_eq!(
            tokenize("Myocardial Infarction, acute"),
            vec!["myocardial", "infarction", "acute"]
        );
        assert!(tokenize("  ,;  ").is_empty());
    }
}
