//! BM25 Okapi scoring over vocabulary terms
//!
//! A small static inverted index: one "document" per vocabulary entry,
//! built from its label and synonyms. Built once at vocabulary compile
//! time; concurrent reads only afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vocab::normalize::tokenize;

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    /// Ordinal of the vocabulary entry
    entry: u32,
    term_frequency: u32,
}

/// Inverted index keyed by normalized token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bm25Index {
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: Vec<u32>,
    total_length: u64,
}

impl Bm25Index {
    /// Build from per-entry term bags, in entry-ordinal order.
    pub fn build(term_bags: &[Vec<String>]) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(term_bags.len());
        let mut total_length = 0u64;

        for (ordinal, bag) in term_bags.iter().enumerate() {
            let mut counts: HashMap<&str, u32> = HashMap::new();
            for token in bag {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
            doc_lengths.push(bag.len() as u32);
            total_length += bag.len() as u64;

            // Deterministic posting order within a token list
            let mut counted: Vec<(&str, u32)> = counts.into_iter().collect();
            counted.sort_unstable_by_key(|(t, _)| *t);
            for (token, tf) in counted {
                postings.entry(token.to_string()).or_default().push(Posting {
                    entry: ordinal as u32,
                    term_frequency: tf,
                });
            }
        }

        Self {
            postings,
            doc_lengths,
            total_length,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    fn average_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.doc_lengths.len() as f32
        }
    }

    /// Score a query against all entries, returning the top `k` as
    /// `(entry ordinal, score)` ordered by descending score then ascending
    /// ordinal (total order, reproducible).
    pub fn search(&self, query: &str, k: usize) -> Vec<(u32, f32)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.doc_lengths.is_empty() {
            return Vec::new();
        }

        let avgdl = self.average_doc_length();
        let n = self.doc_lengths.len() as f32;
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for token in &query_tokens {
            if let Some(postings) = self.postings.get(token) {
                let df = postings.len() as f32;
                // IDF: log((N - df + 0.5) / (df + 0.5) + 1)
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

                for posting in postings {
                    let dl = self.doc_lengths[posting.entry as usize] as f32;
                    let tf = posting.term_frequency as f32;
                    let tf_norm = (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / avgdl));
                    *scores.entry(posting.entry).or_insert(0.0) += idf * tf_norm;
                }
            }
        }

        let mut results: Vec<(u32, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(k);
        results
    }
}
