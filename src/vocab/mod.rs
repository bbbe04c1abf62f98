//! Target vocabulary: entries, lookup indexes, and snapshot persistence
//!
//! The [`Vocabulary`] is compiled once from entry definitions and is
//! read-only afterwards — the only shared resource in the pipeline, safe
//! for concurrent reads behind an `Arc`. It can be serialized to a
//! versioned binary snapshot so large vocabularies are compiled once and
//! reloaded cheaply.

pub mod bm25;
pub mod embed;
pub mod normalize;

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smallvec::SmallVec;

use crate::error::VocabError;
use bm25::Bm25Index;
use embed::{l2_normalize, Embedder};
use normalize::{normalize_term, tokenize};

/// Snapshot format version - increment when struct layout changes
pub const SNAPSHOT_VERSION: u32 = 1;

/// Polarity contract of an entry: whether it may be mapped from a negated
/// span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolarityRule {
    /// Mappable from affirmed and negated spans alike
    Any,
    /// A negated span mapping here is a validation conflict
    AffirmedOnly,
}

/// One target concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabEntry {
    /// Stable canonical identifier (e.g. an ontology accession)
    pub id: String,
    /// Display label
    pub label: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default = "PolarityRule::affirmed_only")]
    pub polarity: PolarityRule,
}

impl PolarityRule {
    fn affirmed_only() -> Self {
        PolarityRule::AffirmedOnly
    }
}

impl VocabEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            synonyms: Vec::new(),
            definition: None,
            polarity: PolarityRule::AffirmedOnly,
        }
    }

    pub fn with_synonyms(mut self, synonyms: &[&str]) -> Self {
        self.synonyms = synonyms.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_polarity(mut self, polarity: PolarityRule) -> Self {
        self.polarity = polarity;
        self
    }

    /// All matchable terms: label first, then synonyms.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.label.as_str()).chain(self.synonyms.iter().map(String::as_str))
    }
}

/// Compiled vocabulary with lookup indexes and optional dense vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Content hash over the entry list, for cache invalidation and the
    /// run manifest
    hash: String,
    entries: Vec<VocabEntry>,

    /// Normalized label/synonym -> entry ordinals
    exact_index: HashMap<String, SmallVec<[u32; 4]>>,
    /// Normalized token -> entry ordinals
    token_index: HashMap<String, SmallVec<[u32; 8]>>,
    /// BM25 index over per-entry term bags
    bm25: Bm25Index,

    /// L2-normalized per-entry vectors, present when compiled with an
    /// embedder
    vectors: Option<Vec<Vec<f32>>>,
    embedder_id: Option<String>,
}

impl Vocabulary {
    /// Compile a vocabulary. With an embedder, per-entry vectors are
    /// computed in parallel (order-preserving) and L2-normalized.
    pub fn build(
        entries: Vec<VocabEntry>,
        embedder: Option<&dyn Embedder>,
    ) -> Result<Self, VocabError> {
        let mut seen: HashMap<&str, ()> = HashMap::with_capacity(entries.len());
        for e in &entries {
            if e.label.trim().is_empty() {
                return Err(VocabError::EmptyLabel { id: e.id.clone() });
            }
            if seen.insert(e.id.as_str(), ()).is_some() {
                return Err(VocabError::DuplicateId { id: e.id.clone() });
            }
        }

        let mut exact_index: HashMap<String, SmallVec<[u32; 4]>> = HashMap::new();
        let mut token_index: HashMap<String, SmallVec<[u32; 8]>> = HashMap::new();
        let mut term_bags: Vec<Vec<String>> = Vec::with_capacity(entries.len());

        for (ordinal, entry) in entries.iter().enumerate() {
            let ordinal = ordinal as u32;
            let mut bag: Vec<String> = Vec::new();
            for term in entry.terms() {
                let norm = normalize_term(term);
                if norm.is_empty() {
                    continue;
                }
                let ids = exact_index.entry(norm.clone()).or_default();
                if !ids.contains(&ordinal) {
                    ids.push(ordinal);
                }
                for token in tokenize(term) {
                    let ids = token_index.entry(token.clone()).or_default();
                    if !ids.contains(&ordinal) {
                        ids.push(ordinal);
                    }
                    bag.push(token);
                }
            }
            term_bags.push(bag);
        }

        let bm25 = Bm25Index::build(&term_bags);
        let hash = content_hash(&entries);

        let (vectors, embedder_id) = match embedder {
            Some(embedder) => {
                let dim = embedder.dim();
                let vectors = entries
                    .par_iter()
                    .map(|entry| {
                        let text = entry.terms().collect::<Vec<_>>().join(" ");
                        let mut v = embedder.embed(&text);
                        if v.len() != dim {
                            return Err(VocabError::DimensionMismatch {
                                id: entry.id.clone(),
                                expected: dim,
                                got: v.len(),
                            });
                        }
                        l2_normalize(&mut v);
                        Ok(v)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (Some(vectors), Some(embedder.model_id().to_string()))
            }
            None => (None, None),
        };

        tracing::info!(
            entries = entries.len(),
            exact_terms = exact_index.len(),
            tokens = token_index.len(),
            embedder = embedder_id.as_deref().unwrap_or("none"),
            "compiled vocabulary"
        );

        Ok(Self {
            hash,
            entries,
            exact_index,
            token_index,
            bm25,
            vectors,
            embedder_id,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn embedder_id(&self) -> Option<&str> {
        self.embedder_id.as_deref()
    }

    pub fn entry(&self, ordinal: u32) -> Option<&VocabEntry> {
        self.entries.get(ordinal as usize)
    }

    pub fn entry_by_id(&self, id: &str) -> Option<&VocabEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    /// Exact lookup by pre-normalized term.
    pub fn lookup_exact(&self, norm: &str) -> Option<&SmallVec<[u32; 4]>> {
        self.exact_index.get(norm)
    }

    /// Token lookup for overlap scoring.
    pub fn lookup_token(&self, token: &str) -> Option<&SmallVec<[u32; 8]>> {
        self.token_index.get(token)
    }

    pub fn bm25(&self) -> &Bm25Index {
        &self.bm25
    }

    /// Compiled vector for an entry, if the vocabulary was built with an
    /// embedder.
    pub fn vector(&self, ordinal: u32) -> Option<&[f32]> {
        self.vectors
            .as_ref()
            .and_then(|vs| vs.get(ordinal as usize))
            .map(Vec::as_slice)
    }

    pub fn has_vectors(&self) -> bool {
        self.vectors.is_some()
    }

    /// Save a versioned binary snapshot.
    pub fn save(&self, path: &Path) -> Result<(), VocabError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            vocabulary: self.clone(),
        };
        std::fs::write(path, bincode::serialize(&snapshot)?)?;
        Ok(())
    }

    /// Load a snapshot, rejecting version mismatches loudly.
    pub fn load(path: &Path) -> Result<Self, VocabError> {
        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(VocabError::SnapshotVersion {
                expected: SNAPSHOT_VERSION,
                got: snapshot.version,
            });
        }
        Ok(snapshot.vocabulary)
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    vocabulary: Vocabulary,
}

/// SHA-256 over the stable JSON form of the entry list.
fn content_hash(entries: &[VocabEntry]) -> String {
    let json = serde_json::to_string(entries).expect("entries serialize");
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed::HashedBowEmbedder;

    pub(crate) fn clinical_entries() -> Vec<VocabEntry> {
        vec![
            VocabEntry::new("C0016658", "Fracture")
                .with_synonyms(&["bone fracture", "broken bone"])
                .with_definition("A break in the continuity of a bone"),
            VocabEntry::new("C0027051", "Myocardial Infarction")
                .with_synonyms(&["heart attack", "MI"]),
            VocabEntry::new("C0032285", "Pneumonia").with_polarity(PolarityRule::Any),
        ]
    }

    #[test]
    fn build_and_lookup() {
        let vocab = Vocabulary::build(clinical_entries(), None).unwrap();
        assert_eq!(vocab.len(), 3);

        let hits = vocab.lookup_exact("bone fracture").expect("synonym indexed");
        assert_eq!(hits.as_slice(), &[0]);

        let hits = vocab.lookup_token("heart").expect("token indexed");
        assert_eq!(hits.as_slice(), &[1]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut entries = clinical_entries();
        entries.push(VocabEntry::new("C0016658", "Duplicate"));
        assert!(matches!(
            Vocabulary::build(entries, None),
            Err(VocabError::DuplicateId { .. })
        ));
    }

    #[test]
    fn empty_label_rejected() {
        let entries = vec![VocabEntry::new("X1", "  ")];
        assert!(matches!(
            Vocabulary::build(entries, None),
            Err(VocabError::EmptyLabel { .. })
        ));
    }

    #[test]
    fn hash_tracks_content() {
        let a = Vocabulary::build(clinical_entries(), None).unwrap();
        let b = Vocabulary::build(clinical_entries(), None).unwrap();
        assert_eq!(a.hash(), b.hash());

        let mut entries = clinical_entries();
        entries[0].synonyms.push("greenstick fracture".into());
        let c = Vocabulary::build(entries, None).unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn vectors_compiled_and_normalized() {
        let embedder = HashedBowEmbedder::default();
        let vocab = Vocabulary::build(clinical_entries(), Some(&embedder)).unwrap();
        assert!(vocab.has_vectors());
        let v = vocab.vector(0).expect("vector for entry 0");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.bin");

        let embedder = HashedBowEmbedder::default();
        let vocab = Vocabulary::build(clinical_entries(), Some(&embedder)).unwrap();
        vocab.save(&path).unwrap();

        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded.hash(), vocab.hash());
        assert_eq!(loaded.len(), vocab.len());
        assert!(loaded.has_vectors());
        assert_eq!(loaded.embedder_id(), Some("hashed-bow"));
    }

    #[test]
    fn bm25_reachable_through_vocab() {
        let vocab = Vocabulary::build(clinical_entries(), None).unwrap();
        let results = vocab.bm25().search("fracture of bone", 5);
        assert_eq!(results[0].0, 0);
    }
}
