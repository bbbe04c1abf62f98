//! Deterministic artifact writers
//!
//! JSONL for structured records, CSV for tabular consumers. Serde structs
//! have a fixed field order and the pipeline pre-sorts entities, so two
//! runs over the same input write byte-identical files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::ExportError;
use crate::pipeline::DocumentRecord;

fn create(path: &Path) -> Result<BufWriter<File>, ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

/// Write one JSON object per document, compact, in input order.
pub fn write_jsonl(records: &[DocumentRecord], path: &Path) -> Result<(), ExportError> {
    let mut w = create(path)?;
    for record in records {
        serde_json::to_writer(&mut w, record)?;
        w.write_all(b"\n").map_err(|source| ExportError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    w.flush().map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(records = records.len(), path = %path.display(), "wrote JSONL artifact");
    Ok(())
}

/// Write a single pretty-printed JSON artifact (summaries, manifests).
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ExportError> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, value)?;
    w.write_all(b"\n").and_then(|_| w.flush()).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// One row per entity, flattened for spreadsheet consumers.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    doc_id: &'a str,
    start: usize,
    end: usize,
    polarity: &'a str,
    text: &'a str,
    source: &'a str,
    entry_id: &'a str,
    label: &'a str,
    exact: f32,
    lexical: f32,
    vector: f32,
    fused: f32,
    verdict: &'a str,
    reason: &'a str,
}

/// Write the tabular artifact. Skipped documents contribute no rows; their
/// skip reasons live in the JSONL artifact.
pub fn write_csv(records: &[DocumentRecord], path: &Path) -> Result<(), ExportError> {
    let w = create(path)?;
    let mut csv = csv::Writer::from_writer(w);

    for record in records {
        for e in &record.entities {
            csv.serialize(CsvRow {
                doc_id: &record.doc_id,
                start: e.start,
                end: e.end,
                polarity: match e.polarity {
                    crate::canonical::Polarity::Affirmed => "affirmed",
                    crate::canonical::Polarity::Negated => "negated",
                },
                text: &e.text,
                source: e.source.as_str(),
                entry_id: e.entry_id.as_deref().unwrap_or(""),
                label: e.label.as_deref().unwrap_or(""),
                exact: e.exact,
                lexical: e.lexical,
                vector: e.vector,
                fused: e.fused,
                verdict: match e.verdict {
                    crate::validate::Verdict::Accepted => "accepted",
                    crate::validate::Verdict::AcceptedWithAdjustment => {
                        "accepted_with_adjustment"
                    }
                    crate::validate::Verdict::Rejected => "rejected",
                },
                reason: e.reason.as_str(),
            })?;
        }
    }
    csv.flush().map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), "wrote CSV artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::Pipeline;
    use crate::vocab::{VocabEntry, Vocabulary};
    use std::sync::Arc;

    async fn sample_records() -> Vec<DocumentRecord> {
        let vocab = Arc::new(
            Vocabulary::build(
                vec![VocabEntry::new("FRACTURE", "Fracture").with_synonyms(&["bone fracture"])],
                None,
            )
            .unwrap(),
        );
        let pipeline = Pipeline::new(PipelineConfig::default(), vocab).unwrap();
        let (records, _) = pipeline
            .process_corpus(vec![
                ("doc-1", "patient has a fracture"),
                ("doc-2", "no evidence of fracture"),
            ])
            .await;
        records
    }

    #[tokio::test]
    async fn jsonl_has_one_line_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/records.jsonl");
        let records = sample_records().await;

        write_jsonl(&records, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["doc_id"], "doc-1");
        assert_eq!(first["status"], "processed");
    }

    #[tokio::test]
    async fn csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let records = sample_records().await;

        write_csv(&records, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "doc_id,start,end,polarity,text,source,entry_id,label,exact,lexical,vector,fused,verdict,reason"
        );
        assert_eq!(lines.count(), 2);
        assert!(content.contains("negation_conflict"));
    }

    #[tokio::test]
    async fn writers_are_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");

        write_jsonl(&sample_records().await, &a).unwrap();
        write_jsonl(&sample_records().await, &b).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }
}
