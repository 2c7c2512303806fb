// src/pipeline.rs
//
// Sequential batch driver: each document is fully extracted, normalized and
// flattened before the next begins; one oracle call outstanding at a time.
// Per-document failures are recorded and skipped, never fatal for the batch.

use crate::assemble::{self, Dataset};
use crate::error::{PipelineError, Result};
use crate::flatten::{self, FlatRecord};
use crate::numeric::NumericStats;
use crate::oracle::ExtractionOracle;
use crate::pdf_text::{self, DocumentText};
use tracing::{info, warn};

/// One input document: a shipping-bill PDF and the name used to identify it
/// in failures and logs.
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Outcome of a batch run. `failures` holds the per-document errors that
/// were isolated along the way; the dataset covers every document that
/// survived.
#[derive(Debug)]
pub struct BatchReport {
    pub dataset: Dataset,
    pub failures: Vec<PipelineError>,
    pub documents_total: usize,
    pub numeric_fallbacks: u64,
}

pub async fn run_batch(
    documents: &[SourceDocument],
    oracle: &dyn ExtractionOracle,
) -> Result<BatchReport> {
    let stats = NumericStats::default();
    let total = documents.len();
    let mut batches: Vec<Vec<FlatRecord>> = Vec::new();
    let mut failures: Vec<PipelineError> = Vec::new();

    for (idx, doc) in documents.iter().enumerate() {
        match process_document(doc, oracle, &stats).await {
            Ok(rows) => {
                info!(
                    document = %doc.name,
                    progress = format!("{}/{total}", idx + 1),
                    rows = rows.len(),
                    "document complete"
                );
                batches.push(rows);
            }
            Err(e) => {
                warn!(
                    document = %doc.name,
                    progress = format!("{}/{total}", idx + 1),
                    error = %e,
                    "document dropped"
                );
                failures.push(e);
            }
        }
    }

    let dataset = assemble::assemble(batches)?;
    info!(
        rows = dataset.len(),
        documents = total,
        failed = failures.len(),
        numeric_fallbacks = stats.fallbacks(),
        "batch assembled"
    );

    Ok(BatchReport {
        dataset,
        failures,
        documents_total: total,
        numeric_fallbacks: stats.fallbacks(),
    })
}

async fn process_document(
    doc: &SourceDocument,
    oracle: &dyn ExtractionOracle,
    stats: &NumericStats,
) -> Result<Vec<FlatRecord>> {
    let text = match pdf_text::read_document(&doc.bytes) {
        DocumentText::Extracted(text) => text,
        DocumentText::Empty => {
            return Err(PipelineError::TextExtraction {
                document: doc.name.clone(),
                reason: "no extractable text (scanned or empty)".to_string(),
            });
        }
        DocumentText::Unreadable(reason) => {
            return Err(PipelineError::TextExtraction {
                document: doc.name.clone(),
                reason,
            });
        }
    };

    extract_rows(&doc.name, &text, oracle, stats).await
}

/// Oracle call + flattening for one document's extracted text.
async fn extract_rows(
    name: &str,
    text: &str,
    oracle: &dyn ExtractionOracle,
    stats: &NumericStats,
) -> Result<Vec<FlatRecord>> {
    let raw = oracle.extract(name, text).await?;
    Ok(flatten::flatten_with_stats(&raw, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RawExtractionResult;
    use crate::oracle::parse_oracle_content;
    use async_trait::async_trait;
    use serde_json::json;

    /// Treats the "document text" itself as the oracle response, so tests
    /// script oracle behavior per document.
    struct EchoOracle;

    #[async_trait]
    impl ExtractionOracle for EchoOracle {
        async fn extract(&self, document: &str, text: &str) -> Result<RawExtractionResult> {
            parse_oracle_content(document, text)
        }
    }

    fn bill_json(sb_no: &str, invoice_no: &str) -> String {
        json!({
            "shipping_bill_header": {"SB NO.": sb_no},
            "invoices": [{
                "FINAL INVOICE NO": invoice_no,
                "Custom Exchange Rate in FC": 83.0,
                "items": [{"FOB Value as per SB in INR": 830000}]
            }]
        })
        .to_string()
    }

    async fn run(texts: Vec<(&str, String)>) -> Result<BatchReport> {
        let oracle = EchoOracle;
        let stats = NumericStats::default();
        let mut batches = Vec::new();
        let mut failures = Vec::new();
        for (name, text) in &texts {
            match extract_rows(name, text, &oracle, &stats).await {
                Ok(rows) => batches.push(rows),
                Err(e) => failures.push(e),
            }
        }
        let dataset = assemble::assemble(batches)?;
        Ok(BatchReport {
            dataset,
            failures,
            documents_total: texts.len(),
            numeric_fallbacks: stats.fallbacks(),
        })
    }

    #[tokio::test]
    async fn malformed_document_is_isolated() {
        let report = run(vec![
            ("bill_1.pdf", bill_json("111", "INV-1")),
            ("bill_2.pdf", "certainly not json".to_string()),
            ("bill_3.pdf", bill_json("333", "INV-3")),
        ])
        .await
        .unwrap();

        // rows from the two good documents only, order preserved
        assert_eq!(report.dataset.len(), 2);
        let sb_nos: Vec<&str> = report
            .dataset
            .rows
            .iter()
            .map(|r| r.get("SB NO.").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(sb_nos, vec!["111", "333"]);

        // the violation names the failed document
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0] {
            PipelineError::OracleViolation { document, .. } => {
                assert_eq!(document, "bill_2.pdf");
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[tokio::test]
    async fn all_documents_empty_is_empty_batch() {
        let err = run(vec![
            ("a.pdf", r#"{"invoices": []}"#.to_string()),
            ("b.pdf", r#"{"invoices": []}"#.to_string()),
        ])
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyBatch));
    }

    #[tokio::test]
    async fn serials_run_across_documents() {
        let report = run(vec![
            ("a.pdf", bill_json("1", "INV-1")),
            ("b.pdf", bill_json("2", "INV-2")),
            ("c.pdf", bill_json("3", "INV-3")),
        ])
        .await
        .unwrap();

        let serials: Vec<u64> = report
            .dataset
            .rows
            .iter()
            .map(|r| r.get("Sr. No.").unwrap().as_u64().unwrap())
            .collect();
        assert_eq!(serials, vec![1, 2, 3]);
    }
}
