// src/assemble.rs

use crate::error::{PipelineError, Result};
use crate::flatten::FlatRecord;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Destination sheet column order. Fields outside this list are dropped at
/// assembly; canonical columns with no data are omitted, never null-filled.
pub const FINAL_COLUMNS: [&str; 27] = [
    "Sr. No.",
    "SB NO.",
    "S/B Date",
    "LEO Date",
    "Customer Name",
    "Final Invoice No.",
    "SB – Solar / Other Goods",
    "Port Code",
    "Incoterms",
    "Country",
    "H.S. ITC (HS Code)",
    "Product Group",
    "Qty",
    "Unit",
    "FOB Value Declared by Us (S/B) in FC",
    "Currency of Export",
    "Custom Exchange Rate (in FC)",
    "LEO Date Exchange Rate (in FC)",
    "FOB Value as per SB in INR",
    "FOB Value as per LEO Ex. Rate in INR",
    "Scheme (ADV/DFIA/Drawback)",
    "DBK %",
    "Drawback Receivable on FOB",
    "RoDTEP %",
    "RoDTEP Receivable",
    "RoDTEP Y/N",
    "Balance RoDTEP",
];

/// The final ordered dataset for one batch: column-projected rows plus the
/// column order the export boundary should use.
#[derive(Debug, Serialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Distinct final invoice numbers across the batch.
    pub fn invoice_count(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.get("Final Invoice No.").and_then(Value::as_str))
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }

    pub fn total_fob_inr(&self) -> f64 {
        self.column_sum("FOB Value as per SB in INR")
    }

    /// Drawback + RoDTEP receivables over the whole batch.
    pub fn total_benefits(&self) -> f64 {
        self.column_sum("Drawback Receivable on FOB") + self.column_sum("RoDTEP Receivable")
    }

    fn column_sum(&self, column: &str) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.get(column).and_then(Value::as_f64))
            .sum()
    }
}

/// Merge flattened rows from all documents into one ordered dataset.
///
/// Row order is the concatenation of per-document, per-invoice, per-item
/// order as presented. `Sr. No.` becomes a dense 1-based index over that
/// order — the only field written after record creation. A batch that
/// produced no rows at all is an explicit `EmptyBatch` condition, not an
/// empty success.
pub fn assemble(batches: Vec<Vec<FlatRecord>>) -> Result<Dataset> {
    let mut raw_rows: Vec<Map<String, Value>> = Vec::new();
    for record in batches.into_iter().flatten() {
        match serde_json::to_value(&record)? {
            Value::Object(map) => raw_rows.push(map),
            _ => unreachable!("FlatRecord serializes to an object"),
        }
    }

    if raw_rows.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }

    let columns: Vec<String> = FINAL_COLUMNS
        .iter()
        .filter(|col| raw_rows.iter().any(|row| row.contains_key(**col)))
        .map(|col| col.to_string())
        .collect();

    let rows = raw_rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut projected = Map::new();
            for col in &columns {
                if col == "Sr. No." {
                    projected.insert(col.clone(), json!(idx as u64 + 1));
                } else if let Some(value) = row.get(col) {
                    projected.insert(col.clone(), value.clone());
                }
            }
            projected
        })
        .collect();

    Ok(Dataset { columns, rows })
}
