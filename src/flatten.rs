// src/flatten.rs
//
// Walks header → invoice → item and emits one flat row per item. All derived
// financial quantities (FC value, percentages, balances) are computed here,
// behind the defensive numeric normalizer.

use crate::contract::{Invoice, Item, RawExtractionResult, ShippingBillHeader, sanitize_date};
use crate::numeric::{NumericStats, normalize_counted};
use serde::Serialize;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Every record is currently filed under the drawback scheme. The per-item
/// SCHEME_CODE / SCHEME_NAME stay on the parsed `Item`, so the column can be
/// switched to the item-level scheme without touching the contract.
pub const SCHEME_LABEL: &str = "DRAWBACK";

/// One row of the destination sheet. Immutable once emitted; `Sr. No.` stays
/// unset until record assembly numbers the final row order.
///
/// Monetary amounts are numeric, rounded to 2 decimals; percentages are
/// preformatted 2-decimal strings. The destination sheet expects exactly that
/// split.
#[derive(Debug, Clone, Serialize)]
pub struct FlatRecord {
    #[serde(rename = "Sr. No.")]
    pub sr_no: Option<u32>,
    #[serde(rename = "SB NO.")]
    pub sb_no: String,
    #[serde(rename = "S/B Date")]
    pub sb_date: String,
    #[serde(rename = "LEO Date")]
    pub leo_date: String,
    #[serde(rename = "Customer Name")]
    pub customer_name: String,
    #[serde(rename = "Final Invoice No.")]
    pub final_invoice_no: String,
    #[serde(rename = "SB – Solar / Other Goods")]
    pub sb_goods: String,
    #[serde(rename = "Port Code")]
    pub port_code: String,
    #[serde(rename = "Incoterms")]
    pub incoterms: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "H.S. ITC (HS Code)")]
    pub hs_code: String,
    #[serde(rename = "Product Group")]
    pub product_group: String,
    #[serde(rename = "Qty")]
    pub qty: f64,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "FOB Value Declared by Us (S/B) in FC")]
    pub fob_fc: f64,
    #[serde(rename = "Currency of Export")]
    pub currency: String,
    #[serde(rename = "Custom Exchange Rate (in FC)")]
    pub exchange_rate: f64,
    #[serde(rename = "LEO Date Exchange Rate (in FC)")]
    pub leo_exchange_rate: f64,
    #[serde(rename = "FOB Value as per SB in INR")]
    pub fob_inr: f64,
    #[serde(rename = "FOB Value as per LEO Ex. Rate in INR")]
    pub fob_leo_inr: f64,
    #[serde(rename = "Scheme (ADV/DFIA/Drawback)")]
    pub scheme: String,
    #[serde(rename = "DBK %")]
    pub dbk_pct: String,
    #[serde(rename = "Drawback Receivable on FOB")]
    pub dbk_receivable: f64,
    #[serde(rename = "RoDTEP %")]
    pub rodtep_pct: String,
    #[serde(rename = "RoDTEP Receivable")]
    pub rodtep_receivable: f64,
    #[serde(rename = "RoDTEP Y/N")]
    pub rodtep_yn: String,
    #[serde(rename = "Balance RoDTEP")]
    pub balance_rodtep: f64,
}

/// Flatten one hierarchical record into rows, one per item.
///
/// Emits exactly `Σ max(1, items.len())` rows over the invoices: an invoice
/// with no line-item detail still contributes one row (a single virtual empty
/// item). No row is ever dropped for missing data — absent numbers normalize
/// to 0, absent text to "".
pub fn flatten(raw: &RawExtractionResult) -> Vec<FlatRecord> {
    flatten_with_stats(raw, &NumericStats::default())
}

pub fn flatten_with_stats(raw: &RawExtractionResult, stats: &NumericStats) -> Vec<FlatRecord> {
    let mut rows = Vec::new();

    for invoice in &raw.invoices {
        let rate = normalize_counted(&invoice.custom_exchange_rate, stats);
        let currency = invoice
            .export_currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY);

        let virtual_item = [Item::default()];
        let items: &[Item] = if invoice.items.is_empty() {
            &virtual_item
        } else {
            &invoice.items
        };

        for item in items {
            rows.push(flatten_item(&raw.header, invoice, item, rate, currency, stats));
        }
    }

    rows
}

fn flatten_item(
    header: &ShippingBillHeader,
    invoice: &Invoice,
    item: &Item,
    rate: f64,
    currency: &str,
    stats: &NumericStats,
) -> FlatRecord {
    let fob_inr = normalize_counted(&item.fob_value_inr, stats);
    let qty = normalize_counted(&item.qty, stats);
    let dbk_amt = normalize_counted(&item.drawback_receivable, stats);
    let rodtep_amt = normalize_counted(&item.rodtep_receivable, stats);

    let fob_fc = if rate > 0.0 { fob_inr / rate } else { 0.0 };
    let dbk_pct = if fob_inr > 0.0 { dbk_amt / fob_inr * 100.0 } else { 0.0 };
    let rodtep_pct = if fob_inr > 0.0 { rodtep_amt / fob_inr * 100.0 } else { 0.0 };

    // The full item description doubles as the goods classification: no
    // separate classification step, the description *is* the value.
    let description = item.product_group.as_deref().unwrap_or("").trim().to_string();

    FlatRecord {
        sr_no: None,
        sb_no: text(&header.sb_no),
        sb_date: sanitize_date(header.sb_date.as_deref().unwrap_or("")),
        leo_date: sanitize_date(header.leo_date.as_deref().unwrap_or("")),
        customer_name: text(&header.customer_name),
        final_invoice_no: text(&invoice.final_invoice_no),
        sb_goods: description.clone(),
        port_code: text(&header.port_code),
        incoterms: text(&invoice.incoterms),
        country: text(&header.country),
        hs_code: text(&item.hs_code),
        product_group: description,
        qty,
        unit: text(&item.unit),
        fob_fc: round2(fob_fc),
        currency: currency.to_string(),
        exchange_rate: rate,
        // No distinct LEO-date rate lookup is modeled; the custom exchange
        // rate stands in for both columns.
        leo_exchange_rate: rate,
        fob_inr: round2(fob_inr),
        fob_leo_inr: round2(fob_inr),
        scheme: SCHEME_LABEL.to_string(),
        dbk_pct: pct(dbk_pct),
        dbk_receivable: round2(dbk_amt),
        rodtep_pct: pct(rodtep_pct),
        rodtep_receivable: round2(rodtep_amt),
        rodtep_yn: if rodtep_amt > 0.0 { "Yes" } else { "No" }.to_string(),
        balance_rodtep: round2(rodtep_amt),
    }
}

fn text(field: &Option<String>) -> String {
    field.clone().unwrap_or_default()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn pct(v: f64) -> String {
    format!("{v:.2}")
}
