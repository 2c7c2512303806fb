// src/contract.rs
//
// The document-to-hierarchy contract: the shape the extraction oracle must
// return and the mapping rules it must follow. The oracle mechanism (model,
// rules engine, hybrid) is swappable; this module is the fixed point.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;
use time::format_description;

/// The mapping rules handed to the extraction oracle together with the
/// document text. Each numbered rule is a testable policy: buyer-only
/// customer resolution, two-strategy LEO date validation, untruncated item
/// descriptions, item-detail FOB sourcing, serial-number scheme correlation.
pub const EXTRACTION_RULES: &str = r#"You are a customs data specialist. Parse this Shipping Bill into a strictly hierarchical JSON.

CRITICAL MAPPING RULES:

1. CUSTOMER NAME:
   - Go to "Part I" or the header/party details section.
   - Locate the "Buyer Name" / "Buyer Details" field and extract the buyer's name.
   - Do NOT extract the Exporter. Do NOT extract the Consignee unless the document states the Consignee is the same as the Buyer. We strictly need the BUYER NAME.

2. LEO DATE (DD-MMM-YYYY format):
   - Locate the "J. PROCESS DETAILS" section (usually the bottom-left quadrant) and restrict parsing to that block.
   - Strategy A (key-value lookup): find the label "6. LEO Date." (or similar) and take the value in the sibling cell to its right.
   - Strategy B (grid intersection): find the "2. DATE" column and the "9. LEO" ("Let Export Order") row; take the value at their intersection.
   - Cross-validate: if A and B match, use that date. If they differ, prefer Strategy A.
   - Emit the date portion ONLY, as DD-MMM-YYYY (e.g. 10-MAY-25). Ignore timestamps and status text.

3. S/B DATE: extract in DD-MMM-YYYY format from the bill's primary date field.

4. PORT CODE: extract the "Port of Loading" (origin) code from the page 1 header.

5. INVOICES (Part II):
   - FINAL INVOICE NO: prefer the cleaner/fuller version when more than one form appears.
   - Extract "3.FREIGHT" and "4.INSURANCE" (total amounts in foreign currency).
   - Extract the "Exchange Rate".

6. ITEMS (Part III):
   - PRODUCT GROUP: copy the COMPLETE "Item Description" text exactly as it appears. Never truncate or summarize.
   - FOB VALUE: take it strictly from the "FOB (INR)" / "9.FOB" column of Part III - ITEM DETAILS, never from summary totals.
   - SCHEME CODE: look for the "18.SCHCOD" column in Part III, or the scheme code in Part IV.

7. SCHEMES (Part IV): match item serial numbers to find per-item Drawback and RoDTEP amounts.

JSON OUTPUT FORMAT:
{
  "shipping_bill_header": {"SB NO.": "string", "S/B Date": "string", "LEO Date": "string", "PORT CODE": "string", "CUSTOMER NAME": "string", "COUNTRY": "string", "SB_TYPE": "string"},
  "invoices": [{ "FINAL INVOICE NO": "string", "INCOTERMS": "string", "Currency of export": "string", "Custom Exchange Rate in FC": "number", "FREIGHT_TOTAL_FC": "number", "INSURANCE_TOTAL_FC": "number",
      "items": [{ "H.S. Itch code": "string", "PRODUCT GROUP": "string", "Qty": "number", "Unit": "string", "FOB Value as per SB in INR": "number", "SCHEME_CODE": "string", "SCHEME_NAME": "string", "DRAWBACK Receivable on fob": "number", "RoDTEP RECEIVABLE": "number"}]
  }]
}

Output ONLY the JSON object. No markdown fences, no commentary."#;

/// Hierarchical record for one shipping bill, as returned by the oracle.
///
/// Missing keys default (empty header, empty lists); *mistyped* values are a
/// contract violation and fail the parse. Numeric-looking fields stay untyped
/// here — the oracle may emit them as numbers or strings — and must go
/// through `numeric::normalize_number` before any arithmetic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtractionResult {
    #[serde(rename = "shipping_bill_header", default)]
    pub header: ShippingBillHeader,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingBillHeader {
    #[serde(rename = "SB NO.", default)]
    pub sb_no: Option<String>,
    #[serde(rename = "S/B Date", default)]
    pub sb_date: Option<String>,
    #[serde(rename = "LEO Date", default)]
    pub leo_date: Option<String>,
    #[serde(rename = "PORT CODE", default)]
    pub port_code: Option<String>,
    #[serde(rename = "CUSTOMER NAME", default)]
    pub customer_name: Option<String>,
    #[serde(rename = "COUNTRY", default)]
    pub country: Option<String>,
    #[serde(rename = "SB_TYPE", default)]
    pub sb_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "FINAL INVOICE NO", default)]
    pub final_invoice_no: Option<String>,
    #[serde(rename = "INCOTERMS", default)]
    pub incoterms: Option<String>,
    #[serde(rename = "Currency of export", default)]
    pub export_currency: Option<String>,
    #[serde(rename = "Custom Exchange Rate in FC", default)]
    pub custom_exchange_rate: Value,
    #[serde(rename = "FREIGHT_TOTAL_FC", default)]
    pub freight_total_fc: Value,
    #[serde(rename = "INSURANCE_TOTAL_FC", default)]
    pub insurance_total_fc: Value,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "H.S. Itch code", default)]
    pub hs_code: Option<String>,
    #[serde(rename = "PRODUCT GROUP", default)]
    pub product_group: Option<String>,
    #[serde(rename = "Qty", default)]
    pub qty: Value,
    #[serde(rename = "Unit", default)]
    pub unit: Option<String>,
    #[serde(rename = "FOB Value as per SB in INR", default)]
    pub fob_value_inr: Value,
    #[serde(rename = "SCHEME_CODE", default)]
    pub scheme_code: Option<String>,
    #[serde(rename = "SCHEME_NAME", default)]
    pub scheme_name: Option<String>,
    #[serde(rename = "DRAWBACK Receivable on fob", default)]
    pub drawback_receivable: Value,
    #[serde(rename = "RoDTEP RECEIVABLE", default)]
    pub rodtep_receivable: Value,
}

/// Parse an oracle response into the hierarchical record.
///
/// A response that is not valid JSON or does not fit the shape above is
/// rejected, never coerced into a partial record.
pub fn parse_raw_extraction(json_str: &str) -> serde_json::Result<RawExtractionResult> {
    serde_json::from_str(json_str)
}

/// Canonicalize a header date to upper-case DD-MMM-YYYY.
///
/// Takes the leading whitespace-delimited token (oracles sometimes append a
/// timestamp or status despite the rules), accepts two-digit years as
/// 2000-based, and upper-cases the month. Values that do not parse as
/// DD-MMM-YYYY pass through trimmed — format repair belongs to the oracle,
/// this only normalizes presentation.
pub fn sanitize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(token) = trimmed.split_whitespace().next() else {
        return String::new();
    };
    reformat_date(token).unwrap_or_else(|| trimmed.to_string())
}

fn reformat_date(token: &str) -> Option<String> {
    let parts: Vec<&str> = token.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    // "10-MAY-25" style two-digit years are 2000-based
    let expanded = if parts[2].len() == 2 && parts[2].chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-20{}", parts[0], parts[1], parts[2])
    } else {
        token.to_string()
    };

    let input =
        format_description::parse("[day padding:none]-[month repr:short case_sensitive:false]-[year]")
            .ok()?;
    let output = format_description::parse("[day]-[month repr:short]-[year]").ok()?;

    let date = Date::parse(&expanded, &input).ok()?;
    Some(date.format(&output).ok()?.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_response() {
        let payload = json!({
            "shipping_bill_header": {
                "SB NO.": "1234567",
                "S/B Date": "08-MAY-2025",
                "LEO Date": "10-MAY-2025",
                "PORT CODE": "INMUN1",
                "CUSTOMER NAME": "Acme Solar LLC",
                "COUNTRY": "UNITED STATES",
                "SB_TYPE": "EDI"
            },
            "invoices": [{
                "FINAL INVOICE NO": "EXP/2025/001",
                "INCOTERMS": "FOB",
                "Currency of export": "USD",
                "Custom Exchange Rate in FC": "83.00",
                "FREIGHT_TOTAL_FC": 0,
                "INSURANCE_TOTAL_FC": 0,
                "items": [{
                    "H.S. Itch code": "85414300",
                    "PRODUCT GROUP": "SOLAR PV MODULE 545Wp",
                    "Qty": 100,
                    "Unit": "PCS",
                    "FOB Value as per SB in INR": "8,30,000",
                    "SCHEME_CODE": "19",
                    "SCHEME_NAME": "DBK",
                    "DRAWBACK Receivable on fob": 8300,
                    "RoDTEP RECEIVABLE": 4150
                }]
            }]
        });

        let raw = parse_raw_extraction(&payload.to_string()).unwrap();
        assert_eq!(raw.header.sb_no.as_deref(), Some("1234567"));
        assert_eq!(raw.invoices.len(), 1);
        let inv = &raw.invoices[0];
        assert_eq!(inv.export_currency.as_deref(), Some("USD"));
        assert_eq!(inv.items.len(), 1);
        assert_eq!(
            inv.items[0].product_group.as_deref(),
            Some("SOLAR PV MODULE 545Wp")
        );
    }

    #[test]
    fn missing_sections_default() {
        let raw = parse_raw_extraction("{}").unwrap();
        assert!(raw.header.sb_no.is_none());
        assert!(raw.invoices.is_empty());

        let raw = parse_raw_extraction(r#"{"invoices":[{"items":[]}]}"#).unwrap();
        assert_eq!(raw.invoices.len(), 1);
        assert!(raw.invoices[0].items.is_empty());
        assert!(raw.invoices[0].custom_exchange_rate.is_null());
    }

    #[test]
    fn mistyped_shapes_are_rejected() {
        // invoices must be an array
        assert!(parse_raw_extraction(r#"{"invoices":{"items":[]}}"#).is_err());
        // header fields must be strings
        assert!(
            parse_raw_extraction(r#"{"shipping_bill_header":{"SB NO.": 1234567}}"#).is_err()
        );
        // root must be an object
        assert!(parse_raw_extraction(r#"["not","a","bill"]"#).is_err());
        assert!(parse_raw_extraction("not json at all").is_err());
    }

    #[test]
    fn sanitize_date_canonicalizes() {
        assert_eq!(sanitize_date("10-MAY-25"), "10-MAY-2025");
        assert_eq!(sanitize_date("8-may-2025"), "08-MAY-2025");
        assert_eq!(sanitize_date("10-May-2025 14:02 LEO GRANTED"), "10-MAY-2025");
        assert_eq!(sanitize_date("  01-JAN-2026  "), "01-JAN-2026");
    }

    #[test]
    fn sanitize_date_passes_through_unparseable() {
        assert_eq!(sanitize_date(""), "");
        assert_eq!(sanitize_date("   "), "");
        assert_eq!(sanitize_date("2025/05/10"), "2025/05/10");
        assert_eq!(sanitize_date("pending"), "pending");
    }
}
