// src/pdf_text.rs

use lopdf::{Dictionary, Document};
use tracing::{info, warn};

/// Outcome of pulling text out of a shipping-bill PDF.
#[derive(Debug)]
pub enum DocumentText {
    /// Extractable text, layout whitespace retained.
    Extracted(String),
    /// Nothing to extract: scanned/image-only pages, or text below the
    /// plausibility threshold.
    Empty,
    /// The bytes could not be parsed as a PDF at all.
    Unreadable(String),
}

/// Minimum number of non-whitespace characters expected from a real text
/// PDF. Below this we treat the document as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Extract text from raw PDF bytes.
///
/// A structural pass over the page tree first: pages that carry image
/// XObjects but no Font resources are scanned pages, and a document that is
/// mostly scanned pages has nothing for the text pipeline.
pub fn read_document(pdf_bytes: &[u8]) -> DocumentText {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return DocumentText::Unreadable(format!("failed to parse PDF: {e}")),
    };

    if mostly_image_pages(&doc) {
        info!("structural check: likely scanned / image-only");
        return DocumentText::Empty;
    }

    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "extracted text too short — treating as scanned");
                DocumentText::Empty
            } else {
                info!(chars = meaningful, "text extracted");
                DocumentText::Extracted(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed — may be scanned or corrupted");
            DocumentText::Empty
        }
    }
}

fn mostly_image_pages(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // can't tell — let text extraction try
    }

    let image_only = pages
        .values()
        .filter_map(|object_id| doc.get_object(*object_id).ok()?.as_dict().ok())
        .filter(|page| {
            has_resource(doc, page, b"XObject") && !has_resource(doc, page, b"Font")
        })
        .count();

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        total_pages = pages.len(),
        image_only,
        ratio = format!("{ratio:.2}"),
        "scanned-page analysis"
    );

    // ≥80% image-only pages → the whole PDF is scanned
    ratio >= 0.8
}

/// Does the page's `Resources` dictionary hold a non-empty entry of `kind`?
fn has_resource(doc: &Document, page: &Dictionary, kind: &[u8]) -> bool {
    page.get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(kind).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_unreadable() {
        let result = read_document(b"this is not a pdf");
        assert!(matches!(result, DocumentText::Unreadable(_)));
    }
}
