//! Plain-text extraction for uploaded documents (PDF, text).
//!
//! The pipeline supplies raw object bytes plus a [`ContentKind`]; this module
//! returns the document's text. Output is not normalized: chunking operates
//! on exactly what the extractor produced.

use crate::error::ExtractionError;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Document kinds the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Text,
}

impl ContentKind {
    /// Picks the kind from the lowercase file extension of `path`.
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_lowercase();
        if lower.ends_with(".pdf") {
            Some(ContentKind::Pdf)
        } else if lower.ends_with(".txt") {
            Some(ContentKind::Text)
        } else {
            None
        }
    }

    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence {
            MIME_PDF => Some(ContentKind::Pdf),
            MIME_TEXT => Some(ContentKind::Text),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ContentKind::Pdf => MIME_PDF,
            ContentKind::Text => MIME_TEXT,
        }
    }
}

/// Converts raw document bytes into text.
///
/// Implementations must be pure with respect to the pipeline: no store
/// access, no side effects beyond logging.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], kind: ContentKind) -> Result<String, ExtractionError>;
}

/// Extractor backed by `pdf-extract` for PDFs and lossy UTF-8 for text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

impl TextExtractor for DefaultExtractor {
    fn extract(&self, bytes: &[u8], kind: ContentKind) -> Result<String, ExtractionError> {
        extract_text(bytes, kind)
    }
}

/// Extracts plain text from `bytes` interpreted as `kind`.
pub fn extract_text(bytes: &[u8], kind: ContentKind) -> Result<String, ExtractionError> {
    match kind {
        ContentKind::Pdf => extract_pdf(bytes),
        ContentKind::Text => Ok(decode_text(bytes)),
    }
}

/// Page texts in page order, each followed by a newline.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    let mut out = String::new();
    for page in pages {
        out.push_str(&page);
        out.push('\n');
    }
    Ok(out)
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
