// PDF text extraction used by the convert endpoint.
// The document is parsed once with `lopdf`; page count, header version and the
// info dictionary are read from it, and `pdf-extract` renders its text.

use lopdf::{Document, Object};
use pdf_extract::PlainTextOutput;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail}")]
pub struct ExtractionError {
    pub detail: String,
}

impl ExtractionError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Everything the gateway reports about a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub text: String,
    pub num_pages: usize,
    /// Entries of the document information dictionary (Title, Author, ...).
    /// `None` when the document has no usable info dictionary.
    pub metadata: Option<BTreeMap<String, String>>,
    /// Header version, e.g. `1.7`.
    pub version: Option<String>,
}

/// Turns raw PDF bytes into text. Implementations are CPU-bound and are called
/// from the blocking thread pool.
pub trait PdfExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError>;
}

/// Processes every page of the document; there is no page cap.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let mut document = Document::load_mem(bytes)
            .map_err(|e| ExtractionError::new(format!("failed to parse PDF structure: {}", e)))?;

        // Owner-locked documents open with an empty user password
        if document.is_encrypted() {
            document
                .decrypt("")
                .map_err(|e| ExtractionError::new(format!("failed to decrypt PDF: {}", e)))?;
        }

        let num_pages = document.get_pages().len();
        let metadata = read_info_dictionary(&document);
        let version = Some(document.version.trim().to_string()).filter(|v| !v.is_empty());

        let text = extract_text_from_document(&document)?;

        Ok(ExtractionResult {
            text,
            num_pages,
            metadata,
            version,
        })
    }
}

/// Renders the text of every page of an already parsed document.
pub fn extract_text_from_document(document: &Document) -> Result<String, ExtractionError> {
    let mut text = String::new();
    {
        let mut output = PlainTextOutput::new(&mut text);
        pdf_extract::output_doc(document, &mut output)
            .map_err(|e| ExtractionError::new(format!("failed to extract text from PDF: {}", e)))?;
    }
    Ok(text)
}

fn read_info_dictionary(document: &Document) -> Option<BTreeMap<String, String>> {
    let info = match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    let dict = info.as_dict().ok()?;

    let mut entries = BTreeMap::new();
    for (key, value) in dict.iter() {
        let value = match value {
            Object::Reference(id) => match document.get_object(*id) {
                Ok(resolved) => resolved,
                Err(_) => continue,
            },
            direct => direct,
        };
        let text = match value {
            Object::String(raw, _) => decode_pdf_string(raw),
            Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
            // Trapped, numbers and nested structures carry nothing worth reporting
            _ => continue,
        };
        entries.insert(String::from_utf8_lossy(key).into_owned(), text);
    }

    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

/// Decodes a PDF text string: UTF-16BE or UTF-8 when a BOM says so, otherwise
/// PDFDocEncoding (approximated by windows-1252, identical for printable text).
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(rest) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let (text, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(rest);
        return text.into_owned();
    }
    if let Some(rest) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let (text, _) = encoding_rs::UTF_8.decode_without_bom_handling(rest);
        return text.into_owned();
    }
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(raw);
    text.into_owned()
}
