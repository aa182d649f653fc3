//! Multi-format text extraction for uploaded documents (PDF, DOCX).
//!
//! Turns an ordered batch of [`Document`]s into one concatenated corpus
//! string. Extraction is tolerant by design: an unsupported media type or
//! an unreadable document contributes no text and a warning, never a
//! failure of the whole batch.

use std::io::Read;
use std::path::Path;

use crate::models::{Document, MEDIA_DOCX, MEDIA_PDF};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// The corpus produced from one document batch, plus any per-document
/// extraction warnings (skipped types, unreadable content).
#[derive(Debug)]
pub struct ExtractReport {
    pub corpus: String,
    pub warnings: Vec<String>,
}

/// Per-document extraction error. Collected as a warning by
/// [`extract_corpus`], never surfaced as a batch failure.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedMediaType(String),
    Pdf(String),
    Docx(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedMediaType(mt) => {
                write!(f, "unsupported media type: {}", mt)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Guess the declared media type for an uploaded file from its extension.
///
/// Anything but `.pdf`/`.docx` is passed through as a generic binary type;
/// it is still accepted but contributes no text.
pub fn media_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => MEDIA_PDF,
        Some("docx") => MEDIA_DOCX,
        _ => "application/octet-stream",
    }
}

/// Extract text from every document in input order and concatenate into
/// one corpus. A document that cannot be extracted contributes an empty
/// string and a warning naming the document and the reason.
pub fn extract_corpus(documents: &[Document]) -> ExtractReport {
    let mut corpus = String::new();
    let mut warnings = Vec::new();

    for doc in documents {
        match extract_text(&doc.bytes, &doc.media_type) {
            Ok(text) => corpus.push_str(&text),
            Err(e) => warnings.push(format!("{}: {}", doc.name, e)),
        }
    }

    ExtractReport { corpus, warnings }
}

/// Extract plain text from one document's bytes according to its declared
/// media type.
pub fn extract_text(bytes: &[u8], media_type: &str) -> Result<String, ExtractError> {
    match media_type {
        MEDIA_PDF => extract_pdf(bytes),
        MEDIA_DOCX => extract_docx(bytes),
        _ => Err(ExtractError::UnsupportedMediaType(media_type.to_string())),
    }
}

/// Page-by-page PDF text. A page with no extractable text contributes an
/// empty string; `pdf-extract` handles that without failing the document.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Paragraph-by-paragraph DOCX text, paragraphs joined with line breaks.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Docx(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }
    extract_paragraphs(&doc_xml)
}

/// Walk `word/document.xml`: collect `w:t` run text, close each `w:p`
/// paragraph with a newline. An empty paragraph contributes just the
/// separator, never an error.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
