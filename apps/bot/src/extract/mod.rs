//! Document extractors: stateless converters from uploaded bytes to plain text.

use thiserror::Error;

pub mod docx;
pub mod pdf;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("the document is empty")]
    Empty,

    #[error("unsupported format: {0}. Send a PDF or DOCX file")]
    UnsupportedFormat(String),

    #[error("could not read the Word document: {0}")]
    Docx(String),

    #[error("could not read the PDF document: {0}")]
    Pdf(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

/// Best-effort sniff for PDF bytes (magic header).
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// DOCX files are ZIP containers.
pub fn looks_like_docx(bytes: &[u8]) -> bool {
    bytes.len() > 4 && bytes.starts_with(b"PK")
}

/// Determines the upload format from magic bytes, falling back to the file
/// name extension when the content is ambiguous.
pub fn detect_kind(bytes: &[u8], file_name: &str) -> Result<DocumentKind, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }
    if looks_like_pdf(bytes) {
        return Ok(DocumentKind::Pdf);
    }
    if looks_like_docx(bytes) {
        return Ok(DocumentKind::Docx);
    }
    let lower = file_name.to_lowercase();
    if lower.ends_with(".pdf") {
        Ok(DocumentKind::Pdf)
    } else if lower.ends_with(".docx") || lower.ends_with(".doc") {
        Ok(DocumentKind::Docx)
    } else {
        Err(ExtractionError::UnsupportedFormat(file_name.to_string()))
    }
}

/// Extracts raw text from an upload, dispatching on the detected format.
pub fn extract_document_text(bytes: &[u8], file_name: &str) -> Result<String, ExtractionError> {
    match detect_kind(bytes, file_name)? {
        DocumentKind::Pdf => pdf::extract_pdf_text(bytes),
        DocumentKind::Docx => docx::extract_docx_text(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf_by_magic() {
        let kind = detect_kind(b"%PDF-1.7 rest", "resume.bin").unwrap();
        assert_eq!(kind, DocumentKind::Pdf);
    }

    #[test]
    fn test_detect_docx_by_magic() {
        let kind = detect_kind(b"PK\x03\x04zipdata", "resume.bin").unwrap();
        assert_eq!(kind, DocumentKind::Docx);
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        let kind = detect_kind(b"plain bytes", "Resume.PDF").unwrap();
        assert_eq!(kind, DocumentKind::Pdf);
    }

    #[test]
    fn test_detect_empty_is_error() {
        assert!(matches!(
            detect_kind(b"", "resume.pdf"),
            Err(ExtractionError::Empty)
        ));
    }

    #[test]
    fn test_detect_unknown_is_unsupported() {
        assert!(matches!(
            detect_kind(b"hello", "resume.txt"),
            Err(ExtractionError::UnsupportedFormat(_))
        ));
    }
}
