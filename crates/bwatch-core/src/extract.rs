//! Black-box document text extraction.
//!
//! Given binary document content, return extracted text or a decode
//! failure. The monitor only feeds the result to the class-code detector,
//! so a failure degrades to "no codes from this document".

/// Documents above this size are skipped rather than decoded.
const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("document decode failed: {0}")]
    Decode(String),

    #[error("document too large: {0} bytes")]
    TooLarge(usize),
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, data: &[u8]) -> std::result::Result<String, ExtractError>;
}

/// PDF implementation. Attachments on the bulletin board are PDFs in
/// practice; other formats surface as decode failures and are skipped.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, data: &[u8]) -> std::result::Result<String, ExtractError> {
        if data.len() > MAX_DOCUMENT_BYTES {
            return Err(ExtractError::TooLarge(data.len()));
        }
        pdf_extract::extract_text_from_mem(data).map_err(|e| ExtractError::Decode(e.to_string()))
    }
}
