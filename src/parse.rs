//! Document text extraction.
//!
//! Dispatches on file extension: PDF via `pdf-extract` (page-segmented),
//! plain-text formats via a UTF-8 read. Extraction is all-or-nothing per
//! file: on failure nothing is returned and the error carries the cause.

use std::path::Path;

use crate::error::PipelineError;

/// Extensions treated as plain text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

/// One page of extracted text. `page` is 1-based for paged formats and
/// `None` for formats without page structure.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page: Option<i64>,
    pub text: String,
}

/// Extract text from a file, segmented by page where the format has pages.
///
/// # Errors
///
/// - [`PipelineError::UnsupportedFormat`] when the extension is neither
///   PDF nor a plain-text type.
/// - [`PipelineError::Extraction`] when the file is unreadable or corrupt
///   (e.g. an encrypted or invalid PDF, or non-UTF-8 text).
pub fn extract_file(path: &Path) -> Result<Vec<PageText>, PipelineError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if ext == "pdf" {
        return extract_pdf(path);
    }

    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return extract_plain_text(path);
    }

    Err(PipelineError::UnsupportedFormat(format!(
        "{} (expected .pdf or a plain-text extension)",
        if ext.is_empty() {
            "(no extension)".to_string()
        } else {
            format!(".{}", ext)
        }
    )))
}

fn extract_pdf(path: &Path) -> Result<Vec<PageText>, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::Extraction(e.to_string()))?;

    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText {
            page: Some(i as i64 + 1),
            text,
        })
        .collect())
}

fn extract_plain_text(path: &Path) -> Result<Vec<PageText>, PipelineError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| PipelineError::Extraction(e.to_string()))?;

    Ok(vec![PageText { page: None, text }])
}
