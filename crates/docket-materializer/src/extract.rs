//! PDF text extraction and normalization

use crate::error::MaterializerError;
use std::collections::BTreeMap;

/// Extract raw text from PDF bytes, pages concatenated in page order
///
/// Fails with [`MaterializerError::EncryptedPdf`] for encrypted documents
/// and [`MaterializerError::ExtractionFailed`] for unparseable ones. An
/// empty result is legal here; emptiness is judged after [`normalize`].
pub fn extract_text(bytes: &[u8]) -> Result<String, MaterializerError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| MaterializerError::ExtractionFailed(e.to_string()))?;

    if document.is_encrypted() {
        return Err(MaterializerError::EncryptedPdf);
    }

    let pages: BTreeMap<u32, lopdf::ObjectId> = document.get_pages();
    let mut page_texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let raw = document
            .extract_text(&[*page_number])
            .map_err(|e| MaterializerError::ExtractionFailed(e.to_string()))?;
        page_texts.push(sanitize(&raw));
    }

    Ok(page_texts.join("\n\n"))
}

// NULs come from broken CMaps; CRs from producers that emit CRLF.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{0}' => {}
            '\r' => out.push('\n'),
            _ => out.push(ch),
        }
    }
    out
}

/// Normalize extracted text
///
/// Collapses runs of spaces/tabs to one space, collapses 3+ newlines to at
/// most 2, strips trailing whitespace. The result is empty for
/// scanned/image-only PDFs; callers turn that into
/// [`MaterializerError::NoExtractableText`].
pub fn normalize(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        match ch {
            ' ' | '\t' => {
                if !in_space {
                    collapsed.push(' ');
                }
                in_space = true;
            }
            _ => {
                collapsed.push(ch);
                in_space = false;
            }
        }
    }

    let mut out = String::with_capacity(collapsed.len());
    let mut pending_blank = false;
    for line in collapsed.split('\n').map(str::trim_end) {
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(line);
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_space_runs() {
        assert_eq!(normalize("a  \t  b"), "a b");
        assert_eq!(normalize("  leading and trailing   "), "leading and trailing");
    }

    #[test]
    fn test_normalize_caps_newline_runs() {
        assert_eq!(normalize("a\nb"), "a\nb");
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
        assert_eq!(normalize("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_normalize_strips_trailing_line_whitespace() {
        assert_eq!(normalize("a   \nb\t\n"), "a\nb");
    }

    #[test]
    fn test_normalize_empty_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \t \n\n \n "), "");
    }

    #[test]
    fn test_garbage_bytes_fail_extraction() {
        assert!(matches!(
            extract_text(b"this is not a pdf"),
            Err(MaterializerError::ExtractionFailed(_))
        ));
    }
}
