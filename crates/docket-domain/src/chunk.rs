//! Chunk module - bounded slices of a document's extracted text

use crate::ids::DocumentId;
use serde::{Deserialize, Serialize};

/// One ordered slice of a document's extracted text
///
/// Indices are zero-based and contiguous. For a given document the full
/// chunk set is always the output of the most recent materialize run;
/// replacement is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The document this chunk belongs to
    pub document_id: DocumentId,

    /// Zero-based position within the document
    pub index: u32,

    /// Extracted text content
    pub content: String,
}

impl Chunk {
    /// Create a chunk
    pub fn new(document_id: DocumentId, index: u32, content: impl Into<String>) -> Self {
        Self {
            document_id,
            index,
            content: content.into(),
        }
    }
}
