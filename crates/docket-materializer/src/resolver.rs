//! Document resolution
//!
//! Maps an opaque token (document id or external identifier) to a canonical
//! document record plus a directly fetchable source descriptor. A pointer
//! descriptor is followed exactly one level; a missing referent or a
//! pointer-to-pointer is a broken pointer, never recursed into.

use crate::error::MaterializerError;
use docket_domain::traits::DocumentStore;
use docket_domain::{Document, DocumentId, SourceDescriptor};

/// A resolved document: the canonical record plus the descriptor to fetch
///
/// When the record's own descriptor was a pointer, `source` is the
/// referent's descriptor while `document` stays the canonical record the
/// chunks attach to.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    /// The canonical document record
    pub document: Document,

    /// The directly fetchable descriptor
    pub source: SourceDescriptor,
}

/// Resolve a document token (read-only)
pub fn resolve_document<S>(store: &S, token: &str) -> Result<ResolvedDocument, MaterializerError>
where
    S: DocumentStore,
    S::Error: std::fmt::Display,
{
    let direct = match DocumentId::parse(token) {
        Ok(id) => store
            .get_document(id)
            .map_err(|e| MaterializerError::Store(e.to_string()))?,
        Err(_) => None,
    };

    let document = match direct {
        Some(doc) => doc,
        None => store
            .find_document_by_external_ref(token)
            .map_err(|e| MaterializerError::Store(e.to_string()))?
            .ok_or_else(|| MaterializerError::NotFound(token.to_string()))?,
    };

    let source = match &document.source {
        SourceDescriptor::Pointer { document_id } => {
            let referent = store
                .get_document(*document_id)
                .map_err(|e| MaterializerError::Store(e.to_string()))?
                .ok_or_else(|| {
                    MaterializerError::BrokenPointer(format!(
                        "document {} points at missing document {}",
                        document.id, document_id
                    ))
                })?;
            if !referent.source.is_direct() {
                return Err(MaterializerError::BrokenPointer(format!(
                    "document {} points at document {} whose source is itself a pointer",
                    document.id, document_id
                )));
            }
            referent.source
        }
        direct_source => direct_source.clone(),
    };

    Ok(ResolvedDocument { document, source })
}
