//! Document module - ingested legal records and their source descriptors

use crate::ids::{DocumentId, OwnerId};
use serde::{Deserialize, Serialize};

/// Where a document's PDF binary lives
///
/// A `Pointer` descriptor references another document's descriptor and is
/// resolved transitively exactly once by the resolver; a pointer whose
/// referent is itself a pointer is a broken pointer, never followed further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDescriptor {
    /// A remote HTTP(S) URL
    RemoteUrl {
        /// The URL to fetch
        url: String,
    },

    /// An object-storage location
    ObjectStore {
        /// Bucket name
        bucket: String,
        /// Object path within the bucket
        path: String,
    },

    /// Indirection to another document's descriptor
    Pointer {
        /// The referenced document
        document_id: DocumentId,
    },
}

impl SourceDescriptor {
    /// Whether this descriptor can be fetched directly (is not a pointer)
    pub fn is_direct(&self) -> bool {
        !matches!(self, SourceDescriptor::Pointer { .. })
    }
}

/// An ingested legal record
///
/// The source descriptor is immutable once set; re-ingestion creates a new
/// document or updates the descriptor explicitly, never implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,

    /// Owning principal
    pub owner: OwnerId,

    /// Where the PDF binary lives
    pub source: SourceDescriptor,

    /// Optional external identifier (court docket number, upload reference)
    pub external_ref: Option<String>,

    /// Free-form provenance metadata
    pub provenance: serde_json::Value,

    /// When this document was ingested (epoch seconds)
    pub created_at: u64,
}

impl Document {
    /// Create a new document record
    pub fn new(owner: OwnerId, source: SourceDescriptor, created_at: u64) -> Self {
        Self {
            id: DocumentId::new(),
            owner,
            source,
            external_ref: None,
            provenance: serde_json::Value::Null,
            created_at,
        }
    }

    /// Attach an external reference
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Attach provenance metadata
    pub fn with_provenance(mut self, provenance: serde_json::Value) -> Self {
        self.provenance = provenance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_directness() {
        let url = SourceDescriptor::RemoteUrl {
            url: "https://example.org/a.pdf".to_string(),
        };
        let ptr = SourceDescriptor::Pointer {
            document_id: DocumentId::new(),
        };
        assert!(url.is_direct());
        assert!(!ptr.is_direct());
    }

    #[test]
    fn test_descriptor_serde_tagging() {
        let d = SourceDescriptor::ObjectStore {
            bucket: "records".to_string(),
            path: "2024/case.pdf".to_string(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["type"], "object_store");
        assert_eq!(json["bucket"], "records");
    }
}
