//! The materialize pipeline

use crate::chunking::chunk_text;
use crate::config::MaterializerConfig;
use crate::error::MaterializerError;
use crate::extract::{extract_text, normalize};
use crate::fetch::BlobFetcher;
use crate::resolver::resolve_document;
use docket_domain::traits::DocumentStore;
use docket_domain::DocumentId;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Leading file-signature bytes of a PDF
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Result of one materialize run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeReport {
    /// The document whose chunk set was replaced
    pub document_id: DocumentId,

    /// Number of chunks written
    pub chunk_count: usize,
}

/// The Materializer runs fetch → extract → chunk → replace for one document
pub struct Materializer<S, F>
where
    S: DocumentStore,
    F: BlobFetcher,
{
    store: Arc<Mutex<S>>,
    fetcher: F,
    config: MaterializerConfig,
}

impl<S, F> Materializer<S, F>
where
    S: DocumentStore,
    S::Error: std::fmt::Display,
    F: BlobFetcher,
{
    /// Create a new Materializer
    pub fn new(store: Arc<Mutex<S>>, fetcher: F, config: MaterializerConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// The active configuration
    pub fn config(&self) -> &MaterializerConfig {
        &self.config
    }

    /// Materialize the document behind `token`
    ///
    /// Replaces the document's entire chunk set; the store makes the
    /// delete+insert pair one logical unit, so a failure anywhere in this
    /// pipeline leaves either the old chunk set or the new one, never a mix.
    pub async fn materialize(&self, token: &str) -> Result<MaterializeReport, MaterializerError> {
        self.config
            .validate()
            .map_err(MaterializerError::Config)?;

        let resolved = {
            let store = self.lock_store()?;
            resolve_document(&*store, token)?
        };
        let document_id = resolved.document.id;

        info!(%document_id, token, "materializing document");

        let bytes = self.fetcher.fetch(&resolved.source, &self.config).await?;
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(MaterializerError::NotPdf);
        }

        let raw = extract_text(&bytes)?;
        let normalized = normalize(&raw);
        if normalized.is_empty() {
            return Err(MaterializerError::NoExtractableText);
        }
        debug!(%document_id, chars = normalized.len(), "extracted text");

        let contents = chunk_text(&normalized, self.config.max_chunk_chars, self.config.max_chunks);

        let chunk_count = {
            let mut store = self.lock_store()?;
            store
                .replace_chunks(document_id, &contents)
                .map_err(|e| MaterializerError::Store(e.to_string()))?
        };

        info!(%document_id, chunk_count, "chunk set replaced");
        Ok(MaterializeReport {
            document_id,
            chunk_count,
        })
    }

    fn lock_store(&self) -> Result<std::sync::MutexGuard<'_, S>, MaterializerError> {
        self.store
            .lock()
            .map_err(|_| MaterializerError::Store("store mutex poisoned".to_string()))
    }
}
