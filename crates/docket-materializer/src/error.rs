//! Error types for the Materializer

use thiserror::Error;

/// Errors that can occur during resolution and materialization
#[derive(Error, Debug)]
pub enum MaterializerError {
    /// The token resolved to no document
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A pointer descriptor's referent is missing or not usable
    #[error("Broken source pointer: {0}")]
    BrokenPointer(String),

    /// Network failure while fetching the binary
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The fetch deadline elapsed
    #[error("Fetch timed out")]
    Timeout,

    /// The payload exceeded the byte cap
    #[error("Payload too large (limit: {limit} bytes)")]
    TooLarge {
        /// The configured byte cap
        limit: usize,
    },

    /// The leading bytes are not a PDF signature
    #[error("Fetched content is not a PDF")]
    NotPdf,

    /// The PDF is encrypted and cannot be read
    #[error("PDF is encrypted")]
    EncryptedPdf,

    /// The PDF could not be parsed
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Normalization yielded an empty string (scanned/image-only PDF)
    #[error("No extractable text")]
    NoExtractableText,

    /// Store read/write failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
