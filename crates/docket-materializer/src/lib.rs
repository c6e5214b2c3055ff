//! Docket PDF Materializer
//!
//! The fetch → extract → chunk → replace pipeline for a document:
//!
//! 1. Resolve an opaque document token to a canonical record and a usable
//!    source descriptor (following at most one pointer indirection).
//! 2. Fetch the binary with a hard deadline and byte cap, trusting only the
//!    leading `%PDF-` signature, never the declared content-type.
//! 3. Extract text per page, normalize whitespace, and split into ordered
//!    chunks on paragraph boundaries.
//! 4. Atomically replace the document's chunk set through the store.
//!
//! # Examples
//!
//! ```no_run
//! use docket_materializer::{HttpFetcher, Materializer, MaterializerConfig};
//! use docket_store::SqliteStore;
//! use std::sync::{Arc, Mutex};
//!
//! # async fn demo() {
//! let store = Arc::new(Mutex::new(SqliteStore::new(":memory:").unwrap()));
//! let materializer =
//!     Materializer::new(store, HttpFetcher::new(), MaterializerConfig::default());
//! let report = materializer.materialize("2024-cv-00123").await.unwrap();
//! println!("{} chunks", report.chunk_count);
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod error;
mod extract;
mod fetch;
mod materializer;
mod resolver;

pub use chunking::chunk_text;
pub use config::MaterializerConfig;
pub use error::MaterializerError;
pub use extract::{extract_text, normalize};
pub use fetch::{BlobFetcher, HttpFetcher};
pub use materializer::{MaterializeReport, Materializer};
pub use resolver::{resolve_document, ResolvedDocument};
