//! Trait definitions for the persistence seams
//!
//! These traits define the boundary between domain logic and the storage
//! layer. Infrastructure implementations live in docket-store; tests use
//! in-memory doubles.

use crate::chunk::Chunk;
use crate::document::Document;
use crate::ids::{DocumentId, RunId};
use crate::run::AnalysisRun;
use crate::token::PurchaseToken;

/// Storage for documents and their chunk sets
pub trait DocumentStore {
    /// Error type for store operations
    type Error;

    /// Insert a new document record
    fn insert_document(&mut self, document: &Document) -> Result<(), Self::Error>;

    /// Get a document by id
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, Self::Error>;

    /// Look up a document by its external reference
    fn find_document_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Document>, Self::Error>;

    /// Atomically replace the document's entire chunk set
    ///
    /// Deletes all existing chunks and inserts `contents` with contiguous
    /// zero-based indices, as one logical unit. A partial replacement must
    /// never be observable. Returns the new chunk count.
    fn replace_chunks(&mut self, id: DocumentId, contents: &[String])
        -> Result<usize, Self::Error>;

    /// Get the document's chunks ordered by index
    fn get_chunks(&self, id: DocumentId) -> Result<Vec<Chunk>, Self::Error>;
}

/// Storage for analysis runs
pub trait RunStore {
    /// Error type for store operations
    type Error;

    /// Insert a new run
    fn insert_run(&mut self, run: &AnalysisRun) -> Result<(), Self::Error>;

    /// Get a run by id
    fn get_run(&self, id: RunId) -> Result<Option<AnalysisRun>, Self::Error>;

    /// Persist the run's current state (status, meta, summary)
    fn update_run(&mut self, run: &AnalysisRun) -> Result<(), Self::Error>;
}

/// Outcome of attempting to claim a purchase token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenClaim {
    /// The token was atomically marked used; payment state may be applied
    Claimed(PurchaseToken),

    /// The token was already burned by a previous claim
    AlreadyUsed,

    /// The token expired before it was claimed
    Expired,

    /// No such token
    NotFound,
}

/// Storage for purchase tokens
pub trait TokenStore {
    /// Error type for store operations
    type Error;

    /// Persist a freshly minted token
    fn insert_token(&mut self, token: &PurchaseToken) -> Result<(), Self::Error>;

    /// Get a token by its string
    fn get_token(&self, token: &str) -> Result<Option<PurchaseToken>, Self::Error>;

    /// Atomically claim a token at time `now`
    ///
    /// This must be a true compare-and-set: of any number of concurrent
    /// claims for the same token, exactly one observes `Claimed`.
    fn claim_token(&mut self, token: &str, now: u64) -> Result<TokenClaim, Self::Error>;
}
