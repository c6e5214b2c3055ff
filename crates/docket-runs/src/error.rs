//! Run orchestration error types

use docket_materializer::MaterializerError;
use thiserror::Error;

/// Errors from run lifecycle operations
#[derive(Error, Debug)]
pub enum RunError {
    /// No run or document under the given identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller is neither owner, administrator, nor system
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// The materialize pipeline failed; the run was moved to `error`
    #[error(transparent)]
    Materialize(MaterializerError),

    /// Execution failed; the run was moved to `error`
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The persistence layer failed
    #[error("Store error: {0}")]
    Store(String),
}
