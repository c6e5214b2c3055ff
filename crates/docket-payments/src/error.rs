//! Payment error types

use thiserror::Error;

/// Errors from checkout creation and webhook processing
#[derive(Error, Debug)]
pub enum PaymentError {
    /// The webhook signature did not verify against the shared secret
    #[error("Webhook signature verification failed")]
    SignatureInvalid,

    /// The webhook body was signed but not parseable
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// The run a checkout was requested for does not exist
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    /// The checkout provider rejected the request or was unreachable
    #[error("Checkout provider error: {0}")]
    Provider(String),

    /// The persistence layer failed
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid checkout configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
