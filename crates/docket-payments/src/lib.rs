//! Docket Payments
//!
//! Payment adapter for Docket: hosted checkout session creation and webhook
//! reconciliation. Checkout mints a single-use [`PurchaseToken`] bound to a
//! run and tier; the provider's signed webhook claims the token and applies
//! payment state onto the run. Run status never changes here - the
//! entitlement resolver picks up `paid`/`tier` on the next execute.
//!
//! [`PurchaseToken`]: docket_domain::PurchaseToken

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkout;
pub mod config;
pub mod error;
pub mod webhook;

pub use checkout::{CheckoutProvider, CheckoutService, CheckoutSession, HostedCheckout};
pub use config::CheckoutConfig;
pub use error::PaymentError;
pub use webhook::{sign, verify_signature, PaymentEvent, WebhookAck, WebhookProcessor};
