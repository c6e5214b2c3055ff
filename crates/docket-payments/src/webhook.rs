//! Payment webhook verification and reconciliation
//!
//! The provider delivers events at-least-once. Safety comes from layering:
//! the HMAC signature over the raw body is checked before anything else,
//! the token burn is a compare-and-set so a redelivered event finds its
//! token already used, and the run itself remembers the last event id it
//! applied.

use crate::checkout::lock;
use crate::error::PaymentError;
use docket_domain::traits::{RunStore, TokenClaim, TokenStore};
use docket_domain::{RunId, Tier};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// A verified, parsed payment event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentEvent {
    /// Provider-assigned event id, stable across redeliveries
    pub event_id: String,

    /// The purchase token the buyer paid against
    pub token: String,

    /// Event status; only `paid` is applied
    pub status: String,

    /// Tier as reported by the provider (informational; the stored token
    /// is authoritative)
    #[serde(default)]
    pub tier: Option<Tier>,
}

/// Outcome of processing one webhook delivery
///
/// Both variants acknowledge the delivery; business-level oddities are
/// `Ignored` so the provider stops retrying them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAck {
    /// Payment state was reconciled onto the run
    Applied {
        /// The run the payment landed on
        run_id: RunId,
    },

    /// The delivery was acknowledged without effect
    Ignored {
        /// Why nothing was applied
        reason: String,
    },
}

/// Verify an HMAC-SHA256 signature (hex) over the raw request body
///
/// Runs before any parse or state change; verification is constant-time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> Result<(), PaymentError> {
    let expected = decode_hex(signature).ok_or(PaymentError::SignatureInvalid)?;
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| PaymentError::SignatureInvalid)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::SignatureInvalid)
}

/// Compute the hex HMAC-SHA256 signature for a body (used by tests and
/// local provider simulation)
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Processes payment webhook deliveries
pub struct WebhookProcessor<S> {
    store: Arc<Mutex<S>>,
    secret: Vec<u8>,
}

impl<S> WebhookProcessor<S>
where
    S: RunStore + TokenStore,
    <S as RunStore>::Error: std::fmt::Display,
    <S as TokenStore>::Error: std::fmt::Display,
{
    /// Create a processor with the provider's shared webhook secret
    pub fn new(store: Arc<Mutex<S>>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }

    /// Verify, parse and reconcile one delivery
    ///
    /// Errors (bad signature, unparseable body, store failure) signal the
    /// provider to retry; acknowledgements never do.
    pub fn process(
        &self,
        body: &[u8],
        signature: &str,
        now: u64,
    ) -> Result<WebhookAck, PaymentError> {
        verify_signature(&self.secret, body, signature)?;

        let event: PaymentEvent = serde_json::from_slice(body)
            .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;

        if event.status != "paid" {
            return Ok(WebhookAck::Ignored {
                reason: format!("status '{}' is not applied", event.status),
            });
        }

        let mut store = lock(&self.store)?;
        let claim = TokenStore::claim_token(&mut *store, &event.token, now)
            .map_err(|e| PaymentError::Store(e.to_string()))?;

        let token = match claim {
            TokenClaim::Claimed(token) => token,
            TokenClaim::AlreadyUsed => {
                // Redelivery of an applied event lands here.
                return Ok(WebhookAck::Ignored {
                    reason: "token already used".to_string(),
                });
            }
            TokenClaim::Expired => {
                return Ok(WebhookAck::Ignored {
                    reason: "token expired".to_string(),
                });
            }
            TokenClaim::NotFound => {
                return Ok(WebhookAck::Ignored {
                    reason: "unknown token".to_string(),
                });
            }
        };

        if let Some(reported) = event.tier {
            if reported != token.tier {
                warn!(
                    event_id = event.event_id,
                    reported = %reported,
                    stored = %token.tier,
                    "provider-reported tier differs from stored token"
                );
            }
        }

        let Some(mut run) = RunStore::get_run(&*store, token.run_id)
            .map_err(|e| PaymentError::Store(e.to_string()))?
        else {
            return Ok(WebhookAck::Ignored {
                reason: format!("run {} not found for claimed token", token.run_id),
            });
        };

        if run.apply_payment(token.tier, &event.event_id, now) {
            RunStore::update_run(&mut *store, &run)
                .map_err(|e| PaymentError::Store(e.to_string()))?;
        }

        info!(event_id = event.event_id, run_id = %run.id, tier = %token.tier, "payment applied");
        Ok(WebhookAck::Applied { run_id: run.id })
    }
}
