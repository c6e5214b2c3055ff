//! Hosted checkout session creation
//!
//! Checkout never mutates run state. It mints a single-use purchase token,
//! persists it, and hands it to the provider; payment only lands on the run
//! when the provider's webhook comes back and the token is claimed.

use crate::config::CheckoutConfig;
use crate::error::PaymentError;
use docket_domain::time::now_epoch_secs;
use docket_domain::traits::{RunStore, TokenStore};
use docket_domain::{PurchaseToken, RunId, Tier};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

/// A hosted checkout session created at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Where the buyer completes payment
    pub redirect_url: String,

    /// The purchase token bound to this session
    pub token: String,
}

/// Creates hosted checkout sessions at a payment provider
///
/// The HTTP implementation talks to the real provider; tests use doubles.
pub trait CheckoutProvider {
    /// Create a session for `token` purchasing `tier` on `run_id`
    fn create_session(
        &self,
        token: &PurchaseToken,
    ) -> impl std::future::Future<Output = Result<String, PaymentError>> + Send;
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    token: &'a str,
    run_id: String,
    tier: Tier,
}

#[derive(Deserialize)]
struct SessionResponse {
    redirect_url: String,
}

/// Provider client for hosted checkout over HTTP
#[derive(Debug, Clone)]
pub struct HostedCheckout {
    client: reqwest::Client,
    endpoint: String,
}

impl HostedCheckout {
    /// Create a client against the configured endpoint
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
        }
    }
}

impl CheckoutProvider for HostedCheckout {
    async fn create_session(&self, token: &PurchaseToken) -> Result<String, PaymentError> {
        let request = SessionRequest {
            token: &token.token,
            run_id: token.run_id.to_string(),
            tier: token.tier,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::Provider(format!(
                "POST {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;
        Ok(body.redirect_url)
    }
}

/// Mints tokens and opens checkout sessions for runs awaiting payment
pub struct CheckoutService<S, P> {
    store: Arc<Mutex<S>>,
    provider: P,
    config: CheckoutConfig,
}

impl<S, P> CheckoutService<S, P>
where
    S: RunStore + TokenStore,
    <S as RunStore>::Error: std::fmt::Display,
    <S as TokenStore>::Error: std::fmt::Display,
    P: CheckoutProvider,
{
    /// Create a new checkout service
    pub fn new(store: Arc<Mutex<S>>, provider: P, config: CheckoutConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Open a checkout session purchasing `tier` for `run_id`
    ///
    /// The token is persisted before the provider call, so a webhook racing
    /// the response always finds it.
    pub async fn create(&self, run_id: RunId, tier: Tier) -> Result<CheckoutSession, PaymentError> {
        self.config.validate()?;

        let token = {
            let mut store = lock(&self.store)?;
            let run = RunStore::get_run(&*store, run_id)
                .map_err(|e| PaymentError::Store(e.to_string()))?
                .ok_or_else(|| PaymentError::UnknownRun(run_id.to_string()))?;

            let token = PurchaseToken::mint(
                run.id,
                tier,
                now_epoch_secs() + self.config.token_ttl_secs,
            );
            TokenStore::insert_token(&mut *store, &token)
                .map_err(|e| PaymentError::Store(e.to_string()))?;
            token
        };

        let redirect_url = self.provider.create_session(&token).await?;
        // The token is a live credential; it never goes to the log.
        info!(%run_id, tier = %tier, "checkout session created");

        Ok(CheckoutSession {
            redirect_url,
            token: token.token,
        })
    }
}

pub(crate) fn lock<S>(store: &Arc<Mutex<S>>) -> Result<std::sync::MutexGuard<'_, S>, PaymentError> {
    store
        .lock()
        .map_err(|_| PaymentError::Store("store mutex poisoned".to_string()))
}
