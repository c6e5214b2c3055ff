//! HTTP request handlers for the Docket server.
//!
//! Implements ingest, materialize, run lifecycle, checkout, and payment
//! webhook endpoints using axum.

use crate::config::ServerConfig;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use docket_domain::time::now_epoch_secs;
use docket_domain::traits::DocumentStore;
use docket_domain::{AnalysisRun, Document, OwnerId, RunId, SourceDescriptor, Tier};
use docket_entitlement::ProfileFlags;
use docket_materializer::{resolve_document, HttpFetcher, Materializer, MaterializerError};
use docket_payments::{
    CheckoutService, CheckoutSession, HostedCheckout, PaymentError, WebhookAck, WebhookProcessor,
};
use docket_runs::{CallerContext, ExecuteOutcome, RunError, RunService};
use docket_store::{SqliteStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Header carrying the end-user principal id
pub const HEADER_USER: &str = "x-docket-user";

/// Header marking internal automation callers
pub const HEADER_SYSTEM: &str = "x-docket-system";

/// Header carrying the payment webhook signature (hex HMAC-SHA256)
pub const HEADER_SIGNATURE: &str = "x-payment-signature";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Shared store handle
    pub store: Arc<Mutex<SqliteStore>>,
    /// Run lifecycle service
    pub runs: Arc<RunService<SqliteStore, HttpFetcher>>,
    /// Document-level materializer
    pub materializer: Arc<Materializer<SqliteStore, HttpFetcher>>,
    /// Checkout session service
    pub checkout: Arc<CheckoutService<SqliteStore, HostedCheckout>>,
    /// Payment webhook processor
    pub webhook: Arc<WebhookProcessor<SqliteStore>>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build the full state graph over one store
    pub fn new(store: SqliteStore, config: ServerConfig) -> Self {
        let store = Arc::new(Mutex::new(store));
        let runs = Arc::new(RunService::new(
            store.clone(),
            HttpFetcher::new(),
            config.materializer.clone(),
            config.engine.clone(),
            config.admin_users.clone(),
        ));
        let materializer = Arc::new(Materializer::new(
            store.clone(),
            HttpFetcher::new(),
            config.materializer.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            store.clone(),
            HostedCheckout::new(&config.checkout),
            config.checkout.clone(),
        ));
        let webhook = Arc::new(WebhookProcessor::new(
            store.clone(),
            config.webhook_secret.as_bytes().to_vec(),
        ));
        Self {
            store,
            runs,
            materializer,
            checkout,
            webhook,
            config: Arc::new(config),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed input (ids, bodies, missing identity)
    BadRequest(String),
    /// Missing or invalid credentials (webhook signature)
    Unauthorized(String),
    /// Caller is identified but not permitted
    Forbidden(String),
    /// No such resource
    NotFound(String),
    /// The write clashes with an existing resource
    Conflict(String),
    /// An upstream dependency failed (fetch target, payment provider)
    Upstream(String),
    /// Internal server error
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m),
            AppError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            AppError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<MaterializerError> for AppError {
    fn from(e: MaterializerError) -> Self {
        match e {
            MaterializerError::NotFound(t) => AppError::NotFound(t),
            MaterializerError::Fetch(_) | MaterializerError::Timeout => {
                AppError::Upstream(e.to_string())
            }
            MaterializerError::Store(m) => AppError::Internal(m),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<RunError> for AppError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::NotFound(t) => AppError::NotFound(t),
            RunError::NotAuthorized(m) => AppError::Forbidden(m),
            RunError::Materialize(m) => m.into(),
            RunError::Execution(m) => AppError::Internal(m),
            RunError::Store(m) => AppError::Internal(m),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::SignatureInvalid => AppError::Unauthorized(e.to_string()),
            PaymentError::MalformedPayload(m) => AppError::BadRequest(m),
            PaymentError::UnknownRun(r) => AppError::NotFound(r),
            PaymentError::Provider(m) => AppError::Upstream(m),
            PaymentError::Store(m) | PaymentError::Config(m) => AppError::Internal(m),
        }
    }
}

/// Resolve the calling principal from request headers
fn caller_context(headers: &HeaderMap, config: &ServerConfig) -> Result<CallerContext, AppError> {
    if headers.contains_key(HEADER_SYSTEM) {
        return Ok(CallerContext::system());
    }
    let id = headers
        .get(HEADER_USER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "caller identity required ({} or {})",
                HEADER_USER, HEADER_SYSTEM
            ))
        })?;
    let profile = ProfileFlags {
        is_admin: config.admin_users.iter().any(|a| a == id),
        free_access: config.free_users.iter().any(|a| a == id),
        free_tier: config.free_tier,
    };
    Ok(CallerContext::user(id).with_profile(profile))
}

fn parse_run_id(raw: &str) -> Result<RunId, AppError> {
    RunId::parse(raw).map_err(|_| AppError::BadRequest(format!("invalid run id: {}", raw)))
}

/// Document ingest request
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Owning principal id
    pub owner: String,
    /// Where the record's binary lives
    pub source: SourceDescriptor,
    /// Optional external identifier (docket/case reference)
    #[serde(default)]
    pub external_ref: Option<String>,
    /// Optional free-form provenance metadata
    #[serde(default)]
    pub provenance: Option<serde_json::Value>,
}

/// Document ingest response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Id of the new document
    pub document_id: String,
}

/// Materialize response
#[derive(Debug, Serialize)]
pub struct MaterializeResponse {
    /// The document whose chunk set was replaced
    pub document_id: String,
    /// Number of chunks written
    pub chunk_count: usize,
}

/// Run creation request
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    /// Document token (id or external reference)
    pub document: String,
    /// Requested tier
    pub tier: Tier,
    /// Run owner; defaults to the calling user
    #[serde(default)]
    pub owner: Option<String>,
}

/// Checkout request
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Tier to purchase
    pub tier: Tier,
}

/// Execute response; `payment_required` and `error` are branch values,
/// not HTTP failures
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    /// One of `done`, `payment_required`, `error`
    pub status: &'static str,
    /// The updated run, present when `done`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<AnalysisRun>,
    /// Failure message, present when `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Webhook acknowledgement response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `applied` or `ignored`
    pub ack: &'static str,
    /// The run the payment landed on, when applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Why nothing was applied, when ignored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
}

/// POST /documents - Ingest a document record
async fn ingest_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let ctx = caller_context(&headers, &state.config)?;
    let owner = OwnerId::new(request.owner);
    if !ctx.may_act_for(&owner, &state.config.admin_users) {
        return Err(AppError::Forbidden(format!(
            "caller may not ingest documents for owner {}",
            owner
        )));
    }

    let mut document = Document::new(owner, request.source, now_epoch_secs());
    if let Some(external_ref) = request.external_ref {
        document = document.with_external_ref(external_ref);
    }
    if let Some(provenance) = request.provenance {
        document = document.with_provenance(provenance);
    }

    let mut store = state
        .store
        .lock()
        .map_err(|_| AppError::Internal("store mutex poisoned".to_string()))?;
    store.insert_document(&document).map_err(|e| match e {
        StoreError::Duplicate(m) => AppError::Conflict(m),
        other => AppError::Internal(other.to_string()),
    })?;

    Ok(Json(IngestResponse {
        document_id: document.id.to_string(),
    }))
}

/// POST /documents/{token}/materialize - Fetch, extract and chunk a document
async fn materialize_document(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MaterializeResponse>, AppError> {
    let ctx = caller_context(&headers, &state.config)?;
    // Resolve first so the owner gate runs before any bytes are fetched.
    {
        let store = state
            .store
            .lock()
            .map_err(|_| AppError::Internal("store mutex poisoned".to_string()))?;
        let resolved = resolve_document(&*store, &token)?;
        if !ctx.may_act_for(&resolved.document.owner, &state.config.admin_users) {
            return Err(AppError::Forbidden(format!(
                "caller may not materialize document {}",
                resolved.document.id
            )));
        }
    }
    let report = state.materializer.materialize(&token).await?;
    Ok(Json(MaterializeResponse {
        document_id: report.document_id.to_string(),
        chunk_count: report.chunk_count,
    }))
}

/// POST /runs - Create an analysis run
async fn create_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRunRequest>,
) -> Result<Json<AnalysisRun>, AppError> {
    let ctx = caller_context(&headers, &state.config)?;
    let owner = request
        .owner
        .or_else(|| ctx.caller.user_id().map(str::to_string))
        .ok_or_else(|| {
            AppError::BadRequest("owner is required for system callers".to_string())
        })?;

    let run = state
        .runs
        .create(OwnerId::new(owner), &request.document, request.tier, &ctx)?;
    Ok(Json(run))
}

/// GET /runs/{id} - Fetch a run
async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AnalysisRun>, AppError> {
    let ctx = caller_context(&headers, &state.config)?;
    let run = state.runs.get(parse_run_id(&id)?, &ctx)?;
    Ok(Json(run))
}

/// POST /runs/{id}/materialize - Materialize the run's document
///
/// Unlike the document-level endpoint, a pipeline failure here is captured
/// onto the run before it surfaces.
async fn materialize_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MaterializeResponse>, AppError> {
    let ctx = caller_context(&headers, &state.config)?;
    let report = state.runs.materialize(parse_run_id(&id)?, &ctx).await?;
    Ok(Json(MaterializeResponse {
        document_id: report.document_id.to_string(),
        chunk_count: report.chunk_count,
    }))
}

/// POST /runs/{id}/execute - Execute the audit
async fn execute_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ExecuteResponse>, AppError> {
    let ctx = caller_context(&headers, &state.config)?;
    match state.runs.execute(parse_run_id(&id)?, &ctx) {
        Ok(ExecuteOutcome::Completed { run }) => Ok(Json(ExecuteResponse {
            status: "done",
            run: Some(run),
            error: None,
        })),
        Ok(ExecuteOutcome::PaymentRequired) => Ok(Json(ExecuteResponse {
            status: "payment_required",
            run: None,
            error: None,
        })),
        // The run already carries the failure; report it as a branch value.
        Err(RunError::Execution(message)) => Ok(Json(ExecuteResponse {
            status: "error",
            run: None,
            error: Some(message),
        })),
        Err(e) => Err(e.into()),
    }
}

/// POST /runs/{id}/checkout - Open a checkout session for a run
async fn create_checkout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSession>, AppError> {
    let ctx = caller_context(&headers, &state.config)?;
    let run_id = parse_run_id(&id)?;
    // Ownership gate before any token is minted.
    state.runs.get(run_id, &ctx)?;
    let session = state.checkout.create(run_id, request.tier).await?;
    Ok(Json(session))
}

/// POST /webhooks/payment - Payment provider callback
///
/// The signature is verified over the raw body before anything else; an
/// unverifiable delivery is rejected with no side effects.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let signature = headers
        .get(HEADER_SIGNATURE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", HEADER_SIGNATURE)))?;

    let ack = state.webhook.process(&body, signature, now_epoch_secs())?;
    let response = match ack {
        WebhookAck::Applied { run_id } => WebhookResponse {
            ack: "applied",
            run_id: Some(run_id.to_string()),
            reason: None,
        },
        WebhookAck::Ignored { reason } => WebhookResponse {
            ack: "ignored",
            run_id: None,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}

/// GET /health - Liveness check
async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/documents", post(ingest_document))
        .route("/documents/:token/materialize", post(materialize_document))
        .route("/runs", post(create_run))
        .route("/runs/:id", get(get_run))
        .route("/runs/:id/materialize", post(materialize_run))
        .route("/runs/:id/execute", post(execute_run))
        .route("/runs/:id/checkout", post(create_checkout))
        .route("/webhooks/payment", post(payment_webhook))
        .route("/health", get(health_check))
        .with_state(state)
}
