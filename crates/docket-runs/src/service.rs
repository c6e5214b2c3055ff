//! Run lifecycle orchestration
//!
//! One service owns the pending_payment → running → done/error lifecycle.
//! Payment never flows through here; the webhook mutates `meta.paid` out of
//! band and execute re-resolves entitlement from whatever is stored at that
//! moment.

use crate::error::RunError;
use docket_audit::{AuditOutcome, Engine, EngineOptions, ScanStats};
use docket_domain::finding::{KIND_ENGINE_NOTICE, KIND_NO_SIGNAL};
use docket_domain::time::now_epoch_secs;
use docket_domain::traits::{DocumentStore, RunStore};
use docket_domain::{
    AnalysisRun, Category, Confidence, Finding, FindingMeta, OwnerId, RunId, RunStats, RunStatus,
    Severity, Tier,
};
use docket_entitlement::{resolve, Caller, EntitlementRequest, ProfileFlags};
use docket_materializer::{
    resolve_document, BlobFetcher, Materializer, MaterializerConfig, MaterializerError,
    MaterializeReport,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// The calling principal plus their stored profile flags
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// Who is asking
    pub caller: Caller,

    /// Stored profile flags for the caller
    pub profile: ProfileFlags,
}

impl CallerContext {
    /// Context for internal automation
    pub fn system() -> Self {
        Self {
            caller: Caller::System,
            profile: ProfileFlags::default(),
        }
    }

    /// Context for an end user with default profile flags
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            caller: Caller::EndUser { id: id.into() },
            profile: ProfileFlags::default(),
        }
    }

    /// Attach stored profile flags
    pub fn with_profile(mut self, profile: ProfileFlags) -> Self {
        self.profile = profile;
        self
    }

    /// Whether this caller may act on a resource owned by `owner`
    ///
    /// System callers and administrators (allow-list or profile flag) may
    /// act on anything; end users only on their own resources.
    pub fn may_act_for(&self, owner: &OwnerId, admin_allowlist: &[String]) -> bool {
        match &self.caller {
            Caller::System => true,
            Caller::EndUser { id } => {
                self.profile.is_admin
                    || admin_allowlist.iter().any(|a| a == id)
                    || owner.as_str() == id
            }
        }
    }
}

/// Outcome of an execute request
#[derive(Debug, Clone)]
pub enum ExecuteOutcome {
    /// Entitlement denied; the run is untouched and recoverable via payment
    PaymentRequired,

    /// The audit ran; the run is `done` with findings and a summary
    Completed {
        /// The updated run as persisted
        run: AnalysisRun,
    },
}

/// Orchestrates analysis runs over one shared store
pub struct RunService<S, F>
where
    S: DocumentStore,
    F: BlobFetcher,
{
    store: Arc<Mutex<S>>,
    materializer: Materializer<S, F>,
    options: EngineOptions,
    admin_allowlist: Vec<String>,
}

impl<S, F> RunService<S, F>
where
    S: DocumentStore + RunStore,
    <S as DocumentStore>::Error: std::fmt::Display,
    <S as RunStore>::Error: std::fmt::Display,
    F: BlobFetcher,
{
    /// Create a new run service
    pub fn new(
        store: Arc<Mutex<S>>,
        fetcher: F,
        materializer_config: MaterializerConfig,
        options: EngineOptions,
        admin_allowlist: Vec<String>,
    ) -> Self {
        let materializer = Materializer::new(store.clone(), fetcher, materializer_config);
        Self {
            store,
            materializer,
            options,
            admin_allowlist,
        }
    }

    /// Create a run for a document
    ///
    /// Entitlement is resolved once at creation: an entitled caller starts
    /// at `running`, anyone else at `pending_payment`.
    pub fn create(
        &self,
        owner: OwnerId,
        document_token: &str,
        tier: Tier,
        ctx: &CallerContext,
    ) -> Result<AnalysisRun, RunError> {
        let mut store = self.lock()?;

        let resolved = resolve_document(&*store, document_token).map_err(map_materializer)?;
        if !ctx.may_act_for(&resolved.document.owner, &self.admin_allowlist) {
            return Err(RunError::NotAuthorized(format!(
                "caller may not target document {} owned by {}",
                resolved.document.id, resolved.document.owner
            )));
        }

        let decision = resolve(&EntitlementRequest {
            caller: &ctx.caller,
            profile: ctx.profile,
            admin_allowlist: &self.admin_allowlist,
            paid: false,
            tier,
        });
        let status = if decision.allowed {
            RunStatus::Running
        } else {
            RunStatus::PendingPayment
        };

        let run = AnalysisRun::new(owner, resolved.document.id, status, tier, now_epoch_secs());
        RunStore::insert_run(&mut *store, &run).map_err(|e| RunError::Store(e.to_string()))?;

        info!(run_id = %run.id, document_id = %run.document_id, status = run.status.as_str(), "run created");
        Ok(run)
    }

    /// Get a run, enforcing ownership
    pub fn get(&self, run_id: RunId, ctx: &CallerContext) -> Result<AnalysisRun, RunError> {
        let store = self.lock()?;
        let run = load_run(&*store, run_id)?;
        self.authorize(&run, ctx)?;
        Ok(run)
    }

    /// Materialize the run's document
    ///
    /// A pipeline failure is captured onto the run (`error` status) before
    /// it propagates.
    pub async fn materialize(
        &self,
        run_id: RunId,
        ctx: &CallerContext,
    ) -> Result<MaterializeReport, RunError> {
        let run = {
            let store = self.lock()?;
            let run = load_run(&*store, run_id)?;
            self.authorize(&run, ctx)?;
            run
        };

        match self
            .materializer
            .materialize(&run.document_id.to_string())
            .await
        {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "materialize failed");
                let mut store = self.lock()?;
                let mut run = load_run(&*store, run_id)?;
                run.fail(e.to_string(), now_epoch_secs());
                RunStore::update_run(&mut *store, &run)
                    .map_err(|se| RunError::Store(se.to_string()))?;
                Err(RunError::Materialize(e))
            }
        }
    }

    /// Execute the audit for a run
    ///
    /// Entitlement is re-resolved from current state, so a payment applied
    /// since creation takes effect here. Re-executing a `done` run replaces
    /// its findings wholesale.
    pub fn execute(&self, run_id: RunId, ctx: &CallerContext) -> Result<ExecuteOutcome, RunError> {
        self.options
            .validate()
            .map_err(RunError::Execution)?;

        let mut store = self.lock()?;
        let mut run = load_run(&*store, run_id)?;
        self.authorize(&run, ctx)?;

        let decision = resolve(&EntitlementRequest {
            caller: &ctx.caller,
            profile: ctx.profile,
            admin_allowlist: &self.admin_allowlist,
            paid: run.meta.paid,
            tier: run.meta.tier,
        });
        if !decision.allowed {
            info!(run_id = %run_id, "execute blocked pending payment");
            return Ok(ExecuteOutcome::PaymentRequired);
        }

        let chunks = match DocumentStore::get_chunks(&*store, run.document_id) {
            Ok(chunks) => chunks,
            Err(e) => return Err(self.fail_run(&mut *store, run, e.to_string())),
        };
        if chunks.is_empty() {
            return Err(self.fail_run(
                &mut *store,
                run,
                "document has no materialized chunks".to_string(),
            ));
        }

        let engine = Engine::new(self.options.clone());
        let (mut findings, stats) = match engine.scan(&chunks) {
            AuditOutcome::Scanned { findings, stats } => (findings, stats),
            AuditOutcome::Degenerate => (
                vec![degenerate_notice()],
                ScanStats {
                    chunks_scanned: chunks.len(),
                    ..ScanStats::default()
                },
            ),
        };
        // Pro audits report quiet categories explicitly.
        if decision.tier == Tier::Pro {
            append_no_signal_findings(&mut findings);
        }

        let now = now_epoch_secs();
        let run_stats = RunStats {
            chunks_scanned: stats.chunks_scanned,
            findings: findings.len(),
            suppressed: stats.suppressed,
        };
        run.status = RunStatus::Done;
        run.meta.tier = decision.tier;
        run.meta.export_allowed = decision.export_allowed;
        run.meta.findings = findings;
        run.meta.stats = Some(run_stats);
        run.meta.error = None;
        run.summary = Some(format!(
            "Scanned {} chunks; {} findings ({} suppressed).",
            run_stats.chunks_scanned, run_stats.findings, run_stats.suppressed
        ));
        run.updated_at = now;

        RunStore::update_run(&mut *store, &run).map_err(|e| RunError::Store(e.to_string()))?;
        info!(run_id = %run.id, findings = run_stats.findings, "run executed");
        Ok(ExecuteOutcome::Completed { run })
    }

    fn authorize(&self, run: &AnalysisRun, ctx: &CallerContext) -> Result<(), RunError> {
        if ctx.may_act_for(&run.owner, &self.admin_allowlist) {
            Ok(())
        } else {
            Err(RunError::NotAuthorized(format!(
                "caller does not own run {}",
                run.id
            )))
        }
    }

    /// Capture a failure onto the run, persist it, and return the error
    fn fail_run(&self, store: &mut S, mut run: AnalysisRun, message: String) -> RunError {
        warn!(run_id = %run.id, error = message, "execute failed");
        run.fail(&message, now_epoch_secs());
        if let Err(e) = RunStore::update_run(store, &run) {
            return RunError::Store(e.to_string());
        }
        RunError::Execution(message)
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, RunError> {
        self.store
            .lock()
            .map_err(|_| RunError::Store("store mutex poisoned".to_string()))
    }
}

fn load_run<S>(store: &S, run_id: RunId) -> Result<AnalysisRun, RunError>
where
    S: RunStore,
    S::Error: std::fmt::Display,
{
    RunStore::get_run(store, run_id)
        .map_err(|e| RunError::Store(e.to_string()))?
        .ok_or_else(|| RunError::NotFound(run_id.to_string()))
}

fn map_materializer(e: MaterializerError) -> RunError {
    match e {
        MaterializerError::NotFound(token) => RunError::NotFound(token),
        other => RunError::Materialize(other),
    }
}

/// The single finding substituted for a degenerate scan
fn degenerate_notice() -> Finding {
    Finding {
        kind: KIND_ENGINE_NOTICE.to_string(),
        category: Category::Consistency,
        severity: Severity::Info,
        confidence: Confidence::Low,
        claim: "Chunk contents look like serialized data rather than extracted \
                prose; re-materialize the document before auditing."
            .to_string(),
        evidence: Vec::new(),
        meta: FindingMeta::default(),
    }
}

/// Add an explicit none-detected finding for each quiet category
fn append_no_signal_findings(findings: &mut Vec<Finding>) {
    let covered: HashSet<Category> = findings.iter().map(|f| f.category).collect();
    for category in Category::ALL {
        if covered.contains(&category) {
            continue;
        }
        findings.push(Finding {
            kind: KIND_NO_SIGNAL.to_string(),
            category,
            severity: Severity::Info,
            confidence: Confidence::Low,
            claim: format!(
                "No {} research signals detected in the scanned text.",
                category.as_str()
            ),
            evidence: Vec::new(),
            meta: FindingMeta::default(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_domain::{Document, SourceDescriptor};
    use docket_materializer::MaterializerConfig;
    use docket_store::SqliteStore;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// A fetcher that always serves the same bytes.
    struct StaticFetcher(Vec<u8>);

    impl BlobFetcher for StaticFetcher {
        async fn fetch(
            &self,
            _source: &SourceDescriptor,
            _config: &MaterializerConfig,
        ) -> Result<Vec<u8>, MaterializerError> {
            Ok(self.0.clone())
        }
    }

    fn make_pdf(text: &str) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn store_with_document() -> (Arc<Mutex<SqliteStore>>, docket_domain::DocumentId) {
        let mut store = SqliteStore::new(":memory:").unwrap();
        let doc = Document::new(
            OwnerId::new("user-1"),
            SourceDescriptor::RemoteUrl {
                url: "https://example.org/record.pdf".to_string(),
            },
            now_epoch_secs(),
        )
        .with_external_ref("2024-cv-9");
        store.insert_document(&doc).unwrap();
        (Arc::new(Mutex::new(store)), doc.id)
    }

    fn service(
        store: Arc<Mutex<SqliteStore>>,
        bytes: Vec<u8>,
    ) -> RunService<SqliteStore, StaticFetcher> {
        RunService::new(
            store,
            StaticFetcher(bytes),
            MaterializerConfig::default(),
            EngineOptions::default(),
            vec!["ops-admin".to_string()],
        )
    }

    #[test]
    fn test_create_system_caller_starts_running() {
        let (store, _) = store_with_document();
        let service = service(store, Vec::new());
        let run = service
            .create(
                OwnerId::new("user-1"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::system(),
            )
            .unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(!run.meta.paid);
    }

    #[test]
    fn test_create_unpaid_user_starts_pending_payment() {
        let (store, _) = store_with_document();
        let service = service(store, Vec::new());
        let run = service
            .create(
                OwnerId::new("user-1"),
                "2024-cv-9",
                Tier::Pro,
                &CallerContext::user("user-1"),
            )
            .unwrap();
        assert_eq!(run.status, RunStatus::PendingPayment);
    }

    #[test]
    fn test_create_unknown_document_is_not_found() {
        let (store, _) = store_with_document();
        let service = service(store, Vec::new());
        assert!(matches!(
            service.create(
                OwnerId::new("user-1"),
                "missing",
                Tier::Basic,
                &CallerContext::system(),
            ),
            Err(RunError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_full_lifecycle_for_free_grant_user() {
        let (store, document_id) = store_with_document();
        let pdf = make_pdf("The hearing was continued to March 14, 2023 per the order.");
        let service = service(store.clone(), pdf);
        let ctx = CallerContext::user("user-1").with_profile(ProfileFlags {
            free_access: true,
            ..ProfileFlags::default()
        });

        let run = service
            .create(OwnerId::new("user-1"), "2024-cv-9", Tier::Basic, &ctx)
            .unwrap();
        assert_eq!(run.status, RunStatus::Running);

        let report = service.materialize(run.id, &ctx).await.unwrap();
        assert_eq!(report.document_id, document_id);
        assert!(report.chunk_count >= 1);

        let outcome = service.execute(run.id, &ctx).unwrap();
        let ExecuteOutcome::Completed { run: done } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(done.status, RunStatus::Done);
        assert!(!done.meta.findings.is_empty());
        let stats = done.meta.stats.unwrap();
        assert_eq!(
            done.summary.as_deref(),
            Some(
                format!(
                    "Scanned {} chunks; {} findings ({} suppressed).",
                    stats.chunks_scanned, stats.findings, stats.suppressed
                )
                .as_str()
            )
        );
    }

    #[test]
    fn test_execute_unpaid_is_payment_required_without_transition() {
        let (store, _) = store_with_document();
        let service = service(store.clone(), Vec::new());
        let ctx = CallerContext::user("user-1");
        let run = service
            .create(OwnerId::new("user-1"), "2024-cv-9", Tier::Basic, &ctx)
            .unwrap();

        let outcome = service.execute(run.id, &ctx).unwrap();
        assert!(matches!(outcome, ExecuteOutcome::PaymentRequired));

        let stored = store.lock().unwrap().get_run(run.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::PendingPayment);
        assert!(stored.meta.findings.is_empty());
    }

    #[test]
    fn test_execute_after_payment_proceeds() {
        let (store, document_id) = store_with_document();
        store
            .lock()
            .unwrap()
            .replace_chunks(document_id, &["Filed on January 3, 2021 and again on 02/04/2021.".to_string()])
            .unwrap();
        let service = service(store.clone(), Vec::new());
        let ctx = CallerContext::user("user-1");
        let run = service
            .create(OwnerId::new("user-1"), "2024-cv-9", Tier::Basic, &ctx)
            .unwrap();

        // The webhook applies payment out of band.
        {
            let mut guard = store.lock().unwrap();
            let mut stored = guard.get_run(run.id).unwrap().unwrap();
            stored.apply_payment(Tier::Basic, "evt-1", now_epoch_secs());
            guard.update_run(&stored).unwrap();
        }

        let outcome = service.execute(run.id, &ctx).unwrap();
        let ExecuteOutcome::Completed { run: done } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(done.status, RunStatus::Done);
        assert!(done.meta.paid);
    }

    #[test]
    fn test_execute_without_chunks_fails_the_run() {
        let (store, _) = store_with_document();
        let service = service(store.clone(), Vec::new());
        let run = service
            .create(
                OwnerId::new("user-1"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::system(),
            )
            .unwrap();

        assert!(matches!(
            service.execute(run.id, &CallerContext::system()),
            Err(RunError::Execution(_))
        ));
        let stored = store.lock().unwrap().get_run(run.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Error);
        assert!(stored.meta.error.is_some());
    }

    #[tokio::test]
    async fn test_materialize_failure_fails_the_run() {
        let (store, _) = store_with_document();
        let service = service(store.clone(), b"<html>sign in</html>".to_vec());
        let run = service
            .create(
                OwnerId::new("user-1"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::system(),
            )
            .unwrap();

        assert!(matches!(
            service.materialize(run.id, &CallerContext::system()).await,
            Err(RunError::Materialize(MaterializerError::NotPdf))
        ));
        let stored = store.lock().unwrap().get_run(run.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Error);
    }

    #[test]
    fn test_degenerate_chunks_yield_engine_notice() {
        let (store, document_id) = store_with_document();
        store
            .lock()
            .unwrap()
            .replace_chunks(
                document_id,
                &["{\"page\": 1}".to_string(), "[1, 2, 3]".to_string()],
            )
            .unwrap();
        let service = service(store, Vec::new());
        let run = service
            .create(
                OwnerId::new("user-1"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::system(),
            )
            .unwrap();

        let ExecuteOutcome::Completed { run: done } =
            service.execute(run.id, &CallerContext::system()).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(done.meta.findings.len(), 1);
        assert_eq!(done.meta.findings[0].kind, KIND_ENGINE_NOTICE);
        assert_eq!(done.status, RunStatus::Done);
    }

    #[test]
    fn test_pro_tier_reports_quiet_categories() {
        let (store, document_id) = store_with_document();
        store
            .lock()
            .unwrap()
            .replace_chunks(
                document_id,
                &["Hearings on January 3, 2021 and 02/04/2021 were continued.".to_string()],
            )
            .unwrap();
        let service = service(store, Vec::new());
        let ctx = CallerContext::user("admin-ann").with_profile(ProfileFlags {
            is_admin: true,
            ..ProfileFlags::default()
        });
        let run = service
            .create(OwnerId::new("admin-ann"), "2024-cv-9", Tier::Basic, &ctx)
            .unwrap();

        let ExecuteOutcome::Completed { run: done } = service.execute(run.id, &ctx).unwrap()
        else {
            panic!("expected completion");
        };
        // Admins resolve to pro, so quiet categories show up explicitly.
        assert_eq!(done.meta.tier, Tier::Pro);
        let no_signal: Vec<_> = done
            .meta
            .findings
            .iter()
            .filter(|f| f.kind == KIND_NO_SIGNAL)
            .collect();
        assert!(!no_signal.is_empty());
        let covered: HashSet<Category> =
            done.meta.findings.iter().map(|f| f.category).collect();
        assert_eq!(covered.len(), Category::ALL.len());
    }

    #[test]
    fn test_execute_requires_ownership() {
        let (store, _) = store_with_document();
        let service = service(store, Vec::new());
        let run = service
            .create(
                OwnerId::new("user-1"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::system(),
            )
            .unwrap();

        assert!(matches!(
            service.execute(run.id, &CallerContext::user("intruder")),
            Err(RunError::NotAuthorized(_))
        ));
        // The admin allow-list opens access without ownership.
        assert!(service
            .get(run.id, &CallerContext::user("ops-admin"))
            .is_ok());
    }

    #[test]
    fn test_create_foreign_document_is_not_authorized() {
        let (store, _) = store_with_document();
        let service = service(store, Vec::new());

        // The document belongs to user-1; another end user may not target it.
        assert!(matches!(
            service.create(
                OwnerId::new("intruder"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::user("intruder"),
            ),
            Err(RunError::NotAuthorized(_))
        ));
        // Allow-listed admins and system automation still may.
        assert!(service
            .create(
                OwnerId::new("ops-admin"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::user("ops-admin"),
            )
            .is_ok());
    }

    #[test]
    fn test_reexecute_replaces_findings() {
        let (store, document_id) = store_with_document();
        store
            .lock()
            .unwrap()
            .replace_chunks(
                document_id,
                &["Exhibit A was filed on January 3, 2021.".to_string()],
            )
            .unwrap();
        let service = service(store, Vec::new());
        let run = service
            .create(
                OwnerId::new("user-1"),
                "2024-cv-9",
                Tier::Basic,
                &CallerContext::system(),
            )
            .unwrap();

        let ExecuteOutcome::Completed { run: first } =
            service.execute(run.id, &CallerContext::system()).unwrap()
        else {
            panic!("expected completion");
        };
        let ExecuteOutcome::Completed { run: second } =
            service.execute(run.id, &CallerContext::system()).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(first.meta.findings, second.meta.findings);
    }
}
