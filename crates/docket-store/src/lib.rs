//! Docket Storage Layer
//!
//! Implements the domain store traits over SQLite.
//!
//! # Architecture
//!
//! - SQLite for documents, chunks, runs, and purchase tokens
//! - Chunk replacement is one transaction: delete-all then batched inserts,
//!   so a partial chunk set is never observable and concurrent materializes
//!   of the same document serialize on the write transaction
//! - Token burn is a compare-and-set UPDATE, never a read-then-write
//!
//! # Examples
//!
//! ```no_run
//! use docket_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! ```

#![warn(missing_docs)]

use docket_domain::traits::{DocumentStore, RunStore, TokenClaim, TokenStore};
use docket_domain::{
    AnalysisRun, Chunk, Document, DocumentId, OwnerId, PurchaseToken, RunId, RunMeta, RunStatus,
    SourceDescriptor, Tier,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Rows inserted per prepared-statement batch during chunk replacement
const CHUNK_INSERT_BATCH: usize = 128;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Requested row is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Stored data failed to deserialize
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// SQLite-based implementation of the docket store traits
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Callers share a store through
/// `Arc<Mutex<SqliteStore>>`; the mutex plus SQLite's single-writer
/// transaction serialize chunk replacement per process and per database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    fn id_to_bytes(value: u128) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    fn bytes_to_u128(bytes: &[u8]) -> Result<u128, StoreError> {
        if bytes.len() != 16 {
            return Err(StoreError::InvalidData(format!(
                "Expected 16 bytes for id, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(bytes);
        Ok(u128::from_be_bytes(arr))
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> Result<Document, rusqlite::Error> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let id = Self::bytes_to_u128(&id_bytes)
            .map_err(|e| conversion_error(0, e))?;
        let owner: String = row.get(1)?;
        let source_json: String = row.get(2)?;
        let source: SourceDescriptor = serde_json::from_str(&source_json)
            .map_err(|e| conversion_error(2, StoreError::from(e)))?;
        let external_ref: Option<String> = row.get(3)?;
        let provenance_json: String = row.get(4)?;
        let provenance = serde_json::from_str(&provenance_json)
            .map_err(|e| conversion_error(4, StoreError::from(e)))?;

        Ok(Document {
            id: DocumentId::from_value(id),
            owner: OwnerId::new(owner),
            source,
            external_ref,
            provenance,
            created_at: row.get::<_, i64>(5)? as u64,
        })
    }

    fn row_to_run(row: &rusqlite::Row<'_>) -> Result<AnalysisRun, rusqlite::Error> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let id = Self::bytes_to_u128(&id_bytes).map_err(|e| conversion_error(0, e))?;
        let doc_bytes: Vec<u8> = row.get(2)?;
        let document_id =
            Self::bytes_to_u128(&doc_bytes).map_err(|e| conversion_error(2, e))?;
        let status_str: String = row.get(3)?;
        let status = RunStatus::parse(&status_str).ok_or_else(|| {
            conversion_error(
                3,
                StoreError::InvalidData(format!("Unknown run status: {}", status_str)),
            )
        })?;
        let meta_json: String = row.get(4)?;
        let meta: RunMeta = serde_json::from_str(&meta_json)
            .map_err(|e| conversion_error(4, StoreError::from(e)))?;

        Ok(AnalysisRun {
            id: RunId::from_value(id),
            owner: OwnerId::new(row.get::<_, String>(1)?),
            document_id: DocumentId::from_value(document_id),
            status,
            meta,
            summary: row.get(5)?,
            created_at: row.get::<_, i64>(6)? as u64,
            updated_at: row.get::<_, i64>(7)? as u64,
        })
    }
}

fn conversion_error(col: usize, e: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
}

/// Surface a UNIQUE violation as `Duplicate` instead of a bare database error
fn map_unique_violation(e: rusqlite::Error, what: String) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate(what)
        }
        other => StoreError::Database(other),
    }
}

impl DocumentStore for SqliteStore {
    type Error = StoreError;

    fn insert_document(&mut self, document: &Document) -> Result<(), Self::Error> {
        let source = serde_json::to_string(&document.source)?;
        let provenance = serde_json::to_string(&document.provenance)?;
        self.conn.execute(
            "INSERT INTO documents (id, owner, source, external_ref, provenance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Self::id_to_bytes(document.id.value()),
                document.owner.as_str(),
                source,
                document.external_ref,
                provenance,
                document.created_at as i64,
            ],
        )
        .map_err(|e| {
            map_unique_violation(
                e,
                format!(
                    "document with external_ref {:?} or id {} already exists",
                    document.external_ref, document.id
                ),
            )
        })?;
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, Self::Error> {
        let doc = self
            .conn
            .query_row(
                "SELECT id, owner, source, external_ref, provenance, created_at
                 FROM documents WHERE id = ?1",
                params![Self::id_to_bytes(id.value())],
                Self::row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    fn find_document_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Document>, Self::Error> {
        let doc = self
            .conn
            .query_row(
                "SELECT id, owner, source, external_ref, provenance, created_at
                 FROM documents WHERE external_ref = ?1",
                params![external_ref],
                Self::row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    fn replace_chunks(
        &mut self,
        id: DocumentId,
        contents: &[String],
    ) -> Result<usize, Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![&id_bytes])?;

        let mut next_idx: i64 = 0;
        for batch in contents.chunks(CHUNK_INSERT_BATCH) {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO chunks (document_id, idx, content) VALUES (?1, ?2, ?3)",
            )?;
            for content in batch {
                stmt.execute(params![&id_bytes, next_idx, content])?;
                next_idx += 1;
            }
        }

        tx.commit()?;
        Ok(contents.len())
    }

    fn get_chunks(&self, id: DocumentId) -> Result<Vec<Chunk>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, content FROM chunks WHERE document_id = ?1 ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map(params![Self::id_to_bytes(id.value())], |row| {
            Ok(Chunk {
                document_id: id,
                index: row.get::<_, i64>(0)? as u32,
                content: row.get(1)?,
            })
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }
}

impl RunStore for SqliteStore {
    type Error = StoreError;

    fn insert_run(&mut self, run: &AnalysisRun) -> Result<(), Self::Error> {
        let meta = serde_json::to_string(&run.meta)?;
        self.conn.execute(
            "INSERT INTO runs (id, owner, document_id, status, meta, summary, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Self::id_to_bytes(run.id.value()),
                run.owner.as_str(),
                Self::id_to_bytes(run.document_id.value()),
                run.status.as_str(),
                meta,
                run.summary,
                run.created_at as i64,
                run.updated_at as i64,
            ],
        )?;
        Ok(())
    }

    fn get_run(&self, id: RunId) -> Result<Option<AnalysisRun>, Self::Error> {
        let run = self
            .conn
            .query_row(
                "SELECT id, owner, document_id, status, meta, summary, created_at, updated_at
                 FROM runs WHERE id = ?1",
                params![Self::id_to_bytes(id.value())],
                Self::row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run(&mut self, run: &AnalysisRun) -> Result<(), Self::Error> {
        let meta = serde_json::to_string(&run.meta)?;
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?2, meta = ?3, summary = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                Self::id_to_bytes(run.id.value()),
                run.status.as_str(),
                meta,
                run.summary,
                run.updated_at as i64,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        Ok(())
    }
}

impl TokenStore for SqliteStore {
    type Error = StoreError;

    fn insert_token(&mut self, token: &PurchaseToken) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT INTO purchase_tokens (token, run_id, tier, expires_at, used_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.token,
                Self::id_to_bytes(token.run_id.value()),
                token.tier.as_str(),
                token.expires_at as i64,
                token.used_at.map(|t| t as i64),
            ],
        )?;
        Ok(())
    }

    fn get_token(&self, token: &str) -> Result<Option<PurchaseToken>, Self::Error> {
        let row = self
            .conn
            .query_row(
                "SELECT token, run_id, tier, expires_at, used_at
                 FROM purchase_tokens WHERE token = ?1",
                params![token],
                |row| {
                    let run_bytes: Vec<u8> = row.get(1)?;
                    let run_id = Self::bytes_to_u128(&run_bytes)
                        .map_err(|e| conversion_error(1, e))?;
                    let tier_str: String = row.get(2)?;
                    let tier = Tier::parse(&tier_str).ok_or_else(|| {
                        conversion_error(
                            2,
                            StoreError::InvalidData(format!("Unknown tier: {}", tier_str)),
                        )
                    })?;
                    let used_at: Option<i64> = row.get(4)?;
                    Ok(PurchaseToken {
                        token: row.get(0)?,
                        run_id: RunId::from_value(run_id),
                        tier,
                        expires_at: row.get::<_, i64>(3)? as u64,
                        used_at: used_at.map(|t| t as u64),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn claim_token(&mut self, token: &str, now: u64) -> Result<TokenClaim, Self::Error> {
        // Compare-and-set: only an unused, unexpired row takes the update.
        let claimed = self.conn.execute(
            "UPDATE purchase_tokens SET used_at = ?2
             WHERE token = ?1 AND used_at IS NULL AND expires_at > ?2",
            params![token, now as i64],
        )?;

        if claimed == 1 {
            let burned = self.get_token(token)?.ok_or_else(|| {
                StoreError::NotFound(format!("token {} vanished after claim", token))
            })?;
            return Ok(TokenClaim::Claimed(burned));
        }

        match self.get_token(token)? {
            None => Ok(TokenClaim::NotFound),
            Some(t) if t.used_at.is_some() => Ok(TokenClaim::AlreadyUsed),
            Some(_) => Ok(TokenClaim::Expired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_domain::time::now_epoch_secs;

    fn memory_store() -> SqliteStore {
        SqliteStore::new(":memory:").unwrap()
    }

    fn sample_document() -> Document {
        Document::new(
            OwnerId::new("user-1"),
            SourceDescriptor::RemoteUrl {
                url: "https://example.org/record.pdf".to_string(),
            },
            now_epoch_secs(),
        )
        .with_external_ref("2024-cv-00123")
    }

    #[test]
    fn test_document_round_trip() {
        let mut store = memory_store();
        let doc = sample_document();
        store.insert_document(&doc).unwrap();

        let loaded = store.get_document(doc.id).unwrap().unwrap();
        assert_eq!(loaded, doc);

        let by_ref = store
            .find_document_by_external_ref("2024-cv-00123")
            .unwrap()
            .unwrap();
        assert_eq!(by_ref.id, doc.id);

        assert!(store
            .find_document_by_external_ref("missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_external_ref_is_rejected() {
        let mut store = memory_store();
        store.insert_document(&sample_document()).unwrap();

        // Same external_ref, fresh id: the UNIQUE constraint names the clash.
        match store.insert_document(&sample_document()) {
            Err(StoreError::Duplicate(m)) => assert!(m.contains("2024-cv-00123")),
            other => panic!("Expected Duplicate, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_replace_chunks_is_total() {
        let mut store = memory_store();
        let doc = sample_document();
        store.insert_document(&doc).unwrap();

        let first: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(store.replace_chunks(doc.id, &first).unwrap(), 3);

        // Second materialize fully replaces the first, no leftovers.
        let second: Vec<String> = vec!["x".into(), "y".into()];
        assert_eq!(store.replace_chunks(doc.id, &second).unwrap(), 2);

        let chunks = store.get_chunks(doc.id).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, "x");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].content, "y");
    }

    #[test]
    fn test_replace_chunks_contiguous_indices_large() {
        let mut store = memory_store();
        let doc = sample_document();
        store.insert_document(&doc).unwrap();

        // More than one insert batch.
        let contents: Vec<String> = (0..300).map(|i| format!("chunk {}", i)).collect();
        assert_eq!(store.replace_chunks(doc.id, &contents).unwrap(), 300);

        let chunks = store.get_chunks(doc.id).unwrap();
        assert_eq!(chunks.len(), 300);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, i);
            assert_eq!(chunk.content, format!("chunk {}", i));
        }
    }

    #[test]
    fn test_run_round_trip_and_update() {
        let mut store = memory_store();
        let doc = sample_document();
        store.insert_document(&doc).unwrap();

        let mut run = AnalysisRun::new(
            OwnerId::new("user-1"),
            doc.id,
            RunStatus::Running,
            Tier::Basic,
            100,
        );
        store.insert_run(&run).unwrap();

        run.status = RunStatus::Done;
        run.summary = Some("Scanned 3 chunks; 1 finding".to_string());
        run.meta.paid = true;
        run.updated_at = 200;
        store.update_run(&run).unwrap();

        let loaded = store.get_run(run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Done);
        assert!(loaded.meta.paid);
        assert_eq!(loaded.summary.as_deref(), Some("Scanned 3 chunks; 1 finding"));
    }

    #[test]
    fn test_update_missing_run_is_not_found() {
        let mut store = memory_store();
        let run = AnalysisRun::new(
            OwnerId::new("user-1"),
            DocumentId::new(),
            RunStatus::Running,
            Tier::Basic,
            100,
        );
        match store.update_run(&run) {
            Err(StoreError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_token_single_use() {
        let mut store = memory_store();
        let doc = sample_document();
        store.insert_document(&doc).unwrap();
        let run = AnalysisRun::new(
            OwnerId::new("user-1"),
            doc.id,
            RunStatus::PendingPayment,
            Tier::Pro,
            100,
        );
        store.insert_run(&run).unwrap();

        let token = PurchaseToken::mint(run.id, Tier::Pro, 10_000);
        store.insert_token(&token).unwrap();

        match store.claim_token(&token.token, 500).unwrap() {
            TokenClaim::Claimed(t) => {
                assert_eq!(t.run_id, run.id);
                assert_eq!(t.used_at, Some(500));
            }
            other => panic!("Expected Claimed, got {:?}", other),
        }

        // Second claim must fail.
        assert_eq!(
            store.claim_token(&token.token, 600).unwrap(),
            TokenClaim::AlreadyUsed
        );
    }

    #[test]
    fn test_token_expiry_and_missing() {
        let mut store = memory_store();
        let doc = sample_document();
        store.insert_document(&doc).unwrap();
        let run = AnalysisRun::new(
            OwnerId::new("user-1"),
            doc.id,
            RunStatus::PendingPayment,
            Tier::Basic,
            100,
        );
        store.insert_run(&run).unwrap();

        let token = PurchaseToken::mint(run.id, Tier::Basic, 1000);
        store.insert_token(&token).unwrap();

        assert_eq!(
            store.claim_token(&token.token, 1000).unwrap(),
            TokenClaim::Expired
        );
        assert_eq!(
            store.claim_token("pt_does_not_exist", 1000).unwrap(),
            TokenClaim::NotFound
        );
    }

    #[test]
    fn test_persistent_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docket.db");

        let doc = sample_document();
        {
            let mut store = SqliteStore::new(&path).unwrap();
            store.insert_document(&doc).unwrap();
            store
                .replace_chunks(doc.id, &["hello".to_string()])
                .unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        let chunks = store.get_chunks(doc.id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello");
    }
}
