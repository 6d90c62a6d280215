/// SQLite catalog for legal units and ingested documents
use crate::domain::{DocumentType, DocumentUnit, LegalDomain, MetadataFilter, UnitKind};
use crate::error::{DadyarError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Row};
use std::path::Path;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Schema migrations, applied in order. Version = array index + 1.
const MIGRATIONS: &[&str] = &[
    // v1: units catalog and per-source document registry
    r#"
    CREATE TABLE units (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        document_type TEXT NOT NULL,
        legal_domain TEXT NOT NULL,
        unit_kind TEXT NOT NULL,
        unit_title TEXT NOT NULL,
        unit_index INTEGER NOT NULL,
        start_offset INTEGER,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (source, unit_index)
    );

    CREATE INDEX idx_units_domain ON units(legal_domain);
    CREATE INDEX idx_units_type ON units(document_type);
    CREATE INDEX idx_units_source ON units(source);

    CREATE TABLE documents (
        source TEXT PRIMARY KEY,
        content_hash TEXT NOT NULL DEFAULT '',
        document_type TEXT NOT NULL,
        legal_domain TEXT NOT NULL,
        unit_count INTEGER NOT NULL,
        ingested_at INTEGER NOT NULL
    );
    "#,
];

/// Connection pool over the catalog database
pub struct Database {
    pool: DbPool,
}

/// Catalog totals reported by the stats command
#[derive(Debug, Clone)]
pub struct CatalogStats {
    pub document_count: u64,
    pub unit_count: u64,
    pub db_size_bytes: u64,
}

impl Database {
    /// Open (or create) the catalog at the given path and run migrations
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DadyarError::Io {
                source: e,
                context: format!("creating database directory {}", parent.display()),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .map_err(|e| DadyarError::Config(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.configure()?;
        db.migrate()?;

        Ok(db)
    }

    /// In-memory catalog for tests
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| DadyarError::Config(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.configure()?;
        db.migrate()?;

        Ok(db)
    }

    fn configure(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )?;

        let current: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (idx, migration) in MIGRATIONS.iter().enumerate() {
            let version = (idx + 1) as i64;
            if version > current {
                tracing::info!(version, "applying catalog migration");
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, strftime('%s', 'now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| DadyarError::Config(format!("Failed to get database connection: {}", e)))
    }

    /// Drop all catalog tables and re-run migrations from scratch.
    ///
    /// Recovery path for a corrupt catalog; callers must also clear and
    /// rebuild the vector index afterwards.
    pub fn recreate(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            "DROP TABLE IF EXISTS units;
             DROP TABLE IF EXISTS documents;
             DROP TABLE IF EXISTS _migrations;",
        )?;
        drop(conn);
        self.migrate()
    }

    /// Replace all units for the given sources in one transaction.
    ///
    /// Returns the assigned rowids (aligned with `units`) and whether any
    /// of the sources had previous rows that were deleted.
    pub fn replace_units(
        &self,
        sources: &[String],
        units: &[DocumentUnit],
        embeddings: &[Vec<f32>],
    ) -> Result<(Vec<i64>, bool)> {
        debug_assert_eq!(units.len(), embeddings.len());

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut replaced = false;

        for source in sources {
            let deleted = tx.execute("DELETE FROM units WHERE source = ?1", params![source])?;
            if deleted > 0 {
                replaced = true;
            }
        }

        let mut ids = Vec::with_capacity(units.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO units (source, document_type, legal_domain, unit_kind, unit_title,
                                    unit_index, start_offset, content, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, strftime('%s', 'now'))",
            )?;

            for (unit, embedding) in units.iter().zip(embeddings.iter()) {
                stmt.execute(params![
                    unit.source,
                    unit.document_type.as_str(),
                    unit.legal_domain.as_str(),
                    unit.unit_kind.as_str(),
                    unit.unit_title,
                    unit.unit_index as i64,
                    unit.start_offset.map(|o| o as i64),
                    unit.content,
                    encode_embedding(embedding),
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        Ok((ids, replaced))
    }

    /// Record an ingested source in the document registry
    pub fn upsert_document(
        &self,
        source: &str,
        document_type: DocumentType,
        legal_domain: LegalDomain,
        unit_count: usize,
    ) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO documents (source, document_type, legal_domain, unit_count, ingested_at)
             VALUES (?1, ?2, ?3, ?4, strftime('%s', 'now'))
             ON CONFLICT(source) DO UPDATE SET
                 document_type = excluded.document_type,
                 legal_domain = excluded.legal_domain,
                 unit_count = excluded.unit_count,
                 ingested_at = excluded.ingested_at",
            params![
                source,
                document_type.as_str(),
                legal_domain.as_str(),
                unit_count as i64
            ],
        )?;
        Ok(())
    }

    /// Attach the archived-content hash to a source's registry row
    pub fn set_document_hash(&self, source: &str, content_hash: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO documents (source, content_hash, document_type, legal_domain, unit_count, ingested_at)
             VALUES (?1, ?2, 'document', 'unknown', 0, strftime('%s', 'now'))
             ON CONFLICT(source) DO UPDATE SET content_hash = excluded.content_hash",
            params![source, content_hash],
        )?;
        Ok(())
    }

    /// Fetch units by rowid, preserving the order of `ids`
    pub fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<(i64, DocumentUnit)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, source, document_type, legal_domain, unit_kind, unit_title,
                    unit_index, start_offset, content
             FROM units WHERE id IN ({})",
            placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), row_to_unit)?;

        let mut by_id = std::collections::HashMap::with_capacity(ids.len());
        for row in rows {
            let (id, unit) = row?;
            by_id.insert(id, unit);
        }

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id).map(|unit| (*id, unit)))
            .collect())
    }

    /// Load all unit rows matching the filter, with their embeddings.
    ///
    /// Rows come back in rowid order so downstream tie-breaks are stable.
    pub fn scan_filtered(&self, filter: &MetadataFilter) -> Result<Vec<(i64, DocumentUnit, Vec<f32>)>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            "SELECT id, source, document_type, legal_domain, unit_kind, unit_title,
                    unit_index, start_offset, content, embedding
             FROM units",
        );
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(domain) = filter.legal_domain {
            clauses.push("legal_domain = ?");
            args.push(domain.as_str().to_string());
        }
        if let Some(doc_type) = filter.document_type {
            clauses.push("document_type = ?");
            args.push(doc_type.as_str().to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let (id, unit) = row_to_unit(row)?;
            let blob: Vec<u8> = row.get(9)?;
            Ok((id, unit, decode_embedding(&blob)))
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DadyarError::from)
    }

    /// Load every (rowid, embedding) pair, for index rebuilds
    pub fn all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, embedding FROM units ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, decode_embedding(&blob)))
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DadyarError::from)
    }

    /// Per-domain unit counts, for the stats command
    pub fn units_per_domain(&self) -> Result<Vec<(LegalDomain, u64)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT legal_domain, COUNT(*) FROM units GROUP BY legal_domain ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(0)?;
            let count: u64 = row.get(1)?;
            Ok((raw, count))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (raw, count) = row?;
            out.push((LegalDomain::parse(&raw).unwrap_or(LegalDomain::Unknown), count));
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.get_conn()?;

        let unit_count: u64 = conn.query_row("SELECT COUNT(*) FROM units", [], |row| row.get(0))?;
        let document_count: u64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let db_size_bytes: u64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;

        Ok(CatalogStats {
            document_count,
            unit_count,
            db_size_bytes,
        })
    }
}

/// Whether a SQLite error means the catalog file itself is damaged
pub fn is_corruption_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseCorrupt
                || e.code == rusqlite::ErrorCode::NotADatabase
    )
}

fn row_to_unit(row: &Row<'_>) -> rusqlite::Result<(i64, DocumentUnit)> {
    let id: i64 = row.get(0)?;
    let doc_type_raw: String = row.get(2)?;
    let domain_raw: String = row.get(3)?;
    let kind_raw: String = row.get(4)?;
    let unit_index: i64 = row.get(6)?;
    let start_offset: Option<i64> = row.get(7)?;

    Ok((
        id,
        DocumentUnit {
            content: row.get(8)?,
            source: row.get(1)?,
            document_type: DocumentType::parse(&doc_type_raw).unwrap_or(DocumentType::Document),
            legal_domain: LegalDomain::parse(&domain_raw).unwrap_or(LegalDomain::Unknown),
            unit_kind: UnitKind::parse(&kind_raw).unwrap_or(UnitKind::Section),
            unit_title: row.get(5)?,
            unit_index: unit_index as usize,
            start_offset: start_offset.map(|o| o as usize),
        },
    ))
}

/// Embeddings are stored as little-endian f32 bytes
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
