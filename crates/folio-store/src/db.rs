//! SQLite document store.
//!
//! Documents, their current blocks, and an append-only revisions table.
//! Block payloads and revision snapshots are stored as JSON text.

use std::collections::HashSet;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use folio_types::{
    now_millis, Block, BlockData, BlockId, ChangeType, ContentKind, DocumentId, DocumentMeta,
    DocumentStatus, Revision, RevisionNumber,
};

use crate::canonical::{plan_write, removed_ids, restore_summary};
use crate::error::{StoreError, StoreResult};
use crate::DocumentStore;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Documents (content items)
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    featured INTEGER NOT NULL DEFAULT 0,
    kind TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Current blocks. AUTOINCREMENT so deleted ids are never handed out again.
CREATE TABLE IF NOT EXISTS blocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    order_idx INTEGER NOT NULL,
    block_type TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_blocks_document ON blocks(document_id, order_idx);

-- Revisions (append-only, immutable)
CREATE TABLE IF NOT EXISTS revisions (
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    change_type TEXT NOT NULL,
    summary TEXT NOT NULL,
    attribution TEXT NOT NULL,
    meta TEXT NOT NULL,
    blocks TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (document_id, number)
);
"#;

const META_COLUMNS: &str =
    "id, title, description, status, featured, kind, created_at, updated_at";

const REVISION_COLUMNS: &str =
    "number, change_type, summary, attribution, meta, blocks, created_at";

/// Database handle for document persistence.
///
/// The connection sits behind a mutex so the handle can be shared with the
/// sync pipeline across tasks.
pub struct DocumentDb {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DocumentDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentDb").finish_non_exhaustive()
    }
}

impl DocumentDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.as_ref().display(), "opened document database");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

// ============================================================================
// Row helpers
// ============================================================================

fn conversion_error(col: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e))
}

fn row_to_meta(row: &Row<'_>) -> rusqlite::Result<DocumentMeta> {
    let id: String = row.get(0)?;
    let status: String = row.get(3)?;
    let kind: String = row.get(5)?;
    Ok(DocumentMeta {
        id: DocumentId::parse(&id).map_err(|e| conversion_error(0, e))?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: DocumentStatus::from_str(&status).unwrap_or_default(),
        featured: row.get(4)?,
        kind: ContentKind::from_str(&kind).unwrap_or_default(),
        created_at: row.get::<_, i64>(6)? as u64,
        updated_at: row.get::<_, i64>(7)? as u64,
    })
}

fn get_meta(conn: &Connection, id: DocumentId) -> StoreResult<DocumentMeta> {
    conn.query_row(
        &format!("SELECT {META_COLUMNS} FROM documents WHERE id = ?1"),
        params![id.to_string()],
        row_to_meta,
    )
    .optional()?
    .ok_or(StoreError::DocumentNotFound(id))
}

fn load_blocks(conn: &Connection, id: DocumentId) -> StoreResult<Vec<Block>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_idx, data, created_at, updated_at
         FROM blocks WHERE document_id = ?1 ORDER BY order_idx, id",
    )?;
    let rows = stmt
        .query_map(params![id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(block_id, order, data, created_at, updated_at)| {
            Ok(Block {
                id: BlockId::Assigned(block_id as u64),
                document_id: id,
                order: order as u32,
                data: serde_json::from_str::<BlockData>(&data)?,
                created_at: created_at as u64,
                updated_at: updated_at as u64,
            })
        })
        .collect()
}

fn stored_ids(conn: &Connection, id: DocumentId) -> StoreResult<HashSet<u64>> {
    let mut stmt = conn.prepare("SELECT id FROM blocks WHERE document_id = ?1")?;
    let ids = stmt
        .query_map(params![id.to_string()], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(|n| n as u64))
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(ids)
}

fn insert_block(conn: &Connection, block: &Block, explicit_id: Option<u64>) -> StoreResult<u64> {
    let data = serde_json::to_string(&block.data)?;
    conn.execute(
        "INSERT INTO blocks (id, document_id, order_idx, block_type, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            explicit_id.map(|n| n as i64),
            block.document_id.to_string(),
            block.order as i64,
            block.type_name(),
            data,
            block.created_at as i64,
            block.updated_at as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid() as u64)
}

/// Append a revision snapshotting the stored state; numbered `max + 1`.
fn insert_revision(
    conn: &Connection,
    id: DocumentId,
    change_type: ChangeType,
    summary: &str,
    attribution: &str,
) -> StoreResult<RevisionNumber> {
    let meta = get_meta(conn, id)?;
    let blocks = load_blocks(conn, id)?;
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(number), 0) + 1 FROM revisions WHERE document_id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    conn.execute(
        &format!("INSERT INTO revisions (document_id, {REVISION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            id.to_string(),
            next,
            change_type.as_str(),
            summary,
            attribution,
            serde_json::to_string(&meta)?,
            serde_json::to_string(&blocks)?,
            now_millis() as i64,
        ],
    )?;
    Ok(RevisionNumber(next as u64))
}

fn read_revision(conn: &Connection, id: DocumentId, number: RevisionNumber) -> StoreResult<Revision> {
    let row = conn
        .query_row(
            &format!("SELECT {REVISION_COLUMNS} FROM revisions WHERE document_id = ?1 AND number = ?2"),
            params![id.to_string(), number.get() as i64],
            RevisionRow::from_row,
        )
        .optional()?
        .ok_or(StoreError::RevisionNotFound { document: id, number })?;
    row.into_revision(id)
}

/// Raw revision columns, decoded outside the rusqlite closure so JSON
/// errors keep their own variant.
struct RevisionRow {
    number: i64,
    change_type: String,
    summary: String,
    attribution: String,
    meta: String,
    blocks: String,
    created_at: i64,
}

impl RevisionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            number: row.get(0)?,
            change_type: row.get(1)?,
            summary: row.get(2)?,
            attribution: row.get(3)?,
            meta: row.get(4)?,
            blocks: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_revision(self, document_id: DocumentId) -> StoreResult<Revision> {
        let change_type = ChangeType::from_str(&self.change_type)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown change type '{}'", self.change_type)))?;
        Ok(Revision {
            document_id,
            number: RevisionNumber(self.number as u64),
            change_type,
            summary: self.summary,
            attribution: self.attribution,
            meta: serde_json::from_str(&self.meta)?,
            blocks: serde_json::from_str(&self.blocks)?,
            created_at: self.created_at as u64,
        })
    }
}

// ============================================================================
// DocumentStore
// ============================================================================

impl DocumentStore for DocumentDb {
    fn create_document(&self, meta: &DocumentMeta) -> StoreResult<()> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            &format!("INSERT OR IGNORE INTO documents ({META_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                meta.id.to_string(),
                meta.title,
                meta.description,
                meta.status.as_str(),
                meta.featured,
                meta.kind.as_str(),
                meta.created_at as i64,
                meta.updated_at as i64,
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::DocumentExists(meta.id));
        }
        debug!(document = %meta.id, title = %meta.title, "document created");
        Ok(())
    }

    fn load_document(&self, id: DocumentId) -> StoreResult<(DocumentMeta, Vec<Block>)> {
        let conn = self.conn.lock();
        let meta = get_meta(&conn, id)?;
        let blocks = load_blocks(&conn, id)?;
        Ok((meta, blocks))
    }

    fn list_documents(&self) -> StoreResult<Vec<DocumentMeta>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {META_COLUMNS} FROM documents ORDER BY created_at, id"
        ))?;
        let metas = stmt.query_map([], row_to_meta)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(metas)
    }

    fn update_meta(&self, meta: &DocumentMeta) -> StoreResult<DocumentMeta> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE documents
             SET title = ?1, description = ?2, status = ?3, featured = ?4, kind = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                meta.title,
                meta.description,
                meta.status.as_str(),
                meta.featured,
                meta.kind.as_str(),
                now_millis() as i64,
                meta.id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::DocumentNotFound(meta.id));
        }
        get_meta(&conn, meta.id)
    }

    fn delete_document(&self, id: DocumentId) -> StoreResult<()> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::DocumentNotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, id, blocks), name = "store.write_blocks", fields(document = %id))]
    fn write_blocks(&self, id: DocumentId, blocks: &[Block]) -> StoreResult<Vec<Block>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        get_meta(&tx, id)?;
        let stored = stored_ids(&tx, id)?;

        let mut planned = plan_write(id, blocks, &stored)?;
        for block in planned.iter_mut() {
            match block.id {
                BlockId::Assigned(n) => {
                    tx.execute(
                        "UPDATE blocks SET order_idx = ?1, block_type = ?2, data = ?3, updated_at = ?4
                         WHERE id = ?5",
                        params![
                            block.order as i64,
                            block.type_name(),
                            serde_json::to_string(&block.data)?,
                            block.updated_at as i64,
                            n as i64,
                        ],
                    )?;
                }
                BlockId::Local(_) => {
                    block.id = BlockId::Assigned(insert_block(&tx, block, None)?);
                }
            }
        }

        let removed = removed_ids(&stored, &planned);
        for n in &removed {
            tx.execute("DELETE FROM blocks WHERE id = ?1", params![*n as i64])?;
        }
        tx.execute(
            "UPDATE documents SET updated_at = ?1 WHERE id = ?2",
            params![now_millis() as i64, id.to_string()],
        )?;
        tx.commit()?;

        debug!(document = %id, blocks = planned.len(), removed = removed.len(), "blocks written");
        Ok(planned)
    }

    fn snapshot(
        &self,
        id: DocumentId,
        change_type: ChangeType,
        summary: &str,
        attribution: &str,
    ) -> StoreResult<RevisionNumber> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let number = insert_revision(&tx, id, change_type, summary, attribution)?;
        tx.commit()?;
        Ok(number)
    }

    fn list_revisions(&self, id: DocumentId) -> StoreResult<Vec<Revision>> {
        let conn = self.conn.lock();
        get_meta(&conn, id)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE document_id = ?1 ORDER BY number"
        ))?;
        let rows = stmt
            .query_map(params![id.to_string()], RevisionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|r| r.into_revision(id)).collect()
    }

    fn get_revision(&self, id: DocumentId, number: RevisionNumber) -> StoreResult<Revision> {
        let conn = self.conn.lock();
        read_revision(&conn, id, number)
    }

    #[tracing::instrument(skip(self, id, attribution), name = "store.restore", fields(document = %id))]
    fn restore_revision(
        &self,
        id: DocumentId,
        number: RevisionNumber,
        attribution: &str,
    ) -> StoreResult<RevisionNumber> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        get_meta(&tx, id)?;
        let revision = read_revision(&tx, id, number)?;

        tx.execute("DELETE FROM blocks WHERE document_id = ?1", params![id.to_string()])?;
        for block in &revision.blocks {
            insert_block(&tx, block, block.id.assigned())?;
        }
        tx.execute(
            "UPDATE documents SET title = ?1, description = ?2, kind = ?3, updated_at = ?4 WHERE id = ?5",
            params![
                revision.meta.title,
                revision.meta.description,
                revision.meta.kind.as_str(),
                now_millis() as i64,
                id.to_string(),
            ],
        )?;
        let restored = insert_revision(&tx, id, ChangeType::Restore, &restore_summary(number), attribution)?;
        tx.commit()?;

        info!(document = %id, from = %number, revision = %restored, "revision restored");
        Ok(restored)
    }
}

crate::impl_collaborators!(DocumentDb);
