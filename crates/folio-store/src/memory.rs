//! In-memory document store.
//!
//! Used for tests and scratch sessions. All data is lost when dropped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use folio_types::{
    now_millis, Block, BlockId, ChangeType, DocumentId, DocumentMeta, Revision, RevisionNumber,
};

use crate::canonical::{plan_write, removed_ids, restore_summary};
use crate::error::{StoreError, StoreResult};
use crate::DocumentStore;

#[derive(Debug)]
struct Record {
    meta: DocumentMeta,
    blocks: Vec<Block>,
    revisions: Vec<Revision>,
}

impl Record {
    fn stored_ids(&self) -> HashSet<u64> {
        self.blocks.iter().filter_map(|b| b.id.assigned()).collect()
    }

    fn push_revision(
        &mut self,
        change_type: ChangeType,
        summary: &str,
        attribution: &str,
    ) -> RevisionNumber {
        let number = RevisionNumber(self.revisions.last().map_or(0, |r| r.number.get()) + 1);
        self.revisions.push(Revision {
            document_id: self.meta.id,
            number,
            change_type,
            summary: summary.to_string(),
            attribution: attribution.to_string(),
            meta: self.meta.clone(),
            blocks: self.blocks.clone(),
            created_at: now_millis(),
        });
        number
    }
}

/// In-memory store. Thread-safe via an internal `RwLock`.
#[derive(Debug)]
pub struct MemoryStore {
    docs: RwLock<HashMap<DocumentId, Record>>,
    /// Block ids are global and never reused.
    next_block_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            next_block_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> BlockId {
        BlockId::Assigned(self.next_block_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn document_count(&self) -> usize {
        self.docs.read().len()
    }
}

impl DocumentStore for MemoryStore {
    fn create_document(&self, meta: &DocumentMeta) -> StoreResult<()> {
        let mut docs = self.docs.write();
        if docs.contains_key(&meta.id) {
            return Err(StoreError::DocumentExists(meta.id));
        }
        docs.insert(meta.id, Record {
            meta: meta.clone(),
            blocks: Vec::new(),
            revisions: Vec::new(),
        });
        Ok(())
    }

    fn load_document(&self, id: DocumentId) -> StoreResult<(DocumentMeta, Vec<Block>)> {
        let docs = self.docs.read();
        let record = docs.get(&id).ok_or(StoreError::DocumentNotFound(id))?;
        Ok((record.meta.clone(), record.blocks.clone()))
    }

    fn list_documents(&self) -> StoreResult<Vec<DocumentMeta>> {
        let mut metas: Vec<DocumentMeta> = self.docs.read().values().map(|r| r.meta.clone()).collect();
        metas.sort_by_key(|m| (m.created_at, m.id.to_hex()));
        Ok(metas)
    }

    fn update_meta(&self, meta: &DocumentMeta) -> StoreResult<DocumentMeta> {
        let mut docs = self.docs.write();
        let record = docs.get_mut(&meta.id).ok_or(StoreError::DocumentNotFound(meta.id))?;
        let created_at = record.meta.created_at;
        record.meta = DocumentMeta {
            created_at,
            updated_at: now_millis(),
            ..meta.clone()
        };
        Ok(record.meta.clone())
    }

    fn delete_document(&self, id: DocumentId) -> StoreResult<()> {
        self.docs
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::DocumentNotFound(id))
    }

    fn write_blocks(&self, id: DocumentId, blocks: &[Block]) -> StoreResult<Vec<Block>> {
        let mut docs = self.docs.write();
        let record = docs.get_mut(&id).ok_or(StoreError::DocumentNotFound(id))?;
        let stored = record.stored_ids();

        let mut planned = plan_write(id, blocks, &stored)?;
        for block in planned.iter_mut().filter(|b| b.id.is_provisional()) {
            block.id = self.allocate_id();
        }
        let removed = removed_ids(&stored, &planned);

        record.blocks = planned.clone();
        record.meta.updated_at = now_millis();
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
        let mut docs = self.docs.write();
        let record = docs.get_mut(&id).ok_or(StoreError::DocumentNotFound(id))?;
        Ok(record.push_revision(change_type, summary, attribution))
    }

    fn list_revisions(&self, id: DocumentId) -> StoreResult<Vec<Revision>> {
        let docs = self.docs.read();
        let record = docs.get(&id).ok_or(StoreError::DocumentNotFound(id))?;
        Ok(record.revisions.clone())
    }

    fn get_revision(&self, id: DocumentId, number: RevisionNumber) -> StoreResult<Revision> {
        let docs = self.docs.read();
        let record = docs.get(&id).ok_or(StoreError::DocumentNotFound(id))?;
        record
            .revisions
            .iter()
            .find(|r| r.number == number)
            .cloned()
            .ok_or(StoreError::RevisionNotFound { document: id, number })
    }

    fn restore_revision(
        &self,
        id: DocumentId,
        number: RevisionNumber,
        attribution: &str,
    ) -> StoreResult<RevisionNumber> {
        let mut docs = self.docs.write();
        let record = docs.get_mut(&id).ok_or(StoreError::DocumentNotFound(id))?;
        let revision = record
            .revisions
            .iter()
            .find(|r| r.number == number)
            .cloned()
            .ok_or(StoreError::RevisionNotFound { document: id, number })?;

        record.blocks = revision.blocks;
        record.meta.title = revision.meta.title;
        record.meta.description = revision.meta.description;
        record.meta.kind = revision.meta.kind;
        record.meta.updated_at = now_millis();
        let restored = record.push_revision(ChangeType::Restore, &restore_summary(number), attribution);
        debug!(document = %id, from = %number, revision = %restored, "revision restored");
        Ok(restored)
    }
}

crate::impl_collaborators!(MemoryStore);

#[cfg(test)]
mod tests {
    use super::*;
    use folio_editor::{BlockPersister, PersistError, RevisionError, RevisionStore};
    use folio_types::BlockData;

    fn store_with_doc() -> (MemoryStore, DocumentMeta) {
        let store = MemoryStore::new();
        let meta = DocumentMeta::new("Notes");
        store.create_document(&meta).unwrap();
        (store, meta)
    }

    fn para(doc: DocumentId, order: u32, text: &str) -> Block {
        Block::new(doc, order, BlockData::paragraph(text))
    }

    #[tokio::test]
    async fn test_persist_assigns_ids_in_order() {
        let (store, meta) = store_with_doc();
        let sent = vec![para(meta.id, 1, "b"), para(meta.id, 0, "a")];
        let canonical = store.persist_blocks(meta.id, &sent).await.unwrap();

        assert_eq!(canonical.len(), 2);
        assert!(canonical.iter().all(|b| !b.id.is_provisional()));
        assert_eq!(canonical[0].data, BlockData::paragraph("a"));
        assert_ne!(canonical[0].id, canonical[1].id);

        let (_, loaded) = store.load_document(meta.id).unwrap();
        assert_eq!(loaded, canonical);
    }

    #[tokio::test]
    async fn test_persist_drops_missing_blocks() {
        let (store, meta) = store_with_doc();
        let first = store
            .persist_blocks(meta.id, &[para(meta.id, 0, "a"), para(meta.id, 1, "b")])
            .await
            .unwrap();
        let second = store.persist_blocks(meta.id, &first[1..]).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[1].id);
        assert_eq!(second[0].order, 0);
    }

    #[tokio::test]
    async fn test_persist_rejects_deleted_id() {
        let (store, meta) = store_with_doc();
        let first = store.persist_blocks(meta.id, &[para(meta.id, 0, "a")]).await.unwrap();
        store.persist_blocks(meta.id, &[]).await.unwrap();
        let err = store.persist_blocks(meta.id, &first).await.unwrap_err();
        assert!(matches!(err, PersistError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_persist_unknown_document() {
        let store = MemoryStore::new();
        let doc = DocumentId::new();
        let err = store.persist_blocks(doc, &[]).await.unwrap_err();
        assert_eq!(err, PersistError::NotFound(doc));
        let err = store.create_revision(doc, ChangeType::Edit, "x", "y").await.unwrap_err();
        assert_eq!(err, RevisionError::NotFound(doc));
    }

    #[tokio::test]
    async fn test_revision_numbers_increase_per_document() {
        let (store, meta) = store_with_doc();
        let other = DocumentMeta::new("Other");
        store.create_document(&other).unwrap();

        let r1 = store.create_revision(meta.id, ChangeType::Create, "created", "ada").await.unwrap();
        let r2 = store.create_revision(meta.id, ChangeType::Edit, "edited", "ada").await.unwrap();
        let o1 = store.create_revision(other.id, ChangeType::Create, "created", "ada").await.unwrap();
        assert_eq!((r1, r2, o1), (RevisionNumber(1), RevisionNumber(2), RevisionNumber(1)));
    }

    #[tokio::test]
    async fn test_restore_writes_snapshot_back() {
        let (store, meta) = store_with_doc();
        let v1 = store.persist_blocks(meta.id, &[para(meta.id, 0, "first")]).await.unwrap();
        let r1 = store.snapshot(meta.id, ChangeType::Edit, "v1", "ada").unwrap();

        let mut renamed = meta.clone();
        renamed.title = "Renamed".into();
        renamed.featured = true;
        store.update_meta(&renamed).unwrap();
        store.persist_blocks(meta.id, &[para(meta.id, 0, "second")]).await.unwrap();

        let restored = store.restore_revision(meta.id, r1, "bob").unwrap();
        assert_eq!(restored, RevisionNumber(2));

        let (meta_now, blocks) = store.load_document(meta.id).unwrap();
        assert_eq!(blocks, v1);
        assert_eq!(meta_now.title, "Notes");
        assert!(meta_now.featured);

        let revision = store.get_revision(meta.id, restored).unwrap();
        assert_eq!(revision.change_type, ChangeType::Restore);
        assert_eq!(revision.summary, "Restored from r1");
        assert_eq!(revision.attribution, "bob");
        assert!(matches!(
            store.get_revision(meta.id, RevisionNumber(9)),
            Err(StoreError::RevisionNotFound { .. })
        ));
    }

    #[test]
    fn test_document_crud() {
        let (store, meta) = store_with_doc();
        assert!(matches!(store.create_document(&meta), Err(StoreError::DocumentExists(_))));
        assert_eq!(store.find_document(&meta.id.short()).unwrap().map(|m| m.id), Some(meta.id));

        store.delete_document(meta.id).unwrap();
        assert_eq!(store.document_count(), 0);
        assert!(matches!(store.load_document(meta.id), Err(StoreError::DocumentNotFound(_))));
    }
}
