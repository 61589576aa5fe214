//! # folio-store
//!
//! Storage collaborators for the Folio editor.
//!
//! Two backends implement the editor's [`BlockPersister`] and
//! [`RevisionStore`] traits plus the document operations in
//! [`DocumentStore`]:
//!
//! - [`MemoryStore`]: ephemeral, for tests and scratch sessions
//! - [`DocumentDb`]: SQLite via rusqlite
//!
//! Both assign [`BlockId::Assigned`] ids to provisional blocks, drop stored
//! blocks a write no longer lists, and number revisions per document,
//! strictly increasing.
//!
//! [`BlockPersister`]: folio_editor::BlockPersister
//! [`RevisionStore`]: folio_editor::RevisionStore
//! [`BlockId::Assigned`]: folio_types::BlockId::Assigned

mod canonical;
pub mod db;
pub mod error;
pub mod memory;

pub use db::DocumentDb;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

use folio_editor::{BlockPersister, RevisionStore};
use folio_types::{Block, ChangeType, DocumentId, DocumentMeta, Revision, RevisionNumber};

/// Document-level operations shared by both backends.
///
/// Calls are synchronous; the async collaborator traits delegate to
/// [`DocumentStore::write_blocks`] and [`DocumentStore::snapshot`].
pub trait DocumentStore: BlockPersister + RevisionStore {
    /// Insert a new document with no blocks.
    fn create_document(&self, meta: &DocumentMeta) -> StoreResult<()>;

    /// Metadata plus blocks in order.
    fn load_document(&self, id: DocumentId) -> StoreResult<(DocumentMeta, Vec<Block>)>;

    /// All documents, oldest first.
    fn list_documents(&self) -> StoreResult<Vec<DocumentMeta>>;

    /// Overwrite title, description, status, featured and kind.
    /// `updated_at` is set by the store.
    fn update_meta(&self, meta: &DocumentMeta) -> StoreResult<DocumentMeta>;

    /// Remove a document with its blocks and revisions.
    fn delete_document(&self, id: DocumentId) -> StoreResult<()>;

    /// Replace the stored block list; returns the canonical list.
    fn write_blocks(&self, id: DocumentId, blocks: &[Block]) -> StoreResult<Vec<Block>>;

    /// Snapshot the stored state as a new revision.
    fn snapshot(
        &self,
        id: DocumentId,
        change_type: ChangeType,
        summary: &str,
        attribution: &str,
    ) -> StoreResult<RevisionNumber>;

    /// Revisions for a document, lowest number first.
    fn list_revisions(&self, id: DocumentId) -> StoreResult<Vec<Revision>>;

    fn get_revision(&self, id: DocumentId, number: RevisionNumber) -> StoreResult<Revision>;

    /// Write a revision's blocks and content fields back, then record a
    /// `RESTORE` revision. Status and the featured flag are left alone.
    fn restore_revision(
        &self,
        id: DocumentId,
        number: RevisionNumber,
        attribution: &str,
    ) -> StoreResult<RevisionNumber>;

    /// Resolve a hex prefix to a single document.
    fn find_document(&self, prefix: &str) -> StoreResult<Option<DocumentMeta>> {
        let prefix = prefix.replace('-', "").to_ascii_lowercase();
        let mut matches = self
            .list_documents()?
            .into_iter()
            .filter(|m| m.id.matches_hex_prefix(&prefix));
        let first = matches.next();
        if matches.next().is_some() {
            return Ok(None);
        }
        Ok(first)
    }
}

/// Wires a backend's sync [`DocumentStore`] methods to the editor's async
/// collaborator traits.
macro_rules! impl_collaborators {
    ($T:ty) => {
        #[async_trait::async_trait]
        impl folio_editor::BlockPersister for $T {
            async fn persist_blocks(
                &self,
                document_id: folio_types::DocumentId,
                blocks: &[folio_types::Block],
            ) -> Result<Vec<folio_types::Block>, folio_editor::PersistError> {
                $crate::DocumentStore::write_blocks(self, document_id, blocks).map_err(Into::into)
            }
        }

        #[async_trait::async_trait]
        impl folio_editor::RevisionStore for $T {
            async fn create_revision(
                &self,
                document_id: folio_types::DocumentId,
                change_type: folio_types::ChangeType,
                summary: &str,
                attribution: &str,
            ) -> Result<folio_types::RevisionNumber, folio_editor::RevisionError> {
                $crate::DocumentStore::snapshot(self, document_id, change_type, summary, attribution)
                    .map_err(Into::into)
            }
        }
    };
}

pub(crate) use impl_collaborators;
