//! Collaborator contracts the engine consumes but does not implement.
//!
//! ```text
//!   SyncPipeline ──persist_blocks──▶ BlockPersister   (canonical blocks back)
//!   RevisionRecorder ─create_revision─▶ RevisionStore (number back)
//!   EditorSession ──commit──▶ BlockEditor (per block type, via EditorRegistry)
//!   PreviewProjector ──sanitize──▶ HtmlSanitizer
//! ```
//!
//! `folio-store` ships `MemoryStore` and `DocumentDb`, which implement both
//! storage traits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use folio_types::{Block, BlockData, BlockType, ChangeType, DocumentId, RevisionNumber};

use crate::EditorError;

/// Failure of a persist call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// Network or storage I/O failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store rejected the payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store's state moved underneath the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The document does not exist in the store.
    #[error("document not found: {0}")]
    NotFound(DocumentId),
}

/// Failure of a revision snapshot request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevisionError {
    #[error("revision store unavailable: {0}")]
    Unavailable(String),

    #[error("document not found: {0}")]
    NotFound(DocumentId),
}

/// Persists a document's ordered block list.
///
/// Implementations must tolerate being sent the same logical state more than
/// once: the pipeline coalesces queued writes, and a queued snapshot may
/// repeat blocks the previous write already created (their IDs will have
/// been remapped to the assigned ones first).
#[async_trait]
pub trait BlockPersister: Send + Sync {
    /// Store `blocks` as the full block list and return the canonical list,
    /// in order, with assigned IDs for any provisional blocks.
    async fn persist_blocks(
        &self,
        document_id: DocumentId,
        blocks: &[Block],
    ) -> Result<Vec<Block>, PersistError>;
}

/// Stores revision snapshots. The store snapshots its own canonical state.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Take a snapshot and return its assigned number.
    async fn create_revision(
        &self,
        document_id: DocumentId,
        change_type: ChangeType,
        summary: &str,
        attribution: &str,
    ) -> Result<RevisionNumber, RevisionError>;
}

/// A per-type editing surface.
///
/// The UI behind it is out of scope; the engine only needs the committed
/// payload. `None` means the author dismissed the editor.
pub trait BlockEditor: Send + Sync {
    fn block_type(&self) -> BlockType;

    fn commit(&self, current: &BlockData) -> Option<BlockData>;
}

/// Routes blocks to their editor by type tag.
#[derive(Default, Clone)]
pub struct EditorRegistry {
    editors: HashMap<BlockType, Arc<dyn BlockEditor>>,
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an editor; replaces any previous one for the same type.
    pub fn register(&mut self, editor: Arc<dyn BlockEditor>) {
        self.editors.insert(editor.block_type(), editor);
    }

    /// Editor for a block's payload.
    pub fn editor_for(&self, data: &BlockData) -> Result<&Arc<dyn BlockEditor>, EditorError> {
        data.block_type()
            .and_then(|t| self.editors.get(&t))
            .ok_or_else(|| EditorError::NoEditor(data.type_name().to_string()))
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }
}

impl std::fmt::Debug for EditorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorRegistry")
            .field("types", &self.editors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upcase;

    impl BlockEditor for Upcase {
        fn block_type(&self) -> BlockType {
            BlockType::Paragraph
        }

        fn commit(&self, current: &BlockData) -> Option<BlockData> {
            match current {
                BlockData::Paragraph(p) => Some(BlockData::paragraph(p.text.to_uppercase())),
                _ => None,
            }
        }
    }

    #[test]
    fn test_registry_routes_by_type() {
        let mut registry = EditorRegistry::new();
        registry.register(Arc::new(Upcase));

        let editor = registry.editor_for(&BlockData::paragraph("x")).unwrap();
        assert_eq!(editor.commit(&BlockData::paragraph("hi")), Some(BlockData::paragraph("HI")));

        let missing = registry.editor_for(&BlockData::heading("h", 1)).err();
        assert_eq!(missing, Some(EditorError::NoEditor("HEADING".to_string())));
    }

    #[test]
    fn test_registry_has_no_editor_for_unknown_types() {
        let registry = EditorRegistry::new();
        let unknown = BlockData::Unknown {
            block_type: "CAROUSEL".to_string(),
            payload: serde_json::Value::Null,
        };
        assert_eq!(
            registry.editor_for(&unknown).err(),
            Some(EditorError::NoEditor("CAROUSEL".to_string()))
        );
    }
}
