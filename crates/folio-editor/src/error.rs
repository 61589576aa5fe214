//! Error types for block-collection operations.

use thiserror::Error;

use folio_types::{BlockId, DocumentId};

/// Errors that can occur while editing a block collection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// The addressed block is no longer in the collection.
    ///
    /// Usually means the caller is holding a reference from before a delete
    /// or a reconciliation.
    #[error("stale block reference: {0:?}")]
    StaleReference(BlockId),

    /// A payload would change a block's type tag.
    #[error("block {block:?} is {expected}, payload is {got}")]
    BlockTypeMismatch {
        block: Option<BlockId>,
        expected: String,
        got: String,
    },

    /// Duplicate block ID in an incoming set.
    #[error("block already exists: {0:?}")]
    DuplicateBlock(BlockId),

    /// Incoming block belongs to another document.
    #[error("block {block:?} belongs to document {document}")]
    ForeignBlock { block: BlockId, document: DocumentId },

    /// No editor registered for a block type.
    #[error("no editor registered for {0}")]
    NoEditor(String),

    /// Orders are not exactly `0..n-1`. A logic fault, never a user condition.
    #[error("invalid order state: {0}")]
    InvalidOrderState(String),
}
