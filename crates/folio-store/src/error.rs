//! Store errors and their mapping onto the editor's collaborator errors.

use thiserror::Error;

use folio_editor::{PersistError, RevisionError};
use folio_types::{BlockId, DocumentId, RevisionNumber};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("document already exists: {0}")]
    DocumentExists(DocumentId),

    #[error("revision {number} not found for document {document}")]
    RevisionNotFound {
        document: DocumentId,
        number: RevisionNumber,
    },

    #[error("block {block} belongs to document {found}, not {expected}")]
    ForeignBlock {
        block: BlockId,
        expected: DocumentId,
        found: DocumentId,
    },

    #[error("block {0} appears more than once")]
    DuplicateBlock(BlockId),

    #[error("block {0} is not stored for this document")]
    UnknownBlock(BlockId),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for PersistError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DocumentNotFound(id) => PersistError::NotFound(id),
            StoreError::ForeignBlock { .. } | StoreError::DuplicateBlock(_) => {
                PersistError::Validation(e.to_string())
            }
            StoreError::UnknownBlock(_) => PersistError::Conflict(e.to_string()),
            other => PersistError::Transport(other.to_string()),
        }
    }
}

impl From<StoreError> for RevisionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DocumentNotFound(id) => RevisionError::NotFound(id),
            other => RevisionError::Unavailable(other.to_string()),
        }
    }
}
