//! # folio-editor
//!
//! Block-collection editing engine for Folio.
//!
//! A document is an ordered list of typed blocks. This crate keeps that list
//! consistent while an author edits it, and gets it to the store without
//! overlapping writes:
//!
//! - [`BlockCollection`]: ordered blocks, orders always `0..n-1`
//! - [`DragController`]: pointer/keyboard gestures to a single [`DropPlan`]
//! - [`ContentBoard`]: featured / all grids; a cross-grid drop flips `featured`
//! - [`SyncHandle`]: debounced saves, at most one write in flight per document
//! - [`PreviewProjector`]: debounced, sanitized preview frames
//! - [`RevisionRecorder`]: best-effort revision snapshots
//! - [`EditorSession`]: wires the above for one document
//!
//! Storage, block editors and HTML sanitizing are collaborators behind the
//! traits in [`collab`] and [`sanitize`]; `folio-store` implements storage.

pub mod board;
pub mod collab;
pub mod collection;
pub mod config;
pub mod debounce;
pub mod drag;
pub mod error;
pub mod flows;
pub mod preview;
pub mod revision;
pub mod sanitize;
pub mod session;
pub mod sync;

pub use board::{BoardChange, BoardError, BoardSection, ContentBoard, DocumentCard};
pub use collab::{
    BlockEditor, BlockPersister, EditorRegistry, PersistError, RevisionError, RevisionStore,
};
pub use collection::BlockCollection;
pub use config::{ConfigError, EditorConfig};
pub use debounce::Debouncer;
pub use drag::{
    nearest_center, DragController, DragOutcome, DragState, DropPlan, DropTarget, HitBox, Point,
    Rect, Slot,
};
pub use error::EditorError;
pub use flows::{
    matches_pattern, shared_sync_flow_bus, FlowBus, FlowMessage, HasSubject, SharedSyncFlowBus,
    Subscription, SyncFlow,
};
pub use preview::{project, EmbedKind, PreviewFrame, PreviewProjector, RenderBody, RenderableBlock};
pub use revision::RevisionRecorder;
pub use sanitize::{BasicSanitizer, EscapeSanitizer, HtmlSanitizer};
pub use session::{
    Collaborators, EditorSession, Reconciled, SaveState, SessionError, SessionResult, SyncEvent,
};
pub use sync::{spawn_sync, PendingWrite, Snapshot, SyncError, SyncHandle, SyncStatus};

/// Result type for collection operations.
pub type Result<T> = std::result::Result<T, EditorError>;
