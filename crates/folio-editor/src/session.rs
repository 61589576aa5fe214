//! One author editing one document.
//!
//! The session owns the [`BlockCollection`] and fans every mutation out to
//! the sync pipeline (debounced save) and the preview projector (debounced
//! re-projection). Save outcomes come back as [`SyncFlow`] events, which the
//! session reconciles into the collection:
//!
//! - the local version still equals the saved one: adopt the canonical list
//!   wholesale (`replace_all`)
//! - the author kept editing meanwhile: only swap provisional ids for the
//!   assigned ones (`remap_ids`), keeping the newer local state
//!
//! A failed save leaves local state alone and marks the session
//! [`SaveState::Failed`]; [`EditorSession::revert_to_last_saved`] is the
//! explicit way back.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use folio_types::{
    Block, BlockData, BlockId, BlockType, ChangeType, DocumentId, DocumentMeta, RevisionNumber,
    SessionId,
};

use crate::collab::{BlockPersister, EditorRegistry, PersistError, RevisionStore};
use crate::collection::BlockCollection;
use crate::config::EditorConfig;
use crate::drag::{DragController, DragOutcome, DropPlan};
use crate::flows::{shared_sync_flow_bus, SharedSyncFlowBus, Subscription, SyncFlow};
use crate::preview::PreviewProjector;
use crate::revision::RevisionRecorder;
use crate::sanitize::{BasicSanitizer, HtmlSanitizer};
use crate::sync::{spawn_sync, SyncError, SyncHandle};
use crate::EditorError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Whether local state has reached the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveState {
    Clean,
    /// Local changes not yet confirmed by the store.
    Dirty,
    /// The last save failed; local state is ahead of the store.
    Failed(PersistError),
}

/// How a save outcome was folded into the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// Canonical list adopted as-is.
    Replaced,
    /// Newer local edits kept; this many provisional ids replaced.
    Remapped(usize),
}

/// A settled save, as seen by this session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    Saved { version: u64, reconciled: Reconciled },
    Failed { version: u64, error: PersistError },
}

/// External services a session needs.
#[derive(Clone)]
pub struct Collaborators {
    pub persister: Arc<dyn BlockPersister>,
    pub revisions: Arc<dyn RevisionStore>,
    pub sanitizer: Arc<dyn HtmlSanitizer>,
    pub editors: EditorRegistry,
}

impl Collaborators {
    /// A store that persists blocks and revisions, with the basic sanitizer
    /// and no block editors.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BlockPersister + RevisionStore + 'static,
    {
        Self {
            persister: store.clone(),
            revisions: store,
            sanitizer: Arc::new(BasicSanitizer),
            editors: EditorRegistry::new(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn HtmlSanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_editors(mut self, editors: EditorRegistry) -> Self {
        self.editors = editors;
        self
    }
}

/// Editing session for one document. Must live inside a tokio runtime.
pub struct EditorSession {
    id: SessionId,
    meta: DocumentMeta,
    collection: BlockCollection,
    last_saved: Vec<Block>,
    state: SaveState,
    editors: EditorRegistry,
    drag: DragController<BlockId>,
    sync: SyncHandle,
    recorder: RevisionRecorder,
    preview: PreviewProjector,
    flows: Subscription<SyncFlow>,
}

impl EditorSession {
    /// Open a session on `blocks` as last persisted.
    pub fn open(
        meta: DocumentMeta,
        blocks: Vec<Block>,
        config: &EditorConfig,
        collaborators: Collaborators,
    ) -> SessionResult<Self> {
        let collection = BlockCollection::from_blocks(meta.id, blocks)?;
        let bus = shared_sync_flow_bus(config.flow_capacity);
        let flows = bus.subscribe("sync.*");

        let recorder = RevisionRecorder::new(
            collaborators.revisions,
            bus.clone(),
            config.attribution.clone(),
            config.auto_revision_summary.clone(),
        );
        let sync = spawn_sync(
            collaborators.persister,
            Some(recorder.clone()),
            bus,
            config.save_debounce(),
        );
        let preview = PreviewProjector::new(
            collection.blocks(),
            &meta,
            collaborators.sanitizer,
            config.preview_debounce(),
            config.auto_refresh_preview,
        );

        let id = SessionId::new();
        info!(session = %id.short(), document = %meta.id, blocks = collection.len(), "editor session opened");
        Ok(Self {
            id,
            last_saved: collection.snapshot(),
            meta,
            collection,
            state: SaveState::Clean,
            editors: collaborators.editors,
            drag: DragController::new(config.drag_activation_distance),
            sync,
            recorder,
            preview,
            flows,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn document_id(&self) -> DocumentId {
        self.meta.id
    }

    pub fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    pub fn collection(&self) -> &BlockCollection {
        &self.collection
    }

    pub fn blocks(&self) -> &[Block] {
        self.collection.blocks()
    }

    pub fn save_state(&self) -> &SaveState {
        &self.state
    }

    pub fn last_saved(&self) -> &[Block] {
        &self.last_saved
    }

    pub fn preview(&self) -> &PreviewProjector {
        &self.preview
    }

    pub fn drag(&mut self) -> &mut DragController<BlockId> {
        &mut self.drag
    }

    /// Bus carrying this session's sync and revision events.
    pub fn flows(&self) -> &SharedSyncFlowBus {
        self.sync.flows()
    }

    // ── Mutations ───────────────────────────────────────────────────────

    pub fn add_block(&mut self, block_type: BlockType, initial: Option<BlockData>) -> SessionResult<BlockId> {
        let id = self.collection.add_block(block_type, initial)?.id;
        self.on_mutate()?;
        Ok(id)
    }

    pub fn update_block_data(&mut self, id: &BlockId, data: BlockData) -> SessionResult<()> {
        self.collection.update_block_data(id, data)?;
        self.on_mutate()
    }

    pub fn delete_block(&mut self, id: &BlockId) -> SessionResult<Block> {
        let removed = self.collection.delete_block(id)?;
        self.on_mutate()?;
        Ok(removed)
    }

    /// Returns false for a same-index move, which schedules nothing.
    pub fn reorder(&mut self, id: &BlockId, new_index: usize) -> SessionResult<bool> {
        let moved = self.collection.reorder(id, new_index)?;
        if moved {
            self.on_mutate()?;
        }
        Ok(moved)
    }

    /// Open the registered editor for a block and apply what it commits.
    /// Returns false if the author dismissed the editor.
    pub fn commit_edit(&mut self, id: &BlockId) -> SessionResult<bool> {
        let current = self
            .collection
            .get(id)
            .ok_or(EditorError::StaleReference(*id))?
            .data
            .clone();
        let editor = self.editors.editor_for(&current)?.clone();
        match editor.commit(&current) {
            Some(data) => {
                self.update_block_data(id, data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn apply_drop(&mut self, plan: &DropPlan<BlockId, ()>) -> SessionResult<bool> {
        let moved = plan.apply(&mut self.collection)?;
        if moved {
            self.on_mutate()?;
        }
        Ok(moved)
    }

    /// Release the current drag gesture and apply it if it produced a plan.
    pub fn end_drag(&mut self) -> SessionResult<bool> {
        match self.drag.drop() {
            DragOutcome::Dropped(plan) => self.apply_drop(&plan),
            DragOutcome::Cancelled | DragOutcome::Ignored => Ok(false),
        }
    }

    /// Change metadata (title, status, featured). Re-projects the preview;
    /// persisting metadata is the caller's concern.
    pub fn update_meta(&mut self, f: impl FnOnce(&mut DocumentMeta)) {
        f(&mut self.meta);
        self.meta.updated_at = folio_types::now_millis();
        self.preview.schedule(self.collection.snapshot(), self.meta.clone());
    }

    fn on_mutate(&mut self) -> SessionResult<()> {
        if !matches!(self.state, SaveState::Failed(_)) {
            self.state = SaveState::Dirty;
        }
        let snapshot = self.collection.snapshot();
        self.preview.schedule(snapshot.clone(), self.meta.clone());
        self.sync
            .schedule_save(self.meta.id, snapshot, self.collection.version())?;
        Ok(())
    }

    // ── Saving ──────────────────────────────────────────────────────────

    /// Explicit save: skips the debounce, still waits behind an in-flight write.
    pub fn save_now(&mut self) -> SessionResult<()> {
        self.sync
            .save_now(self.meta.id, self.collection.snapshot(), self.collection.version())?;
        Ok(())
    }

    /// Request a revision for a workflow transition (publish, feature, ...).
    pub async fn record_transition(&self, change_type: ChangeType, summary: &str) -> Option<RevisionNumber> {
        self.recorder.record(self.meta.id, change_type, summary).await
    }

    /// Put the collection back to what the store last confirmed and save it,
    /// so that anything queued behind is superseded.
    pub fn revert_to_last_saved(&mut self) -> SessionResult<()> {
        self.collection.reset_to(self.last_saved.clone())?;
        info!(document = %self.meta.id, blocks = self.collection.len(), "reverted to last saved state");
        self.state = SaveState::Dirty;
        self.preview.schedule(self.collection.snapshot(), self.meta.clone());
        self.save_now()
    }

    /// Fold one flow event into the session. Events for other documents and
    /// non-terminal events return `None`.
    pub fn handle_flow(&mut self, flow: SyncFlow) -> Option<SyncEvent> {
        match flow {
            SyncFlow::Saved { document_id, version, canonical, id_map } if document_id == self.meta.id => {
                let reconciled = self.reconcile(version, canonical, &id_map);
                Some(SyncEvent::Saved { version, reconciled })
            }
            SyncFlow::Failed { document_id, version, error } if document_id == self.meta.id => {
                warn!(document = %document_id, version, %error, "save did not land; local changes kept");
                self.state = SaveState::Failed(error.clone());
                Some(SyncEvent::Failed { version, error })
            }
            _ => None,
        }
    }

    fn reconcile(&mut self, version: u64, canonical: Vec<Block>, id_map: &[(BlockId, BlockId)]) -> Reconciled {
        self.last_saved = canonical.clone();

        if version == self.collection.version() {
            match self.collection.replace_all(canonical) {
                Ok(()) => {
                    self.state = SaveState::Clean;
                    self.preview.schedule(self.collection.snapshot(), self.meta.clone());
                    debug!(document = %self.meta.id, version, "adopted canonical blocks");
                    return Reconciled::Replaced;
                }
                Err(e) => {
                    warn!(document = %self.meta.id, error = %e, "canonical blocks rejected, remapping ids only");
                }
            }
        }

        let remapped = self.collection.remap_ids(id_map);
        if remapped > 0 {
            self.preview.schedule(self.collection.snapshot(), self.meta.clone());
        }
        debug!(document = %self.meta.id, version, local = self.collection.version(), remapped, "kept newer local edits");
        Reconciled::Remapped(remapped)
    }

    /// Wait for the next settled save of this document.
    pub async fn next_sync_event(&mut self) -> Option<SyncEvent> {
        while let Some(msg) = self.flows.recv().await {
            if let Some(event) = self.handle_flow(msg.payload) {
                return Some(event);
            }
        }
        None
    }

    /// Handle every buffered event without waiting.
    pub fn poll_sync_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(msg) = self.flows.try_recv() {
            events.extend(self.handle_flow(msg.payload));
        }
        events
    }

    /// Flush staged work, wait for every write to settle, stop the pipeline.
    pub async fn close(mut self) -> SessionResult<SaveState> {
        let document_id = self.meta.id;
        self.sync.flush(document_id).await?;
        while !self.sync.status(document_id).await?.is_idle() {
            if self.next_sync_event().await.is_none() {
                break;
            }
        }
        self.sync.shutdown().await?;
        self.poll_sync_events();
        info!(session = %self.id.short(), document = %document_id, state = ?self.state, "editor session closed");
        Ok(self.state)
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("id", &self.id)
            .field("document", &self.meta.id)
            .field("blocks", &self.collection.len())
            .field("version", &self.collection.version())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
