//! Command implementations, generic over the document store.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use folio_editor::{
    project, BasicSanitizer, BoardChange, BoardSection, Collaborators, ContentBoard, DragController,
    DragOutcome, EditorConfig, EditorRegistry, EditorSession, Reconciled, SaveState, Slot,
    Subscription, SyncEvent, SyncFlow,
};
use folio_store::DocumentStore;
use folio_types::{
    BlockId, BlockType, ChangeType, ContentKind, DocumentMeta, DocumentStatus, RevisionNumber,
};

use crate::text::{apply_text, summary, text_editors};

/// How long a command waits for its save or revision to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct App<S> {
    store: Arc<S>,
    config: EditorConfig,
}

/// An open session plus a subscription to its revision events.
struct Editing {
    session: EditorSession,
    revisions: Subscription<SyncFlow>,
}

impl<S: DocumentStore + 'static> App<S> {
    pub fn new(store: Arc<S>, config: EditorConfig) -> Self {
        Self { store, config }
    }

    /// Resolve a hex id prefix to exactly one document.
    fn resolve(&self, prefix: &str) -> Result<DocumentMeta> {
        self.store
            .find_document(prefix)?
            .ok_or_else(|| anyhow!("no unique document matches '{prefix}'"))
    }

    fn open(&self, prefix: &str, editors: EditorRegistry) -> Result<Editing> {
        let meta = self.resolve(prefix)?;
        let (meta, blocks) = self.store.load_document(meta.id)?;
        let collaborators = Collaborators::from_store(self.store.clone()).with_editors(editors);
        let session = EditorSession::open(meta, blocks, &self.config, collaborators)?;
        let revisions = session.flows().subscribe("revision.*");
        Ok(Editing { session, revisions })
    }

    /// Save now, wait for the outcome and the auto-save revision, close.
    async fn settle(&self, mut editing: Editing) -> Result<EditorSession> {
        editing.session.save_now()?;
        let event = tokio::time::timeout(SETTLE_TIMEOUT, editing.session.next_sync_event())
            .await
            .context("timed out waiting for save")?
            .ok_or_else(|| anyhow!("sync pipeline stopped"))?;

        match event {
            SyncEvent::Saved { version, reconciled } => {
                info!(document = %editing.session.document_id(), version, ?reconciled, "saved");
                if reconciled != Reconciled::Replaced {
                    warn!(?reconciled, "local edits newer than the save");
                }
            }
            SyncEvent::Failed { error, .. } => bail!("save failed: {error}"),
        }

        // The auto-save revision is recorded off the save path; give it a
        // chance to land before the runtime goes away.
        match tokio::time::timeout(SETTLE_TIMEOUT, editing.revisions.recv()).await {
            Ok(Some(msg)) => {
                if let SyncFlow::RevisionFailed { error, .. } = msg.payload {
                    warn!(%error, "auto-save revision not recorded");
                }
            }
            Ok(None) | Err(_) => warn!("no revision outcome before timeout"),
        }
        Ok(editing.session)
    }

    async fn close(session: EditorSession) -> Result<()> {
        match session.close().await? {
            SaveState::Failed(e) => bail!("unsaved changes: {e}"),
            SaveState::Clean | SaveState::Dirty => Ok(()),
        }
    }

    // ========================================================================
    // Documents
    // ========================================================================

    pub fn new_document(&self, title: &str, kind: ContentKind, description: &str) -> Result<DocumentMeta> {
        let meta = DocumentMeta::new(title)
            .with_kind(kind)
            .with_description(description);
        self.store.create_document(&meta)?;
        self.store
            .snapshot(meta.id, ChangeType::Create, "Created", &self.config.attribution)?;
        Ok(meta)
    }

    pub fn list(&self) -> Result<String> {
        let docs = self.store.list_documents()?;
        let board = ContentBoard::from_documents(&docs);
        let mut out = String::new();
        for (label, section) in [("Featured", BoardSection::Featured), ("All", BoardSection::All)] {
            writeln!(out, "{label} ({})", board.section(section).len())?;
            for card in board.section(section) {
                writeln!(out, "  {}  {:<9} {:<8} {}", card.id.short(), card.status.as_str(), card.kind.as_str(), card.title)?;
            }
        }
        Ok(out)
    }

    pub fn show(&self, prefix: &str, html: bool) -> Result<String> {
        let meta = self.resolve(prefix)?;
        let (meta, blocks) = self.store.load_document(meta.id)?;
        if html {
            return Ok(project(&blocks, &meta, &BasicSanitizer).to_html());
        }

        let mut out = String::new();
        let featured = if meta.featured { ", featured" } else { "" };
        writeln!(out, "{}  [{}{}]  {}  {}", meta.title, meta.status, featured, meta.kind, meta.id.short())?;
        if !meta.description.is_empty() {
            writeln!(out, "{}", meta.description)?;
        }
        for block in &blocks {
            writeln!(out, "  {:>3}  {:>6}  {:<11} {}", block.order, block.id.to_string(), block.type_name(), summary(&block.data))?;
        }
        Ok(out)
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    pub async fn add(
        &self,
        prefix: &str,
        block_type: BlockType,
        text: Option<&str>,
        at: Option<usize>,
    ) -> Result<BlockId> {
        let mut editing = self.open(prefix, EditorRegistry::new())?;
        let initial = text
            .map(|t| {
                apply_text(&folio_types::BlockData::default_for(block_type), t)
                    .ok_or_else(|| anyhow!("{block_type} blocks take no text"))
            })
            .transpose()?;

        let id = editing.session.add_block(block_type, initial)?;
        if let Some(at) = at {
            editing.session.reorder(&id, at)?;
        }
        let order = editing.session.collection().index_of(&id);

        let session = self.settle(editing).await?;
        // The provisional id was replaced on save; find the block by position.
        let assigned = order
            .and_then(|i| session.blocks().get(i))
            .map(|b| b.id)
            .unwrap_or(id);
        Self::close(session).await?;
        Ok(assigned)
    }

    pub async fn edit(&self, prefix: &str, block: &str, text: &str) -> Result<()> {
        let mut editing = self.open(prefix, text_editors(text))?;
        let id = parse_block(block)?;
        if !editing.session.commit_edit(&id)? {
            bail!("block {id} has no text to edit");
        }
        let session = self.settle(editing).await?;
        Self::close(session).await
    }

    /// Move a block with the same keyboard gesture an author would use.
    pub async fn move_block(&self, prefix: &str, block: &str, to: usize) -> Result<bool> {
        let mut editing = self.open(prefix, EditorRegistry::new())?;
        let id = parse_block(block)?;
        let len = editing.session.blocks().len();
        let from = editing
            .session
            .collection()
            .index_of(&id)
            .ok_or_else(|| anyhow!("block {id} not found"))?;

        let drag = editing.session.drag();
        drag.keyboard_pickup(id, Slot::new((), from));
        drag.keyboard_move(to as isize - from as isize, len);
        if !editing.session.end_drag()? {
            Self::close(editing.session).await?;
            return Ok(false);
        }
        let session = self.settle(editing).await?;
        Self::close(session).await?;
        Ok(true)
    }

    pub async fn remove(&self, prefix: &str, block: &str) -> Result<()> {
        let mut editing = self.open(prefix, EditorRegistry::new())?;
        editing.session.delete_block(&parse_block(block)?)?;
        let session = self.settle(editing).await?;
        Self::close(session).await
    }

    // ========================================================================
    // Workflow
    // ========================================================================

    /// Record a workflow transition from a session on the document.
    async fn transition(
        &self,
        meta: &DocumentMeta,
        change_type: ChangeType,
        summary: &str,
    ) -> Result<Option<RevisionNumber>> {
        let editing = self.open(&meta.id.to_hex(), EditorRegistry::new())?;
        let number = editing.session.record_transition(change_type, summary).await;
        Self::close(editing.session).await?;
        Ok(number)
    }

    pub async fn publish(&self, prefix: &str, publish: bool) -> Result<DocumentStatus> {
        let mut meta = self.resolve(prefix)?;
        let (status, change_type, summary) = if publish {
            (DocumentStatus::Published, ChangeType::Publish, "Published")
        } else {
            (DocumentStatus::Draft, ChangeType::Unpublish, "Unpublished")
        };
        if meta.status == status {
            return Ok(status);
        }
        meta.status = status;
        let meta = self.store.update_meta(&meta)?;
        self.transition(&meta, change_type, summary).await?;
        Ok(meta.status)
    }

    pub async fn archive(&self, prefix: &str) -> Result<()> {
        let mut meta = self.resolve(prefix)?;
        meta.status = DocumentStatus::Archived;
        let meta = self.store.update_meta(&meta)?;
        self.transition(&meta, ChangeType::Archive, "Archived").await?;
        Ok(())
    }

    /// Drag a document between the featured and all grids.
    pub async fn feature(&self, prefix: &str, featured: bool, at: Option<usize>) -> Result<BoardChange> {
        let meta = self.resolve(prefix)?;
        let docs = self.store.list_documents()?;
        let mut board = ContentBoard::from_documents(&docs);
        let (from, index) = board
            .locate(&meta.id)
            .ok_or_else(|| anyhow!("document {} not on the board", meta.id))?;
        let target = if featured { BoardSection::Featured } else { BoardSection::All };

        let mut drag: DragController<_, BoardSection> = DragController::new(self.config.drag_activation_distance);
        drag.keyboard_pickup(meta.id, Slot::new(from, index));
        let len = board.section(target).len();
        if let Some(slot) = drag.keyboard_move_to_section(target, len) {
            let to = at.unwrap_or(slot.index);
            drag.keyboard_move(to as isize - slot.index as isize, len);
        }
        let DragOutcome::Dropped(plan) = drag.drop() else {
            return Ok(BoardChange::Unchanged);
        };

        let change = plan.apply(&mut board)?;
        if let BoardChange::FeatureToggled { featured, .. } = change {
            let mut meta = meta;
            meta.featured = featured;
            let meta = self.store.update_meta(&meta)?;
            let summary = if featured { "Featured" } else { "Unfeatured" };
            self.transition(&meta, ChangeType::Feature, summary).await?;
        }
        Ok(change)
    }

    // ========================================================================
    // Revisions
    // ========================================================================

    pub fn history(&self, prefix: &str) -> Result<String> {
        let meta = self.resolve(prefix)?;
        let mut out = String::new();
        for revision in self.store.list_revisions(meta.id)? {
            writeln!(
                out,
                "{:>4}  {:<9} {:<12} {} ({} blocks)",
                revision.number.to_string(),
                revision.change_type.as_str(),
                revision.attribution,
                revision.summary,
                revision.blocks.len(),
            )?;
        }
        Ok(out)
    }

    pub fn restore(&self, prefix: &str, number: u64) -> Result<RevisionNumber> {
        let meta = self.resolve(prefix)?;
        let restored = self
            .store
            .restore_revision(meta.id, RevisionNumber(number), &self.config.attribution)?;
        Ok(restored)
    }
}

/// Accepts `12`, `#12` or a provisional `tmp-…` key.
fn parse_block(s: &str) -> Result<BlockId> {
    Ok(BlockId::from_key(s.trim_start_matches('#'))?)
}
