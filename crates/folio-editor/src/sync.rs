//! Debounced persistence pipeline.
//!
//! An actor task owns every document's pending-write bookkeeping; the
//! cloneable [`SyncHandle`] talks to it over mpsc and awaits oneshot replies.
//! Outcomes are published on the [`SyncFlow`] bus rather than returned, so a
//! session learns about a save whether it asked for it explicitly or a timer
//! fired.
//!
//! ```text
//!   SyncHandle            mpsc           SyncActor
//!   ┌──────────────────┐ ──────────▶ ┌───────────────────────────────┐
//!   │ .schedule_save() │             │ staged snapshot + Debouncer   │
//!   │ .save_now()      │             │ PendingWrite { in_flight,     │
//!   │ .flush()         │ ◀────────── │                queued }       │
//!   └──────────────────┘   oneshot   └──────────┬────────────────────┘
//!                                      spawn    │ persist_blocks
//!                                               ▼
//!                                    BlockPersister ──▶ WriteFinished
//! ```
//!
//! # Rules
//!
//! - Each document has at most one persist call outstanding.
//! - While one is outstanding, newer snapshots replace the queued one
//!   (latest wins) and go out as soon as it resolves.
//! - A failed payload is not resent; a newer queued snapshot still is.
//! - On success, provisional ids in the queued and staged snapshots are
//!   rewritten to the assigned ones so the store never creates the same
//!   block twice.
//! - In-flight writes are never cancelled, not even by shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, info_span, trace, Instrument};

use folio_types::{Block, BlockId, DocumentId};

use crate::collab::{BlockPersister, PersistError};
use crate::debounce::Debouncer;
use crate::flows::{SharedSyncFlowBus, SyncFlow};
use crate::revision::RevisionRecorder;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("sync pipeline shut down")]
    Shutdown,
}

// ============================================================================
// Public state types
// ============================================================================

/// A block list captured at a local version.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub blocks: Vec<Block>,
    pub version: u64,
}

/// Per-document write bookkeeping. Lives only in memory.
#[derive(Debug, Default)]
pub struct PendingWrite {
    pub in_flight: Option<u64>,
    pub queued: Option<Snapshot>,
}

/// Point-in-time view of one document's pipeline state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Version of the snapshot being persisted right now.
    pub in_flight: Option<u64>,
    /// Version waiting behind it.
    pub queued: Option<u64>,
    /// Version waiting for its debounce timer.
    pub staged: Option<u64>,
}

impl SyncStatus {
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queued.is_none() && self.staged.is_none()
    }
}

/// Pair provisional ids in `sent` with the ids the store assigned.
///
/// The store returns the canonical list in order, so positions line up when
/// the lengths agree. Anything else yields an empty map and the caller falls
/// back to the canonical list.
pub fn assigned_id_map(sent: &[Block], canonical: &[Block]) -> Vec<(BlockId, BlockId)> {
    if sent.len() != canonical.len() {
        return Vec::new();
    }
    sent.iter()
        .zip(canonical)
        .filter(|(s, c)| s.id.is_provisional() && s.id != c.id && s.data.same_type(&c.data))
        .map(|(s, c)| (s.id, c.id))
        .collect()
}

// ============================================================================
// Commands (internal)
// ============================================================================

enum SyncCommand {
    Schedule {
        document_id: DocumentId,
        snapshot: Snapshot,
    },
    SaveNow {
        document_id: DocumentId,
        snapshot: Snapshot,
    },
    Flush {
        document_id: DocumentId,
        reply: oneshot::Sender<bool>,
    },
    Cancel {
        document_id: DocumentId,
        reply: oneshot::Sender<bool>,
    },
    Status {
        document_id: DocumentId,
        reply: oneshot::Sender<SyncStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    TimerFired {
        document_id: DocumentId,
        generation: u64,
    },
    WriteFinished {
        document_id: DocumentId,
        sent: Snapshot,
        result: Result<Vec<Block>, PersistError>,
    },
}

// ============================================================================
// SyncHandle
// ============================================================================

/// Cloneable handle to the sync actor.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncCommand>,
    flows: SharedSyncFlowBus,
}

impl SyncHandle {
    /// Stage `blocks` and (re)start the document's debounce timer.
    pub fn schedule_save(
        &self,
        document_id: DocumentId,
        blocks: Vec<Block>,
        version: u64,
    ) -> Result<(), SyncError> {
        self.tx
            .send(SyncCommand::Schedule {
                document_id,
                snapshot: Snapshot { blocks, version },
            })
            .map_err(|_| SyncError::Shutdown)
    }

    /// Persist `blocks` without waiting for the debounce. Replaces anything
    /// staged; still queues behind an in-flight write.
    pub fn save_now(
        &self,
        document_id: DocumentId,
        blocks: Vec<Block>,
        version: u64,
    ) -> Result<(), SyncError> {
        self.tx
            .send(SyncCommand::SaveNow {
                document_id,
                snapshot: Snapshot { blocks, version },
            })
            .map_err(|_| SyncError::Shutdown)
    }

    /// Send the staged snapshot now. Returns false if nothing was staged.
    pub async fn flush(&self, document_id: DocumentId) -> Result<bool, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Flush { document_id, reply })
            .map_err(|_| SyncError::Shutdown)?;
        rx.await.map_err(|_| SyncError::Shutdown)
    }

    /// Drop the staged snapshot and its timer. In-flight writes continue.
    pub async fn cancel(&self, document_id: DocumentId) -> Result<bool, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Cancel { document_id, reply })
            .map_err(|_| SyncError::Shutdown)?;
        rx.await.map_err(|_| SyncError::Shutdown)
    }

    pub async fn status(&self, document_id: DocumentId) -> Result<SyncStatus, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Status { document_id, reply })
            .map_err(|_| SyncError::Shutdown)?;
        rx.await.map_err(|_| SyncError::Shutdown)
    }

    /// Cancel all timers, drop unsent snapshots and wait for in-flight
    /// writes to settle. Call [`SyncHandle::flush`] first to keep staged work.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Shutdown { reply })
            .map_err(|_| SyncError::Shutdown)?;
        rx.await.map_err(|_| SyncError::Shutdown)
    }

    /// The bus outcomes are published on.
    pub fn flows(&self) -> &SharedSyncFlowBus {
        &self.flows
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ============================================================================
// SyncActor (internal)
// ============================================================================

struct SyncActor {
    persister: Arc<dyn BlockPersister>,
    recorder: Option<RevisionRecorder>,
    flows: SharedSyncFlowBus,
    /// Weak so that dropping every handle ends the actor.
    tx: mpsc::WeakUnboundedSender<SyncCommand>,
    timers: Debouncer<DocumentId>,
    staged: HashMap<DocumentId, Snapshot>,
    writes: HashMap<DocumentId, PendingWrite>,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl SyncActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SyncCommand>) {
        while let Some(cmd) = rx.recv().await {
            if self.handle_command(cmd) {
                break;
            }
        }
        self.timers.cancel_all();
        debug!("sync actor stopped");
    }

    /// Returns true once the actor should stop.
    fn handle_command(&mut self, cmd: SyncCommand) -> bool {
        match cmd {
            SyncCommand::Schedule { document_id, snapshot } => {
                if !self.shutdown_waiters.is_empty() {
                    debug!(document = %document_id, "ignoring save during shutdown");
                    return false;
                }
                trace!(document = %document_id, version = snapshot.version, "save staged");
                self.staged.insert(document_id, snapshot);
                let tx = self.tx.clone();
                self.timers.schedule(document_id, move |generation| {
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(SyncCommand::TimerFired { document_id, generation });
                    }
                });
            }
            SyncCommand::SaveNow { document_id, snapshot } => {
                if !self.shutdown_waiters.is_empty() {
                    debug!(document = %document_id, "ignoring save during shutdown");
                    return false;
                }
                self.timers.cancel(&document_id);
                self.staged.remove(&document_id);
                self.dispatch(document_id, snapshot);
            }
            SyncCommand::Flush { document_id, reply } => {
                self.timers.cancel(&document_id);
                let flushed = match self.staged.remove(&document_id) {
                    Some(snapshot) => {
                        self.dispatch(document_id, snapshot);
                        true
                    }
                    None => false,
                };
                let _ = reply.send(flushed);
            }
            SyncCommand::Cancel { document_id, reply } => {
                self.timers.cancel(&document_id);
                let _ = reply.send(self.staged.remove(&document_id).is_some());
            }
            SyncCommand::Status { document_id, reply } => {
                let write = self.writes.get(&document_id);
                let _ = reply.send(SyncStatus {
                    in_flight: write.and_then(|w| w.in_flight),
                    queued: write.and_then(|w| w.queued.as_ref().map(|s| s.version)),
                    staged: self.staged.get(&document_id).map(|s| s.version),
                });
            }
            SyncCommand::Shutdown { reply } => {
                self.timers.cancel_all();
                self.staged.clear();
                for write in self.writes.values_mut() {
                    write.queued = None;
                }
                self.shutdown_waiters.push(reply);
                return self.settle_shutdown();
            }
            SyncCommand::TimerFired { document_id, generation } => {
                if !self.timers.complete(&document_id, generation) {
                    trace!(document = %document_id, generation, "stale timer ignored");
                    return false;
                }
                if let Some(snapshot) = self.staged.remove(&document_id) {
                    self.dispatch(document_id, snapshot);
                }
            }
            SyncCommand::WriteFinished { document_id, sent, result } => {
                self.finish_write(document_id, sent, result);
                return self.settle_shutdown();
            }
        }
        false
    }

    /// Start a write, or queue behind the outstanding one.
    fn dispatch(&mut self, document_id: DocumentId, snapshot: Snapshot) {
        let write = self.writes.entry(document_id).or_default();
        if write.in_flight.is_some() {
            debug!(document = %document_id, version = snapshot.version, "write queued behind in-flight save");
            let version = snapshot.version;
            write.queued = Some(snapshot);
            self.flows.publish(SyncFlow::Queued { document_id, version });
            return;
        }

        let Some(tx) = self.tx.upgrade() else {
            debug!(document = %document_id, "no handles left, dropping write");
            return;
        };
        write.in_flight = Some(snapshot.version);
        self.flows.publish(SyncFlow::Sent {
            document_id,
            version: snapshot.version,
            block_count: snapshot.blocks.len(),
        });

        let persister = self.persister.clone();
        let span = info_span!("sync.persist", document = %document_id, version = snapshot.version);
        tokio::spawn(
            async move {
                let result = persister.persist_blocks(document_id, &snapshot.blocks).await;
                let _ = tx.send(SyncCommand::WriteFinished {
                    document_id,
                    sent: snapshot,
                    result,
                });
            }
            .instrument(span),
        );
    }

    fn finish_write(
        &mut self,
        document_id: DocumentId,
        sent: Snapshot,
        result: Result<Vec<Block>, PersistError>,
    ) {
        let write = self.writes.entry(document_id).or_default();
        write.in_flight = None;
        let mut queued = write.queued.take();

        match result {
            Ok(canonical) => {
                let id_map = assigned_id_map(&sent.blocks, &canonical);
                if let Some(next) = queued.as_mut() {
                    remap_snapshot(next, &id_map);
                }
                if let Some(staged) = self.staged.get_mut(&document_id) {
                    remap_snapshot(staged, &id_map);
                }
                info!(
                    document = %document_id,
                    version = sent.version,
                    blocks = canonical.len(),
                    assigned = id_map.len(),
                    "blocks saved"
                );
                self.flows.publish(SyncFlow::Saved {
                    document_id,
                    version: sent.version,
                    canonical,
                    id_map,
                });
                if let Some(recorder) = self.recorder.clone() {
                    tokio::spawn(async move {
                        recorder.record_auto_save(document_id).await;
                    });
                }
            }
            Err(e) => {
                error!(document = %document_id, version = sent.version, error = %e, "save failed");
                self.flows.publish(SyncFlow::Failed {
                    document_id,
                    version: sent.version,
                    error: e,
                });
            }
        }

        match queued {
            Some(next) => self.dispatch(document_id, next),
            None => {
                self.writes.remove(&document_id);
            }
        }
    }

    fn settle_shutdown(&mut self) -> bool {
        if self.shutdown_waiters.is_empty() {
            return false;
        }
        if self.writes.values().any(|w| w.in_flight.is_some()) {
            debug!("shutdown waiting for in-flight writes");
            return false;
        }
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
        true
    }
}

fn remap_snapshot(snapshot: &mut Snapshot, id_map: &[(BlockId, BlockId)]) {
    for block in &mut snapshot.blocks {
        if let Some((_, to)) = id_map.iter().find(|(from, _)| *from == block.id) {
            block.id = *to;
        }
    }
}

// ============================================================================
// Public spawn function
// ============================================================================

/// Spawn the sync actor on the current tokio runtime.
///
/// `recorder` receives an auto-save request after every successful write.
pub fn spawn_sync(
    persister: Arc<dyn BlockPersister>,
    recorder: Option<RevisionRecorder>,
    flows: SharedSyncFlowBus,
    debounce: Duration,
) -> SyncHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = SyncActor {
        persister,
        recorder,
        flows: flows.clone(),
        tx: tx.downgrade(),
        timers: Debouncer::new(debounce),
        staged: HashMap::new(),
        writes: HashMap::new(),
        shutdown_waiters: Vec::new(),
    };
    tokio::spawn(actor.run(rx));
    SyncHandle { tx, flows }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{RevisionError, RevisionStore};
    use crate::flows::{shared_sync_flow_bus, FlowMessage, Subscription};
    use async_trait::async_trait;
    use folio_types::{BlockData, ChangeType, RevisionNumber};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    /// Assigns ids like a store would. Optionally gated so a test can hold a
    /// write in flight.
    #[derive(Default)]
    struct MockPersister {
        calls: Mutex<Vec<Vec<Block>>>,
        gate: Option<Semaphore>,
        fail_next: Mutex<Option<PersistError>>,
        current: AtomicUsize,
        max_concurrent: AtomicUsize,
        next_id: AtomicU64,
    }

    impl MockPersister {
        fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Default::default()
            }
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn calls(&self) -> Vec<Vec<Block>> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl BlockPersister for MockPersister {
        async fn persist_blocks(
            &self,
            _document_id: DocumentId,
            blocks: &[Block],
        ) -> Result<Vec<Block>, PersistError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().push(blocks.to_vec());

            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            self.current.fetch_sub(1, Ordering::SeqCst);

            if let Some(err) = self.fail_next.lock().take() {
                return Err(err);
            }
            Ok(blocks
                .iter()
                .map(|b| {
                    let mut b = b.clone();
                    if b.id.is_provisional() {
                        b.id = BlockId::Assigned(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                    }
                    b
                })
                .collect())
        }
    }

    struct FailingRevisions;

    #[async_trait]
    impl RevisionStore for FailingRevisions {
        async fn create_revision(
            &self,
            _document_id: DocumentId,
            _change_type: ChangeType,
            _summary: &str,
            _attribution: &str,
        ) -> Result<RevisionNumber, RevisionError> {
            Err(RevisionError::Unavailable("revision store down".into()))
        }
    }

    fn blocks(doc: DocumentId, texts: &[&str]) -> Vec<Block> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Block::new(doc, i as u32, BlockData::paragraph(*t)))
            .collect()
    }

    async fn next(sub: &mut Subscription<SyncFlow>) -> FlowMessage<SyncFlow> {
        tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("timed out waiting for flow")
            .expect("bus closed")
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_rapid_saves() {
        let persister = Arc::new(MockPersister::default());
        let bus = shared_sync_flow_bus(64);
        let mut saved = bus.subscribe("sync.saved");
        let sync = spawn_sync(persister.clone(), None, bus, DEBOUNCE);

        let doc = DocumentId::new();
        for version in 1..=5 {
            sync.schedule_save(doc, blocks(doc, &["a"]), version).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(persister.calls().is_empty());
        assert_eq!(sync.status(doc).await.unwrap().staged, Some(5));

        let msg = next(&mut saved).await;
        match msg.payload {
            SyncFlow::Saved { version, id_map, .. } => {
                assert_eq!(version, 5);
                assert_eq!(id_map.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(persister.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_write_in_flight_latest_wins() {
        let persister = Arc::new(MockPersister::gated());
        let bus = shared_sync_flow_bus(64);
        let mut flows = bus.subscribe("sync.*");
        let sync = spawn_sync(persister.clone(), None, bus, DEBOUNCE);

        let doc = DocumentId::new();
        sync.save_now(doc, blocks(doc, &["v1"]), 1).unwrap();
        sync.save_now(doc, blocks(doc, &["v2"]), 2).unwrap();
        sync.save_now(doc, blocks(doc, &["v3"]), 3).unwrap();

        let status = sync.status(doc).await.unwrap();
        assert_eq!(status.in_flight, Some(1));
        assert_eq!(status.queued, Some(3));

        persister.release();
        persister.release();

        let mut saved_versions = Vec::new();
        while saved_versions.len() < 2 {
            if let SyncFlow::Saved { version, .. } = next(&mut flows).await.payload {
                saved_versions.push(version);
            }
        }
        assert_eq!(saved_versions, vec![1, 3]);
        assert_eq!(persister.max_concurrent.load(Ordering::SeqCst), 1);

        let sent: Vec<String> = persister
            .calls()
            .iter()
            .map(|c| match &c[0].data {
                BlockData::Paragraph(p) => p.text.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(sent, vec!["v1", "v3"]);
        assert!(sync.status(doc).await.unwrap().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_snapshot_gets_assigned_ids() {
        let persister = Arc::new(MockPersister::gated());
        let bus = shared_sync_flow_bus(64);
        let mut saved = bus.subscribe("sync.saved");
        let sync = spawn_sync(persister.clone(), None, bus, DEBOUNCE);

        let doc = DocumentId::new();
        let first = blocks(doc, &["a"]);
        let provisional = first[0].id;
        sync.save_now(doc, first.clone(), 1).unwrap();

        let mut second = first.clone();
        second.push(Block::new(doc, 1, BlockData::paragraph("b")));
        sync.save_now(doc, second, 2).unwrap();

        persister.release();
        persister.release();
        next(&mut saved).await;
        next(&mut saved).await;

        let calls = persister.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0].id, provisional);
        assert_eq!(calls[1][0].id, BlockId::Assigned(1));
        assert!(calls[1][1].id.is_provisional());
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_snapshot_gets_assigned_ids() {
        let persister = Arc::new(MockPersister::gated());
        let bus = shared_sync_flow_bus(64);
        let mut saved = bus.subscribe("sync.saved");
        let sync = spawn_sync(persister.clone(), None, bus, DEBOUNCE);

        let doc = DocumentId::new();
        let first = blocks(doc, &["a"]);
        let provisional = first[0].id;
        sync.save_now(doc, first.clone(), 1).unwrap();

        // Edit lands while the first write is still out; it waits on its timer.
        let mut second = first.clone();
        second[0].data = BlockData::paragraph("a, edited");
        sync.schedule_save(doc, second, 2).unwrap();

        let status = sync.status(doc).await.unwrap();
        assert_eq!(status.in_flight, Some(1));
        assert_eq!(status.staged, Some(2));

        persister.release();
        persister.release();
        match next(&mut saved).await.payload {
            SyncFlow::Saved { version, id_map, .. } => {
                assert_eq!(version, 1);
                assert_eq!(id_map, vec![(provisional, BlockId::Assigned(1))]);
            }
            other => panic!("unexpected {other:?}"),
        }

        match next(&mut saved).await.payload {
            SyncFlow::Saved { version, canonical, id_map, .. } => {
                assert_eq!(version, 2);
                assert!(id_map.is_empty());
                assert_eq!(canonical[0].id, BlockId::Assigned(1));
            }
            other => panic!("unexpected {other:?}"),
        }

        let calls = persister.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1][0].id, BlockId::Assigned(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_published_and_not_retried() {
        let persister = Arc::new(MockPersister::default());
        *persister.fail_next.lock() = Some(PersistError::Transport("connection reset".into()));
        let bus = shared_sync_flow_bus(64);
        let mut terminal = bus.subscribe("sync.*");
        let sync = spawn_sync(persister.clone(), None, bus, DEBOUNCE);

        let doc = DocumentId::new();
        sync.save_now(doc, blocks(doc, &["a"]), 1).unwrap();

        loop {
            match next(&mut terminal).await.payload {
                SyncFlow::Failed { version, error, .. } => {
                    assert_eq!(version, 1);
                    assert_eq!(error, PersistError::Transport("connection reset".into()));
                    break;
                }
                SyncFlow::Sent { .. } => {}
                other => panic!("unexpected {other:?}"),
            }
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(persister.calls().len(), 1);
        assert!(sync.status(doc).await.unwrap().is_idle());

        sync.save_now(doc, blocks(doc, &["a"]), 2).unwrap();
        loop {
            if let SyncFlow::Saved { version, .. } = next(&mut terminal).await.payload {
                assert_eq!(version, 2);
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_revision_failure_does_not_block_saves() {
        let persister = Arc::new(MockPersister::default());
        let bus = shared_sync_flow_bus(64);
        let mut all = bus.subscribe(">");
        let recorder = RevisionRecorder::new(Arc::new(FailingRevisions), bus.clone(), "test", "auto");
        let sync = spawn_sync(persister.clone(), Some(recorder), bus, DEBOUNCE);

        let doc = DocumentId::new();
        sync.save_now(doc, blocks(doc, &["a"]), 1).unwrap();

        let mut subjects = Vec::new();
        while !subjects.contains(&"revision.failed".to_string()) {
            subjects.push(next(&mut all).await.subject);
        }
        assert!(subjects.contains(&"sync.saved".to_string()));

        sync.save_now(doc, blocks(doc, &["b"]), 2).unwrap();
        loop {
            if let SyncFlow::Saved { version, .. } = next(&mut all).await.payload {
                assert_eq!(version, 2);
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_cancel() {
        let persister = Arc::new(MockPersister::default());
        let bus = shared_sync_flow_bus(64);
        let mut saved = bus.subscribe("sync.saved");
        let sync = spawn_sync(persister.clone(), None, bus, Duration::from_secs(60));

        let doc = DocumentId::new();
        assert!(!sync.flush(doc).await.unwrap());

        sync.schedule_save(doc, blocks(doc, &["a"]), 1).unwrap();
        assert!(sync.cancel(doc).await.unwrap());
        assert!(!sync.flush(doc).await.unwrap());

        sync.schedule_save(doc, blocks(doc, &["a"]), 2).unwrap();
        assert!(sync.flush(doc).await.unwrap());
        next(&mut saved).await;
        assert_eq!(persister.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_write() {
        let persister = Arc::new(MockPersister::gated());
        let bus = shared_sync_flow_bus(64);
        let mut saved = bus.subscribe("sync.saved");
        let sync = spawn_sync(persister.clone(), None, bus, DEBOUNCE);

        let doc = DocumentId::new();
        sync.save_now(doc, blocks(doc, &["a"]), 1).unwrap();
        sync.schedule_save(doc, blocks(doc, &["b"]), 2).unwrap();

        let handle = sync.clone();
        let shutdown = tokio::spawn(async move { handle.shutdown().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!shutdown.is_finished());

        persister.release();
        shutdown.await.unwrap().unwrap();
        next(&mut saved).await;

        assert_eq!(persister.calls().len(), 1);
        assert_eq!(sync.status(doc).await, Err(SyncError::Shutdown));
        assert_eq!(sync.schedule_save(doc, vec![], 3), Err(SyncError::Shutdown));
    }

    #[test]
    fn test_assigned_id_map_pairs_by_position() {
        let doc = DocumentId::new();
        let sent = blocks(doc, &["a", "b"]);
        let mut canonical = sent.clone();
        canonical[0].id = BlockId::Assigned(10);
        canonical[1].id = BlockId::Assigned(11);

        let map = assigned_id_map(&sent, &canonical);
        assert_eq!(map, vec![
            (sent[0].id, BlockId::Assigned(10)),
            (sent[1].id, BlockId::Assigned(11)),
        ]);
        assert!(assigned_id_map(&sent, &canonical[..1]).is_empty());
    }
}
