//! FlowBus pub/sub for persistence and revision events.
//!
//! The sync pipeline and the revision recorder publish [`SyncFlow`] events;
//! sessions, the CLI and tests subscribe with NATS-style subject patterns.
//!
//! # Pattern Matching
//!
//! Patterns use dot-separated tokens with wildcards:
//! - `*` matches exactly one token: `sync.*` matches `sync.saved`
//! - `>` matches one or more tokens (only at end): `revision.>`
//! - Exact match: `sync.failed` only matches `sync.failed`
//!
//! # Subjects
//!
//! | Subject             | Payload                          |
//! |---------------------|----------------------------------|
//! | `sync.sent`         | a persist call started           |
//! | `sync.queued`       | a snapshot waits behind one      |
//! | `sync.saved`        | canonical blocks + id remapping  |
//! | `sync.failed`       | persist error                    |
//! | `revision.recorded` | revision number assigned         |
//! | `revision.failed`   | revision error (swallowed)       |

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use folio_types::{Block, BlockId, ChangeType, DocumentId, RevisionNumber};

use crate::collab::{PersistError, RevisionError};

// ============================================================================
// Pattern Matching
// ============================================================================

/// Check if a subject matches a pattern.
///
/// ```ignore
/// assert!(matches_pattern("sync.*", "sync.saved"));
/// assert!(matches_pattern("sync.>", "sync.saved"));
/// assert!(!matches_pattern("sync.*", "revision.recorded"));
/// ```
pub fn matches_pattern(pattern: &str, subject: &str) -> bool {
    let pattern_tokens: Vec<&str> = pattern.split('.').collect();
    let subject_tokens: Vec<&str> = subject.split('.').collect();

    let mut pi = 0;
    let mut si = 0;

    while pi < pattern_tokens.len() && si < subject_tokens.len() {
        match pattern_tokens[pi] {
            // `>` is only valid as the last token
            ">" => return pi == pattern_tokens.len() - 1,
            "*" => {
                pi += 1;
                si += 1;
            }
            token => {
                if token != subject_tokens[si] {
                    return false;
                }
                pi += 1;
                si += 1;
            }
        }
    }

    pi == pattern_tokens.len() && si == subject_tokens.len()
}

// ============================================================================
// Flow Message Types
// ============================================================================

/// Payloads that know their subject.
pub trait HasSubject {
    fn subject(&self) -> &str;
}

/// A message published to the flow bus.
#[derive(Clone, Debug)]
pub struct FlowMessage<T> {
    pub subject: String,
    pub payload: T,
    pub timestamp: Instant,
}

impl<T: HasSubject> FlowMessage<T> {
    pub fn new(payload: T) -> Self {
        Self {
            subject: payload.subject().to_string(),
            payload,
            timestamp: Instant::now(),
        }
    }
}

// ============================================================================
// Sync Flow Events
// ============================================================================

/// Persistence and revision events.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncFlow {
    /// A persist call started for a snapshot taken at `version`.
    Sent {
        document_id: DocumentId,
        version: u64,
        block_count: usize,
    },

    /// A snapshot is waiting behind an in-flight write (latest wins).
    Queued { document_id: DocumentId, version: u64 },

    /// A persist call succeeded.
    Saved {
        document_id: DocumentId,
        /// Local version the sent snapshot was taken at.
        version: u64,
        /// The store's canonical, ordered block list.
        canonical: Vec<Block>,
        /// Provisional ids in the sent snapshot and their assigned replacements.
        id_map: Vec<(BlockId, BlockId)>,
    },

    /// A persist call failed. The payload is not retried.
    Failed {
        document_id: DocumentId,
        version: u64,
        error: PersistError,
    },

    /// The revision store assigned a number.
    RevisionRecorded {
        document_id: DocumentId,
        change_type: ChangeType,
        number: RevisionNumber,
    },

    /// A revision request failed. Never blocks saving.
    RevisionFailed {
        document_id: DocumentId,
        change_type: ChangeType,
        error: RevisionError,
    },
}

impl SyncFlow {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sync.sent",
            Self::Queued { .. } => "sync.queued",
            Self::Saved { .. } => "sync.saved",
            Self::Failed { .. } => "sync.failed",
            Self::RevisionRecorded { .. } => "revision.recorded",
            Self::RevisionFailed { .. } => "revision.failed",
        }
    }

    pub fn document_id(&self) -> DocumentId {
        match self {
            Self::Sent { document_id, .. }
            | Self::Queued { document_id, .. }
            | Self::Saved { document_id, .. }
            | Self::Failed { document_id, .. }
            | Self::RevisionRecorded { document_id, .. }
            | Self::RevisionFailed { document_id, .. } => *document_id,
        }
    }

    /// Whether this event settles a persist call (saved or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Saved { .. } | Self::Failed { .. })
    }
}

impl HasSubject for SyncFlow {
    fn subject(&self) -> &str {
        SyncFlow::subject(self)
    }
}

// ============================================================================
// FlowBus
// ============================================================================

/// Type-parameterized pub/sub bus over a broadcast channel.
#[derive(Debug)]
pub struct FlowBus<T: Clone + Send + 'static> {
    tx: broadcast::Sender<FlowMessage<T>>,
    capacity: usize,
}

impl<T: Clone + Send + 'static> FlowBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + Send + HasSubject + 'static> FlowBus<T> {
    /// Publish a payload. Returns the number of receivers; zero is not an error.
    pub fn publish(&self, payload: T) -> usize {
        self.tx.send(FlowMessage::new(payload)).unwrap_or(0)
    }

    /// Subscribe to messages matching a pattern.
    pub fn subscribe(&self, pattern: &str) -> Subscription<T> {
        Subscription {
            pattern: pattern.to_string(),
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone + Send + 'static> Clone for FlowBus<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

/// Shared handle to the sync flow bus.
pub type SharedSyncFlowBus = Arc<FlowBus<SyncFlow>>;

pub fn shared_sync_flow_bus(capacity: usize) -> SharedSyncFlowBus {
    Arc::new(FlowBus::new(capacity))
}

// ============================================================================
// Subscription
// ============================================================================

/// A pattern-filtered subscription to a [`FlowBus`].
pub struct Subscription<T: Clone> {
    pattern: String,
    rx: broadcast::Receiver<FlowMessage<T>>,
}

impl<T: Clone> Subscription<T> {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Next matching message. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<FlowMessage<T>> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => {
                    if matches_pattern(&self.pattern, &msg.subject) {
                        return Some(msg);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "Flow subscription lagged behind"
                    );
                }
            }
        }
    }

    /// Next matching message if one is buffered.
    pub fn try_recv(&mut self) -> Option<FlowMessage<T>> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => {
                    if matches_pattern(&self.pattern, &msg.subject) {
                        return Some(msg);
                    }
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "Flow subscription lagged behind"
                    );
                }
            }
        }
    }
}

impl<T: Clone> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
