//! Revision snapshot policy.
//!
//! Every successful save asks for an `EDIT` revision; status transitions ask
//! for their own change type. Numbers come from the store. A failed request
//! is logged and published, never propagated: revisions are best-effort and
//! must not hold up saving.

use std::sync::Arc;

use tracing::{debug, warn};

use folio_types::{ChangeType, DocumentId, RevisionNumber};

use crate::collab::RevisionStore;
use crate::flows::{SharedSyncFlowBus, SyncFlow};

/// Requests revision snapshots from a [`RevisionStore`].
#[derive(Clone)]
pub struct RevisionRecorder {
    store: Arc<dyn RevisionStore>,
    flows: SharedSyncFlowBus,
    attribution: String,
    auto_summary: String,
}

impl RevisionRecorder {
    pub fn new(
        store: Arc<dyn RevisionStore>,
        flows: SharedSyncFlowBus,
        attribution: impl Into<String>,
        auto_summary: impl Into<String>,
    ) -> Self {
        Self {
            store,
            flows,
            attribution: attribution.into(),
            auto_summary: auto_summary.into(),
        }
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    /// Snapshot after a successful auto-save.
    pub async fn record_auto_save(&self, document_id: DocumentId) -> Option<RevisionNumber> {
        let summary = self.auto_summary.clone();
        self.record(document_id, ChangeType::Edit, &summary).await
    }

    /// Snapshot for an explicit transition (publish, feature, restore, ...).
    pub async fn record(
        &self,
        document_id: DocumentId,
        change_type: ChangeType,
        summary: &str,
    ) -> Option<RevisionNumber> {
        match self
            .store
            .create_revision(document_id, change_type, summary, &self.attribution)
            .await
        {
            Ok(number) => {
                debug!(document = %document_id, %change_type, %number, "revision recorded");
                self.flows.publish(SyncFlow::RevisionRecorded {
                    document_id,
                    change_type,
                    number,
                });
                Some(number)
            }
            Err(error) => {
                warn!(document = %document_id, %change_type, %error, "revision not recorded");
                self.flows.publish(SyncFlow::RevisionFailed {
                    document_id,
                    change_type,
                    error,
                });
                None
            }
        }
    }
}

impl std::fmt::Debug for RevisionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionRecorder")
            .field("attribution", &self.attribution)
            .field("auto_summary", &self.auto_summary)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::RevisionError;
    use crate::flows::shared_sync_flow_bus;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Log {
        calls: Mutex<Vec<(ChangeType, String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl RevisionStore for Log {
        async fn create_revision(
            &self,
            _document_id: DocumentId,
            change_type: ChangeType,
            summary: &str,
            attribution: &str,
        ) -> Result<RevisionNumber, RevisionError> {
            if self.fail {
                return Err(RevisionError::Unavailable("offline".into()));
            }
            let mut calls = self.calls.lock();
            calls.push((change_type, summary.to_string(), attribution.to_string()));
            Ok(RevisionNumber(calls.len() as u64))
        }
    }

    #[tokio::test]
    async fn test_auto_save_uses_edit_and_configured_summary() {
        let store = Arc::new(Log::default());
        let bus = shared_sync_flow_bus(8);
        let mut sub = bus.subscribe("revision.*");
        let recorder = RevisionRecorder::new(store.clone(), bus, "ada", "Auto-saved changes");

        let doc = DocumentId::new();
        assert_eq!(recorder.record_auto_save(doc).await, Some(RevisionNumber(1)));
        assert_eq!(
            recorder.record(doc, ChangeType::Publish, "Published").await,
            Some(RevisionNumber(2))
        );

        let calls = store.calls.lock().clone();
        assert_eq!(calls[0], (ChangeType::Edit, "Auto-saved changes".into(), "ada".into()));
        assert_eq!(calls[1].0, ChangeType::Publish);

        let msg = sub.try_recv().expect("recorded flow");
        assert_eq!(msg.subject, "revision.recorded");
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_published() {
        let store = Arc::new(Log { fail: true, ..Default::default() });
        let bus = shared_sync_flow_bus(8);
        let mut sub = bus.subscribe("revision.failed");
        let recorder = RevisionRecorder::new(store, bus, "ada", "auto");

        let doc = DocumentId::new();
        assert_eq!(recorder.record_auto_save(doc).await, None);

        let msg = sub.try_recv().expect("failure flow");
        assert_eq!(msg.payload, SyncFlow::RevisionFailed {
            document_id: doc,
            change_type: ChangeType::Edit,
            error: RevisionError::Unavailable("offline".into()),
        });
    }
}
