//! Editor sessions against the SQLite store.

use std::sync::Arc;
use std::time::Duration;

use folio_editor::{
    Collaborators, EditorConfig, EditorSession, Reconciled, SaveState, SyncEvent, SyncFlow,
};
use folio_store::{DocumentDb, DocumentStore};
use folio_types::{BlockData, BlockType, ChangeType, DocumentMeta, RevisionNumber};

fn config() -> EditorConfig {
    EditorConfig {
        save_debounce_ms: 20,
        preview_debounce_ms: 5,
        attribution: "tester".into(),
        ..EditorConfig::default()
    }
}

fn open(db: &Arc<DocumentDb>, meta: &DocumentMeta) -> EditorSession {
    let (meta, blocks) = db.load_document(meta.id).unwrap();
    EditorSession::open(meta, blocks, &config(), Collaborators::from_store(db.clone())).unwrap()
}

fn new_document(db: &DocumentDb, title: &str) -> DocumentMeta {
    let meta = DocumentMeta::new(title);
    db.create_document(&meta).unwrap();
    db.snapshot(meta.id, ChangeType::Create, "Created", "tester").unwrap();
    meta
}

#[tokio::test]
async fn test_save_now_assigns_ids_and_records_revision() {
    let db = Arc::new(DocumentDb::in_memory().unwrap());
    let meta = new_document(&db, "Release notes");
    let mut session = open(&db, &meta);
    let mut revisions = session.flows().subscribe("revision.*");

    session.add_block(BlockType::Heading, Some(BlockData::heading("v1.2", 1))).unwrap();
    session.add_block(BlockType::Paragraph, Some(BlockData::paragraph("Fixes."))).unwrap();
    session.save_now().unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), session.next_sync_event())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SyncEvent::Saved { reconciled: Reconciled::Replaced, .. }));
    assert_eq!(session.save_state(), &SaveState::Clean);
    assert!(session.blocks().iter().all(|b| !b.id.is_provisional()));

    let (_, stored) = db.load_document(meta.id).unwrap();
    assert_eq!(stored, session.blocks());

    let recorded = tokio::time::timeout(Duration::from_secs(5), revisions.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        recorded.payload,
        SyncFlow::RevisionRecorded { change_type: ChangeType::Edit, number: RevisionNumber(2), .. }
    ));
    let revision = db.get_revision(meta.id, RevisionNumber(2)).unwrap();
    assert_eq!(revision.summary, "Auto-saved changes");
    assert_eq!(revision.attribution, "tester");

    assert_eq!(session.close().await.unwrap(), SaveState::Clean);
}

#[tokio::test]
async fn test_debounced_edits_land_on_close() {
    let db = Arc::new(DocumentDb::in_memory().unwrap());
    let meta = new_document(&db, "Draft");
    let mut session = open(&db, &meta);

    let a = session.add_block(BlockType::Paragraph, Some(BlockData::paragraph("a"))).unwrap();
    let b = session.add_block(BlockType::Paragraph, Some(BlockData::paragraph("b"))).unwrap();
    session.reorder(&b, 0).unwrap();
    session.update_block_data(&a, BlockData::paragraph("a, edited")).unwrap();

    assert_eq!(session.close().await.unwrap(), SaveState::Clean);

    let (_, stored) = db.load_document(meta.id).unwrap();
    let texts: Vec<_> = stored.iter().map(|b| b.data.clone()).collect();
    assert_eq!(texts, vec![BlockData::paragraph("b"), BlockData::paragraph("a, edited")]);
    assert_eq!(stored.iter().map(|b| b.order).collect::<Vec<_>>(), vec![0, 1]);
}

#[tokio::test]
async fn test_restore_then_reopen() {
    let db = Arc::new(DocumentDb::in_memory().unwrap());
    let meta = new_document(&db, "Guide");

    let mut session = open(&db, &meta);
    session.add_block(BlockType::Paragraph, Some(BlockData::paragraph("first draft"))).unwrap();
    session.close().await.unwrap();
    let first = db.snapshot(meta.id, ChangeType::Edit, "checkpoint", "tester").unwrap();

    let mut session = open(&db, &meta);
    let id = session.blocks()[0].id;
    session.update_block_data(&id, BlockData::paragraph("second draft")).unwrap();
    session.add_block(BlockType::Divider, None).unwrap();
    session.close().await.unwrap();

    let restored = db.restore_revision(meta.id, first, "tester").unwrap();
    assert!(restored > first);
    assert_eq!(db.get_revision(meta.id, restored).unwrap().change_type, ChangeType::Restore);

    let session = open(&db, &meta);
    assert_eq!(session.blocks().len(), 1);
    assert_eq!(session.blocks()[0].data, BlockData::paragraph("first draft"));
    assert_eq!(session.blocks()[0].id, id);
    session.close().await.unwrap();
}
