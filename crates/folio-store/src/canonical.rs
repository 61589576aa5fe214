//! Shared write planning for both backends.
//!
//! A persisted block list is the full list: validated against the stored
//! ids, sorted by `order` and renumbered `0..n-1`. Provisional ids are left
//! for the backend to assign.

use std::collections::HashSet;

use folio_types::{Block, BlockId, DocumentId};

use crate::error::{StoreError, StoreResult};

/// Validate and normalise an incoming block list.
///
/// `stored` holds the assigned ids currently stored for the document. An
/// assigned id outside that set was deleted or never existed; the write is
/// rejected rather than resurrecting it.
pub(crate) fn plan_write(
    document_id: DocumentId,
    incoming: &[Block],
    stored: &HashSet<u64>,
) -> StoreResult<Vec<Block>> {
    let mut seen = HashSet::with_capacity(incoming.len());
    for block in incoming {
        if block.document_id != document_id {
            return Err(StoreError::ForeignBlock {
                block: block.id,
                expected: document_id,
                found: block.document_id,
            });
        }
        if !seen.insert(block.id) {
            return Err(StoreError::DuplicateBlock(block.id));
        }
        if let BlockId::Assigned(n) = block.id {
            if !stored.contains(&n) {
                return Err(StoreError::UnknownBlock(block.id));
            }
        }
    }

    let mut blocks = incoming.to_vec();
    blocks.sort_by_key(|b| b.order);
    for (i, block) in blocks.iter_mut().enumerate() {
        block.order = i as u32;
    }
    Ok(blocks)
}

/// Stored ids that the written list no longer mentions.
pub(crate) fn removed_ids(stored: &HashSet<u64>, written: &[Block]) -> Vec<u64> {
    let kept: HashSet<u64> = written.iter().filter_map(|b| b.id.assigned()).collect();
    let mut removed: Vec<u64> = stored.difference(&kept).copied().collect();
    removed.sort_unstable();
    removed
}

pub(crate) fn restore_summary(number: folio_types::RevisionNumber) -> String {
    format!("Restored from {number}")
}
