//! The authoritative ordered block list for one document.
//!
//! # Order invariant
//!
//! Blocks are kept in a `Vec` sorted by position, and `blocks[i].order == i`
//! for every `i` at the end of every public mutator. Mutators may break this
//! transiently (remove, then insert) but always renumber before returning,
//! and assert the invariant in debug builds.
//!
//! # Versions
//!
//! `version` counts local mutations. The sync pipeline echoes the version it
//! sent back in its result, which lets the session tell whether the local
//! state has moved on since that write left (see `EditorSession`).
//! Reconciliation (`replace_all`, `remap_ids`) does not bump it.

use std::collections::HashSet;

use folio_types::{now_millis, Block, BlockData, BlockId, BlockType, DocumentId};
use tracing::trace;

use crate::{EditorError, Result};

/// Ordered blocks of one document.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockCollection {
    /// Document these blocks belong to.
    document_id: DocumentId,
    /// Sorted by order; `blocks[i].order == i`.
    blocks: Vec<Block>,
    /// Local mutation counter.
    version: u64,
}

impl BlockCollection {
    /// Create an empty collection.
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            blocks: Vec::new(),
            version: 0,
        }
    }

    /// Build from a stored block list (validated like [`replace_all`](Self::replace_all)).
    pub fn from_blocks(document_id: DocumentId, blocks: Vec<Block>) -> Result<Self> {
        let mut collection = Self::new(document_id);
        collection.replace_all(blocks)?;
        Ok(collection)
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Local mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Owned copy of the blocks, for handing to the pipeline or preview.
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    /// Block IDs in order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id).collect()
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == *id)
    }

    /// Current position of a block.
    pub fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == *id)
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    /// Append a block of `block_type`.
    ///
    /// Uses the type's default payload when `initial` is `None`. The block
    /// gets a provisional ID; the store assigns the canonical one later.
    /// Fails only if `initial` carries a different type tag.
    pub fn add_block(&mut self, block_type: BlockType, initial: Option<BlockData>) -> Result<&Block> {
        let data = match initial {
            Some(data) if data.block_type() != Some(block_type) => {
                return Err(EditorError::BlockTypeMismatch {
                    block: None,
                    expected: block_type.to_string(),
                    got: data.type_name().to_string(),
                });
            }
            Some(data) => data,
            None => BlockData::default_for(block_type),
        };

        let block = Block::new(self.document_id, self.blocks.len() as u32, data);
        trace!(block = %block.id, %block_type, order = block.order, "add block");
        self.blocks.push(block);
        self.touch("add_block");

        let last = self.blocks.len() - 1;
        Ok(&self.blocks[last])
    }

    /// Replace a block's payload wholesale. Order and type are unchanged.
    pub fn update_block_data(&mut self, id: &BlockId, data: BlockData) -> Result<()> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.id == *id)
            .ok_or(EditorError::StaleReference(*id))?;

        if !block.data.same_type(&data) {
            return Err(EditorError::BlockTypeMismatch {
                block: Some(*id),
                expected: block.type_name().to_string(),
                got: data.type_name().to_string(),
            });
        }

        block.data = data;
        block.updated_at = now_millis();
        self.touch("update_block_data");
        Ok(())
    }

    /// Remove a block and renumber the rest, preserving relative order.
    ///
    /// Deleting the only block is allowed and leaves an empty collection.
    pub fn delete_block(&mut self, id: &BlockId) -> Result<Block> {
        let index = self.index_of(id).ok_or(EditorError::StaleReference(*id))?;
        let removed = self.blocks.remove(index);
        self.renumber();
        self.touch("delete_block");
        Ok(removed)
    }

    /// Move a block to `new_index` (clamped to `[0, n-1]`).
    ///
    /// Intermediate blocks shift by one. Returns `false`, touching nothing,
    /// when the block is already there.
    pub fn reorder(&mut self, id: &BlockId, new_index: usize) -> Result<bool> {
        let from = self.index_of(id).ok_or(EditorError::StaleReference(*id))?;
        let to = new_index.min(self.blocks.len() - 1);
        if from == to {
            return Ok(false);
        }

        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        self.renumber();
        trace!(block = %id, from, to, "reorder");
        self.touch("reorder");
        Ok(true)
    }

    /// Replace every block with a canonical set (reconciliation).
    ///
    /// The incoming set is validated (same document, unique IDs), sorted by
    /// its own `order` values (stable for ties) and renumbered `0..n-1`.
    /// The local version is not bumped.
    pub fn replace_all(&mut self, mut blocks: Vec<Block>) -> Result<()> {
        let mut seen = HashSet::with_capacity(blocks.len());
        for block in &blocks {
            if block.document_id != self.document_id {
                return Err(EditorError::ForeignBlock {
                    block: block.id,
                    document: block.document_id,
                });
            }
            if !seen.insert(block.id) {
                return Err(EditorError::DuplicateBlock(block.id));
            }
        }

        blocks.sort_by_key(|b| b.order);
        for (i, block) in blocks.iter_mut().enumerate() {
            block.order = i as u32;
        }
        self.blocks = blocks;
        self.check_invariant("replace_all");
        Ok(())
    }

    /// Like [`replace_all`](Self::replace_all), but counts as a local edit
    /// that must be persisted (revert, restore).
    pub fn reset_to(&mut self, blocks: Vec<Block>) -> Result<()> {
        self.replace_all(blocks)?;
        self.touch("reset_to");
        Ok(())
    }

    /// Rewrite provisional IDs to their canonical counterparts.
    ///
    /// Used when a save completes but local state has moved on since it was
    /// sent, so a full `replace_all` would discard newer edits. Returns the
    /// number of blocks rewritten.
    pub fn remap_ids(&mut self, map: &[(BlockId, BlockId)]) -> usize {
        let mut rewritten = 0;
        for block in &mut self.blocks {
            if let Some((_, to)) = map.iter().find(|(from, _)| *from == block.id) {
                block.id = *to;
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Checked form of the order invariant, plus ID uniqueness.
    pub fn validate(&self) -> Result<()> {
        for (i, block) in self.blocks.iter().enumerate() {
            if block.order as usize != i {
                return Err(EditorError::InvalidOrderState(format!(
                    "block {} at position {} has order {}",
                    block.id, i, block.order
                )));
            }
        }
        let unique: HashSet<_> = self.blocks.iter().map(|b| b.id).collect();
        if unique.len() != self.blocks.len() {
            return Err(EditorError::InvalidOrderState("duplicate block ids".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Reassign `order = index`, stamping blocks whose position changed.
    fn renumber(&mut self) {
        let now = now_millis();
        for (i, block) in self.blocks.iter_mut().enumerate() {
            let order = i as u32;
            if block.order != order {
                block.order = order;
                block.updated_at = now;
            }
        }
    }

    fn touch(&mut self, op: &'static str) {
        self.version += 1;
        self.check_invariant(op);
    }

    fn check_invariant(&self, op: &'static str) {
        debug_assert!(
            self.blocks.iter().enumerate().all(|(i, b)| b.order as usize == i),
            "order invariant violated after {op}"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
