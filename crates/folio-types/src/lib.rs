//! Shared identity, block and revision types for Folio.
//!
//! This crate is the data foundation: typed IDs, blocks with their tagged
//! payloads, document metadata and revisions. It has **no internal folio
//! dependencies** — a pure leaf crate that the engine and the stores build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Document (DocumentId) ← the unit of persistence and revisioning
//!     └── DocumentMeta (title, status, featured, kind)
//!     └── owns ordered Blocks (order = 0..n-1)
//!     └── accumulates Revisions (RevisionNumber, strictly increasing)
//!
//! Block (BlockId) ← Local(uuid) until the store assigns Assigned(n)
//!     └── data: BlockData, tagged by BlockType
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`DocumentId`]    | Which document                               |
//! | [`SessionId`]     | Which editing session                        |
//! | [`BlockId`]       | Provisional or store-assigned block identity |
//! | [`Block`]         | Positioned, typed unit of content            |
//! | [`BlockType`]     | Closed set of block tags                     |
//! | [`BlockData`]     | Tagged payload union                         |
//! | [`DocumentMeta`]  | Title, status, featured flag, kind           |
//! | [`Revision`]      | Immutable numbered snapshot                  |
//! |-------------------|----------------------------------------------|

pub mod block;
pub mod document;
pub mod ids;
pub mod revision;

// Re-export primary types at crate root for convenience.
pub use block::{
    Alignment, AudioEmbedData, Block, BlockData, BlockDataError, BlockType, CalloutData,
    CalloutVariant, CodeBlockData, CustomData, DividerData, HeadingData, ImageData, ListData,
    ListItem, ListType, ParagraphData, QuoteData, RawBlockData, TableData, VideoEmbedData,
};
pub use document::{ContentKind, DocumentMeta, DocumentStatus};
pub use ids::{BlockId, DocumentId, IdParseError, SessionId};
pub use revision::{ChangeType, Revision, RevisionNumber};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
