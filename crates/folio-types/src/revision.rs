//! Revisions: immutable, numbered snapshots of a document.
//!
//! Revision numbers are assigned by the store, strictly increasing per
//! document. Clients never compute or predict them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::block::Block;
use crate::document::DocumentMeta;
use crate::ids::DocumentId;

/// Store-assigned revision number.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionNumber(pub u64);

impl RevisionNumber {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Why a revision was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ChangeType {
    Create,
    Edit,
    Publish,
    Unpublish,
    Feature,
    Restore,
    Archive,
}

impl ChangeType {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "CREATE",
            ChangeType::Edit => "EDIT",
            ChangeType::Publish => "PUBLISH",
            ChangeType::Unpublish => "UNPUBLISH",
            ChangeType::Feature => "FEATURE",
            ChangeType::Restore => "RESTORE",
            ChangeType::Archive => "ARCHIVE",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable snapshot of a document's metadata and blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub document_id: DocumentId,
    pub number: RevisionNumber,
    pub change_type: ChangeType,
    pub summary: String,
    /// Who made the change (free-form).
    pub attribution: String,
    pub meta: DocumentMeta,
    pub blocks: Vec<Block>,
    /// Unix millis.
    pub created_at: u64,
}
