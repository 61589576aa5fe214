//! Typed identifiers for documents, sessions and blocks.
//!
//! Document and session IDs wrap UUIDv7 (time-ordered, globally unique) and
//! display as standard UUID text for logging. The `short()` form (first 8 hex
//! chars) is for human-facing UI, never used as a lookup key.
//!
//! Block IDs are different: a block is born with a client-generated
//! provisional ID and only receives its canonical ID when the store accepts
//! it. [`BlockId`] makes that distinction part of the type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A document identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

/// An editing-session identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters — for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// Check if a query string matches this ID by hex prefix.
            pub fn matches_hex_prefix(&self, prefix: &str) -> bool {
                self.to_hex().starts_with(prefix)
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(DocumentId, "DocumentId");
impl_typed_id!(SessionId, "SessionId");

// ── BlockId ─────────────────────────────────────────────────────────────────

/// Block identity, unique within one document.
///
/// - `Local`: provisional ID generated by the client when the block is added.
///   Never leaves the client as a lookup key on the server side; the store
///   replaces it on the first successful persist.
/// - `Assigned`: canonical ID handed out by the store.
///
/// Text form: `tmp-{uuid hex}` for local IDs, the bare decimal for assigned ones.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockId {
    Local(uuid::Uuid),
    Assigned(u64),
}

impl BlockId {
    /// A fresh provisional ID.
    pub fn provisional() -> Self {
        BlockId::Local(uuid::Uuid::now_v7())
    }

    /// Whether the store has yet to assign a canonical ID.
    pub fn is_provisional(&self) -> bool {
        matches!(self, BlockId::Local(_))
    }

    /// The canonical numeric ID, if assigned.
    pub fn assigned(&self) -> Option<u64> {
        match self {
            BlockId::Assigned(n) => Some(*n),
            BlockId::Local(_) => None,
        }
    }

    /// Compact key used in storage and on the command line.
    pub fn to_key(&self) -> String {
        match self {
            BlockId::Local(u) => format!("tmp-{}", u.as_simple()),
            BlockId::Assigned(n) => n.to_string(),
        }
    }

    /// Parse the form produced by [`BlockId::to_key`].
    pub fn from_key(key: &str) -> Result<Self, IdParseError> {
        if let Some(hex) = key.strip_prefix("tmp-") {
            return uuid::Uuid::parse_str(hex)
                .map(BlockId::Local)
                .map_err(|_| IdParseError(key.to_string()));
        }
        key.parse::<u64>()
            .map(BlockId::Assigned)
            .map_err(|_| IdParseError(key.to_string()))
    }
}

impl FromStr for BlockId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Local(u) => write!(f, "tmp-{}", &u.as_simple().to_string()[..8]),
            BlockId::Assigned(n) => write!(f, "#{}", n),
        }
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self)
    }
}

/// A block key that is neither `tmp-{uuid}` nor a decimal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block id '{0}'")]
pub struct IdParseError(pub String);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids_are_unique() {
        assert_ne!(DocumentId::new(), DocumentId::new());
    }

    #[test]
    fn test_document_id_parse_roundtrip() {
        let id = DocumentId::new();
        assert_eq!(DocumentId::parse(&id.to_string()).unwrap(), id);
        assert_eq!(DocumentId::parse(&id.to_hex()).unwrap(), id);
        assert!(id.matches_hex_prefix(&id.short()));
    }

    #[test]
    fn test_provisional_block_key() {
        let id = BlockId::provisional();
        assert!(id.is_provisional());
        assert_eq!(id.assigned(), None);
        let key = id.to_key();
        assert!(key.starts_with("tmp-"));
        assert_eq!(BlockId::from_key(&key).unwrap(), id);
    }

    #[test]
    fn test_assigned_block_key() {
        let id = BlockId::Assigned(42);
        assert!(!id.is_provisional());
        assert_eq!(id.to_key(), "42");
        assert_eq!("42".parse::<BlockId>().unwrap(), id);
        assert_eq!(id.to_string(), "#42");
    }

    #[test]
    fn test_block_key_rejects_garbage() {
        assert!(BlockId::from_key("tmp-nope").is_err());
        assert!(BlockId::from_key("-3").is_err());
        assert!(BlockId::from_key("").is_err());
    }

    #[test]
    fn test_block_id_serde_shape() {
        let json = serde_json::to_string(&BlockId::Assigned(7)).unwrap();
        assert_eq!(json, r#"{"assigned":7}"#);
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BlockId::Assigned(7));
    }
}
