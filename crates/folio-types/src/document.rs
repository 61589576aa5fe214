//! Document (content item) metadata.
//!
//! The document is the unit of persistence and revisioning. Its blocks live
//! beside it in the store; this module only describes the metadata that a
//! revision snapshots together with the block list.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::DocumentId;

/// Publication status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum DocumentStatus {
    #[default]
    Draft,
    #[strum(serialize = "published", serialize = "live")]
    Published,
    Archived,
}

impl DocumentStatus {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
            DocumentStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What sort of content item this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ContentKind {
    #[default]
    Article,
    Page,
    News,
    Tutorial,
}

impl ContentKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Page => "page",
            ContentKind::News => "news",
            ContentKind::Tutorial => "tutorial",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata for one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub kind: ContentKind,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis.
    pub updated_at: u64,
}

impl DocumentMeta {
    /// A fresh draft with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let now = crate::now_millis();
        Self {
            id: DocumentId::new(),
            title: title.into(),
            description: String::new(),
            status: DocumentStatus::Draft,
            featured: false,
            kind: ContentKind::Article,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style kind override.
    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Builder-style description override.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_aliases() {
        assert_eq!(DocumentStatus::from_str("LIVE"), Some(DocumentStatus::Published));
        assert_eq!(DocumentStatus::from_str("draft"), Some(DocumentStatus::Draft));
        assert_eq!(DocumentStatus::from_str("deleted"), None);
    }

    #[test]
    fn test_meta_defaults_on_deserialize() {
        let id = DocumentId::new();
        let json = format!(r#"{{"id":"{}","title":"Hi","createdAt":1,"updatedAt":2}}"#, id);
        let meta: DocumentMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta.status, DocumentStatus::Draft);
        assert_eq!(meta.kind, ContentKind::Article);
        assert!(!meta.featured);
    }
}
