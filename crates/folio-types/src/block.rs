//! Blocks: positioned, typed units of document content.
//!
//! ## Design: BlockData is the tag
//!
//! A block's type is not stored next to its payload where the two could
//! disagree. [`BlockData`] is a tagged union, and [`Block::block_type`] is
//! derived from it. Every consumer matches exhaustively on the variant.
//!
//! The set of block types evolves independently of readers, so the union also
//! carries an `Unknown` variant that preserves an unrecognised tag and its raw
//! payload verbatim. Stores round-trip it untouched; the preview renders a
//! placeholder for it.
//!
//! ## Wire shape
//!
//! ```json
//! { "id": {"assigned": 12}, "documentId": "…", "order": 0,
//!   "blockType": "HEADING", "data": { "text": "Intro", "level": 2 },
//!   "createdAt": 1712000000000, "updatedAt": 1712000000000 }
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, DocumentId};

/// Closed set of block type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BlockType {
    Paragraph,
    Heading,
    Image,
    CodeBlock,
    Quote,
    List,
    Divider,
    Custom,
    VideoEmbed,
    AudioEmbed,
    Callout,
    Table,
}

impl BlockType {
    /// Every known block type, in palette order.
    pub const ALL: [BlockType; 12] = [
        BlockType::Paragraph,
        BlockType::Heading,
        BlockType::Image,
        BlockType::CodeBlock,
        BlockType::Quote,
        BlockType::List,
        BlockType::Divider,
        BlockType::Custom,
        BlockType::VideoEmbed,
        BlockType::AudioEmbed,
        BlockType::Callout,
        BlockType::Table,
    ];

    /// Parse from string (case-insensitive, `CODE_BLOCK` form).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "PARAGRAPH",
            BlockType::Heading => "HEADING",
            BlockType::Image => "IMAGE",
            BlockType::CodeBlock => "CODE_BLOCK",
            BlockType::Quote => "QUOTE",
            BlockType::List => "LIST",
            BlockType::Divider => "DIVIDER",
            BlockType::Custom => "CUSTOM",
            BlockType::VideoEmbed => "VIDEO_EMBED",
            BlockType::AudioEmbed => "AUDIO_EMBED",
            BlockType::Callout => "CALLOUT",
            BlockType::Table => "TABLE",
        }
    }

    /// Whether the payload carries author-supplied HTML that must be
    /// sanitized before it reaches an HTML sink.
    pub fn carries_html(&self) -> bool {
        matches!(
            self,
            BlockType::Paragraph | BlockType::Heading | BlockType::Custom | BlockType::Quote | BlockType::Callout
        )
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Payloads ────────────────────────────────────────────────────────────────

/// Horizontal placement for media blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphData {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingData {
    pub text: String,
    /// 1..=6
    pub level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl Default for HeadingData {
    fn default() -> Self {
        Self { text: String::new(), level: 2, anchor: None }
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageData {
    pub url: String,
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub alignment: Alignment,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeBlockData {
    pub code: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub show_line_numbers: bool,
}

impl Default for CodeBlockData {
    fn default() -> Self {
        Self {
            code: String::new(),
            language: "plaintext".to_string(),
            filename: None,
            show_line_numbers: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteData {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    #[default]
    Unordered,
    Ordered,
    Checklist,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListItem {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub checked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListData {
    #[serde(rename = "type")]
    pub list_type: ListType,
    pub items: Vec<ListItem>,
}

impl Default for ListData {
    fn default() -> Self {
        Self {
            list_type: ListType::Unordered,
            items: vec![ListItem::default()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DividerData {
    pub style: String,
    pub color: String,
    pub thickness: u32,
    pub width: String,
    pub margin_top: u32,
    pub margin_bottom: u32,
}

impl Default for DividerData {
    fn default() -> Self {
        Self {
            style: "solid".to_string(),
            color: "#e5e7eb".to_string(),
            thickness: 1,
            width: "100%".to_string(),
            margin_top: 24,
            margin_bottom: 24,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomData {
    pub html: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoEmbedData {
    pub url: String,
    pub platform: String,
    pub alignment: Alignment,
    pub width: String,
    pub aspect_ratio: String,
    pub autoplay: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Default for VideoEmbedData {
    fn default() -> Self {
        Self {
            url: String::new(),
            platform: "youtube".to_string(),
            alignment: Alignment::Center,
            width: "100%".to_string(),
            aspect_ratio: "16:9".to_string(),
            autoplay: false,
            caption: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEmbedData {
    pub url: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub alignment: Alignment,
}

impl Default for AudioEmbedData {
    fn default() -> Self {
        Self {
            url: String::new(),
            platform: "spotify".to_string(),
            title: None,
            alignment: Alignment::Center,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutVariant {
    #[default]
    Info,
    Warning,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalloutData {
    pub variant: CalloutVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub has_header_row: bool,
    pub striped: bool,
    pub bordered: bool,
}

impl Default for TableData {
    fn default() -> Self {
        Self {
            headers: vec!["Column 1".to_string(), "Column 2".to_string()],
            rows: vec![vec![String::new(), String::new()]],
            has_header_row: true,
            striped: false,
            bordered: true,
        }
    }
}

// ── BlockData ───────────────────────────────────────────────────────────────

/// Block payload, tagged by block type.
///
/// Serialized as `{"blockType": TAG, "data": {...}}` (see [`RawBlockData`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlockData", into = "RawBlockData")]
pub enum BlockData {
    Paragraph(ParagraphData),
    Heading(HeadingData),
    Image(ImageData),
    CodeBlock(CodeBlockData),
    Quote(QuoteData),
    List(ListData),
    Divider(DividerData),
    Custom(CustomData),
    VideoEmbed(VideoEmbedData),
    AudioEmbed(AudioEmbedData),
    Callout(CalloutData),
    Table(TableData),
    /// A tag this build does not know. Kept verbatim.
    Unknown {
        block_type: String,
        payload: serde_json::Value,
    },
}

impl BlockData {
    /// Default payload for a freshly added block of `block_type`.
    pub fn default_for(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Paragraph => BlockData::Paragraph(ParagraphData::default()),
            BlockType::Heading => BlockData::Heading(HeadingData::default()),
            BlockType::Image => BlockData::Image(ImageData::default()),
            BlockType::CodeBlock => BlockData::CodeBlock(CodeBlockData::default()),
            BlockType::Quote => BlockData::Quote(QuoteData::default()),
            BlockType::List => BlockData::List(ListData::default()),
            BlockType::Divider => BlockData::Divider(DividerData::default()),
            BlockType::Custom => BlockData::Custom(CustomData::default()),
            BlockType::VideoEmbed => BlockData::VideoEmbed(VideoEmbedData::default()),
            BlockType::AudioEmbed => BlockData::AudioEmbed(AudioEmbedData::default()),
            BlockType::Callout => BlockData::Callout(CalloutData::default()),
            BlockType::Table => BlockData::Table(TableData::default()),
        }
    }

    /// Convenience constructor for the most common block.
    pub fn paragraph(text: impl Into<String>) -> Self {
        BlockData::Paragraph(ParagraphData { text: text.into() })
    }

    /// Convenience constructor for a heading.
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        BlockData::Heading(HeadingData { text: text.into(), level, anchor: None })
    }

    /// The type tag, or `None` for an unrecognised payload.
    pub fn block_type(&self) -> Option<BlockType> {
        Some(match self {
            BlockData::Paragraph(_) => BlockType::Paragraph,
            BlockData::Heading(_) => BlockType::Heading,
            BlockData::Image(_) => BlockType::Image,
            BlockData::CodeBlock(_) => BlockType::CodeBlock,
            BlockData::Quote(_) => BlockType::Quote,
            BlockData::List(_) => BlockType::List,
            BlockData::Divider(_) => BlockType::Divider,
            BlockData::Custom(_) => BlockType::Custom,
            BlockData::VideoEmbed(_) => BlockType::VideoEmbed,
            BlockData::AudioEmbed(_) => BlockType::AudioEmbed,
            BlockData::Callout(_) => BlockType::Callout,
            BlockData::Table(_) => BlockType::Table,
            BlockData::Unknown { .. } => return None,
        })
    }

    /// The wire tag, including unrecognised ones.
    pub fn type_name(&self) -> &str {
        match self {
            BlockData::Unknown { block_type, .. } => block_type,
            known => known.block_type().map(|t| t.as_str()).unwrap_or_default(),
        }
    }

    /// Whether `other` carries the same type tag.
    pub fn same_type(&self, other: &BlockData) -> bool {
        self.type_name() == other.type_name()
    }
}

/// Wire representation of [`BlockData`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawBlockData {
    #[serde(rename = "blockType")]
    pub block_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A known type tag whose payload does not have the expected shape.
#[derive(Debug, thiserror::Error)]
#[error("malformed {block_type} payload: {source}")]
pub struct BlockDataError {
    pub block_type: BlockType,
    #[source]
    pub source: serde_json::Error,
}

impl TryFrom<RawBlockData> for BlockData {
    type Error = BlockDataError;

    fn try_from(raw: RawBlockData) -> Result<Self, Self::Error> {
        let Some(block_type) = BlockType::from_str(&raw.block_type) else {
            return Ok(BlockData::Unknown {
                block_type: raw.block_type,
                payload: raw.data,
            });
        };

        // A missing payload means "all defaults".
        let data = match raw.data {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };

        fn parse<T: serde::de::DeserializeOwned>(
            block_type: BlockType,
            data: serde_json::Value,
        ) -> Result<T, BlockDataError> {
            serde_json::from_value(data).map_err(|source| BlockDataError { block_type, source })
        }

        Ok(match block_type {
            BlockType::Paragraph => BlockData::Paragraph(parse(block_type, data)?),
            BlockType::Heading => BlockData::Heading(parse(block_type, data)?),
            BlockType::Image => BlockData::Image(parse(block_type, data)?),
            BlockType::CodeBlock => BlockData::CodeBlock(parse(block_type, data)?),
            BlockType::Quote => BlockData::Quote(parse(block_type, data)?),
            BlockType::List => BlockData::List(parse(block_type, data)?),
            BlockType::Divider => BlockData::Divider(parse(block_type, data)?),
            BlockType::Custom => BlockData::Custom(parse(block_type, data)?),
            BlockType::VideoEmbed => BlockData::VideoEmbed(parse(block_type, data)?),
            BlockType::AudioEmbed => BlockData::AudioEmbed(parse(block_type, data)?),
            BlockType::Callout => BlockData::Callout(parse(block_type, data)?),
            BlockType::Table => BlockData::Table(parse(block_type, data)?),
        })
    }
}

impl From<BlockData> for RawBlockData {
    fn from(data: BlockData) -> Self {
        fn value<T: Serialize>(payload: &T) -> serde_json::Value {
            serde_json::to_value(payload).unwrap_or_default()
        }

        let block_type = data.type_name().to_string();
        let data = match &data {
            BlockData::Paragraph(p) => value(p),
            BlockData::Heading(p) => value(p),
            BlockData::Image(p) => value(p),
            BlockData::CodeBlock(p) => value(p),
            BlockData::Quote(p) => value(p),
            BlockData::List(p) => value(p),
            BlockData::Divider(p) => value(p),
            BlockData::Custom(p) => value(p),
            BlockData::VideoEmbed(p) => value(p),
            BlockData::AudioEmbed(p) => value(p),
            BlockData::Callout(p) => value(p),
            BlockData::Table(p) => value(p),
            BlockData::Unknown { payload, .. } => payload.clone(),
        };
        RawBlockData { block_type, data }
    }
}

// ── Block ───────────────────────────────────────────────────────────────────

/// A positioned, typed unit of document content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    /// Owning document (back-reference only).
    pub document_id: DocumentId,
    /// Zero-based position; contiguous within a document.
    pub order: u32,
    #[serde(flatten)]
    pub data: BlockData,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis; bumped on every successful mutation.
    pub updated_at: u64,
}

impl Block {
    /// Create a block with a fresh provisional ID.
    pub fn new(document_id: DocumentId, order: u32, data: BlockData) -> Self {
        let now = crate::now_millis();
        Self {
            id: BlockId::provisional(),
            document_id,
            order,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// The type tag, or `None` for an unrecognised payload.
    pub fn block_type(&self) -> Option<BlockType> {
        self.data.block_type()
    }

    /// The wire tag, including unrecognised ones.
    pub fn type_name(&self) -> &str {
        self.data.type_name()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_type_parse_aliases() {
        assert_eq!(BlockType::from_str("CODE_BLOCK"), Some(BlockType::CodeBlock));
        assert_eq!(BlockType::from_str("code_block"), Some(BlockType::CodeBlock));
        assert_eq!(BlockType::from_str("video_embed"), Some(BlockType::VideoEmbed));
        assert_eq!(BlockType::from_str("carousel"), None);
    }

    #[test]
    fn test_block_type_str_matches_serde() {
        for t in BlockType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(BlockType::from_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_default_payload_matches_type() {
        for t in BlockType::ALL {
            assert_eq!(BlockData::default_for(t).block_type(), Some(t));
        }
    }

    #[test]
    fn test_heading_wire_shape() {
        let data = BlockData::heading("Intro", 3);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["blockType"], "HEADING");
        assert_eq!(json["data"]["text"], "Intro");
        assert_eq!(json["data"]["level"], 3);
        assert!(json["data"].get("anchor").is_none());
    }

    #[test]
    fn test_missing_payload_uses_defaults() {
        let data: BlockData = serde_json::from_str(r#"{"blockType":"CODE_BLOCK"}"#).unwrap();
        match data {
            BlockData::CodeBlock(code) => {
                assert_eq!(code.language, "plaintext");
                assert!(code.show_line_numbers);
            }
            other => panic!("expected code block, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let json = r#"{"blockType":"CAROUSEL","data":{"slides":[1,2,3]}}"#;
        let data: BlockData = serde_json::from_str(json).unwrap();
        assert_eq!(data.block_type(), None);
        assert_eq!(data.type_name(), "CAROUSEL");

        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["blockType"], "CAROUSEL");
        assert_eq!(back["data"]["slides"][2], 3);
    }

    #[test]
    fn test_malformed_known_payload_is_rejected() {
        let json = r#"{"blockType":"HEADING","data":{"level":"huge"}}"#;
        let err = serde_json::from_str::<BlockData>(json).unwrap_err();
        assert!(err.to_string().contains("HEADING"));
    }

    #[test]
    fn test_block_flattens_payload() {
        let doc = DocumentId::new();
        let block = Block::new(doc, 0, BlockData::paragraph("hello"));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["blockType"], "PARAGRAPH");
        assert_eq!(json["data"]["text"], "hello");
        assert_eq!(json["order"], 0);
        assert!(json.get("documentId").is_some());

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_list_type_field_name() {
        let data = BlockData::default_for(BlockType::List);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["data"]["type"], "unordered");
        assert_eq!(json["data"]["items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_same_type() {
        let a = BlockData::paragraph("a");
        let b = BlockData::paragraph("b");
        let h = BlockData::heading("h", 1);
        assert!(a.same_type(&b));
        assert!(!a.same_type(&h));
    }
}
