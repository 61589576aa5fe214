//! Plain-text editing for blocks on the command line.
//!
//! Each block type maps a single text argument onto the field an author
//! would type into. [`TextEditor`] wraps that as a [`BlockEditor`] so edits
//! go through the session's editor registry.

use std::sync::Arc;

use folio_editor::{BlockEditor, EditorRegistry};
use folio_types::{BlockData, BlockType, ListItem};

/// Apply `text` to the payload's main text field. `None` for types with no
/// text field (dividers) and for unknown payloads.
pub fn apply_text(data: &BlockData, text: &str) -> Option<BlockData> {
    let mut data = data.clone();
    match &mut data {
        BlockData::Paragraph(p) => p.text = text.to_string(),
        BlockData::Heading(h) => h.text = text.to_string(),
        BlockData::Quote(q) => q.text = text.to_string(),
        BlockData::Callout(c) => c.text = text.to_string(),
        BlockData::CodeBlock(c) => c.code = text.to_string(),
        BlockData::Custom(c) => c.html = text.to_string(),
        BlockData::Image(i) => i.url = text.to_string(),
        BlockData::VideoEmbed(v) => v.url = text.to_string(),
        BlockData::AudioEmbed(a) => a.url = text.to_string(),
        BlockData::List(l) => {
            l.items = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| ListItem { text: line.trim().to_string(), checked: false })
                .collect();
        }
        // One row per line, cells split on `|`.
        BlockData::Table(t) => {
            t.rows = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.split('|').map(|cell| cell.trim().to_string()).collect())
                .collect();
        }
        BlockData::Divider(_) | BlockData::Unknown { .. } => return None,
    }
    Some(data)
}

/// Commits a fixed piece of text into whatever block it is opened on.
pub struct TextEditor {
    block_type: BlockType,
    text: String,
}

impl BlockEditor for TextEditor {
    fn block_type(&self) -> BlockType {
        self.block_type
    }

    fn commit(&self, current: &BlockData) -> Option<BlockData> {
        apply_text(current, &self.text)
    }
}

/// A registry with a [`TextEditor`] for every block type.
pub fn text_editors(text: &str) -> EditorRegistry {
    let mut registry = EditorRegistry::new();
    for block_type in BlockType::ALL {
        registry.register(Arc::new(TextEditor {
            block_type,
            text: text.to_string(),
        }));
    }
    registry
}

/// One-line summary for listings.
pub fn summary(data: &BlockData) -> String {
    let text = match data {
        BlockData::Paragraph(p) => p.text.clone(),
        BlockData::Heading(h) => format!("h{} {}", h.level, h.text),
        BlockData::Quote(q) => q.text.clone(),
        BlockData::Callout(c) => c.text.clone(),
        BlockData::CodeBlock(c) => format!("[{}] {}", c.language, c.code),
        BlockData::Custom(c) => c.html.clone(),
        BlockData::Image(i) => i.url.clone(),
        BlockData::VideoEmbed(v) => v.url.clone(),
        BlockData::AudioEmbed(a) => a.url.clone(),
        BlockData::List(l) => l.items.iter().map(|i| i.text.as_str()).collect::<Vec<_>>().join(" / "),
        BlockData::Table(t) => format!("{} rows", t.rows.len()),
        BlockData::Divider(d) => d.style.clone(),
        BlockData::Unknown { .. } => String::new(),
    };
    truncate(&text.replace('\n', " "), 60)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_text_by_type() {
        let code = apply_text(&BlockData::default_for(BlockType::CodeBlock), "fn main() {}").unwrap();
        assert!(matches!(code, BlockData::CodeBlock(ref c) if c.code == "fn main() {}"));

        let list = apply_text(&BlockData::default_for(BlockType::List), "one\n\n two \n").unwrap();
        let BlockData::List(list) = list else { panic!("expected a list") };
        assert_eq!(list.items.iter().map(|i| i.text.as_str()).collect::<Vec<_>>(), vec!["one", "two"]);

        let table = apply_text(&BlockData::default_for(BlockType::Table), "a | b\nc|d").unwrap();
        let BlockData::Table(table) = table else { panic!("expected a table") };
        assert_eq!(table.rows, vec![vec!["a", "b"], vec!["c", "d"]]);

        assert!(apply_text(&BlockData::default_for(BlockType::Divider), "x").is_none());
    }

    #[test]
    fn test_registry_covers_every_type() {
        let registry = text_editors("hello");
        assert_eq!(registry.len(), BlockType::ALL.len());
        let editor = registry.editor_for(&BlockData::paragraph("old")).unwrap();
        assert_eq!(editor.commit(&BlockData::paragraph("old")), Some(BlockData::paragraph("hello")));
    }

    #[test]
    fn test_summary_truncates() {
        let long = "x".repeat(100);
        let s = summary(&BlockData::paragraph(long));
        assert_eq!(s.chars().count(), 60);
        assert!(s.ends_with('…'));
        assert_eq!(summary(&BlockData::heading("Intro", 2)), "h2 Intro");
    }
}
