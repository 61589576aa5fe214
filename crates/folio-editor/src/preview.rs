//! Live preview projection.
//!
//! [`project`] turns a block list into a [`PreviewFrame`]: ordered,
//! render-ready entries with author HTML already sanitized. It is pure.
//! [`PreviewProjector`] debounces projection independently of saving and
//! publishes frames on a `watch` channel, so a slow renderer only ever sees
//! the newest frame.
//!
//! Field naming in [`RenderBody`]: anything called `html` is sanitized HTML
//! ready for injection; every other string is plain text the renderer must
//! escape (as [`PreviewFrame::to_html`] does).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use folio_types::{
    now_millis, Alignment, Block, BlockData, BlockId, CalloutVariant, DividerData, DocumentId,
    DocumentMeta, DocumentStatus, ListType,
};

use crate::debounce::Debouncer;
use crate::sanitize::{escape_html, HtmlSanitizer};

// ============================================================================
// Frame types
// ============================================================================

/// One fully projected preview.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewFrame {
    pub document_id: DocumentId,
    pub title: String,
    pub status: DocumentStatus,
    pub featured: bool,
    pub blocks: Vec<RenderableBlock>,
    /// Input changed since this frame was projected (auto-refresh off).
    pub stale: bool,
    pub generated_at: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderableBlock {
    pub id: BlockId,
    pub order: u32,
    pub type_name: String,
    pub body: RenderBody,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedKind {
    Video,
    Audio,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderBody {
    Html(String),
    Heading {
        level: u8,
        html: String,
        anchor: Option<String>,
    },
    Quote {
        html: String,
        citation: Option<String>,
    },
    Code {
        language: String,
        code: String,
        filename: Option<String>,
        line_numbers: bool,
    },
    Image {
        url: String,
        alt: String,
        caption: Option<String>,
        alignment: Alignment,
    },
    List {
        list_type: ListType,
        items: Vec<(String, bool)>,
    },
    Table {
        headers: Option<Vec<String>>,
        rows: Vec<Vec<String>>,
        striped: bool,
        bordered: bool,
    },
    Divider(DividerData),
    Embed {
        kind: EmbedKind,
        url: String,
        platform: String,
        title: Option<String>,
        alignment: Alignment,
    },
    Callout {
        variant: CalloutVariant,
        title: Option<String>,
        html: String,
    },
    /// A block type this build cannot render.
    Placeholder { block_type: String },
}

// ============================================================================
// Projection
// ============================================================================

/// Project `blocks` into a frame. Input order is irrelevant; output follows
/// each block's `order`.
pub fn project(blocks: &[Block], meta: &DocumentMeta, sanitizer: &dyn HtmlSanitizer) -> PreviewFrame {
    let mut sorted: Vec<&Block> = blocks.iter().collect();
    sorted.sort_by_key(|b| b.order);

    PreviewFrame {
        document_id: meta.id,
        title: meta.title.clone(),
        status: meta.status,
        featured: meta.featured,
        blocks: sorted
            .into_iter()
            .map(|b| RenderableBlock {
                id: b.id,
                order: b.order,
                type_name: b.type_name().to_string(),
                body: render_body(&b.data, sanitizer),
            })
            .collect(),
        stale: false,
        generated_at: now_millis(),
    }
}

fn render_body(data: &BlockData, sanitizer: &dyn HtmlSanitizer) -> RenderBody {
    match data {
        BlockData::Paragraph(p) => RenderBody::Html(sanitizer.sanitize(&p.text)),
        BlockData::Custom(c) => RenderBody::Html(sanitizer.sanitize(&c.html)),
        BlockData::Heading(h) => RenderBody::Heading {
            level: h.level.clamp(1, 6),
            html: sanitizer.sanitize(&h.text),
            anchor: h.anchor.clone(),
        },
        BlockData::Quote(q) => RenderBody::Quote {
            html: sanitizer.sanitize(&q.text),
            citation: q.citation.clone(),
        },
        BlockData::Callout(c) => RenderBody::Callout {
            variant: c.variant,
            title: c.title.clone(),
            html: sanitizer.sanitize(&c.text),
        },
        BlockData::CodeBlock(c) => RenderBody::Code {
            language: c.language.clone(),
            code: c.code.clone(),
            filename: c.filename.clone(),
            line_numbers: c.show_line_numbers,
        },
        BlockData::Image(i) => RenderBody::Image {
            url: i.url.clone(),
            alt: i.alt.clone(),
            caption: i.caption.clone(),
            alignment: i.alignment,
        },
        BlockData::List(l) => RenderBody::List {
            list_type: l.list_type,
            items: l.items.iter().map(|i| (i.text.clone(), i.checked)).collect(),
        },
        BlockData::Table(t) => RenderBody::Table {
            headers: t.has_header_row.then(|| t.headers.clone()),
            rows: t.rows.clone(),
            striped: t.striped,
            bordered: t.bordered,
        },
        BlockData::Divider(d) => RenderBody::Divider(d.clone()),
        BlockData::VideoEmbed(v) => RenderBody::Embed {
            kind: EmbedKind::Video,
            url: v.url.clone(),
            platform: v.platform.clone(),
            title: v.caption.clone(),
            alignment: v.alignment,
        },
        BlockData::AudioEmbed(a) => RenderBody::Embed {
            kind: EmbedKind::Audio,
            url: a.url.clone(),
            platform: a.platform.clone(),
            title: a.title.clone(),
            alignment: a.alignment,
        },
        BlockData::Unknown { block_type, .. } => RenderBody::Placeholder {
            block_type: block_type.clone(),
        },
    }
}

impl PreviewFrame {
    /// An empty frame for a document with no projected content yet.
    pub fn empty(meta: &DocumentMeta) -> Self {
        Self {
            document_id: meta.id,
            title: meta.title.clone(),
            status: meta.status,
            featured: meta.featured,
            blocks: Vec::new(),
            stale: false,
            generated_at: now_millis(),
        }
    }

    /// Minimal HTML rendering of the frame.
    pub fn to_html(&self) -> String {
        let mut out = format!("<article>\n<h1>{}</h1>\n", escape_html(&self.title));
        for block in &self.blocks {
            out.push_str(&block.body.to_html());
            out.push('\n');
        }
        out.push_str("</article>\n");
        out
    }
}

impl RenderBody {
    pub fn to_html(&self) -> String {
        match self {
            RenderBody::Html(html) => format!("<div>{html}</div>"),
            RenderBody::Heading { level, html, anchor } => match anchor {
                Some(a) => format!("<h{level} id=\"{}\">{html}</h{level}>", escape_html(a)),
                None => format!("<h{level}>{html}</h{level}>"),
            },
            RenderBody::Quote { html, citation } => {
                let cite = citation
                    .as_deref()
                    .map(|c| format!("<cite>{}</cite>", escape_html(c)))
                    .unwrap_or_default();
                format!("<blockquote>{html}{cite}</blockquote>")
            }
            RenderBody::Code { language, code, .. } => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_html(language),
                escape_html(code)
            ),
            RenderBody::Image { url, alt, caption, .. } => {
                let img = format!("<img src=\"{}\" alt=\"{}\">", escape_html(url), escape_html(alt));
                match caption {
                    Some(c) => format!("<figure>{img}<figcaption>{}</figcaption></figure>", escape_html(c)),
                    None => format!("<figure>{img}</figure>"),
                }
            }
            RenderBody::List { list_type, items } => {
                let tag = if *list_type == ListType::Ordered { "ol" } else { "ul" };
                let lis: String = items
                    .iter()
                    .map(|(text, checked)| match list_type {
                        ListType::Checklist => format!(
                            "<li><input type=\"checkbox\" disabled{}> {}</li>",
                            if *checked { " checked" } else { "" },
                            escape_html(text)
                        ),
                        _ => format!("<li>{}</li>", escape_html(text)),
                    })
                    .collect();
                format!("<{tag}>{lis}</{tag}>")
            }
            RenderBody::Table { headers, rows, .. } => {
                let mut html = String::from("<table>");
                if let Some(headers) = headers {
                    html.push_str("<thead><tr>");
                    for h in headers {
                        html.push_str(&format!("<th>{}</th>", escape_html(h)));
                    }
                    html.push_str("</tr></thead>");
                }
                html.push_str("<tbody>");
                for row in rows {
                    html.push_str("<tr>");
                    for cell in row {
                        html.push_str(&format!("<td>{}</td>", escape_html(cell)));
                    }
                    html.push_str("</tr>");
                }
                html.push_str("</tbody></table>");
                html
            }
            RenderBody::Divider(d) => format!(
                "<hr style=\"border-style:{};border-color:{};border-width:{}px;width:{}\">",
                escape_html(&d.style),
                escape_html(&d.color),
                d.thickness,
                escape_html(&d.width)
            ),
            RenderBody::Embed { kind, url, platform, .. } => {
                let class = match kind {
                    EmbedKind::Video => "video",
                    EmbedKind::Audio => "audio",
                };
                format!(
                    "<div class=\"embed {class} {}\" data-src=\"{}\"></div>",
                    escape_html(platform),
                    escape_html(url)
                )
            }
            RenderBody::Callout { variant, title, html } => {
                let variant = match variant {
                    CalloutVariant::Info => "info",
                    CalloutVariant::Warning => "warning",
                    CalloutVariant::Success => "success",
                    CalloutVariant::Error => "error",
                };
                let title = title
                    .as_deref()
                    .map(|t| format!("<strong>{}</strong>", escape_html(t)))
                    .unwrap_or_default();
                format!("<aside class=\"callout {variant}\">{title}{html}</aside>")
            }
            RenderBody::Placeholder { block_type } => format!(
                "<div class=\"unsupported\">Unsupported block: {}</div>",
                escape_html(block_type)
            ),
        }
    }
}

// ============================================================================
// PreviewProjector
// ============================================================================

struct ProjectorState {
    auto_refresh: bool,
    pending: Option<(Vec<Block>, DocumentMeta)>,
    timers: Debouncer<DocumentId>,
}

/// Debounced preview publisher.
pub struct PreviewProjector {
    document_id: DocumentId,
    sanitizer: Arc<dyn HtmlSanitizer>,
    tx: Arc<watch::Sender<PreviewFrame>>,
    state: Arc<Mutex<ProjectorState>>,
}

impl PreviewProjector {
    /// Projects `blocks` immediately to seed the channel. Timers need a tokio
    /// runtime.
    pub fn new(
        blocks: &[Block],
        meta: &DocumentMeta,
        sanitizer: Arc<dyn HtmlSanitizer>,
        delay: Duration,
        auto_refresh: bool,
    ) -> Self {
        let (tx, _) = watch::channel(project(blocks, meta, sanitizer.as_ref()));
        Self {
            document_id: meta.id,
            sanitizer,
            tx: Arc::new(tx),
            state: Arc::new(Mutex::new(ProjectorState {
                auto_refresh,
                pending: None,
                timers: Debouncer::new(delay),
            })),
        }
    }

    /// Queue a projection of new input. With auto-refresh on it publishes
    /// after the debounce; otherwise the current frame is marked stale.
    pub fn schedule(&self, blocks: Vec<Block>, meta: DocumentMeta) {
        let mut state = self.state.lock();
        state.pending = Some((blocks, meta));
        if state.auto_refresh {
            self.start_timer(&mut state);
        } else {
            self.tx.send_if_modified(|frame| !std::mem::replace(&mut frame.stale, true));
        }
    }

    /// Project whatever is pending right now, cancelling the timer.
    pub fn refresh(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.timers.cancel(&self.document_id);
            state.pending.take()
        };
        match pending {
            Some((blocks, meta)) => {
                let frame = project(&blocks, &meta, self.sanitizer.as_ref());
                trace!(document = %self.document_id, blocks = frame.blocks.len(), "preview refreshed");
                self.tx.send_replace(frame);
            }
            None => {
                self.tx.send_if_modified(|frame| std::mem::replace(&mut frame.stale, false));
            }
        }
    }

    /// Turning auto-refresh back on schedules any held input.
    pub fn set_auto_refresh(&self, on: bool) {
        let mut state = self.state.lock();
        if state.auto_refresh == on {
            return;
        }
        state.auto_refresh = on;
        if on {
            if state.pending.is_some() {
                self.start_timer(&mut state);
            }
        } else {
            state.timers.cancel(&self.document_id);
            if state.pending.is_some() {
                self.tx.send_if_modified(|frame| !std::mem::replace(&mut frame.stale, true));
            }
        }
    }

    pub fn auto_refresh(&self) -> bool {
        self.state.lock().auto_refresh
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewFrame> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> PreviewFrame {
        self.tx.borrow().clone()
    }

    fn start_timer(&self, state: &mut ProjectorState) {
        let shared = Arc::downgrade(&self.state);
        let tx = self.tx.clone();
        let sanitizer = self.sanitizer.clone();
        let document_id = self.document_id;
        state.timers.schedule(document_id, move |generation| {
            let Some(shared) = shared.upgrade() else { return };
            let pending = {
                let mut state = shared.lock();
                if !state.timers.complete(&document_id, generation) {
                    return;
                }
                state.pending.take()
            };
            if let Some((blocks, meta)) = pending {
                let frame = project(&blocks, &meta, sanitizer.as_ref());
                trace!(document = %document_id, blocks = frame.blocks.len(), "preview published");
                tx.send_replace(frame);
            }
        });
    }
}

impl Drop for PreviewProjector {
    fn drop(&mut self) {
        self.state.lock().timers.cancel_all();
    }
}

impl std::fmt::Debug for PreviewProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewProjector")
            .field("document_id", &self.document_id)
            .field("auto_refresh", &self.auto_refresh())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::BasicSanitizer;
    use folio_types::{BlockType, CodeBlockData, HeadingData, TableData};

    const DELAY: Duration = Duration::from_millis(150);

    fn doc() -> (DocumentMeta, Vec<Block>) {
        let meta = DocumentMeta::new("Hello");
        let id = meta.id;
        let blocks = vec![
            Block::new(id, 1, BlockData::paragraph("<p>second<script>x()</script></p>")),
            Block::new(id, 0, BlockData::heading("First", 1)),
        ];
        (meta, blocks)
    }

    #[test]
    fn test_project_orders_and_sanitizes() {
        let (meta, blocks) = doc();
        let frame = project(&blocks, &meta, &BasicSanitizer);

        assert_eq!(frame.title, "Hello");
        assert_eq!(frame.blocks.len(), 2);
        assert_eq!(frame.blocks[0].type_name, "HEADING");
        assert_eq!(frame.blocks[1].body, RenderBody::Html("<p>second</p>".to_string()));
        assert!(!frame.to_html().contains("script"));
    }

    #[test]
    fn test_project_unknown_becomes_placeholder() {
        let meta = DocumentMeta::new("t");
        let block = Block::new(meta.id, 0, BlockData::Unknown {
            block_type: "CAROUSEL".into(),
            payload: serde_json::json!({"slides": 3}),
        });
        let frame = project(&[block], &meta, &BasicSanitizer);
        assert_eq!(frame.blocks[0].body, RenderBody::Placeholder { block_type: "CAROUSEL".into() });
    }

    #[test]
    fn test_plain_text_fields_are_escaped_in_html() {
        let meta = DocumentMeta::new("t");
        let blocks = vec![
            Block::new(meta.id, 0, BlockData::CodeBlock(CodeBlockData {
                code: "<b>&</b>".into(),
                ..Default::default()
            })),
            Block::new(meta.id, 1, BlockData::Table(TableData {
                has_header_row: false,
                ..Default::default()
            })),
            Block::new(meta.id, 2, BlockData::Heading(HeadingData { level: 9, ..Default::default() })),
        ];
        let frame = project(&blocks, &meta, &BasicSanitizer);
        assert!(frame.to_html().contains("&lt;b&gt;&amp;&lt;/b&gt;"));
        assert!(matches!(frame.blocks[1].body, RenderBody::Table { headers: None, .. }));
        assert!(matches!(frame.blocks[2].body, RenderBody::Heading { level: 6, .. }));
    }

    #[test]
    fn test_every_known_type_renders() {
        let meta = DocumentMeta::new("t");
        let blocks: Vec<Block> = BlockType::ALL
            .iter()
            .enumerate()
            .map(|(i, t)| Block::new(meta.id, i as u32, BlockData::default_for(*t)))
            .collect();
        let frame = project(&blocks, &meta, &BasicSanitizer);
        assert!(frame.blocks.iter().all(|b| !matches!(b.body, RenderBody::Placeholder { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_projector_debounces() {
        let (meta, blocks) = doc();
        let projector = PreviewProjector::new(&[], &meta, Arc::new(BasicSanitizer), DELAY, true);
        let mut rx = projector.subscribe();
        assert!(projector.current().blocks.is_empty());

        projector.schedule(blocks[..1].to_vec(), meta.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        projector.schedule(blocks.clone(), meta.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(projector.current().blocks.is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().blocks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_projector_manual_refresh_marks_stale() {
        let (meta, blocks) = doc();
        let projector = PreviewProjector::new(&[], &meta, Arc::new(BasicSanitizer), DELAY, false);

        projector.schedule(blocks, meta.clone());
        assert!(projector.current().stale);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(projector.current().blocks.is_empty());

        projector.refresh();
        let frame = projector.current();
        assert!(!frame.stale);
        assert_eq!(frame.blocks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabling_auto_refresh_publishes_held_input() {
        let (meta, blocks) = doc();
        let projector = PreviewProjector::new(&[], &meta, Arc::new(BasicSanitizer), DELAY, false);
        projector.schedule(blocks, meta);

        projector.set_auto_refresh(true);
        assert!(projector.auto_refresh());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(projector.current().blocks.len(), 2);
    }
}
