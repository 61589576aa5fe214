//! HTML sanitization for the preview sink.
//!
//! Paragraph, heading, quote, callout and custom-HTML blocks carry author
//! HTML. Nothing from them reaches an HTML-rendering sink without passing
//! through an [`HtmlSanitizer`] first.

use std::sync::LazyLock;

/// Makes author HTML safe for injection into the preview.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Dropped together with their content; other disallowed tags are unwrapped.
const DROPPED_ELEMENTS: [&str; 3] = ["iframe", "object", "embed"];

static ALLOWLIST: LazyLock<ammonia::Builder<'static>> = LazyLock::new(|| {
    let mut builder = ammonia::Builder::default();
    builder.add_clean_content_tags(DROPPED_ELEMENTS);
    builder
});

/// Allowlist sanitizer: parses the fragment and keeps only known formatting
/// markup.
///
/// - `<script>`, `<style>`, `<iframe>`, `<object>`, `<embed>` go with their content
/// - unknown elements are unwrapped, unknown attributes (`on*=` included) dropped
/// - URLs outside `http`, `https`, `mailto` and friends are removed after
///   entity decoding
/// - links get `rel="noopener noreferrer"`
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicSanitizer;

impl HtmlSanitizer for BasicSanitizer {
    fn sanitize(&self, html: &str) -> String {
        ALLOWLIST.clean(html).to_string()
    }
}

/// Escapes everything; renders author HTML as text.
#[derive(Debug, Default, Clone, Copy)]
pub struct EscapeSanitizer;

impl HtmlSanitizer for EscapeSanitizer {
    fn sanitize(&self, html: &str) -> String {
        escape_html(html)
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_keeps_formatting() {
        let html = "<p>Hello <strong>world</strong> <em>again</em></p>";
        assert_eq!(BasicSanitizer.sanitize(html), html);
        assert_eq!(
            BasicSanitizer.sanitize(r#"<a href="https://x.test">link</a>"#),
            r#"<a href="https://x.test" rel="noopener noreferrer">link</a>"#
        );
    }

    #[test]
    fn test_basic_drops_scripts_with_content() {
        let html = "<p>a</p><script type=\"text/javascript\">alert(1)</script><p>b</p>";
        assert_eq!(BasicSanitizer.sanitize(html), "<p>a</p><p>b</p>");

        let multiline = "<STYLE>\nbody { display: none }\n</style>ok";
        assert_eq!(BasicSanitizer.sanitize(multiline), "ok");
    }

    #[test]
    fn test_basic_drops_embedded_frames() {
        assert_eq!(BasicSanitizer.sanitize("x<iframe src=\"//evil\">y</iframe>z"), "xz");
    }

    #[test]
    fn test_basic_strips_event_handlers() {
        let html = r#"<img src="a.png" onerror="steal()" alt="a">"#;
        assert_eq!(BasicSanitizer.sanitize(html), r#"<img src="a.png" alt="a">"#);

        let out = BasicSanitizer.sanitize("<svg/onload=alert(1)>");
        assert!(!out.contains("onload"), "{out}");
        assert!(!out.contains('<'), "{out}");
    }

    #[test]
    fn test_basic_drops_javascript_urls() {
        let out = BasicSanitizer.sanitize(r#"<a href="javascript:alert(1)">x</a>"#);
        assert_eq!(out, r#"<a rel="noopener noreferrer">x</a>"#);

        let encoded = BasicSanitizer.sanitize(r#"<a href="&#106;avascript:alert(1)">y</a>"#);
        assert!(!encoded.contains("avascript"), "{encoded}");
        assert!(!encoded.contains("href"), "{encoded}");
    }

    #[test]
    fn test_basic_does_not_reassemble_split_tags() {
        let out = BasicSanitizer.sanitize("<scr<script>ipt>alert(1)</scr<script>ipt>");
        assert!(!out.to_ascii_lowercase().contains("<script"), "{out}");
        assert!(!out.contains('<'), "{out}");
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            EscapeSanitizer.sanitize(r#"<b class="x">Tom & 'Jerry'</b>"#),
            "&lt;b class=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }
}
