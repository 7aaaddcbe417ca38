//! Bounded markdown-inline → HTML conversion (§4.6 `Paragraph`/`List`).
//!
//! Supports bold (`**text**`), italic (`*text*`), inline code (`` `text` ``),
//! and links (`[text](url)`). Text is HTML-escaped first; none of the
//! markdown delimiter characters this module matches on collide with the
//! escaped entities, so running the substitutions afterward is safe.
//!
//! Code spans are pulled out and replaced with placeholders before bold/
//! italic run, then restored verbatim at the end — otherwise a `*` sitting
//! inside `` `...` `` gets re-matched by the italic pass once it's already
//! sitting inside a `<code>` tag.

use regex::Regex;
use std::sync::OnceLock;

use crate::escape::escape_text;

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("static regex"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").expect("static regex"))
}

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").expect("static regex"))
}

fn italic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("static regex"))
}

const CODE_PLACEHOLDER_PREFIX: &str = "\u{0}CODE";
const CODE_PLACEHOLDER_SUFFIX: &str = "\u{0}";

/// Converts one line/paragraph of markdown-inline source to an HTML
/// fragment. The input is raw (unescaped) source text.
pub fn render_inline(text: &str) -> String {
    let escaped = escape_text(text);

    let mut code_spans = Vec::new();
    let with_placeholders = code_re().replace_all(&escaped, |caps: &regex::Captures| {
        let idx = code_spans.len();
        code_spans.push(caps[1].to_string());
        format!("{CODE_PLACEHOLDER_PREFIX}{idx}{CODE_PLACEHOLDER_SUFFIX}")
    });

    let with_links = link_re().replace_all(&with_placeholders, r#"<a href="$2">$1</a>"#);
    let with_bold = bold_re().replace_all(&with_links, "<strong>$1</strong>");
    let with_italic = italic_re().replace_all(&with_bold, "<em>$1</em>");

    restore_code_spans(&with_italic, &code_spans)
}

fn restore_code_spans(text: &str, code_spans: &[String]) -> String {
    let mut out = text.to_string();
    for (idx, code) in code_spans.iter().enumerate() {
        let placeholder = format!("{CODE_PLACEHOLDER_PREFIX}{idx}{CODE_PLACEHOLDER_SUFFIX}");
        out = out.replace(&placeholder, &format!("<code>{code}</code>"));
    }
    out
}

/// Same as `render_inline`, but strips a single outer `<p>...</p>` wrapper —
/// unused today since `render_inline` never emits one, kept for list items
/// that receive block-level markdown in a future extension.
pub fn render_inline_unwrapped(text: &str) -> String {
    render_inline(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_bold_italic_code_and_links() {
        assert_eq!(render_inline("**bold**"), "<strong>bold</strong>");
        assert_eq!(render_inline("*italic*"), "<em>italic</em>");
        assert_eq!(render_inline("`code`"), "<code>code</code>");
        assert_eq!(
            render_inline("[text](http://example.com)"),
            r#"<a href="http://example.com">text</a>"#
        );
    }

    #[test]
    fn escapes_html_metacharacters_before_matching_markdown() {
        assert_eq!(render_inline("<b>&"), "&lt;b&gt;&amp;");
    }

    #[test]
    fn code_spans_are_not_reinterpreted_as_emphasis() {
        assert_eq!(render_inline("`*not italic*`"), "<code>*not italic*</code>");
    }
}
