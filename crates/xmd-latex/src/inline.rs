//! Bidirectional markdown-inline ↔ LaTeX-inline conversion (§4.7/§4.8).
//!
//! Writer direction escapes LaTeX metacharacters in plain text, then
//! substitutes the same bounded markdown constructs `xmd-render::inline`
//! matches on (code/link/bold/italic) for their LaTeX equivalents. None of
//! those delimiter characters collide with the escape set, so escaping
//! first and substituting after is safe, exactly as in the HTML renderer.
//! Code spans are pulled out into placeholders before bold/italic run, then
//! restored as `\texttt{...}` at the end, so a `*` inside `` `...` `` can't
//! be re-matched by the italic pass. Reader direction undoes both steps in
//! reverse order.

use regex::Regex;
use std::sync::OnceLock;

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

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\href\{([^}]*)\}\{([^}]*)\}").expect("static regex"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\url\{([^}]*)\}").expect("static regex"))
}

fn textbf_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\textbf\{([^}]*)\}").expect("static regex"))
}

fn emph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\(?:emph|textit)\{([^}]*)\}").expect("static regex"))
}

fn texttt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\texttt\{([^}]*)\}").expect("static regex"))
}

/// Escapes the characters LaTeX treats specially in running text.
fn escape_latex_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' => out.push_str("\\&"),
            '%' => out.push_str("\\%"),
            '$' => out.push_str("\\$"),
            '#' => out.push_str("\\#"),
            '_' => out.push_str("\\_"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_latex_text(s: &str) -> String {
    s.replace("\\textbackslash{}", "\u{0}BKSL\u{0}")
        .replace("\\&", "&")
        .replace("\\%", "%")
        .replace("\\$", "$")
        .replace("\\#", "#")
        .replace("\\_", "_")
        .replace("\\{", "{")
        .replace("\\}", "}")
        .replace("\\textasciitilde{}", "~")
        .replace("\\textasciicircum{}", "^")
        .replace("\u{0}BKSL\u{0}", "\\")
}

const CODE_PLACEHOLDER_PREFIX: &str = "\u{0}CODE";
const CODE_PLACEHOLDER_SUFFIX: &str = "\u{0}";

/// Converts one paragraph/line of markdown-inline source into a LaTeX
/// fragment: bold/italic/code/links map to their LaTeX commands, `[t](u)`
/// degrades to `t (u)` (no hyperref dependency), everything else is
/// metacharacter-escaped.
pub fn markdown_to_latex_inline(text: &str) -> String {
    let escaped = escape_latex_text(text);

    let mut code_spans = Vec::new();
    let with_placeholders = code_re().replace_all(&escaped, |caps: &regex::Captures| {
        let idx = code_spans.len();
        code_spans.push(caps[1].to_string());
        format!("{CODE_PLACEHOLDER_PREFIX}{idx}{CODE_PLACEHOLDER_SUFFIX}")
    });

    let with_links = link_re().replace_all(&with_placeholders, "$1 ($2)");
    let with_bold = bold_re().replace_all(&with_links, "\\textbf{$1}");
    let with_italic = italic_re().replace_all(&with_bold, "\\emph{$1}");

    let mut out = with_italic.into_owned();
    for (idx, code) in code_spans.iter().enumerate() {
        let placeholder = format!("{CODE_PLACEHOLDER_PREFIX}{idx}{CODE_PLACEHOLDER_SUFFIX}");
        out = out.replace(&placeholder, &format!("\\texttt{{{code}}}"));
    }
    out
}

/// Converts a LaTeX-inline fragment back to markdown-inline source.
/// Unrecognized commands are left as-is; callers that need a clean
/// fallback should route the whole block to `RawLatexBlock` instead.
pub fn latex_to_markdown_inline(text: &str) -> String {
    let with_href = href_re().replace_all(text, "[$2]($1)");
    let with_url = url_re().replace_all(&with_href, "$1");
    let with_bold = textbf_re().replace_all(&with_url, "**$1**");
    let with_italic = emph_re().replace_all(&with_bold, "*$1*");
    let with_code = texttt_re().replace_all(&with_italic, "`$1`");
    unescape_latex_text(&with_code)
}
