//! Reverse LaTeX parsing into the document IR (C8, §4.8).
//!
//! Covers a deliberately bounded subset of LaTeX: title/author/date
//! metadata, section levels, itemize/enumerate, verbatim, equation,
//! abstract, center, and figure/wrapfigure with `\includegraphics`.
//! Anything outside that subset — an unrecognized environment, a raw
//! command sequence — degrades to a `RawLatexBlock` carrying the exact
//! source text, never a panic or a dropped byte.

use xmd_core::{stable_node_id, IrNode, SourceSpan};

use crate::inline::latex_to_markdown_inline;

#[derive(Default)]
struct Counters(std::collections::HashMap<&'static str, usize>);

impl Counters {
    fn next(&mut self, leaf: &'static str) -> usize {
        let entry = self.0.entry(leaf).or_insert(0);
        *entry += 1;
        *entry - 1
    }
}

struct OpenSection {
    id: String,
    level: u8,
    title: String,
    prefix: String,
    children: Vec<IrNode>,
    counters: Counters,
}

/// Parses a LaTeX document subset into the same IR a forward parse of an
/// equivalent XMD document would produce.
pub fn parse_latex(doc_id: &str, source: &str) -> IrNode {
    let body = extract_document_body(source);
    let mut doc_children: Vec<IrNode> = Vec::new();
    let mut doc_counters = Counters::default();
    let mut stack: Vec<OpenSection> = Vec::new();

    if let Some(title) = find_macro_arg(&body, "title") {
        doc_children.push(IrNode::DocumentTitle {
            id: stable_node_id(doc_id, "document_title", "doc_title"),
            text: latex_to_markdown_inline(title.trim()),
            source: None,
        });
    }
    if let Some(author) = find_macro_arg(&body, "author") {
        doc_children.push(IrNode::DocumentAuthor {
            id: stable_node_id(doc_id, "document_author", "doc_author"),
            text: latex_to_markdown_inline(&normalize_authors(&author)),
            source: None,
        });
    }
    if let Some(date) = find_macro_arg(&body, "date") {
        doc_children.push(IrNode::DocumentDate {
            id: stable_node_id(doc_id, "document_date", "doc_date"),
            text: latex_to_markdown_inline(date.trim()),
            source: None,
        });
    }

    let mut pos = 0usize;
    let mut pending_raw = String::new();

    while pos < body.len() {
        match find_next_marker(&body, pos) {
            None => {
                pending_raw.push_str(&body[pos..]);
                pos = body.len();
            }
            Some((idx, marker)) => {
                if idx > pos {
                    pending_raw.push_str(&body[pos..idx]);
                }
                flush_raw(&mut pending_raw, &mut stack, &mut doc_children, &mut doc_counters, doc_id);

                let (node, next_pos) = match marker {
                    Marker::Section(level) => {
                        let Some((title, end)) = extract_braced_after(&body, idx) else {
                            pending_raw.push_str(&body[idx..idx + 1]);
                            pos = idx + 1;
                            continue;
                        };
                        while let Some(top) = stack.last() {
                            if top.level >= level {
                                close_top_section(&mut stack, &mut doc_children);
                            } else {
                                break;
                            }
                        }
                        let prefix = current_prefix(&stack);
                        let counters = current_counters_mut(&mut stack, &mut doc_counters);
                        let n = counters.next("sec");
                        let sec_prefix = join_path(&prefix, &format!("sec[{n}]"));
                        let id = stable_node_id(doc_id, "section", &sec_prefix);
                        stack.push(OpenSection {
                            id,
                            level,
                            title: latex_to_markdown_inline(title.trim()),
                            prefix: sec_prefix,
                            children: Vec::new(),
                            counters: Counters::default(),
                        });
                        (None, end)
                    }
                    Marker::Itemize => build_list_env(&body, idx, "itemize", false),
                    Marker::Enumerate => build_list_env(&body, idx, "enumerate", true),
                    Marker::Verbatim => build_verbatim(&body, idx),
                    Marker::Equation => build_equation(&body, idx),
                    Marker::Abstract => build_abstract(&body, idx),
                    Marker::Center => build_center(&body, idx),
                    Marker::Figure => build_figure(&body, idx, "figure", None),
                    Marker::Wrapfigure => build_wrapfigure(&body, idx),
                };

                if let Some(node) = node {
                    finalize_and_append(&mut stack, &mut doc_children, &mut doc_counters, doc_id, node);
                }
                pos = next_pos;
            }
        }
    }
    flush_raw(&mut pending_raw, &mut stack, &mut doc_children, &mut doc_counters, doc_id);
    while !stack.is_empty() {
        close_top_section(&mut stack, &mut doc_children);
    }

    IrNode::Document {
        id: stable_node_id(doc_id, "document", "root"),
        doc_id: doc_id.to_string(),
        children: doc_children,
    }
}

fn current_prefix(stack: &[OpenSection]) -> String {
    stack.last().map(|s| s.prefix.clone()).unwrap_or_default()
}

fn current_counters_mut<'a>(stack: &'a mut [OpenSection], doc_counters: &'a mut Counters) -> &'a mut Counters {
    match stack.last_mut() {
        Some(top) => &mut top.counters,
        None => doc_counters,
    }
}

fn join_path(prefix: &str, leaf: &str) -> String {
    if prefix.is_empty() {
        leaf.to_string()
    } else {
        format!("{prefix}/{leaf}")
    }
}

/// Appends an already-ided node (a just-closed `Section`) to its parent
/// without consuming another structural-path counter slot — the slot was
/// already reserved against the parent's counters when the section opened.
fn append_node(stack: &mut [OpenSection], doc_children: &mut Vec<IrNode>, node: IrNode) {
    match stack.last_mut() {
        Some(top) => top.children.push(node),
        None => doc_children.push(node),
    }
}

/// Assigns a fresh structural id to a leaf node built with a placeholder
/// id, then appends it to the current open section (or the document root).
fn finalize_and_append(
    stack: &mut [OpenSection],
    doc_children: &mut Vec<IrNode>,
    doc_counters: &mut Counters,
    doc_id: &str,
    mut node: IrNode,
) {
    let leaf = leaf_abbrev(&node);
    let prefix = current_prefix(stack);
    let counters = current_counters_mut(stack, doc_counters);
    let n = counters.next(leaf);
    let path = join_path(&prefix, &format!("{leaf}[{n}]"));
    let id = stable_node_id(doc_id, node.node_type(), &path);
    set_id(&mut node, id);
    append_node(stack, doc_children, node);
}

fn leaf_abbrev(node: &IrNode) -> &'static str {
    match node {
        IrNode::Section { .. } => "sec",
        IrNode::Paragraph { .. } => "p",
        IrNode::List { .. } => "list",
        IrNode::CodeBlock { .. } => "code_block",
        IrNode::MathBlock { .. } => "math_block",
        IrNode::Figure { .. } => "fig",
        IrNode::Table { .. } => "tbl",
        IrNode::Grid { .. } => "grid",
        IrNode::RawXmdBlock { .. } => "raw_xmd_block",
        IrNode::RawLatexBlock { .. } => "raw_latex_block",
        IrNode::Document { .. } | IrNode::DocumentTitle { .. } | IrNode::DocumentAuthor { .. } | IrNode::DocumentDate { .. } => "node",
    }
}

fn set_id(node: &mut IrNode, new_id: String) {
    match node {
        IrNode::Document { id, .. }
        | IrNode::Section { id, .. }
        | IrNode::DocumentTitle { id, .. }
        | IrNode::DocumentAuthor { id, .. }
        | IrNode::DocumentDate { id, .. }
        | IrNode::Paragraph { id, .. }
        | IrNode::List { id, .. }
        | IrNode::CodeBlock { id, .. }
        | IrNode::MathBlock { id, .. }
        | IrNode::Figure { id, .. }
        | IrNode::Table { id, .. }
        | IrNode::Grid { id, .. }
        | IrNode::RawXmdBlock { id, .. }
        | IrNode::RawLatexBlock { id, .. } => *id = new_id,
    }
}

fn close_top_section(stack: &mut Vec<OpenSection>, doc_children: &mut Vec<IrNode>) {
    let Some(top) = stack.pop() else { return };
    let node = IrNode::Section {
        id: top.id,
        level: top.level,
        title: top.title,
        children: top.children,
        source: None,
    };
    append_node(stack, doc_children, node);
}

fn flush_raw(
    pending: &mut String,
    stack: &mut [OpenSection],
    doc_children: &mut Vec<IrNode>,
    doc_counters: &mut Counters,
    doc_id: &str,
) {
    let trimmed = pending.trim();
    if !trimmed.is_empty() {
        let node = IrNode::RawLatexBlock { id: String::new(), latex: trimmed.to_string(), source: None };
        finalize_and_append(stack, doc_children, doc_counters, doc_id, node);
    }
    pending.clear();
}

// --- input preprocessing -----------------------------------------------

/// Strips a leading BOM, discards `\end{document}` and anything after it,
/// and drops the preamble (everything before `\begin{document}`, or the
/// whole input if there is no document environment at all).
fn extract_document_body(source: &str) -> String {
    let stripped = source.strip_prefix('\u{feff}').unwrap_or(source);
    let stripped = normalize_newlines(stripped);
    let body_start = stripped.find("\\begin{document}").map(|i| i + "\\begin{document}".len()).unwrap_or(0);
    let after_begin = &stripped[body_start..];
    let body_end = after_begin.find("\\end{document}").unwrap_or(after_begin.len());
    let body = &after_begin[..body_end];
    strip_comment_lines(body)
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_comment_lines(s: &str) -> String {
    s.lines().filter(|line| !line.trim_start().starts_with('%')).collect::<Vec<_>>().join("\n")
}

fn normalize_authors(raw: &str) -> String {
    let without_thanks = strip_command_arg(raw, "thanks");
    let without_hspace = strip_command_arg(&without_thanks, "hspace");
    without_hspace
        .replace("\\AND", ";")
        .replace("\\And", ";")
        .split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn strip_command_arg(s: &str, cmd: &str) -> String {
    let marker = format!("\\{cmd}{{");
    let mut out = String::new();
    let mut rest = s;
    while let Some(idx) = rest.find(&marker) {
        out.push_str(&rest[..idx]);
        let brace_idx = idx + marker.len() - 1;
        match balanced_end(rest, brace_idx) {
            Some(end) => rest = &rest[end..],
            None => rest = &rest[idx + marker.len()..],
        }
    }
    out.push_str(rest);
    out
}

// --- marker scanning -----------------------------------------------------

enum Marker {
    Section(u8),
    Itemize,
    Enumerate,
    Verbatim,
    Equation,
    Abstract,
    Center,
    Figure,
    Wrapfigure,
}

const MARKERS: &[(&str, fn() -> Marker)] = &[
    ("\\subsubsection{", || Marker::Section(3)),
    ("\\subsection{", || Marker::Section(2)),
    ("\\section{", || Marker::Section(1)),
    ("\\begin{itemize}", || Marker::Itemize),
    ("\\begin{enumerate}", || Marker::Enumerate),
    ("\\begin{verbatim}", || Marker::Verbatim),
    ("\\begin{equation}", || Marker::Equation),
    ("\\begin{abstract}", || Marker::Abstract),
    ("\\begin{center}", || Marker::Center),
    ("\\begin{wrapfigure}", || Marker::Wrapfigure),
    ("\\begin{figure}", || Marker::Figure),
];

fn find_next_marker(text: &str, from: usize) -> Option<(usize, Marker)> {
    let mut best: Option<(usize, &(&str, fn() -> Marker))> = None;
    for entry in MARKERS {
        if let Some(rel) = text[from..].find(entry.0) {
            let abs = from + rel;
            if best.map(|(b, _)| abs < b).unwrap_or(true) {
                best = Some((abs, entry));
            }
        }
    }
    best.map(|(idx, (_, ctor))| (idx, ctor()))
}

fn balanced_end(text: &str, open_brace_idx: usize) -> Option<usize> {
    if text.as_bytes().get(open_brace_idx) != Some(&b'{') {
        return None;
    }
    let mut depth = 0i32;
    for (i, c) in text[open_brace_idx..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_brace_idx + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn extract_braced(text: &str, open_brace_idx: usize) -> Option<(&str, usize)> {
    let end = balanced_end(text, open_brace_idx)?;
    Some((&text[open_brace_idx + 1..end - 1], end))
}

/// Finds `\cmd{...}` anywhere in `text` and returns its brace contents.
fn find_macro_arg(text: &str, cmd: &str) -> Option<String> {
    let marker = format!("\\{cmd}{{");
    let idx = text.find(&marker)?;
    let brace_idx = idx + marker.len() - 1;
    extract_braced(text, brace_idx).map(|(s, _)| s.to_string())
}

/// `idx` points at the start of a `\section{`-style marker; the open
/// brace sits right after the command name.
fn extract_braced_after(text: &str, idx: usize) -> Option<(&str, usize)> {
    let brace_idx = text[idx..].find('{')? + idx;
    extract_braced(text, brace_idx)
}

fn find_env_end(text: &str, from: usize, env: &str) -> usize {
    let end_marker = format!("\\end{{{env}}}");
    text[from..].find(&end_marker).map(|rel| from + rel).unwrap_or(text.len())
}

fn env_span(text: &str, begin_idx: usize, env: &str) -> (String, usize) {
    let begin_marker = format!("\\begin{{{env}}}");
    let content_start = begin_idx + begin_marker.len();
    let content_end = find_env_end(text, content_start, env);
    let end_marker = format!("\\end{{{env}}}");
    let next = (content_end + end_marker.len()).min(text.len());
    (text[content_start..content_end].to_string(), next)
}

fn build_list_env(text: &str, idx: usize, env: &str, ordered: bool) -> (Option<IrNode>, usize) {
    let (content, next) = env_span(text, idx, env);
    let items: Vec<String> = content
        .split("\\item")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(latex_to_markdown_inline)
        .collect();
    if items.is_empty() {
        return (None, next);
    }
    (Some(IrNode::List { id: String::new(), ordered, items, source: None }), next)
}

fn build_verbatim(text: &str, idx: usize) -> (Option<IrNode>, usize) {
    let (content, next) = env_span(text, idx, "verbatim");
    let code = content.strip_prefix('\n').unwrap_or(&content).to_string();
    (Some(IrNode::CodeBlock { id: String::new(), language: None, code, source: None }), next)
}

fn build_equation(text: &str, idx: usize) -> (Option<IrNode>, usize) {
    let (content, next) = env_span(text, idx, "equation");
    let latex = content.trim().to_string();
    (Some(IrNode::MathBlock { id: String::new(), latex, source: None }), next)
}

fn build_abstract(text: &str, idx: usize) -> (Option<IrNode>, usize) {
    let (content, next) = env_span(text, idx, "abstract");
    let para = IrNode::Paragraph {
        id: String::new(),
        text: latex_to_markdown_inline(content.trim()),
        style: None,
        source: None,
    };
    (
        Some(IrNode::Section { id: String::new(), level: 1, title: "Abstract".to_string(), children: vec![para], source: None }),
        next,
    )
}

fn build_center(text: &str, idx: usize) -> (Option<IrNode>, usize) {
    let (content, next) = env_span(text, idx, "center");
    let cleaned = strip_formatting_macros(&content);
    let node = IrNode::Paragraph {
        id: String::new(),
        text: latex_to_markdown_inline(cleaned.trim()),
        style: Some(xmd_core::ParagraphStyle { align: Some(xmd_core::Align::Center), color: None, size: None }),
        source: None,
    };
    (Some(node), next)
}

fn strip_formatting_macros(s: &str) -> String {
    s.replace("\\large", "").replace("\\bf", "").replace("\\centering", "")
}

fn build_figure(text: &str, idx: usize, env: &str, forced_side: Option<&str>) -> (Option<IrNode>, usize) {
    let (content, next) = env_span(text, idx, env);
    let node = reconstruct_figure(&content, forced_side);
    (node, next)
}

fn build_wrapfigure(text: &str, idx: usize) -> (Option<IrNode>, usize) {
    let begin_marker = "\\begin{wrapfigure}";
    let after_begin = idx + begin_marker.len();
    let side = text[after_begin..]
        .find('{')
        .map(|r| r + after_begin)
        .and_then(|brace_idx| extract_braced(text, brace_idx))
        .map(|(s, _)| s.trim().to_string());
    let (content, next) = env_span(text, idx, "wrapfigure");
    let node = reconstruct_figure(&content, side.as_deref());
    (node, next)
}

fn reconstruct_figure(content: &str, forced_side: Option<&str>) -> Option<IrNode> {
    let raw_src = find_macro_arg(content, "includegraphics").or_else(|| {
        let i = content.find("\\includegraphics")?;
        let after = &content[i + "\\includegraphics".len()..];
        let brace_rel = after.find('{')?;
        extract_braced(after, brace_rel).map(|(s, _)| s.to_string())
    })?;
    let src = raw_src.trim();
    let src = src.strip_prefix("\\detokenize{").and_then(|s| s.strip_suffix('}')).unwrap_or(src);
    let src_mapped = map_asset_path(src);

    let width = find_include_width(content);
    let caption = find_macro_arg(content, "caption").map(|c| latex_to_markdown_inline(c.trim())).unwrap_or_default();
    let label = find_macro_arg(content, "label").map(|l| l.trim_start_matches("fig:").to_string());

    let mut attr_parts: Vec<String> = Vec::new();
    if let Some(side) = forced_side {
        let align = if side.starts_with('r') { "right" } else { "left" };
        attr_parts.push(format!("align={align}"));
        attr_parts.push("placement=inline".to_string());
    }
    if let Some(w) = width {
        attr_parts.push(format!("width={:.0}%", w * 100.0));
    }
    if let Some(l) = &label {
        attr_parts.push(format!("#fig:{l}"));
    }
    let attr_suffix = if attr_parts.is_empty() { String::new() } else { format!("{{{}}}", attr_parts.join(" ")) };
    let raw = format!("![{caption}]({src_mapped}){attr_suffix}");

    Some(IrNode::Figure {
        id: String::new(),
        src: src_mapped,
        caption,
        label,
        source: Some(SourceSpan { start_offset: 0, end_offset: 0, block_index: 0, raw }),
    })
}

fn map_asset_path(src: &str) -> String {
    match src.strip_prefix("assets/") {
        Some(key) => format!("zadoox-asset://{key}"),
        None => src.to_string(),
    }
}

fn find_include_width(content: &str) -> Option<f64> {
    let idx = content.find("width=")?;
    let after = &content[idx + "width=".len()..];
    let end = after.find(|c: char| c == ']' || c == ',')?;
    let token = after[..end].trim();
    let n = token.strip_suffix("\\textwidth").or_else(|| token.strip_suffix("\\linewidth"))?;
    n.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_author_date() {
        let src = "\\documentclass{article}\n\\title{Report}\n\\author{Alice \\AND Bob}\n\\date{2026}\n\\begin{document}\n\\maketitle\nHello\n\\end{document}";
        let tree = parse_latex("d1", src);
        let IrNode::Document { children, .. } = &tree else { panic!() };
        let texts: Vec<_> = children
            .iter()
            .filter_map(|c| match c {
                IrNode::DocumentTitle { text, .. } => Some(format!("title:{text}")),
                IrNode::DocumentAuthor { text, .. } => Some(format!("author:{text}")),
                IrNode::DocumentDate { text, .. } => Some(format!("date:{text}")),
                _ => None,
            })
            .collect();
        assert!(texts.contains(&"title:Report".to_string()));
        assert!(texts.iter().any(|t| t.starts_with("author:") && t.contains("Alice") && t.contains("Bob")));
        assert!(texts.contains(&"date:2026".to_string()));
    }

    #[test]
    fn section_and_paragraph_become_ir_nodes() {
        let src = "\\begin{document}\n\\section{Intro}\nSome text here.\n\\end{document}";
        let tree = parse_latex("d1", src);
        let IrNode::Document { children, .. } = &tree else { panic!() };
        let sec = children.iter().find(|c| matches!(c, IrNode::Section { .. }));
        assert!(sec.is_some());
        if let Some(IrNode::Section { title, children, .. }) = sec {
            assert_eq!(title, "Intro");
            assert!(children.iter().any(|c| matches!(c, IrNode::RawLatexBlock { .. })));
        }
    }

    #[test]
    fn unrecognized_content_becomes_raw_latex_block() {
        let src = "\\begin{document}\n\\somethingweird{x}\n\\end{document}";
        let tree = parse_latex("d1", src);
        let IrNode::Document { children, .. } = &tree else { panic!() };
        assert!(children.iter().any(|c| matches!(c, IrNode::RawLatexBlock { .. })));
    }

    #[test]
    fn figure_reconstructs_asset_scheme_and_width() {
        let src = "\\begin{document}\n\\begin{figure}[h]\n\\centering\n\\includegraphics[width=0.5\\textwidth]{\\detokenize{assets/img1}}\n\\caption{A cat}\n\\label{fig:demo}\n\\end{figure}\n\\end{document}";
        let tree = parse_latex("d1", src);
        let IrNode::Document { children, .. } = &tree else { panic!() };
        let fig = children.iter().find(|c| matches!(c, IrNode::Figure { .. }));
        let Some(IrNode::Figure { src, caption, label, .. }) = fig else { panic!("no figure") };
        assert_eq!(src, "zadoox-asset://img1");
        assert_eq!(caption, "A cat");
        assert_eq!(label.as_deref(), Some("demo"));
    }

    #[test]
    fn verbatim_becomes_code_block() {
        let src = "\\begin{document}\n\\begin{verbatim}\nfn x() {}\n\\end{verbatim}\n\\end{document}";
        let tree = parse_latex("d1", src);
        let IrNode::Document { children, .. } = &tree else { panic!() };
        assert!(children.iter().any(|c| matches!(c, IrNode::CodeBlock { .. })));
    }
}
