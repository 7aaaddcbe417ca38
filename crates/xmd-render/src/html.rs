//! C6: IR → preview HTML (§4.6).

use xmd_core::{BorderStyle, GridAlign, IrNode, Margin, Placement, Rule};
use xmd_parse::attrs::{self, AttrMap};

use crate::config::{HtmlRendererConfig, PlainImageMode};
use crate::escape::{escape_attr, escape_text, sanitize_id};
use crate::inline::render_inline;

/// Whether a node is being rendered directly inside a `Grid` cell, and if
/// so whether that grid is full-width or shrink-wrapped. Only `Figure`
/// rendering consults this; a nested `Grid` computes its own context for
/// its own cells rather than inheriting the enclosing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridContext {
    None,
    Full,
    ShrinkWrap,
}

/// Renders a full IR tree (rooted at a `Document`) to an HTML fragment.
pub fn render_html(root: &IrNode, config: &HtmlRendererConfig) -> String {
    render_node(root, config, GridContext::None)
}

fn render_node(node: &IrNode, cfg: &HtmlRendererConfig, grid_ctx: GridContext) -> String {
    match node {
        IrNode::Document { children, .. } => children.iter().map(|c| render_node(c, cfg, grid_ctx)).collect(),
        IrNode::Section { level, title, children, .. } => {
            let tag_level = (*level as u32 + 1).min(6);
            let inner: String = children.iter().map(|c| render_node(c, cfg, grid_ctx)).collect();
            format!("<h{tag_level}>{}</h{tag_level}>{}", render_inline(title), inner)
        }
        IrNode::DocumentTitle { text, .. } => {
            format!("<h1 id=\"doc-title\" class=\"doc-title\">{}</h1>", render_inline(text))
        }
        IrNode::DocumentAuthor { text, .. } => {
            format!("<div class=\"doc-author\">{}</div>", render_inline(text))
        }
        IrNode::DocumentDate { text, .. } => {
            format!("<div class=\"doc-date\">{}</div>", render_inline(text))
        }
        IrNode::Paragraph { text, style, .. } => render_paragraph(text, style.as_ref()),
        IrNode::List { ordered, items, .. } => render_list(*ordered, items),
        IrNode::CodeBlock { language, code, .. } => render_code_block(language.as_deref(), code),
        IrNode::MathBlock { latex, .. } => {
            format!(
                "<div class=\"math-block\"><code class=\"math-latex\">{}</code></div>",
                escape_text(latex)
            )
        }
        IrNode::Figure { id, src, caption, label, source } => render_figure(
            id,
            src,
            caption,
            label.as_deref(),
            source.as_ref().map(|s| s.raw.as_str()).unwrap_or(""),
            cfg,
            grid_ctx,
        ),
        IrNode::Table {
            id,
            header,
            rows,
            caption,
            label,
            col_align,
            v_rules,
            h_rules,
            style,
            ..
        } => render_table(id, header, rows, caption.as_deref(), label.as_deref(), col_align.as_deref(), v_rules.as_deref(), h_rules.as_deref(), style.as_ref()),
        IrNode::Grid {
            cols,
            caption,
            label,
            align,
            placement,
            margin,
            rows,
            ..
        } => render_grid(*cols, caption.as_deref(), label.as_deref(), *align, *placement, *margin, rows, cfg),
        IrNode::RawXmdBlock { xmd, .. } => render_unrecognized("XMD", xmd),
        IrNode::RawLatexBlock { latex, .. } => {
            let stripped = strip_latex_noise(latex);
            if stripped.is_empty() {
                String::new()
            } else {
                render_unrecognized("LaTeX", &stripped)
            }
        }
    }
}

fn render_paragraph(text: &str, style: Option<&xmd_core::ParagraphStyle>) -> String {
    let inline = render_inline(text);
    match style {
        None => format!("<p>{inline}</p>"),
        Some(style) => {
            let mut decls = Vec::new();
            if let Some(align) = style.align {
                decls.push(format!("text-align:{}", align_css(align)));
            }
            if let Some(color) = &style.color {
                decls.push(format!("color:{color}"));
            }
            if let Some(size) = style.size {
                decls.push(format!("font-size:{}", size_css(size)));
            }
            format!("<div class=\"text-block\" style=\"{}\">{inline}</div>", decls.join(";"))
        }
    }
}

fn align_css(align: xmd_core::Align) -> &'static str {
    match align {
        xmd_core::Align::Left => "left",
        xmd_core::Align::Center => "center",
        xmd_core::Align::Right => "right",
    }
}

fn size_css(size: xmd_core::TextSize) -> &'static str {
    match size {
        xmd_core::TextSize::Small => "0.85em",
        xmd_core::TextSize::Medium => "1em",
        xmd_core::TextSize::Large => "1.25em",
    }
}

fn render_list(ordered: bool, items: &[String]) -> String {
    let tag = if ordered { "ol" } else { "ul" };
    let body: String = items.iter().map(|i| format!("<li>{}</li>", render_inline(i))).collect();
    format!("<{tag}>{body}</{tag}>")
}

fn render_code_block(language: Option<&str>, code: &str) -> String {
    let class_attr = match language {
        Some(lang) => format!(" class=\"language-{}\"", escape_attr(lang)),
        None => String::new(),
    };
    format!("<pre><code{class_attr}>{}</code></pre>", escape_text(code))
}

fn render_unrecognized(badge: &str, body: &str) -> String {
    format!(
        "<div class=\"unrecognized-block\"><span class=\"badge\">{badge}</span><pre>{}</pre></div>",
        escape_text(body)
    )
}

/// Strips comment-only lines, common preamble directives, and trailing `%`
/// comments from a `RawLatexBlock`'s payload (§4.6).
fn strip_latex_noise(latex: &str) -> String {
    latex
        .lines()
        .filter(|line| {
            let t = line.trim();
            !(t.starts_with('%')
                || t.starts_with("\\documentclass")
                || t.starts_with("\\usepackage")
                || t.starts_with("\\begin{document}")
                || t.starts_with("\\end{document}")
                || t.starts_with("\\maketitle"))
        })
        .map(trim_trailing_percent_comment)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn trim_trailing_percent_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'%' && (i == 0 || bytes[i - 1] != b'\\') {
            return line[..i].trim_end();
        }
    }
    line
}

fn is_known_scheme(raw: &str, asset_scheme: &str) -> bool {
    raw.contains(asset_scheme) || raw.contains("data:") || has_absolute_url_scheme(raw)
}

/// Absolute `scheme://` form inside the figure line's `(...)`, e.g. `http://`.
fn has_absolute_url_scheme(raw: &str) -> bool {
    let Some(paren_start) = raw.find('(') else { return false };
    let Some(paren_end) = raw[paren_start..].find(')') else { return false };
    let url = &raw[paren_start + 1..paren_start + paren_end];
    url.contains("://")
}

fn render_figure(
    id: &str,
    src: &str,
    caption: &str,
    label: Option<&str>,
    raw: &str,
    cfg: &HtmlRendererConfig,
    grid_ctx: GridContext,
) -> String {
    let is_markdown_line = raw.trim_start().starts_with("![");
    let figure_id = sanitize_id(label.unwrap_or(id));

    if is_markdown_line
        && is_known_scheme(raw, &cfg.asset_scheme)
        && cfg.plain_image_mode == PlainImageMode::CaptionedSpan
    {
        return format!("<span id=\"figure-{figure_id}\">{}</span>", render_inline(raw));
    }

    let figure_attrs = attrs::extract_attr_block(raw)
        .map(attrs::parse_attrs)
        .unwrap_or_default();
    let (wrapper_style, media_style, width_pct_hint) = figure_styles(&figure_attrs, grid_ctx);
    let is_pdf = src.to_ascii_lowercase().ends_with(".pdf");
    let width_pct_attr = width_pct_hint
        .map(|pct| format!(" data-zx-width-pct=\"{pct}\""))
        .unwrap_or_default();

    let media = if is_pdf {
        format!(
            "<object type=\"application/pdf\" data-zx-asset-scope=\"latex\" data-zx-asset-path=\"{}\" style=\"{media_style}\"{width_pct_attr}></object>",
            escape_attr(src)
        )
    } else {
        format!(
            "<img data-zx-asset-scope=\"latex\" data-zx-asset-path=\"{}\" alt=\"{}\" style=\"{media_style}\"{width_pct_attr} />",
            escape_attr(src),
            escape_attr(caption)
        )
    };

    format!("<span id=\"figure-{figure_id}\" style=\"{wrapper_style}\">{media}</span>")
}

/// Computes `(wrapper_style, media_style, width_pct_hint)`. `grid_ctx`
/// overrides the block-placement width rules per §4.6's grid-cell figure
/// rules: full-width cells force media to fill, respecting an explicit
/// `width` attribute; shrink-wrap grids drop the wrapper's `width:100%` and
/// turn a percentage `width` into `width:auto` plus a hint attribute.
fn figure_styles(attrs: &AttrMap, grid_ctx: GridContext) -> (String, String, Option<String>) {
    let placement = attrs.get("placement").unwrap_or("block");
    let align = attrs.get("align").unwrap_or("left");
    let width = attrs.get("width");

    let mut wrapper = Vec::new();
    let mut media = Vec::new();
    let mut width_pct_hint = None;

    if placement == "inline" {
        wrapper.push("display:inline-block".to_string());
        match align {
            "center" => {
                wrapper.push("margin-left:auto".to_string());
                wrapper.push("margin-right:auto".to_string());
            }
            "right" => {
                wrapper.push("float:right".to_string());
                wrapper.push("margin-left:1em".to_string());
            }
            _ => {
                wrapper.push("float:left".to_string());
                wrapper.push("margin-right:1em".to_string());
            }
        }
        if let Some(w) = width {
            wrapper.push(format!("width:{w}"));
        }
    } else {
        wrapper.push("display:block".to_string());
        if grid_ctx != GridContext::ShrinkWrap {
            wrapper.push("width:100%".to_string());
        }
        match align {
            "center" => {
                media.push("display:block".to_string());
                media.push("margin-left:auto".to_string());
                media.push("margin-right:auto".to_string());
            }
            "right" => {
                media.push("display:block".to_string());
                media.push("margin-left:auto".to_string());
            }
            _ => {}
        }

        match grid_ctx {
            GridContext::Full => {
                if let Some(w) = width {
                    media.push(format!("max-width:{w}"));
                } else {
                    media.push("width:100%".to_string());
                }
            }
            GridContext::ShrinkWrap => {
                if let Some(w) = width {
                    if let Some(pct) = w.strip_suffix('%') {
                        media.push("width:auto".to_string());
                        width_pct_hint = Some(pct.to_string());
                    } else {
                        media.push(format!("max-width:{w}"));
                    }
                }
            }
            GridContext::None => {
                if let Some(w) = width {
                    media.push(format!("max-width:{w}"));
                }
            }
        }
    }

    if let Some(bw) = attrs.get("borderWidth") {
        if bw != "0" {
            let style = attrs.get("borderStyle").unwrap_or("solid");
            let color = attrs.get("borderColor").unwrap_or("black");
            media.push(format!("border:{bw}px {style} {color}"));
        }
    } else if attrs.get("borderStyle").is_some() || attrs.get("borderColor").is_some() {
        let style = attrs.get("borderStyle").unwrap_or("solid");
        let color = attrs.get("borderColor").unwrap_or("black");
        media.push(format!("border:1px {style} {color}"));
    }

    (wrapper.join(";"), media.join(";"), width_pct_hint)
}

fn rule_css(rule: Rule) -> Option<(&'static str, u32)> {
    match rule {
        Rule::None => None,
        Rule::Single => Some(("solid", 1)),
        Rule::Double => Some(("double", 3)),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_table(
    id: &str,
    header: &[String],
    rows: &[Vec<String>],
    caption: Option<&str>,
    _label: Option<&str>,
    col_align: Option<&[xmd_core::Align]>,
    v_rules: Option<&[Rule]>,
    h_rules: Option<&[Rule]>,
    style: Option<&BorderStyle>,
) -> String {
    let ncols = header.len().max(rows.first().map(|r| r.len()).unwrap_or(0));

    let cell_style = |row_idx: usize, col_idx: usize| -> String {
        let mut decls = Vec::new();
        if let Some(aligns) = col_align {
            if let Some(a) = aligns.get(col_idx) {
                decls.push(format!("text-align:{}", align_css(*a)));
            }
        }
        if let Some(rules) = v_rules {
            if col_idx == 0 {
                if let Some((bstyle, w)) = rules.get(0).copied().and_then(rule_css) {
                    decls.push(format!("border-left:{w}px {bstyle} {}", border_color(style)));
                }
            }
            if let Some((bstyle, w)) = rules.get(col_idx + 1).copied().and_then(rule_css) {
                decls.push(format!("border-right:{w}px {bstyle} {}", border_color(style)));
            }
        }
        if let Some(rules) = h_rules {
            if row_idx == 0 {
                if let Some((bstyle, w)) = rules.get(0).copied().and_then(rule_css) {
                    decls.push(format!("border-top:{w}px {bstyle} {}", border_color(style)));
                }
            }
            if let Some((bstyle, w)) = rules.get(row_idx + 1).copied().and_then(rule_css) {
                decls.push(format!("border-bottom:{w}px {bstyle} {}", border_color(style)));
            }
        }
        decls.join(";")
    };

    let mut out = format!("<table id=\"tbl-{}\">", escape_attr(id));
    if let Some(cap) = caption {
        out.push_str(&format!("<caption style=\"caption-side:top\">{}</caption>", render_inline(cap)));
    }
    if !header.is_empty() {
        out.push_str("<thead><tr>");
        for (ci, cell) in header.iter().enumerate() {
            out.push_str(&format!("<th style=\"{}\">{}</th>", cell_style(0, ci), render_inline(cell)));
        }
        out.push_str("</tr></thead>");
    }
    out.push_str("<tbody>");
    let header_offset = usize::from(!header.is_empty());
    for (ri, row) in rows.iter().enumerate() {
        out.push_str("<tr>");
        for ci in 0..ncols {
            let cell = row.get(ci).map(String::as_str).unwrap_or("");
            out.push_str(&format!(
                "<td style=\"{}\">{}</td>",
                cell_style(ri + header_offset, ci),
                render_inline(cell)
            ));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

fn border_color(style: Option<&BorderStyle>) -> String {
    style
        .and_then(|s| s.border_color.clone())
        .unwrap_or_else(|| "currentColor".to_string())
}

fn margin_padding(m: Margin) -> u32 {
    match m {
        Margin::Small => 4,
        Margin::Medium => 12,
        Margin::Large => 24,
    }
}

fn render_grid(
    cols: Option<usize>,
    caption: Option<&str>,
    _label: Option<&str>,
    align: Option<GridAlign>,
    placement: Option<Placement>,
    margin: Option<Margin>,
    rows: &[Vec<xmd_core::GridCell>],
    cfg: &HtmlRendererConfig,
) -> String {
    let _ = cols;
    let align = align.unwrap_or(GridAlign::Left);
    let placement = placement.unwrap_or(Placement::Block);
    let pad = margin_padding(margin.unwrap_or(Margin::Medium));
    let is_full = align == GridAlign::Full;

    let mut outer = Vec::new();
    let mut inner = vec!["border-collapse:collapse".to_string()];

    if is_full {
        outer.push("display:block".to_string());
        outer.push("width:100%".to_string());
        inner.push("width:100%".to_string());
    } else {
        inner.push("display:table".to_string());
        inner.push("width:auto".to_string());
        inner.push("margin-left:auto".to_string());
        inner.push("margin-right:auto".to_string());
        if placement == Placement::Inline && align != GridAlign::Center {
            let side = if align == GridAlign::Right { "right" } else { "left" };
            let opposite = if side == "right" { "left" } else { "right" };
            outer.push(format!("float:{side}"));
            outer.push(format!("margin-{opposite}:1em"));
        }
    }
    outer.push(format!("padding:{pad}px"));

    let cell_ctx = if is_full { GridContext::Full } else { GridContext::ShrinkWrap };

    let mut body = String::new();
    for row in rows {
        body.push_str("<tr>");
        for cell in row {
            let inner_html: String = cell.children.iter().map(|c| render_node(c, cfg, cell_ctx)).collect();
            body.push_str(&format!("<td style=\"padding:{pad}px;vertical-align:top\">{inner_html}</td>"));
        }
        body.push_str("</tr>");
    }

    let mut out = format!("<div style=\"{}\">", outer.join(";"));
    if let Some(cap) = caption {
        out.push_str(&format!("<div class=\"grid-caption\">{}</div>", render_inline(cap)));
    }
    out.push_str(&format!("<table style=\"{}\"><tbody>{body}</tbody></table></div>", inner.join(";")));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmd_core::{IrNode, SourceSpan};

    fn doc(children: Vec<IrNode>) -> IrNode {
        IrNode::Document {
            id: "root".to_string(),
            doc_id: "doc1".to_string(),
            children,
        }
    }

    #[test]
    fn renders_document_title_as_h1() {
        let tree = doc(vec![IrNode::DocumentTitle {
            id: "t0".to_string(),
            text: "My Report".to_string(),
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert!(html.contains("<h1 id=\"doc-title\" class=\"doc-title\">My Report</h1>"));
    }

    #[test]
    fn section_level_one_renders_as_h2() {
        let tree = doc(vec![IrNode::Section {
            id: "s0".to_string(),
            level: 1,
            title: "Intro".to_string(),
            children: vec![],
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert_eq!(html, "<h2>Intro</h2>");
    }

    #[test]
    fn scenario_s1_matches_the_documented_literal_html() {
        let tree = doc(vec![IrNode::Section {
            id: "s0".to_string(),
            level: 1,
            title: "Intro".to_string(),
            children: vec![IrNode::Paragraph {
                id: "p0".to_string(),
                text: "Hello.".to_string(),
                style: None,
                source: None,
            }],
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert!(html.contains("<h2>Intro</h2><p>Hello.</p>"));
    }

    #[test]
    fn paragraph_without_style_wraps_in_plain_p() {
        let tree = doc(vec![IrNode::Paragraph {
            id: "p0".to_string(),
            text: "Hello **world**".to_string(),
            style: None,
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert_eq!(html, "<p>Hello <strong>world</strong></p>");
    }

    #[test]
    fn code_block_escapes_content() {
        let tree = doc(vec![IrNode::CodeBlock {
            id: "c0".to_string(),
            language: Some("rs".to_string()),
            code: "<tag>".to_string(),
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert!(html.contains("<pre><code class=\"language-rs\">&lt;tag&gt;</code></pre>"));
    }

    #[test]
    fn math_block_renders_escaped_latex() {
        let tree = doc(vec![IrNode::MathBlock {
            id: "m0".to_string(),
            latex: "x < y".to_string(),
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert!(html.contains("<div class=\"math-block\"><code class=\"math-latex\">x &lt; y</code></div>"));
    }

    #[test]
    fn figure_with_known_scheme_markdown_line_renders_captioned_span() {
        let raw = r#"![Cap](zadoox-asset://img.png){align="right"}"#;
        let tree = doc(vec![IrNode::Figure {
            id: "f0".to_string(),
            src: "zadoox-asset://img.png".to_string(),
            caption: "Cap".to_string(),
            label: None,
            source: Some(SourceSpan {
                start_offset: 0,
                end_offset: raw.len(),
                block_index: 0,
                raw: raw.to_string(),
            }),
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert!(html.contains("<span id=\"figure-f0\">"));
        assert!(html.contains("Cap"));
    }

    #[test]
    fn figure_with_bare_img_mode_renders_img_tag() {
        let cfg = HtmlRendererConfig {
            plain_image_mode: PlainImageMode::BareImg,
            ..HtmlRendererConfig::default()
        };
        let raw = "![Cap](zadoox-asset://img.png)";
        let tree = doc(vec![IrNode::Figure {
            id: "f0".to_string(),
            src: "zadoox-asset://img.png".to_string(),
            caption: "Cap".to_string(),
            label: None,
            source: Some(SourceSpan {
                start_offset: 0,
                end_offset: raw.len(),
                block_index: 0,
                raw: raw.to_string(),
            }),
        }]);
        let html = render_html(&tree, &cfg);
        assert!(html.contains("<img "));
    }

    fn grid_with_figure(align: GridAlign, raw: &str) -> IrNode {
        doc(vec![IrNode::Grid {
            id: "g0".to_string(),
            cols: None,
            caption: None,
            label: None,
            align: Some(align),
            placement: None,
            margin: None,
            style: None,
            rows: vec![vec![xmd_core::GridCell {
                children: vec![IrNode::Figure {
                    id: "f0".to_string(),
                    src: "zadoox-asset://img.png".to_string(),
                    caption: "Cap".to_string(),
                    label: None,
                    source: Some(SourceSpan {
                        start_offset: 0,
                        end_offset: raw.len(),
                        block_index: 0,
                        raw: raw.to_string(),
                    }),
                }],
            }]],
            source: None,
        }])
    }

    #[test]
    fn full_width_grid_cell_forces_figure_media_to_fill() {
        let raw = r#"![Cap](zadoox-asset://img.png)"#;
        let tree = grid_with_figure(GridAlign::Full, raw);
        let cfg = HtmlRendererConfig { plain_image_mode: PlainImageMode::BareImg, ..HtmlRendererConfig::default() };
        let html = render_html(&tree, &cfg);
        assert!(html.contains("width:100%"));
        assert!(!html.contains("data-zx-width-pct"));
    }

    #[test]
    fn full_width_grid_cell_respects_explicit_figure_width() {
        let raw = r#"![Cap](zadoox-asset://img.png){width="50%"}"#;
        let tree = grid_with_figure(GridAlign::Full, raw);
        let cfg = HtmlRendererConfig { plain_image_mode: PlainImageMode::BareImg, ..HtmlRendererConfig::default() };
        let html = render_html(&tree, &cfg);
        assert!(html.contains("max-width:50%"));
    }

    #[test]
    fn shrink_wrap_grid_strips_wrapper_full_width_and_hints_percentage() {
        let raw = r#"![Cap](zadoox-asset://img.png){width="33%"}"#;
        let tree = grid_with_figure(GridAlign::Left, raw);
        let cfg = HtmlRendererConfig { plain_image_mode: PlainImageMode::BareImg, ..HtmlRendererConfig::default() };
        let html = render_html(&tree, &cfg);
        assert!(html.contains("width:auto"));
        assert!(html.contains("data-zx-width-pct=\"33\""));
        assert!(!html.contains("span id=\"figure-f0\" style=\"display:block;width:100%\""));
    }

    #[test]
    fn raw_xmd_block_renders_inside_unrecognized_wrapper() {
        let tree = doc(vec![IrNode::RawXmdBlock {
            id: "r0".to_string(),
            xmd: ":::mystery\nbody\n:::".to_string(),
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert!(html.contains("class=\"unrecognized-block\""));
        assert!(html.contains("badge"));
    }

    #[test]
    fn raw_latex_block_strips_preamble_noise() {
        let tree = doc(vec![IrNode::RawLatexBlock {
            id: "r0".to_string(),
            latex: "\\documentclass{article}\n% a comment\n\\somecommand{x} % trailing\n".to_string(),
            source: None,
        }]);
        let html = render_html(&tree, &HtmlRendererConfig::default());
        assert!(html.contains("\\somecommand{x}"));
        assert!(!html.contains("documentclass"));
    }
}
