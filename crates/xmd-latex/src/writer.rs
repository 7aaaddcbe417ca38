//! LaTeX document generation from the IR (C7, §4.7).
//!
//! Package inclusion in the preamble is conditional on what the body
//! actually uses: a document with no figures never pulls in `graphicx`, a
//! document with no inline/side figures never pulls in `wrapfig`. Colors
//! referenced by border styling are collected while the body is rendered
//! and then declared with `\definecolor` ahead of it, since the color name
//! a border references has to exist before `\begin{document}`.

use xmd_core::{Align, GridAlign, GridCell, IrNode, Margin, Placement, Rule, SourceSpan};
use xmd_parse::{extract_attr_block, parse_attrs, AttrMap};

use crate::config::LatexWriterConfig;
use crate::inline::markdown_to_latex_inline;

#[derive(Default)]
struct Usage {
    has_figure: bool,
    has_inline_figure_or_grid: bool,
    has_figure_only_grid: bool,
    has_grid_or_table: bool,
    has_border_color: bool,
    needs_captionof: bool,
}

/// Renders a parsed document to a complete, compilable LaTeX source file.
pub fn render_latex(root: &IrNode, cfg: &LatexWriterConfig) -> String {
    let children = match root {
        IrNode::Document { children, .. } => children.as_slice(),
        _ => &[],
    };

    let mut usage = Usage::default();
    for child in children {
        scan_usage(child, &mut usage);
    }
    let (title, author, date) = extract_metadata(children);

    let mut colors: Vec<(String, String)> = Vec::new();
    let body = join_blocks(children, cfg, &mut colors);

    let mut out = build_preamble(&usage, title.as_deref(), author.as_deref(), date.as_deref(), &colors);
    out.push_str("\\begin{document}\n");
    if title.is_some() {
        out.push_str("\\maketitle\n");
    }
    out.push_str(&body);
    out.push_str("\n\\end{document}\n");
    out
}

/// Renders a single node as a standalone LaTeX fragment (no preamble/
/// document environment) — used by consumers embedding a figure or table
/// into a larger document they already control.
pub fn render_latex_fragment(node: &IrNode, cfg: &LatexWriterConfig) -> String {
    let mut colors = Vec::new();
    render_block(node, cfg, &mut colors)
}

fn extract_metadata(children: &[IrNode]) -> (Option<String>, Option<String>, Option<String>) {
    let mut title = None;
    let mut author = None;
    let mut date = None;
    for child in children {
        match child {
            IrNode::DocumentTitle { text, .. } => title = Some(text.clone()),
            IrNode::DocumentAuthor { text, .. } => author = Some(text.clone()),
            IrNode::DocumentDate { text, .. } => date = Some(text.clone()),
            _ => {}
        }
    }
    (title, author, date)
}

fn scan_usage(node: &IrNode, usage: &mut Usage) {
    match node {
        IrNode::Document { children, .. } | IrNode::Section { children, .. } => {
            for child in children {
                scan_usage(child, usage);
            }
        }
        IrNode::Figure { source, .. } => {
            usage.has_figure = true;
            let attrs = figure_attrs_from_source(source);
            if attrs.kv.get("placement").map(String::as_str) == Some("inline") {
                usage.has_inline_figure_or_grid = true;
            }
            if attrs.kv.contains_key("borderColor") {
                usage.has_border_color = true;
            }
        }
        IrNode::Table { style, .. } => {
            usage.has_grid_or_table = true;
            if style.as_ref().and_then(|s| s.border_color.as_ref()).is_some() {
                usage.has_border_color = true;
            }
        }
        IrNode::Grid { placement, style, rows, .. } => {
            usage.has_grid_or_table = true;
            if matches!(placement, Some(Placement::Inline)) {
                usage.has_inline_figure_or_grid = true;
            }
            if style.as_ref().and_then(|s| s.border_color.as_ref()).is_some() {
                usage.has_border_color = true;
            }
            if is_figure_only_grid(rows) {
                usage.has_figure_only_grid = true;
            } else {
                usage.needs_captionof = true;
            }
            for row in rows {
                for cell in row {
                    for child in &cell.children {
                        scan_usage(child, usage);
                    }
                }
            }
        }
        _ => {}
    }
}

fn is_figure_only_grid(rows: &[Vec<GridCell>]) -> bool {
    let mut saw_any = false;
    for row in rows {
        for cell in row {
            if cell.children.len() != 1 {
                return false;
            }
            if !matches!(cell.children[0], IrNode::Figure { .. }) {
                return false;
            }
            saw_any = true;
        }
    }
    saw_any
}

fn figure_attrs_from_source(source: &Option<SourceSpan>) -> AttrMap {
    let Some(span) = source else { return AttrMap::default() };
    if !span.raw.trim_start().starts_with("![") {
        return AttrMap::default();
    }
    match extract_attr_block(&span.raw) {
        Some(block) => parse_attrs(block),
        None => AttrMap::default(),
    }
}

fn build_preamble(
    usage: &Usage,
    title: Option<&str>,
    author: Option<&str>,
    date: Option<&str>,
    colors: &[(String, String)],
) -> String {
    let mut out = String::from("\\documentclass{article}\n");
    if usage.has_figure {
        out.push_str("\\usepackage{graphicx}\n");
    }
    if usage.has_inline_figure_or_grid {
        out.push_str("\\usepackage{wrapfig}\n");
    }
    if usage.has_figure_only_grid {
        out.push_str("\\usepackage{subcaption}\n");
    }
    if usage.has_grid_or_table {
        out.push_str("\\usepackage{tabularx}\n\\usepackage{array}\n");
    }
    if usage.has_border_color {
        out.push_str("\\usepackage[table]{xcolor}\n");
    }
    if usage.needs_captionof {
        out.push_str("\\usepackage{caption}\n");
    }
    for (name, hex) in colors {
        out.push_str(&format!("\\definecolor{{{name}}}{{HTML}}{{{hex}}}\n"));
    }
    if let Some(t) = title {
        out.push_str(&format!("\\title{{{}}}\n", markdown_to_latex_inline(t)));
    }
    if let Some(a) = author {
        out.push_str(&format!("\\author{{{}}}\n", markdown_to_latex_inline(a)));
    }
    if let Some(d) = date {
        out.push_str(&format!("\\date{{{}}}\n", markdown_to_latex_inline(d)));
    }
    out
}

fn join_blocks(children: &[IrNode], cfg: &LatexWriterConfig, colors: &mut Vec<(String, String)>) -> String {
    let mut out = String::new();
    let mut prev_was_inline_wrapfigure = false;
    for child in children {
        if matches!(
            child,
            IrNode::DocumentTitle { .. } | IrNode::DocumentAuthor { .. } | IrNode::DocumentDate { .. }
        ) {
            continue;
        }
        let rendered = render_block(child, cfg, colors);
        if rendered.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(if prev_was_inline_wrapfigure { "\n" } else { "\n\n" });
        }
        out.push_str(&rendered);
        prev_was_inline_wrapfigure = is_inline_wrapfigure_block(child);
    }
    out
}

fn is_inline_wrapfigure_block(node: &IrNode) -> bool {
    let IrNode::Figure { source, .. } = node else { return false };
    let attrs = figure_attrs_from_source(source);
    attrs.kv.get("placement").map(String::as_str) == Some("inline")
        && attrs.kv.get("align").map(String::as_str) != Some("center")
}

fn render_block(node: &IrNode, cfg: &LatexWriterConfig, colors: &mut Vec<(String, String)>) -> String {
    match node {
        IrNode::Document { children, .. } => join_blocks(children, cfg, colors),
        IrNode::Section { level, title, children, .. } => {
            let cmd = section_cmd(*level);
            let mut out = format!("\\{cmd}{{{}}}\n", markdown_to_latex_inline(title));
            out.push_str(&join_blocks(children, cfg, colors));
            out
        }
        IrNode::Paragraph { text, .. } => markdown_to_latex_inline(text),
        IrNode::List { ordered, items, .. } => render_list(*ordered, items),
        IrNode::CodeBlock { code, .. } => format!("\\begin{{verbatim}}\n{code}\n\\end{{verbatim}}"),
        IrNode::MathBlock { latex, .. } => format!("\\begin{{equation}}\n{latex}\n\\end{{equation}}"),
        IrNode::Figure { src, caption, label, source, .. } => {
            render_figure(src, caption, label.as_deref(), source, cfg, colors)
        }
        IrNode::Table { .. } => render_table(node, cfg, colors),
        IrNode::Grid { .. } => render_grid(node, cfg, colors),
        IrNode::RawXmdBlock { xmd, .. } => xmd.lines().map(|l| format!("% {l}")).collect::<Vec<_>>().join("\n"),
        IrNode::RawLatexBlock { latex, .. } => latex.clone(),
        IrNode::DocumentTitle { .. } | IrNode::DocumentAuthor { .. } | IrNode::DocumentDate { .. } => String::new(),
    }
}

fn section_cmd(level: u8) -> &'static str {
    match level {
        0 | 1 => "section",
        2 => "subsection",
        _ => "subsubsection",
    }
}

fn render_list(ordered: bool, items: &[String]) -> String {
    let env = if ordered { "enumerate" } else { "itemize" };
    let mut out = format!("\\begin{{{env}}}\n");
    for item in items {
        out.push_str(&format!("\\item {}\n", markdown_to_latex_inline(item)));
    }
    out.push_str(&format!("\\end{{{env}}}"));
    out
}

fn asset_path(src: &str, cfg: &LatexWriterConfig) -> String {
    match src.strip_prefix(&cfg.asset_scheme) {
        Some(key) => format!("{}{}", cfg.asset_dir, key),
        None => src.to_string(),
    }
}

fn parse_pct(s: &str) -> Option<f64> {
    s.trim().strip_suffix('%')?.trim().parse::<f64>().ok().map(|v| v / 100.0)
}

fn register_color(value: &str, colors: &mut Vec<(String, String)>) -> String {
    let hex = value.trim_start_matches('#').to_string();
    if let Some((name, _)) = colors.iter().find(|(_, h)| h == &hex) {
        return name.clone();
    }
    let name = format!("zxcolor{}", colors.len());
    colors.push((name.clone(), hex));
    name
}

fn wrap_border(include: String, attrs: &AttrMap, colors: &mut Vec<(String, String)>) -> String {
    let Some(bw) = attrs.kv.get("borderWidth") else { return include };
    if bw.trim() == "0" {
        return include;
    }
    let color_name = attrs
        .kv
        .get("borderColor")
        .map(|c| register_color(c, colors))
        .unwrap_or_else(|| "black".to_string());
    format!(
        "{{\\setlength{{\\fboxsep}}{{0pt}}\\setlength{{\\fboxrule}}{{{bw}pt}}\\fcolorbox{{{color_name}}}{{white}}{{{include}}}}}"
    )
}

fn render_figure(
    src: &str,
    caption: &str,
    label: Option<&str>,
    source: &Option<SourceSpan>,
    cfg: &LatexWriterConfig,
    colors: &mut Vec<(String, String)>,
) -> String {
    let attrs = figure_attrs_from_source(source);
    let path = asset_path(src, cfg);
    let placement = attrs.kv.get("placement").map(String::as_str).unwrap_or("block");
    let align = attrs.kv.get("align").map(String::as_str).unwrap_or("left");
    let width_pct = attrs.kv.get("width").and_then(|w| parse_pct(w));

    let width_tok = if placement == "inline" {
        "\\linewidth".to_string()
    } else {
        format!("{:.3}\\textwidth", width_pct.unwrap_or(1.0))
    };
    let include = format!("\\includegraphics[width={width_tok}]{{\\detokenize{{{path}}}}}");
    let include = wrap_border(include, &attrs, colors);

    if placement == "inline" && align != "center" {
        let side = if align == "right" { "r" } else { "l" };
        let dim = format!("{:.3}\\linewidth", width_pct.unwrap_or(0.4));
        let align_cmd = if align == "right" { "\\raggedleft" } else { "\\raggedright" };
        let mut out = format!("\\begin{{wrapfigure}}{{{side}}}{{{dim}}}\n{align_cmd}\n{include}\n");
        if !caption.is_empty() {
            out.push_str(&format!("\\caption{{{}}}\n", markdown_to_latex_inline(caption)));
        }
        if let Some(l) = label {
            if !l.is_empty() {
                out.push_str(&format!("\\label{{fig:{l}}}\n"));
            }
        }
        out.push_str("\\end{wrapfigure}");
        out
    } else {
        let mut out = String::from("\\begin{figure}[h]\n");
        match align {
            "center" => out.push_str("\\centering\n"),
            "right" => out.push_str("\\raggedleft\n"),
            _ => {}
        }
        out.push_str(&include);
        out.push('\n');
        if !caption.is_empty() {
            out.push_str(&format!("\\caption{{{}}}\n", markdown_to_latex_inline(caption)));
        }
        if let Some(l) = label {
            if !l.is_empty() {
                out.push_str(&format!("\\label{{fig:{l}}}\n"));
            }
        }
        out.push_str("\\end{figure}");
        out
    }
}

fn render_table(node: &IrNode, _cfg: &LatexWriterConfig, colors: &mut Vec<(String, String)>) -> String {
    let IrNode::Table {
        header,
        rows,
        caption,
        label,
        col_align,
        v_rules,
        h_rules,
        style,
        ..
    } = node
    else {
        return String::new();
    };

    let ncols = header.len().max(rows.first().map(|r| r.len()).unwrap_or(0)).max(1);
    let col_spec = build_tabularx_colspec(ncols, col_align.as_deref(), v_rules.as_deref());
    let border_disabled = style.as_ref().and_then(|s| s.border_width_px).map(|w| w == 0).unwrap_or(false);

    let hrule_at = |idx: usize| -> String {
        if border_disabled {
            return String::new();
        }
        match h_rules.as_deref().and_then(|r| r.get(idx)).copied() {
            Some(Rule::Single) => "\\hline\n".to_string(),
            Some(Rule::Double) => "\\hline \\hline\n".to_string(),
            _ => String::new(),
        }
    };

    let mut body = String::new();
    body.push_str(&hrule_at(0));
    let mut next_rule_idx = 1;
    if !header.is_empty() {
        body.push_str(
            &header.iter().map(|c| markdown_to_latex_inline(c)).collect::<Vec<_>>().join(" & "),
        );
        body.push_str(" \\\\\n");
        body.push_str(&hrule_at(next_rule_idx));
        next_rule_idx += 1;
    }
    for row in rows {
        body.push_str(&row.iter().map(|c| markdown_to_latex_inline(c)).collect::<Vec<_>>().join(" & "));
        body.push_str(" \\\\\n");
        body.push_str(&hrule_at(next_rule_idx));
        next_rule_idx += 1;
    }

    let mut rule_setup = String::new();
    if !border_disabled {
        if let Some(s) = style {
            if let Some(w) = s.border_width_px {
                rule_setup.push_str(&format!("\\setlength{{\\arrayrulewidth}}{{{w}pt}}\n"));
            }
            if let Some(c) = &s.border_color {
                let name = register_color(c, colors);
                rule_setup.push_str(&format!("\\arrayrulecolor{{{name}}}\n"));
            }
        }
    }

    let mut out = String::from("\\begin{table}[h]\n\\centering\n");
    out.push_str(&rule_setup);
    out.push_str(&format!("\\begin{{tabularx}}{{\\linewidth}}{{{col_spec}}}\n"));
    out.push_str(&body);
    out.push_str("\\end{tabularx}\n");
    if let Some(cap) = caption {
        if !cap.is_empty() {
            out.push_str(&format!("\\caption{{{}}}\n", markdown_to_latex_inline(cap)));
        }
    }
    if let Some(l) = label {
        if !l.is_empty() {
            out.push_str(&format!("\\label{{tbl:{l}}}\n"));
        }
    }
    out.push_str("\\end{table}");
    out
}

fn build_tabularx_colspec(ncols: usize, col_align: Option<&[Align]>, v_rules: Option<&[Rule]>) -> String {
    let v = |idx: usize| -> &'static str {
        match v_rules.and_then(|r| r.get(idx)).copied() {
            Some(Rule::Single) => "|",
            Some(Rule::Double) => "||",
            _ => "",
        }
    };
    let mut out = String::from(v(0));
    for i in 0..ncols {
        let spec = match col_align.and_then(|a| a.get(i)).copied() {
            Some(Align::Center) => ">{\\centering\\arraybackslash}X",
            Some(Align::Right) => ">{\\raggedleft\\arraybackslash}X",
            _ => ">{\\raggedright\\arraybackslash}X",
        };
        out.push_str(spec);
        out.push_str(v(i + 1));
    }
    out
}

fn render_grid(node: &IrNode, cfg: &LatexWriterConfig, colors: &mut Vec<(String, String)>) -> String {
    let IrNode::Grid {
        cols,
        caption,
        label,
        align,
        placement,
        margin,
        rows,
        ..
    } = node
    else {
        return String::new();
    };
    let ncols = cols.unwrap_or_else(|| rows.first().map(|r| r.len()).unwrap_or(1)).max(1);

    if is_figure_only_grid(rows) {
        render_figure_only_grid(
            ncols,
            *align,
            *placement,
            margin.unwrap_or(Margin::Medium),
            caption.as_deref(),
            label.as_deref(),
            rows,
            cfg,
        )
    } else {
        render_mixed_grid(ncols, caption.as_deref(), label.as_deref(), rows, cfg, colors)
    }
}

fn subfig_width(ncols: usize) -> f64 {
    (0.95 / ncols as f64).min(0.95)
}

fn wrapfig_width(ncols: usize) -> f64 {
    match ncols {
        2 => 0.55,
        3 => 0.80,
        _ => 0.95,
    }
}

fn margin_em(m: Margin) -> f64 {
    match m {
        Margin::Small => 0.5,
        Margin::Medium => 1.0,
        Margin::Large => 2.0,
    }
}

fn render_figure_only_grid(
    ncols: usize,
    align: Option<GridAlign>,
    placement: Option<Placement>,
    margin: Margin,
    caption: Option<&str>,
    label: Option<&str>,
    rows: &[Vec<GridCell>],
    cfg: &LatexWriterConfig,
) -> String {
    let width = subfig_width(ncols);
    let row_gap = margin_em(margin);
    let mut body = String::new();
    for (ri, row) in rows.iter().enumerate() {
        for cell in row {
            if let Some(IrNode::Figure { src, caption: fig_cap, label: fig_label, .. }) = cell.children.first() {
                let path = asset_path(src, cfg);
                body.push_str(&format!(
                    "\\begin{{subfigure}}[t]{{{width:.3}\\textwidth}}\n\\centering\n\\includegraphics[width=0.95\\linewidth]{{\\detokenize{{{path}}}}}\n"
                ));
                if !fig_cap.is_empty() {
                    body.push_str(&format!("\\caption{{{}}}\n", markdown_to_latex_inline(fig_cap)));
                }
                if let Some(l) = fig_label {
                    if !l.is_empty() {
                        body.push_str(&format!("\\label{{fig:{l}}}\n"));
                    }
                }
                body.push_str("\\end{subfigure}\n");
            }
        }
        if ri + 1 < rows.len() {
            body.push_str(&format!("\\\\[{row_gap}em]\n"));
        }
    }

    let inline_side = match (placement, align) {
        (Some(Placement::Inline), Some(GridAlign::Right)) => Some("r"),
        (Some(Placement::Inline), _) => Some("l"),
        _ => None,
    };

    let mut out = String::new();
    if let Some(side) = inline_side {
        let w = wrapfig_width(ncols);
        out.push_str(&format!("\\begin{{wrapfigure}}{{{side}}}{{{w:.2}\\textwidth}}\n\\centering\n{body}"));
        push_caption_label(&mut out, caption, label, "fig");
        out.push_str("\\end{wrapfigure}");
    } else {
        out.push_str(&format!("\\begin{{figure}}[h]\n\\centering\n{body}"));
        push_caption_label(&mut out, caption, label, "fig");
        out.push_str("\\end{figure}");
    }
    out
}

fn render_mixed_grid(
    ncols: usize,
    caption: Option<&str>,
    label: Option<&str>,
    rows: &[Vec<GridCell>],
    cfg: &LatexWriterConfig,
    colors: &mut Vec<(String, String)>,
) -> String {
    let col_spec = "X".repeat(ncols);
    let mut body = String::new();
    for row in rows {
        let cells: Vec<String> = row.iter().map(|cell| render_grid_cell(cell, cfg, colors)).collect();
        body.push_str(&cells.join(" & "));
        body.push_str(" \\\\\n");
    }
    let inner = format!("\\begin{{tabularx}}{{\\linewidth}}{{{col_spec}}}\n{body}\\end{{tabularx}}");

    if caption.is_some() || label.is_some() {
        let mut out = String::from("\\begin{table}[h]\n\\centering\n");
        out.push_str(&inner);
        out.push('\n');
        push_caption_label(&mut out, caption, label, "tbl");
        out.push_str("\\end{table}");
        out
    } else {
        inner
    }
}

fn render_grid_cell(cell: &GridCell, cfg: &LatexWriterConfig, colors: &mut Vec<(String, String)>) -> String {
    let mut out = String::from("\\begin{minipage}[t]{\\linewidth}\n");
    for child in &cell.children {
        if let IrNode::Figure { src, caption, .. } = child {
            let path = asset_path(src, cfg);
            out.push_str(&format!("\\includegraphics[width=\\linewidth]{{\\detokenize{{{path}}}}}\n"));
            if !caption.is_empty() {
                out.push_str(&format!("\\captionof{{figure}}{{{}}}\n", markdown_to_latex_inline(caption)));
            }
        } else {
            out.push_str(&render_block(child, cfg, colors));
            out.push('\n');
        }
    }
    out.push_str("\\end{minipage}");
    out
}

fn push_caption_label(out: &mut String, caption: Option<&str>, label: Option<&str>, label_kind: &str) {
    if let Some(cap) = caption {
        if !cap.is_empty() {
            out.push_str(&format!("\\caption{{{}}}\n", markdown_to_latex_inline(cap)));
        }
    }
    if let Some(l) = label {
        if !l.is_empty() {
            out.push_str(&format!("\\label{{{label_kind}:{l}}}\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(children: Vec<IrNode>) -> IrNode {
        IrNode::Document { id: "root".to_string(), doc_id: "d1".to_string(), children }
    }

    #[test]
    fn emits_documentclass_and_document_environment() {
        let tree = doc(vec![IrNode::Paragraph {
            id: "p0".to_string(),
            text: "hello".to_string(),
            style: None,
            source: None,
        }]);
        let out = render_latex(&tree, &LatexWriterConfig::default());
        assert!(out.starts_with("\\documentclass{article}\n"));
        assert!(out.contains("\\begin{document}"));
        assert!(out.contains("\\end{document}"));
        assert!(out.contains("hello"));
        assert!(!out.contains("graphicx"));
    }

    #[test]
    fn title_triggers_maketitle_and_preamble_macro() {
        let tree = doc(vec![
            IrNode::DocumentTitle { id: "t0".to_string(), text: "Report".to_string(), source: None },
            IrNode::Paragraph { id: "p0".to_string(), text: "body".to_string(), style: None, source: None },
        ]);
        let out = render_latex(&tree, &LatexWriterConfig::default());
        assert!(out.contains("\\title{Report}"));
        assert!(out.contains("\\maketitle"));
    }

    #[test]
    fn figure_triggers_graphicx_and_includegraphics() {
        let tree = doc(vec![IrNode::Figure {
            id: "f0".to_string(),
            src: "zadoox-asset://img1".to_string(),
            caption: "A cat".to_string(),
            label: None,
            source: Some(SourceSpan { start_offset: 0, end_offset: 0, block_index: 0, raw: "![A cat](zadoox-asset://img1)".to_string() }),
        }]);
        let out = render_latex(&tree, &LatexWriterConfig::default());
        assert!(out.contains("\\usepackage{graphicx}"));
        assert!(out.contains("\\detokenize{assets/img1}"));
        assert!(out.contains("\\caption{A cat}"));
    }

    #[test]
    fn section_levels_map_to_section_commands() {
        let tree = doc(vec![IrNode::Section {
            id: "s0".to_string(),
            level: 2,
            title: "Sub".to_string(),
            children: vec![],
            source: None,
        }]);
        let out = render_latex(&tree, &LatexWriterConfig::default());
        assert!(out.contains("\\subsection{Sub}"));
    }

    #[test]
    fn raw_xmd_block_becomes_comment_lines() {
        let tree = doc(vec![IrNode::RawXmdBlock {
            id: "r0".to_string(),
            xmd: "line one\nline two".to_string(),
            source: None,
        }]);
        let out = render_latex(&tree, &LatexWriterConfig::default());
        assert!(out.contains("% line one"));
        assert!(out.contains("% line two"));
    }
}
