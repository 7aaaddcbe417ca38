//! C3: builds the stable IR tree from the token stream produced by the
//! tokenizer (C2). Never throws — malformed or unrecognized constructs
//! degrade to `RawXmdBlock` per P9.

use std::collections::HashMap;

use xmd_core::{stable_node_id, Align, BorderStyle, GridAlign, GridCell, IrNode, Margin, Placement, SourceSpan};

use crate::attrs::{self, AttrMap};
use crate::block::{Block, BlockKind};
use crate::directive::{parse_table_body, split_grid_body};
use crate::tokenizer::tokenize;

/// Parses a complete XMD document into its root `Document` IR node.
pub fn parse_xmd(doc_id: &str, xmd: &str) -> IrNode {
    let normalized = xmd_core::normalize_newlines(xmd);
    let blocks = tokenize(&normalized);

    let mut doc_children: Vec<IrNode> = Vec::new();
    let mut doc_counters = Counters::default();
    let mut stack: Vec<OpenSection> = Vec::new();

    for block in &blocks {
        match &block.kind {
            BlockKind::Title(text) => push_doc_marker(
                doc_id,
                &mut doc_counters,
                &mut doc_children,
                "document_title",
                "title",
                text.clone(),
                block,
            ),
            BlockKind::Author(text) => push_doc_marker(
                doc_id,
                &mut doc_counters,
                &mut doc_children,
                "document_author",
                "author",
                text.clone(),
                block,
            ),
            BlockKind::Date(text) => push_doc_marker(
                doc_id,
                &mut doc_counters,
                &mut doc_children,
                "document_date",
                "date",
                text.clone(),
                block,
            ),
            BlockKind::Heading { level, text } => {
                while let Some(top) = stack.last() {
                    if top.level >= *level {
                        let finished = stack.pop().expect("non-empty").into_node();
                        append_to_parent(&mut stack, &mut doc_children, finished);
                    } else {
                        break;
                    }
                }
                let prefix = current_prefix(&stack);
                let counters = current_counters_mut(&mut stack, &mut doc_counters);
                let idx = counters.next("section");
                let path = join_path(&prefix, &format!("sec[{idx}]"));
                let id = stable_node_id(doc_id, "section", &path);
                stack.push(OpenSection {
                    id,
                    level: *level,
                    title: text.clone(),
                    prefix: path,
                    children: Vec::new(),
                    counters: Counters::default(),
                    source: Some(span_from(block)),
                });
            }
            _ => {
                let prefix = current_prefix(&stack);
                let counters = current_counters_mut(&mut stack, &mut doc_counters);
                let node = build_leaf(doc_id, &block.kind, block, counters, &prefix, false);
                append_to_parent(&mut stack, &mut doc_children, node);
            }
        }
    }

    while let Some(top) = stack.pop() {
        let finished = top.into_node();
        append_to_parent(&mut stack, &mut doc_children, finished);
    }

    IrNode::Document {
        id: stable_node_id(doc_id, "document", ""),
        doc_id: doc_id.to_string(),
        children: doc_children,
    }
}

/// Per-type child-index counters for one structural frame (document root or
/// an open section), mirroring the `(docId, nodeType, path)` scheme in §4.1.
#[derive(Default)]
struct Counters(HashMap<&'static str, usize>);

impl Counters {
    fn next(&mut self, kind: &'static str) -> usize {
        let entry = self.0.entry(kind).or_insert(0);
        let v = *entry;
        *entry += 1;
        v
    }
}

struct OpenSection {
    id: String,
    level: u8,
    title: String,
    prefix: String,
    children: Vec<IrNode>,
    counters: Counters,
    source: Option<SourceSpan>,
}

impl OpenSection {
    fn into_node(self) -> IrNode {
        IrNode::Section {
            id: self.id,
            level: self.level,
            title: self.title,
            children: self.children,
            source: self.source,
        }
    }
}

fn current_prefix(stack: &[OpenSection]) -> String {
    stack.last().map(|s| s.prefix.clone()).unwrap_or_default()
}

fn current_counters_mut<'a>(stack: &'a mut [OpenSection], doc_counters: &'a mut Counters) -> &'a mut Counters {
    if let Some(top) = stack.last_mut() {
        &mut top.counters
    } else {
        doc_counters
    }
}

fn append_to_parent(stack: &mut [OpenSection], doc_children: &mut Vec<IrNode>, node: IrNode) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    } else {
        doc_children.push(node);
    }
}

fn join_path(prefix: &str, leaf: &str) -> String {
    if prefix.is_empty() {
        leaf.to_string()
    } else {
        format!("{prefix}/{leaf}")
    }
}

fn span_from(block: &Block) -> SourceSpan {
    SourceSpan {
        start_offset: block.start_offset,
        end_offset: block.end_offset,
        block_index: block.block_index,
        raw: block.raw.clone(),
    }
}

fn push_doc_marker(
    doc_id: &str,
    counters: &mut Counters,
    doc_children: &mut Vec<IrNode>,
    node_type: &'static str,
    leaf: &str,
    text: String,
    block: &Block,
) {
    let idx = counters.next(node_type);
    let path = format!("{leaf}[{idx}]");
    let id = stable_node_id(doc_id, node_type, &path);
    let source = Some(span_from(block));
    let node = match node_type {
        "document_title" => IrNode::DocumentTitle { id, text, source },
        "document_author" => IrNode::DocumentAuthor { id, text, source },
        "document_date" => IrNode::DocumentDate { id, text, source },
        _ => unreachable!("only called for document-level marker kinds"),
    };
    doc_children.push(node);
}

/// Builds a leaf (non-container, non-section) IR node for one block.
/// `restricted` is set while building a grid cell's children, where
/// section/title/author/date/grid are forbidden (I5) and degrade to
/// `RawXmdBlock`.
fn build_leaf(
    doc_id: &str,
    kind: &BlockKind,
    block: &Block,
    counters: &mut Counters,
    prefix: &str,
    restricted: bool,
) -> IrNode {
    match kind {
        BlockKind::Paragraph(text) => leaf_node(doc_id, counters, prefix, "paragraph", "p", block, |id, source| {
            IrNode::Paragraph {
                id,
                text: text.clone(),
                style: None,
                source,
            }
        }),
        BlockKind::List { ordered, items } => {
            leaf_node(doc_id, counters, prefix, "list", "list", block, |id, source| IrNode::List {
                id,
                ordered: *ordered,
                items: items.clone(),
                source,
            })
        }
        BlockKind::CodeFence { language, code } => {
            leaf_node(doc_id, counters, prefix, "code_block", "code_block", block, |id, source| {
                IrNode::CodeBlock {
                    id,
                    language: language.clone(),
                    code: code.clone(),
                    source,
                }
            })
        }
        BlockKind::MathBlock { latex } => {
            leaf_node(doc_id, counters, prefix, "math_block", "math_block", block, |id, source| {
                IrNode::MathBlock {
                    id,
                    latex: latex.clone(),
                    source,
                }
            })
        }
        BlockKind::Figure { alt, url, attrs_raw } => {
            let label = attrs_raw
                .as_ref()
                .and_then(|a| attrs::parse_attrs(a).label.clone());
            leaf_node(doc_id, counters, prefix, "figure", "fig", block, |id, source| IrNode::Figure {
                id,
                src: url.clone(),
                caption: alt.clone(),
                label,
                source,
            })
        }
        BlockKind::Raw(text) => leaf_node(doc_id, counters, prefix, "raw_xmd_block", "raw_xmd_block", block, |id, source| {
            IrNode::RawXmdBlock {
                id,
                xmd: text.clone(),
                source,
            }
        }),
        BlockKind::Directive { name, args, body } => {
            build_directive(doc_id, counters, prefix, name.as_deref(), args, body, block, restricted)
        }
        BlockKind::Heading { .. } | BlockKind::Title(_) | BlockKind::Author(_) | BlockKind::Date(_) => {
            if restricted {
                raw_fallback(doc_id, counters, prefix, block)
            } else {
                unreachable!("heading/title/author/date are handled by the caller's section stack")
            }
        }
    }
}

fn leaf_node(
    doc_id: &str,
    counters: &mut Counters,
    prefix: &str,
    node_type: &'static str,
    leaf: &str,
    block: &Block,
    build: impl FnOnce(String, Option<SourceSpan>) -> IrNode,
) -> IrNode {
    let idx = counters.next(node_type);
    let path = join_path(prefix, &format!("{leaf}[{idx}]"));
    let id = stable_node_id(doc_id, node_type, &path);
    build(id, Some(span_from(block)))
}

fn raw_fallback(doc_id: &str, counters: &mut Counters, prefix: &str, block: &Block) -> IrNode {
    tracing::debug!(doc_id, prefix, "block did not parse into a recognized node, falling back to raw");
    leaf_node(doc_id, counters, prefix, "raw_xmd_block", "raw_xmd_block", block, |id, source| {
        IrNode::RawXmdBlock {
            id,
            xmd: block.raw.clone(),
            source,
        }
    })
}

fn build_directive(
    doc_id: &str,
    counters: &mut Counters,
    prefix: &str,
    name: Option<&str>,
    args: &str,
    body: &str,
    block: &Block,
    restricted: bool,
) -> IrNode {
    match name {
        Some("equation") => leaf_node(doc_id, counters, prefix, "math_block", "math_block", block, |id, source| {
            IrNode::MathBlock {
                id,
                latex: body.trim().to_string(),
                source,
            }
        }),
        Some("figure") => {
            let attrs = attrs::parse_attrs(args);
            let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());
            let src = lines.next().unwrap_or_default().to_string();
            let caption = lines.collect::<Vec<_>>().join(" ");
            leaf_node(doc_id, counters, prefix, "figure", "fig", block, |id, source| IrNode::Figure {
                id,
                src,
                caption,
                label: attrs.label.clone(),
                source,
            })
        }
        Some("table") => {
            let attrs = attrs::parse_attrs(args);
            let parsed = parse_table_body(body);
            let style = border_style(&attrs);
            leaf_node(doc_id, counters, prefix, "table", "tbl", block, move |id, source| IrNode::Table {
                id,
                header: parsed.header,
                rows: parsed.rows,
                caption: attrs.get("caption").map(str::to_string),
                label: attrs.label,
                col_align: opt_vec(parsed.col_align),
                v_rules: opt_vec(parsed.v_rules),
                h_rules: opt_vec(parsed.h_rules),
                style,
                source,
            })
        }
        None if !args.trim().is_empty() => {
            if restricted {
                return raw_fallback(doc_id, counters, prefix, block);
            }
            let attrs = attrs::parse_attrs(args);
            let cols: Option<usize> = attrs.get("cols").and_then(|v| v.parse().ok());
            let grid_rows = split_grid_body(body);
            let idx = counters.next("grid");
            let grid_path = join_path(prefix, &format!("grid[{idx}]"));
            let id = stable_node_id(doc_id, "grid", &grid_path);
            let mut rows = Vec::with_capacity(grid_rows.len());
            for (r, row) in grid_rows.iter().enumerate() {
                let mut cells = Vec::with_capacity(row.len());
                for (c, cell_text) in row.iter().enumerate() {
                    let cell_prefix = format!("{grid_path}/row[{r}]/cell[{c}]");
                    let cell_blocks = tokenize(cell_text);
                    let children = parse_cell_blocks(doc_id, &cell_prefix, &cell_blocks);
                    cells.push(GridCell { children });
                }
                rows.push(cells);
            }
            let style = border_style(&attrs);
            IrNode::Grid {
                id,
                cols,
                caption: attrs.get("caption").map(str::to_string),
                label: attrs.label,
                align: grid_align(&attrs),
                placement: placement(&attrs),
                margin: margin(&attrs),
                style,
                rows,
                source: Some(span_from(block)),
            }
        }
        _ => raw_fallback(doc_id, counters, prefix, block),
    }
}

/// Builds the children of a single grid cell. Per I5, cells can never
/// contain sections, document titles/authors/dates, or nested grids —
/// violating blocks are lowered to `RawXmdBlock` instead of recursing.
fn parse_cell_blocks(doc_id: &str, cell_prefix: &str, blocks: &[Block]) -> Vec<IrNode> {
    let mut counters = Counters::default();
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        let node = build_leaf(doc_id, &block.kind, block, &mut counters, cell_prefix, true);
        out.push(node);
    }
    out
}

fn opt_vec<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

fn border_style(attrs: &AttrMap) -> Option<BorderStyle> {
    let border_style = attrs.get("borderStyle").map(str::to_string);
    let border_color = attrs.get("borderColor").map(str::to_string);
    let border_width_px = attrs.get("borderWidth").and_then(|v| v.parse().ok());
    if border_style.is_none() && border_color.is_none() && border_width_px.is_none() {
        None
    } else {
        Some(BorderStyle {
            border_style,
            border_color,
            border_width_px,
        })
    }
}

fn grid_align(attrs: &AttrMap) -> Option<GridAlign> {
    match attrs.get("align") {
        Some("left") => Some(GridAlign::Left),
        Some("center") => Some(GridAlign::Center),
        Some("right") => Some(GridAlign::Right),
        Some("full") => Some(GridAlign::Full),
        _ => None,
    }
}

fn placement(attrs: &AttrMap) -> Option<Placement> {
    match attrs.get("placement") {
        Some("inline") => Some(Placement::Inline),
        Some("block") => Some(Placement::Block),
        _ => None,
    }
}

fn margin(attrs: &AttrMap) -> Option<Margin> {
    match attrs.get("margin") {
        Some("small") => Some(Margin::Small),
        Some("medium") => Some(Margin::Medium),
        Some("large") => Some(Margin::Large),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmd_core::walk;

    fn type_counts(root: &IrNode) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for node in walk(root) {
            *counts.entry(node.node_type()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn empty_document_has_no_children() {
        let doc = parse_xmd("doc1", "");
        match doc {
            IrNode::Document { children, .. } => assert!(children.is_empty()),
            _ => panic!("expected Document"),
        }
    }

    #[test]
    fn title_author_date_attach_to_document_root() {
        let src = "@Title Text\n@^Author Name\n@=2024-01-01\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].node_type(), "document_title");
        assert_eq!(children[1].node_type(), "document_author");
        assert_eq!(children[2].node_type(), "document_date");
    }

    #[test]
    fn headings_nest_sections_by_level() {
        let src = "# One\npara1\n## Two\npara2\n# Three\npara3\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        assert_eq!(children.len(), 2, "two top-level sections (One, Three)");
        match &children[0] {
            IrNode::Section { title, children, level, .. } => {
                assert_eq!(title, "One");
                assert_eq!(*level, 1);
                assert_eq!(children.len(), 2, "paragraph + nested section Two");
                assert_eq!(children[1].node_type(), "section");
            }
            _ => panic!("expected Section"),
        }
    }

    #[test]
    fn deeper_heading_after_shallow_closes_frames_correctly() {
        let src = "# A\n## B\n### C\n## D\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        assert_eq!(children.len(), 1);
        match &children[0] {
            IrNode::Section { children, .. } => {
                // B (with C nested) and D are siblings under A
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].node_type(), "section");
                assert_eq!(children[1].node_type(), "section");
            }
            _ => panic!("expected Section"),
        }
    }

    #[test]
    fn node_ids_are_stable_across_identical_parses() {
        let src = "# Heading\nSome paragraph text.\n";
        let a = parse_xmd("doc1", src);
        let b = parse_xmd("doc1", src);
        assert_eq!(a.id(), b.id());
        let (a_children, b_children) = match (&a, &b) {
            (IrNode::Document { children: ac, .. }, IrNode::Document { children: bc, .. }) => (ac, bc),
            _ => panic!("expected Document"),
        };
        assert_eq!(a_children[0].id(), b_children[0].id());
    }

    #[test]
    fn equation_directive_becomes_math_block() {
        let src = ":::equation\nx = y^2\n:::\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        assert_eq!(children.len(), 1);
        match &children[0] {
            IrNode::MathBlock { latex, .. } => assert_eq!(latex, "x = y^2"),
            other => panic!("expected MathBlock, got {:?}", other.node_type()),
        }
    }

    #[test]
    fn table_directive_parses_into_table_node() {
        let src = ":::table caption=\"Results\"\n|L|C|\n| A | B |\n| --- | --- |\n| 1 | 2 |\n:::\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        match &children[0] {
            IrNode::Table { header, rows, caption, .. } => {
                assert_eq!(header, &vec!["A".to_string(), "B".to_string()]);
                assert_eq!(rows, &vec![vec!["1".to_string(), "2".to_string()]]);
                assert_eq!(caption.as_deref(), Some("Results"));
            }
            other => panic!("expected Table, got {:?}", other.node_type()),
        }
    }

    #[test]
    fn anonymous_directive_with_args_becomes_grid() {
        let src = "::: cols=2\nLeft cell\n|||\nRight cell\n:::\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        match &children[0] {
            IrNode::Grid { cols, rows, .. } => {
                assert_eq!(*cols, Some(2));
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].len(), 2);
            }
            other => panic!("expected Grid, got {:?}", other.node_type()),
        }
    }

    #[test]
    fn grid_cell_containing_heading_degrades_to_raw_block() {
        let src = "::: cols=1\n# Not Allowed\n:::\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        match &children[0] {
            IrNode::Grid { rows, .. } => {
                assert_eq!(rows[0][0].children.len(), 1);
                assert_eq!(rows[0][0].children[0].node_type(), "raw_xmd_block");
            }
            other => panic!("expected Grid, got {:?}", other.node_type()),
        }
    }

    #[test]
    fn unknown_directive_name_degrades_to_raw_block() {
        let src = ":::mystery\nsome body\n:::\n";
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        assert_eq!(children[0].node_type(), "raw_xmd_block");
    }

    #[test]
    fn markdown_figure_line_produces_figure_node_with_caption_from_alt() {
        let src = r#"![A caption](zadoox-asset://img.png){#fig:demo align="right"}"#;
        let doc = parse_xmd("doc1", src);
        let children = match &doc {
            IrNode::Document { children, .. } => children,
            _ => panic!("expected Document"),
        };
        match &children[0] {
            IrNode::Figure { caption, label, src, .. } => {
                assert_eq!(caption, "A caption");
                assert_eq!(label.as_deref(), Some("demo"));
                assert_eq!(src, "zadoox-asset://img.png");
            }
            other => panic!("expected Figure, got {:?}", other.node_type()),
        }
    }

    #[test]
    fn never_panics_across_a_representative_mixed_document() {
        let src = "@Title Demo\n# Intro\nSome para.\n:::equation\nx\n:::\n:::table\n| A |\n| --- |\n| 1 |\n:::\n::: cols=2\nL\n|||\nR\n:::\n:::bogus\nfoo\n:::\n";
        let doc = parse_xmd("doc1", src);
        let counts = type_counts(&doc);
        assert!(counts.get("math_block").copied().unwrap_or(0) >= 1);
        assert!(counts.get("table").copied().unwrap_or(0) >= 1);
        assert!(counts.get("grid").copied().unwrap_or(0) >= 1);
        assert!(counts.get("raw_xmd_block").copied().unwrap_or(0) >= 1);
    }
}
