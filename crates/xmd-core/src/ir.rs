//! The tagged-union intermediate representation (IR) and its hashing rules.
//!
//! `IrNode` models every node variant from the data model as a single enum;
//! containers (`Document`, `Section`, `Grid`) own their children as ordered
//! `Vec<IrNode>`. Cross-references (figure labels, etc.) are by id through
//! an index, never by pointer — the tree has no cycles.

use crate::hash::content_hash_of;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A byte-offset span into the original source, carried for editor anchoring
/// and to preserve attribute text the structural IR does not model directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start_offset: usize,
    pub end_offset: usize,
    pub block_index: usize,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridAlign {
    Left,
    Center,
    Right,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Inline,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Margin {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    None,
    Single,
    Double,
}

/// Paragraph-level presentation hints (§3 `Paragraph.style`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    pub align: Option<Align>,
    pub color: Option<String>,
    pub size: Option<TextSize>,
}

/// Border styling shared by tables and grids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub border_style: Option<String>,
    pub border_color: Option<String>,
    pub border_width_px: Option<u32>,
}

/// A single cell in a `Grid`, owning its own IR subtree (I5 bounds what may
/// legally appear here; the parser lowers violating content to
/// `RawXmdBlock` before it reaches this type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub children: Vec<IrNode>,
}

/// The tagged-union IR node. Every variant carries an `id` (stable per I1/I2)
/// and an optional `source` span; container variants additionally own their
/// children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum IrNode {
    Document {
        id: String,
        doc_id: String,
        children: Vec<IrNode>,
    },
    Section {
        id: String,
        level: u8,
        title: String,
        children: Vec<IrNode>,
        source: Option<SourceSpan>,
    },
    DocumentTitle {
        id: String,
        text: String,
        source: Option<SourceSpan>,
    },
    DocumentAuthor {
        id: String,
        text: String,
        source: Option<SourceSpan>,
    },
    DocumentDate {
        id: String,
        text: String,
        source: Option<SourceSpan>,
    },
    Paragraph {
        id: String,
        text: String,
        style: Option<ParagraphStyle>,
        source: Option<SourceSpan>,
    },
    List {
        id: String,
        ordered: bool,
        items: Vec<String>,
        source: Option<SourceSpan>,
    },
    CodeBlock {
        id: String,
        language: Option<String>,
        code: String,
        source: Option<SourceSpan>,
    },
    MathBlock {
        id: String,
        latex: String,
        source: Option<SourceSpan>,
    },
    Figure {
        id: String,
        src: String,
        caption: String,
        label: Option<String>,
        source: Option<SourceSpan>,
    },
    Table {
        id: String,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        caption: Option<String>,
        label: Option<String>,
        col_align: Option<Vec<Align>>,
        v_rules: Option<Vec<Rule>>,
        h_rules: Option<Vec<Rule>>,
        style: Option<BorderStyle>,
        source: Option<SourceSpan>,
    },
    Grid {
        id: String,
        cols: Option<usize>,
        caption: Option<String>,
        label: Option<String>,
        align: Option<GridAlign>,
        placement: Option<Placement>,
        margin: Option<Margin>,
        style: Option<BorderStyle>,
        rows: Vec<Vec<GridCell>>,
        source: Option<SourceSpan>,
    },
    RawXmdBlock {
        id: String,
        xmd: String,
        source: Option<SourceSpan>,
    },
    RawLatexBlock {
        id: String,
        latex: String,
        source: Option<SourceSpan>,
    },
}

impl IrNode {
    pub fn id(&self) -> &str {
        match self {
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
            | IrNode::RawLatexBlock { id, .. } => id,
        }
    }

    /// The node-type leaf name used in structural paths and ids (I2).
    pub fn node_type(&self) -> &'static str {
        match self {
            IrNode::Document { .. } => "document",
            IrNode::Section { .. } => "section",
            IrNode::DocumentTitle { .. } => "document_title",
            IrNode::DocumentAuthor { .. } => "document_author",
            IrNode::DocumentDate { .. } => "document_date",
            IrNode::Paragraph { .. } => "paragraph",
            IrNode::List { .. } => "list",
            IrNode::CodeBlock { .. } => "code_block",
            IrNode::MathBlock { .. } => "math_block",
            IrNode::Figure { .. } => "figure",
            IrNode::Table { .. } => "table",
            IrNode::Grid { .. } => "grid",
            IrNode::RawXmdBlock { .. } => "raw_xmd_block",
            IrNode::RawLatexBlock { .. } => "raw_latex_block",
        }
    }

    /// Direct children of a container node; leaves return an empty slice.
    pub fn children(&self) -> &[IrNode] {
        match self {
            IrNode::Document { children, .. } | IrNode::Section { children, .. } => children,
            _ => &[],
        }
    }

    /// Canonical per-type payload used as hash input (I3: own content only,
    /// never descendants — container children are hashed as their own
    /// nodes during `walk`).
    fn canonical_payload(&self) -> String {
        match self {
            IrNode::Document { doc_id, .. } => format!("document|{doc_id}"),
            IrNode::Section { level, title, .. } => {
                format!("section|{level}|{}", normalize_text(title))
            }
            IrNode::DocumentTitle { text, .. } => {
                format!("document_title|{}", normalize_text(text))
            }
            IrNode::DocumentAuthor { text, .. } => {
                format!("document_author|{}", normalize_text(text))
            }
            IrNode::DocumentDate { text, .. } => format!("document_date|{}", normalize_text(text)),
            IrNode::Paragraph { text, style, .. } => format!(
                "paragraph|{}|{}",
                normalize_text(text),
                style_key(style.as_ref())
            ),
            IrNode::List {
                ordered, items, ..
            } => {
                let joined = items
                    .iter()
                    .map(|i| normalize_text(i))
                    .collect::<Vec<_>>()
                    .join("\u{1}");
                format!("list|{ordered}|{joined}")
            }
            IrNode::CodeBlock { language, code, .. } => {
                format!(
                    "code_block|{}|{}",
                    language.as_deref().unwrap_or(""),
                    trim_end_only(code)
                )
            }
            IrNode::MathBlock { latex, .. } => format!("math_block|{}", normalize_text(latex)),
            IrNode::Figure {
                src,
                caption,
                label,
                source,
                ..
            } => format!(
                "figure|{}|{}|{}|{}",
                src,
                normalize_text(caption),
                label.as_deref().unwrap_or(""),
                source.as_ref().map(|s| s.raw.as_str()).unwrap_or("")
            ),
            IrNode::Table {
                header,
                rows,
                caption,
                label,
                col_align,
                v_rules,
                h_rules,
                style,
                ..
            } => {
                let header_s = header.iter().map(|c| collapse_ws(c)).collect::<Vec<_>>().join("\u{1}");
                let rows_s = rows
                    .iter()
                    .map(|r| r.iter().map(|c| collapse_ws(c)).collect::<Vec<_>>().join("\u{1}"))
                    .collect::<Vec<_>>()
                    .join("\u{2}");
                format!(
                    "table|{header_s}|{rows_s}|{}|{}|{}|{}|{}|{}",
                    caption.as_deref().unwrap_or(""),
                    label.as_deref().unwrap_or(""),
                    debug_opt_vec(col_align),
                    debug_opt_vec(v_rules),
                    debug_opt_vec(h_rules),
                    border_key(style.as_ref())
                )
            }
            IrNode::Grid {
                cols,
                caption,
                label,
                align,
                placement,
                margin,
                style,
                ..
            } => format!(
                "grid|{}|{}|{}|{:?}|{:?}|{:?}|{}",
                cols.map(|c| c.to_string()).unwrap_or_default(),
                caption.as_deref().unwrap_or(""),
                label.as_deref().unwrap_or(""),
                align,
                placement,
                margin,
                border_key(style.as_ref())
            ),
            IrNode::RawXmdBlock { xmd, .. } => format!("raw_xmd_block|{}", normalize_text(xmd)),
            IrNode::RawLatexBlock { latex, .. } => {
                format!("raw_latex_block|{}", normalize_text(latex))
            }
        }
    }
}

fn style_key(style: Option<&ParagraphStyle>) -> String {
    match style {
        None => String::new(),
        Some(s) => format!("{:?}|{}|{:?}", s.align, s.color.as_deref().unwrap_or(""), s.size),
    }
}

fn border_key(style: Option<&BorderStyle>) -> String {
    match style {
        None => String::new(),
        Some(s) => format!(
            "{}|{}|{}",
            s.border_style.as_deref().unwrap_or(""),
            s.border_color.as_deref().unwrap_or(""),
            s.border_width_px.map(|w| w.to_string()).unwrap_or_default()
        ),
    }
}

fn debug_opt_vec<T: std::fmt::Debug>(v: &Option<Vec<T>>) -> String {
    match v {
        None => String::new(),
        Some(items) => format!("{items:?}"),
    }
}

/// Trim trailing whitespace and normalize CRLF/CR to LF.
pub fn normalize_text(s: &str) -> String {
    trim_end_only(&normalize_newlines(s))
}

pub fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_end_only(s: &str) -> String {
    s.trim_end().to_string()
}

/// Collapse runs of inner whitespace to a single space (table cells, §4.1).
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// FNV-1a content hash of a single node's own content (I3).
pub fn content_hash(node: &IrNode) -> String {
    content_hash_of(&node.canonical_payload())
}

/// Depth-first, document-order walk, descending into sections and grid
/// cells (C4).
pub fn walk(root: &IrNode) -> Vec<&IrNode> {
    let mut out = Vec::new();
    walk_into(root, &mut out);
    out
}

fn walk_into<'a>(node: &'a IrNode, out: &mut Vec<&'a IrNode>) {
    out.push(node);
    for child in node.children() {
        walk_into(child, out);
    }
    if let IrNode::Grid { rows, .. } = node {
        for row in rows {
            for cell in row {
                for child in &cell.children {
                    walk_into(child, out);
                }
            }
        }
    }
}

/// An id → node index built from a walk (C4 `build_index`).
pub fn build_index(root: &IrNode) -> HashMap<String, &IrNode> {
    walk(root).into_iter().map(|n| (n.id().to_string(), n)).collect()
}

/// An ordered id → content-hash map, preserving document-order iteration
/// (required by C5's `added`/`changed` ordering rule, which std `HashMap`
/// cannot provide on its own).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeHashMap {
    order: Vec<String>,
    map: HashMap<String, String>,
}

impl NodeHashMap {
    pub fn get(&self, id: &str) -> Option<&str> {
        self.map.get(id).map(|s| s.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter_ordered(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order.iter().map(move |id| (id.as_str(), self.map[id].as_str()))
    }
}

/// Build the id → content-hash map for an entire tree (C4 `build_hash_map`).
pub fn build_hash_map(root: &IrNode) -> NodeHashMap {
    let mut order = Vec::new();
    let mut map = HashMap::new();
    for node in walk(root) {
        let id = node.id().to_string();
        let hash = content_hash(node);
        order.push(id.clone());
        map.insert(id, hash);
    }
    NodeHashMap { order, map }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(id: &str, text: &str) -> IrNode {
        IrNode::Paragraph {
            id: id.to_string(),
            text: text.to_string(),
            style: None,
            source: None,
        }
    }

    fn section(id: &str, level: u8, title: &str, children: Vec<IrNode>) -> IrNode {
        IrNode::Section {
            id: id.to_string(),
            level,
            title: title.to_string(),
            children,
            source: None,
        }
    }

    fn doc(children: Vec<IrNode>) -> IrNode {
        IrNode::Document {
            id: "root".to_string(),
            doc_id: "doc1".to_string(),
            children,
        }
    }

    #[test]
    fn content_hash_depends_only_on_own_content_not_descendants() {
        let sec_a = section("s0", 1, "Intro", vec![paragraph("p0", "Hello.")]);
        let sec_b = section("s0", 1, "Intro", vec![paragraph("p0", "Different body.")]);
        assert_eq!(content_hash(&sec_a), content_hash(&sec_b));
    }

    #[test]
    fn content_hash_changes_with_own_text() {
        let a = paragraph("p0", "Hello.");
        let b = paragraph("p0", "Hello!");
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn walk_is_depth_first_document_order() {
        let tree = doc(vec![section(
            "s0",
            1,
            "Intro",
            vec![paragraph("p0", "A"), paragraph("p1", "B")],
        )]);
        let ids: Vec<_> = walk(&tree).into_iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["root", "s0", "p0", "p1"]);
    }

    #[test]
    fn walk_descends_into_grid_cells() {
        let grid = IrNode::Grid {
            id: "g0".to_string(),
            cols: Some(2),
            caption: None,
            label: None,
            align: None,
            placement: None,
            margin: None,
            style: None,
            rows: vec![vec![
                GridCell {
                    children: vec![paragraph("c0p0", "left")],
                },
                GridCell {
                    children: vec![paragraph("c1p0", "right")],
                },
            ]],
            source: None,
        };
        let tree = doc(vec![grid]);
        let ids: Vec<_> = walk(&tree).into_iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["root", "g0", "c0p0", "c1p0"]);
    }

    #[test]
    fn build_hash_map_preserves_document_order() {
        let tree = doc(vec![
            paragraph("p0", "A"),
            paragraph("p1", "B"),
            paragraph("p2", "C"),
        ]);
        let hm = build_hash_map(&tree);
        let order: Vec<_> = hm.iter_ordered().map(|(id, _)| id.to_string()).collect();
        assert_eq!(order, vec!["root", "p0", "p1", "p2"]);
    }

    #[test]
    fn empty_and_absent_title_text_hash_distinctly_represented() {
        // An empty-string title is itself a present node distinct from no
        // node at all; its hash is simply the hash of empty text, which
        // still differs from a non-empty title's hash.
        let empty_title = IrNode::DocumentTitle {
            id: "t0".to_string(),
            text: String::new(),
            source: None,
        };
        let real_title = IrNode::DocumentTitle {
            id: "t0".to_string(),
            text: "Report".to_string(),
            source: None,
        };
        assert_ne!(content_hash(&empty_title), content_hash(&real_title));
    }

    #[test]
    fn table_cells_collapse_inner_whitespace_for_hashing() {
        let t1 = IrNode::Table {
            id: "tb0".to_string(),
            header: vec!["A   B".to_string()],
            rows: vec![],
            caption: None,
            label: None,
            col_align: None,
            v_rules: None,
            h_rules: None,
            style: None,
            source: None,
        };
        let t2 = IrNode::Table {
            id: "tb0".to_string(),
            header: vec!["A B".to_string()],
            rows: vec![],
            caption: None,
            label: None,
            col_align: None,
            v_rules: None,
            h_rules: None,
            style: None,
            source: None,
        };
        assert_eq!(content_hash(&t1), content_hash(&t2));
    }

    #[test]
    fn code_block_preserves_internal_whitespace_but_trims_end() {
        let c1 = IrNode::CodeBlock {
            id: "cb0".to_string(),
            language: Some("rs".to_string()),
            code: "fn x() {\n    1\n}\n\n".to_string(),
            source: None,
        };
        let c2 = IrNode::CodeBlock {
            id: "cb0".to_string(),
            language: Some("rs".to_string()),
            code: "fn x() {\n    1\n}".to_string(),
            source: None,
        };
        assert_eq!(content_hash(&c1), content_hash(&c2));

        let c3 = IrNode::CodeBlock {
            id: "cb0".to_string(),
            language: Some("rs".to_string()),
            code: "fn x() {\n1\n}".to_string(),
            source: None,
        };
        assert_ne!(content_hash(&c1), content_hash(&c3));
    }
}
