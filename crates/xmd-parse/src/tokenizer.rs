//! Line-offset-preserving block segmentation of normalized XMD (C2).
//!
//! The tokenizer never fails: any unrecognized or unclosed construct becomes
//! a `Raw` block spanning the remaining source, satisfying P9 (no throws).

use crate::block::{Block, BlockKind};

struct Line<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut pos = 0usize;
    for segment in source.split('\n') {
        let start = pos;
        let end = start + segment.len();
        lines.push(Line {
            text: segment,
            start,
            end,
        });
        pos = end + 1; // account for the '\n' consumed by split
    }
    lines
}

/// Tokenize already-normalized (CRLF/CR -> LF, per I6) XMD source.
pub fn tokenize(source: &str) -> Vec<Block> {
    let lines = split_lines(source);
    let mut blocks = Vec::new();
    let mut i = 0usize;
    let mut block_index = 0usize;

    while i < lines.len() {
        if lines[i].text.trim().is_empty() {
            i += 1;
            continue;
        }

        let line = lines[i].text;

        if let Some(payload) = line.strip_prefix("@^") {
            let (raw, start, end) = span_single(&lines, i);
            blocks.push(Block {
                kind: BlockKind::Author(payload.trim().to_string()),
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i += 1;
            continue;
        }

        if let Some(payload) = line.strip_prefix("@=") {
            let (raw, start, end) = span_single(&lines, i);
            blocks.push(Block {
                kind: BlockKind::Date(payload.trim().to_string()),
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i += 1;
            continue;
        }

        if let Some(payload) = line.strip_prefix('@') {
            let trimmed = payload.trim();
            if !trimmed.is_empty() {
                let (raw, start, end) = span_single(&lines, i);
                blocks.push(Block {
                    kind: BlockKind::Title(trimmed.to_string()),
                    start_offset: start,
                    end_offset: end,
                    block_index,
                    raw,
                });
                block_index += 1;
                i += 1;
                continue;
            }
            // Empty `@` payload falls through to paragraph handling below.
        }

        if let Some((level, text)) = parse_heading(line) {
            let (raw, start, end) = span_single(&lines, i);
            blocks.push(Block {
                kind: BlockKind::Heading { level, text },
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i += 1;
            continue;
        }

        if let Some(language) = parse_fence_open(line) {
            let fence_start = i;
            let mut j = i + 1;
            let mut code_lines = Vec::new();
            while j < lines.len() && lines[j].text.trim_end() != "```" {
                code_lines.push(lines[j].text);
                j += 1;
            }
            let end_line = if j < lines.len() { j } else { lines.len() - 1 };
            let (raw, start, end) = span_range(&lines, fence_start, end_line);
            blocks.push(Block {
                kind: BlockKind::CodeFence {
                    language,
                    code: code_lines.join("\n"),
                },
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i = j + 1;
            continue;
        }

        if line.trim() == "$$" {
            let math_start = i;
            let mut j = i + 1;
            let mut math_lines = Vec::new();
            while j < lines.len() && lines[j].text.trim() != "$$" {
                math_lines.push(lines[j].text);
                j += 1;
            }
            let end_line = if j < lines.len() { j } else { lines.len() - 1 };
            let (raw, start, end) = span_range(&lines, math_start, end_line);
            blocks.push(Block {
                kind: BlockKind::MathBlock {
                    latex: math_lines.join("\n"),
                },
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i = j + 1;
            continue;
        }

        if line.trim_start().starts_with(":::") {
            let (block, consumed) = parse_directive(&lines, i);
            let end_line = i + consumed - 1;
            let (raw, start, end) = span_range(&lines, i, end_line);
            blocks.push(Block {
                kind: block,
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i += consumed;
            continue;
        }

        if let Some((ordered, _)) = parse_list_item(line) {
            let list_start = i;
            let mut j = i;
            let mut items = Vec::new();
            while j < lines.len() {
                match parse_list_item(lines[j].text) {
                    Some((item_ordered, text)) if item_ordered == ordered => {
                        items.push(text);
                        j += 1;
                    }
                    _ => break,
                }
            }
            let end_line = j - 1;
            let (raw, start, end) = span_range(&lines, list_start, end_line);
            blocks.push(Block {
                kind: BlockKind::List { ordered, items },
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i = j;
            continue;
        }

        if let Some((alt, url, attrs_raw)) = parse_figure_line(line) {
            let (raw, start, end) = span_single(&lines, i);
            blocks.push(Block {
                kind: BlockKind::Figure { alt, url, attrs_raw },
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i += 1;
            continue;
        }

        // Paragraph: consume until a blank line or a line that starts a new
        // structural block.
        let para_start = i;
        let mut j = i;
        let mut text_lines = Vec::new();
        while j < lines.len() && !is_structural_break(lines[j].text) {
            text_lines.push(lines[j].text);
            j += 1;
        }
        if text_lines.is_empty() {
            // Nothing recognized and no paragraph content could be formed;
            // treat the single line as Raw to guarantee forward progress.
            let (raw, start, end) = span_single(&lines, i);
            blocks.push(Block {
                kind: BlockKind::Raw(raw.clone()),
                start_offset: start,
                end_offset: end,
                block_index,
                raw,
            });
            block_index += 1;
            i += 1;
            continue;
        }
        let end_line = j - 1;
        let (raw, start, end) = span_range(&lines, para_start, end_line);
        blocks.push(Block {
            kind: BlockKind::Paragraph(text_lines.join("\n").trim_end().to_string()),
            start_offset: start,
            end_offset: end,
            block_index,
            raw,
        });
        block_index += 1;
        i = j;
    }

    blocks
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_structural_break(line: &str) -> bool {
    if is_blank(line) {
        return true;
    }
    if parse_heading(line).is_some() {
        return true;
    }
    if parse_fence_open(line).is_some() {
        return true;
    }
    if line.trim() == "$$" {
        return true;
    }
    if line.trim_start().starts_with(":::") {
        return true;
    }
    if parse_list_item(line).is_some() {
        return true;
    }
    if parse_figure_line(line).is_some() {
        return true;
    }
    false
}

fn span_single(lines: &[Line<'_>], idx: usize) -> (String, usize, usize) {
    span_range(lines, idx, idx)
}

fn span_range(lines: &[Line<'_>], start_idx: usize, end_idx: usize) -> (String, usize, usize) {
    let start = lines[start_idx].start;
    let end = lines[end_idx.min(lines.len() - 1)].end;
    let raw = lines[start_idx..=end_idx.min(lines.len() - 1)]
        .iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n");
    (raw, start, end)
}

fn parse_heading(line: &str) -> Option<(u8, String)> {
    let bytes = line.as_bytes();
    let mut count = 0usize;
    while count < bytes.len() && bytes[count] == b'#' {
        count += 1;
    }
    if count == 0 || count > 6 {
        return None;
    }
    let rest = &line[count..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((count as u8, rest.trim().to_string()))
}

fn parse_fence_open(line: &str) -> Option<Option<String>> {
    let trimmed = line.trim_end();
    let rest = trimmed.strip_prefix("```")?;
    if rest.is_empty() {
        Some(None)
    } else if rest.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '+' || c == '-') {
        Some(Some(rest.to_string()))
    } else {
        None
    }
}

fn parse_list_item(line: &str) -> Option<(bool, String)> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some((false, rest.trim().to_string()));
    }
    let mut digits_end = 0usize;
    for (idx, c) in line.char_indices() {
        if c.is_ascii_digit() {
            digits_end = idx + c.len_utf8();
        } else {
            break;
        }
    }
    if digits_end > 0 {
        let rest = &line[digits_end..];
        if let Some(after) = rest.strip_prefix(". ") {
            return Some((true, after.trim().to_string()));
        }
    }
    None
}

/// Scans a `![alt](url)` prefix and an optional balanced `{...}` attribute
/// suffix. Trailing characters glued onto the same line (no intervening
/// whitespace) are tolerated and absorbed into the block's raw span but do
/// not themselves become separate content (see DESIGN.md for the rationale).
fn parse_figure_line(line: &str) -> Option<(String, String, Option<String>)> {
    let rest = line.strip_prefix("![")?;
    let alt_end = rest.find(']')?;
    let alt = rest[..alt_end].to_string();
    let after_alt = &rest[alt_end + 1..];
    let after_paren = after_alt.strip_prefix('(')?;
    let url_end = after_paren.find(')')?;
    let url = after_paren[..url_end].to_string();
    let after_url = &after_paren[url_end + 1..];

    if let Some(attr_body) = after_url.strip_prefix('{') {
        let mut depth = 1i32;
        let mut end_idx = None;
        for (idx, c) in attr_body.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end_idx = Some(idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end_idx = end_idx?;
        let attrs_raw = format!("{{{}}}", &attr_body[..end_idx]);
        Some((alt, url, Some(attrs_raw)))
    } else {
        Some((alt, url, None))
    }
}

/// Parses a `:::` directive block starting at `lines[start]`. Returns the
/// resulting block kind and the number of lines consumed (at least 1).
fn parse_directive(lines: &[Line<'_>], start: usize) -> (BlockKind, usize) {
    let opener = lines[start].text.trim_start();
    let after_colons = &opener[3..]; // strip "::: " prefix marker

    let (name, args) = if let Some(rest) = after_colons.strip_prefix(' ') {
        (None, rest.trim().to_string())
    } else if after_colons.is_empty() {
        (None, String::new())
    } else {
        let name_end = after_colons.find(' ').unwrap_or(after_colons.len());
        let name = &after_colons[..name_end];
        let args = after_colons.get(name_end..).unwrap_or("").trim().to_string();
        (Some(name.to_string()), args)
    };

    let mut j = start + 1;
    let mut body_lines: Vec<String> = Vec::new();
    loop {
        if j >= lines.len() {
            // Unterminated directive: swallow the rest as body (lossless).
            return (
                BlockKind::Directive {
                    name,
                    args,
                    body: body_lines.join("\n"),
                },
                j - start,
            );
        }
        let text = lines[j].text;
        let trimmed = text.trim_end();

        if trimmed == ":::" {
            j += 1;
            break;
        }
        // Tolerate a closing `:::` immediately followed by grid delimiters.
        if let Some(suffix) = trimmed.strip_prefix(":::") {
            if suffix == "|||" || suffix == "---" {
                body_lines.push(suffix.to_string());
                j += 1;
                break;
            }
        }
        // Tolerate a body line ending with " :::" as a trailing close.
        if let Some(prefix) = trimmed.strip_suffix(" :::") {
            body_lines.push(prefix.to_string());
            j += 1;
            break;
        }

        body_lines.push(text.to_string());
        j += 1;
    }

    (
        BlockKind::Directive {
            name,
            args,
            body: body_lines.join("\n"),
        },
        j - start,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_and_paragraph() {
        let blocks = tokenize("# Intro\n\nHello.\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Heading {
                level: 1,
                text: "Intro".to_string()
            }
        );
        assert_eq!(blocks[1].kind, BlockKind::Paragraph("Hello.".to_string()));
    }

    #[test]
    fn metadata_markers_allow_empty_payload() {
        let blocks = tokenize("@ T\n@^\n@= \n\nBody");
        assert_eq!(blocks[0].kind, BlockKind::Title("T".to_string()));
        assert_eq!(blocks[1].kind, BlockKind::Author(String::new()));
        assert_eq!(blocks[2].kind, BlockKind::Date(String::new()));
        assert_eq!(blocks[3].kind, BlockKind::Paragraph("Body".to_string()));
    }

    #[test]
    fn empty_title_payload_falls_through_to_paragraph() {
        let blocks = tokenize("@\nBody text");
        assert_eq!(
            blocks[0].kind,
            BlockKind::Paragraph("@\nBody text".to_string())
        );
    }

    #[test]
    fn fenced_code_block_captures_language_and_body() {
        let blocks = tokenize("```rust\nfn x() {}\n```\n");
        assert_eq!(
            blocks[0].kind,
            BlockKind::CodeFence {
                language: Some("rust".to_string()),
                code: "fn x() {}".to_string()
            }
        );
    }

    #[test]
    fn unterminated_fence_consumes_rest_of_input() {
        let blocks = tokenize("```rust\nfn x() {}\n");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0].kind, BlockKind::CodeFence { .. }));
    }

    #[test]
    fn math_block_delimited_by_dollar_dollar() {
        let blocks = tokenize("$$\nx^2\n$$\n");
        assert_eq!(
            blocks[0].kind,
            BlockKind::MathBlock {
                latex: "x^2".to_string()
            }
        );
    }

    #[test]
    fn directive_with_name_parses_into_name_args_body() {
        let blocks = tokenize(":::equation\nx = y\n:::\n");
        match &blocks[0].kind {
            BlockKind::Directive { name, args, body } => {
                assert_eq!(name.as_deref(), Some("equation"));
                assert_eq!(args, "");
                assert_eq!(body, "x = y");
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn anonymous_directive_with_args_is_a_grid() {
        let blocks = tokenize("::: cols=2 caption=\"G\"\nA\n|||\nB\n:::\n");
        match &blocks[0].kind {
            BlockKind::Directive { name, args, body } => {
                assert_eq!(*name, None);
                assert_eq!(args, "cols=2 caption=\"G\"");
                assert_eq!(body, "A\n|||\nB");
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn close_fence_tolerates_trailing_close_on_body_line() {
        let blocks = tokenize(":::table\n| A |\n| --- |\n| 1 | :::\n");
        match &blocks[0].kind {
            BlockKind::Directive { body, .. } => {
                assert!(body.ends_with("| 1 |"));
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn close_fence_tolerates_inline_grid_delimiter() {
        let blocks = tokenize("::: cols=2\nA\n:::|||\nB\n:::\n");
        match &blocks[0].kind {
            BlockKind::Directive { body, .. } => {
                assert_eq!(body, "A\n|||");
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn list_items_group_while_ordering_matches() {
        let blocks = tokenize("- one\n- two\n1. three\n");
        match &blocks[0].kind {
            BlockKind::List { ordered, items } => {
                assert!(!ordered);
                assert_eq!(items, &vec!["one".to_string(), "two".to_string()]);
            }
            other => panic!("expected list, got {other:?}"),
        }
        match &blocks[1].kind {
            BlockKind::List { ordered, items } => {
                assert!(ordered);
                assert_eq!(items, &vec!["three".to_string()]);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn figure_line_with_balanced_attribute_block() {
        let blocks = tokenize(
            "![Cap](zadoox-asset://img){#fig:demo align=\"right\" width=\"33%\"}\n",
        );
        match &blocks[0].kind {
            BlockKind::Figure { alt, url, attrs_raw } => {
                assert_eq!(alt, "Cap");
                assert_eq!(url, "zadoox-asset://img");
                assert_eq!(
                    attrs_raw.as_deref(),
                    Some("{#fig:demo align=\"right\" width=\"33%\"}")
                );
            }
            other => panic!("expected figure, got {other:?}"),
        }
    }

    #[test]
    fn figure_line_without_attributes() {
        let blocks = tokenize("![alt](http://example.com/x.png)\n");
        match &blocks[0].kind {
            BlockKind::Figure { alt, url, attrs_raw } => {
                assert_eq!(alt, "alt");
                assert_eq!(url, "http://example.com/x.png");
                assert_eq!(*attrs_raw, None);
            }
            other => panic!("expected figure, got {other:?}"),
        }
    }

    #[test]
    fn placeholder_tokens_inside_attribute_values_are_balanced() {
        let blocks = tokenize("![a](u){desc=\"{CH} and {REF}\"}\n");
        match &blocks[0].kind {
            BlockKind::Figure { attrs_raw, .. } => {
                assert_eq!(
                    attrs_raw.as_deref(),
                    Some("{desc=\"{CH} and {REF}\"}")
                );
            }
            other => panic!("expected figure, got {other:?}"),
        }
    }

    #[test]
    fn paragraph_stops_before_next_structural_block() {
        let blocks = tokenize("Line one\nLine two\n# Heading\n");
        assert_eq!(
            blocks[0].kind,
            BlockKind::Paragraph("Line one\nLine two".to_string())
        );
        assert!(matches!(blocks[1].kind, BlockKind::Heading { .. }));
    }

    #[test]
    fn block_indices_and_offsets_are_sequential() {
        let blocks = tokenize("# A\n\nB\n\nC\n");
        for (i, b) in blocks.iter().enumerate() {
            assert_eq!(b.block_index, i);
        }
        assert!(blocks[0].start_offset < blocks[1].start_offset);
    }

    #[test]
    fn never_panics_on_arbitrary_bytes() {
        let inputs = [
            "",
            "\n\n\n",
            ":::",
            "![",
            "```",
            "$$",
            "@^@=@",
            "1.",
            "- ",
        ];
        for input in inputs {
            let _ = tokenize(input);
        }
    }
}
