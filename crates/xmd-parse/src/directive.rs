//! Table (`:::table`) and grid (`:::`) directive body parsing (§4.3).

use xmd_core::{Align, Rule};

/// Parsed shape of a `:::table` body, independent of the directive opener's
/// attribute block (caption/label/border*), which is parsed separately via
/// `attrs::parse_attrs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub col_align: Vec<Align>,
    pub v_rules: Vec<Rule>,
    pub h_rules: Vec<Rule>,
}

pub fn parse_table_body(body: &str) -> ParsedTable {
    let mut out = ParsedTable::default();
    let mut first = true;

    for raw_line in body.split('\n') {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if first {
            first = false;
            if is_col_spec(line) {
                let (col_align, v_rules) = parse_col_spec(line);
                out.col_align = col_align;
                out.v_rules = v_rules;
                continue;
            }
        }

        if let Some(rule) = parse_bare_hrule(line) {
            out.h_rules.push(rule);
            continue;
        }

        if is_standard_separator(line) {
            out.h_rules.push(Rule::Single);
            continue;
        }

        if line.contains('|') {
            let cells = split_pipe_row(line);
            if out.header.is_empty() && out.rows.is_empty() {
                out.header = cells;
            } else {
                out.rows.push(cells);
            }
        }
    }

    out
}

fn is_col_spec(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    let mut saw_letter = false;
    for c in line.chars() {
        match c {
            '|' => {}
            'L' | 'C' | 'R' => saw_letter = true,
            _ => return false,
        }
    }
    saw_letter
}

fn parse_col_spec(line: &str) -> (Vec<Align>, Vec<Rule>) {
    let mut col_align = Vec::new();
    let mut v_rules = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] == '|' {
            let mut run = 0usize;
            while i < chars.len() && chars[i] == '|' {
                run += 1;
                i += 1;
            }
            v_rules.push(if run >= 2 { Rule::Double } else { Rule::Single });
        } else {
            let align = match chars[i] {
                'L' => Align::Left,
                'C' => Align::Center,
                'R' => Align::Right,
                _ => Align::Left,
            };
            col_align.push(align);
            i += 1;
        }
    }
    (col_align, v_rules)
}

fn parse_bare_hrule(line: &str) -> Option<Rule> {
    match line {
        "-" => Some(Rule::Single),
        "=" => Some(Rule::Double),
        "." => Some(Rule::None),
        _ => None,
    }
}

fn is_standard_separator(line: &str) -> bool {
    if !line.contains('|') {
        return false;
    }
    let mut saw_dashes = false;
    for c in line.chars() {
        match c {
            '|' | ':' | ' ' => {}
            '-' => saw_dashes = true,
            _ => return false,
        }
    }
    saw_dashes
}

fn split_pipe_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('|')
        .unwrap_or(trimmed)
        .strip_suffix('|')
        .unwrap_or(trimmed.strip_prefix('|').unwrap_or(trimmed));
    inner
        .split('|')
        .map(|c| xmd_core::collapse_ws(c.trim()))
        .collect()
}

/// Splits a grid directive body into rows of raw cell source text. Cells in
/// a row are separated by a line consisting solely of `|||`; rows are
/// separated by a line consisting solely of `---`. Inline suffix forms
/// (`…|||`, `…---`) are tolerated, the prefix staying attached to the
/// current cell.
pub fn split_grid_body(body: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = vec![Vec::new()];
    let mut buf: Vec<String> = Vec::new();

    for line in body.split('\n') {
        let trimmed = line.trim_end();
        if trimmed.trim() == "|||" {
            finish_cell(&mut rows, &mut buf);
            continue;
        }
        if trimmed.trim() == "---" {
            finish_cell(&mut rows, &mut buf);
            rows.push(Vec::new());
            continue;
        }
        if let Some(prefix) = trimmed.strip_suffix("|||") {
            buf.push(prefix.to_string());
            finish_cell(&mut rows, &mut buf);
            continue;
        }
        if let Some(prefix) = trimmed.strip_suffix("---") {
            buf.push(prefix.to_string());
            finish_cell(&mut rows, &mut buf);
            rows.push(Vec::new());
            continue;
        }
        buf.push(line.to_string());
    }
    finish_cell(&mut rows, &mut buf);
    rows
}

fn finish_cell(rows: &mut Vec<Vec<String>>, buf: &mut Vec<String>) {
    let text = buf.join("\n");
    rows.last_mut().expect("at least one row").push(text);
    buf.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_col_spec_with_single_rules() {
        let (col_align, v_rules) = parse_col_spec("|L|C|R|");
        assert_eq!(col_align, vec![Align::Left, Align::Center, Align::Right]);
        assert_eq!(
            v_rules,
            vec![Rule::Single, Rule::Single, Rule::Single, Rule::Single]
        );
    }

    #[test]
    fn full_table_scenario_matches_documented_example() {
        let body = "|L|C|R|\n=\n| A | B | C |\n| --- | --- | --- |\n-\n| 1 | 2 | 3 |\n=";
        let parsed = parse_table_body(body);
        assert_eq!(parsed.col_align, vec![Align::Left, Align::Center, Align::Right]);
        assert_eq!(
            parsed.v_rules,
            vec![Rule::Single, Rule::Single, Rule::Single, Rule::Single]
        );
        assert_eq!(
            parsed.h_rules,
            vec![Rule::Double, Rule::Single, Rule::Single, Rule::Double]
        );
        assert_eq!(parsed.header, vec!["A", "B", "C"]);
        assert_eq!(parsed.rows, vec![vec!["1", "2", "3"]]);
    }

    #[test]
    fn table_without_col_spec_still_parses_rows() {
        let body = "| A | B |\n| --- | --- |\n| 1 | 2 |";
        let parsed = parse_table_body(body);
        assert!(parsed.col_align.is_empty());
        assert_eq!(parsed.header, vec!["A", "B"]);
        assert_eq!(parsed.rows, vec![vec!["1", "2"]]);
    }

    #[test]
    fn grid_body_splits_cells_and_rows() {
        let body = "A\n|||\nB\n---\nC\n|||\nD";
        let rows = split_grid_body(body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["A".to_string(), "B".to_string()]);
        assert_eq!(rows[1], vec!["C".to_string(), "D".to_string()]);
    }

    #[test]
    fn grid_body_tolerates_inline_suffix_delimiters() {
        let body = "one|||\ntwo---\nthree";
        let rows = split_grid_body(body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["one".to_string(), "two".to_string()]);
        assert_eq!(rows[1], vec!["three".to_string()]);
    }
}
