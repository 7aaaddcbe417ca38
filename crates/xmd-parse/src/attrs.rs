//! Parsing of `{…}` attribute blocks and directive-opener argument strings
//! shared by figures, tables, and grids (§4.3, §6).
//!
//! Renderers re-parse `Figure.source.raw` on demand rather than the parser
//! storing structured attribute fields on the `Figure` IR node — `source`
//! is the single source of truth for attributes the structural IR does not
//! model directly, per §3.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A parsed `key=value` / `#fig:label` attribute body, independent of
/// whether it came from a markdown figure's `{…}` suffix or a directive
/// opener's trailing args.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrMap {
    pub label: Option<String>,
    pub kv: HashMap<String, String>,
}

impl AttrMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.kv.get(key).map(|s| s.as_str())
    }
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:#fig:(?P<label>[^\s{}]+))|(?:(?P<key>[A-Za-z_][A-Za-z0-9_]*)=(?:"(?P<qval>[^"]*)"|(?P<uval>[^\s{}]+)))"#,
        )
        .expect("static attribute regex is valid")
    })
}

/// Parse an attribute body. `input` may be a bare `{...}` block, the
/// interior of one, or a directive opener's trailing args string (no
/// braces) — all are scanned the same way.
pub fn parse_attrs(input: &str) -> AttrMap {
    let inner = strip_outer_braces(input);
    let mut out = AttrMap::default();
    for caps in attr_regex().captures_iter(inner) {
        if let Some(label) = caps.name("label") {
            out.label = Some(label.as_str().to_string());
            continue;
        }
        if let Some(key) = caps.name("key") {
            let value = caps
                .name("qval")
                .or_else(|| caps.name("uval"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            out.kv.insert(key.as_str().to_string(), value);
        }
    }
    out
}

fn strip_outer_braces(input: &str) -> &str {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix('{') {
        rest.strip_suffix('}').unwrap_or(rest)
    } else {
        trimmed
    }
}

/// Extract the `{…}` attribute substring (if any) from a full `![alt](url)`
/// markdown figure line, e.g. the verbatim text stored in `source.raw`.
pub fn extract_attr_block(figure_line: &str) -> Option<&str> {
    let idx = figure_line.find(')')?;
    let after = &figure_line[idx + 1..];
    let brace_start = after.find('{')?;
    let body = &after[brace_start..];
    let mut depth = 0i32;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
