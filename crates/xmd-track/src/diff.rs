//! Token-level diff using the Myers algorithm via the `similar` crate.
//!
//! Operates on normalized token text by default, so minor case or diacritic
//! differences don't produce spurious hunks; `TrackerConfig.case_insensitive`
//! can switch this to raw-text comparison. Consecutive same-kind operations
//! are grouped; adjacent delete+insert groups merge into a single `Replace`
//! group so a one-word substitution becomes one hunk, not two.

use similar::{Algorithm, DiffOp};

use crate::tokenize::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Equal,
    Delete,
    Insert,
    Replace,
}

/// A contiguous run of tokens with the same disposition. `left_span` is a
/// `(start, end)` byte range into `original`; `right_span` is the same into
/// `next`. Either may be absent (a pure insertion has no left span, a pure
/// deletion has no right span).
#[derive(Debug, Clone)]
pub struct ChangeGroup {
    pub kind: GroupKind,
    pub left_span: Option<(usize, usize)>,
    pub right_span: Option<(usize, usize)>,
}

/// Diffs two token streams. When `case_insensitive` is true, tokens compare
/// by their normalized (lowercased, diacritic-stripped) text; when false,
/// they compare by raw `text`, so e.g. `"The"` and `"the"` are distinct.
pub fn token_diff_groups(left: &[Token], right: &[Token], case_insensitive: bool) -> Vec<ChangeGroup> {
    let key = |t: &Token| if case_insensitive { t.normalized.as_str() } else { t.text.as_str() };
    let left_norm: Vec<&str> = left.iter().map(key).collect();
    let right_norm: Vec<&str> = right.iter().map(key).collect();

    let ops = similar::capture_diff_slices(Algorithm::Myers, &left_norm, &right_norm);

    let mut changes: Vec<RawChange> = Vec::new();
    for op in &ops {
        match op {
            DiffOp::Equal { old_index, new_index, len } => {
                for k in 0..*len {
                    changes.push(RawChange { tag: RawTag::Equal, left: Some(&left[old_index + k]), right: Some(&right[new_index + k]) });
                }
            }
            DiffOp::Delete { old_index, old_len, .. } => {
                for k in 0..*old_len {
                    changes.push(RawChange { tag: RawTag::Delete, left: Some(&left[old_index + k]), right: None });
                }
            }
            DiffOp::Insert { new_index, new_len, .. } => {
                for k in 0..*new_len {
                    changes.push(RawChange { tag: RawTag::Insert, left: None, right: Some(&right[new_index + k]) });
                }
            }
            DiffOp::Replace { old_index, old_len, new_index, new_len } => {
                for k in 0..*old_len {
                    changes.push(RawChange { tag: RawTag::Delete, left: Some(&left[old_index + k]), right: None });
                }
                for k in 0..*new_len {
                    changes.push(RawChange { tag: RawTag::Insert, left: None, right: Some(&right[new_index + k]) });
                }
            }
        }
    }

    group_and_merge(changes)
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum RawTag {
    Equal,
    Delete,
    Insert,
}

struct RawChange<'a> {
    tag: RawTag,
    left: Option<&'a Token>,
    right: Option<&'a Token>,
}

struct Run {
    tag: RawTag,
    left_span: Option<(usize, usize)>,
    right_span: Option<(usize, usize)>,
}

fn extend_span(span: &mut Option<(usize, usize)>, token: &Token) {
    match span {
        Some((_, end)) => *end = token.end_offset(),
        None => *span = Some((token.offset, token.end_offset())),
    }
}

fn group_and_merge(changes: Vec<RawChange<'_>>) -> Vec<ChangeGroup> {
    let mut runs: Vec<Run> = Vec::new();
    for ch in changes {
        if let Some(last) = runs.last_mut() {
            if last.tag == ch.tag {
                if let Some(t) = ch.left {
                    extend_span(&mut last.left_span, t);
                }
                if let Some(t) = ch.right {
                    extend_span(&mut last.right_span, t);
                }
                continue;
            }
        }
        let mut left_span = None;
        let mut right_span = None;
        if let Some(t) = ch.left {
            extend_span(&mut left_span, t);
        }
        if let Some(t) = ch.right {
            extend_span(&mut right_span, t);
        }
        runs.push(Run { tag: ch.tag, left_span, right_span });
    }

    let mut result = Vec::new();
    let mut i = 0;
    while i < runs.len() {
        if runs[i].tag == RawTag::Delete && i + 1 < runs.len() && runs[i + 1].tag == RawTag::Insert {
            result.push(ChangeGroup { kind: GroupKind::Replace, left_span: runs[i].left_span, right_span: runs[i + 1].right_span });
            i += 2;
        } else {
            let kind = match runs[i].tag {
                RawTag::Equal => GroupKind::Equal,
                RawTag::Delete => GroupKind::Delete,
                RawTag::Insert => GroupKind::Insert,
            };
            result.push(ChangeGroup { kind, left_span: runs[i].left_span, right_span: runs[i].right_span });
            i += 1;
        }
    }
    result
}
