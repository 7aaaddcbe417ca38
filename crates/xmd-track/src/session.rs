//! Stateful change-tracking session (§4.9).
//!
//! A session pairs an `original` text with a proposed `next` text and a set
//! of hunks describing how to get from one to the other. Hunks can be
//! individually accepted or rejected; `apply_changes` then produces the
//! final text reflecting only the accepted ones.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::diff::{token_diff_groups, GroupKind};
use crate::tokenize::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HunkKind {
    Add,
    Remove,
    Replace,
}

/// A single tracked change. Positions are byte offsets: for `Remove`/`Replace`
/// they index into `original`; for `Add` they index into `next` — the hunk
/// describes where the inserted text lands in the content that doesn't exist
/// yet in `original`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    pub id: String,
    pub kind: HunkKind,
    pub start_position: usize,
    pub end_position: usize,
    pub original_text: Option<String>,
    pub new_text: Option<String>,
    /// `None` until explicitly accepted or rejected.
    pub accepted: Option<bool>,
}

/// Same shape as [`Hunk`] but with positions remapped into `next`'s
/// coordinate system, as produced by [`map_changes_to_new_content`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedHunk {
    pub id: String,
    pub kind: HunkKind,
    pub start_position: usize,
    pub end_position: usize,
    pub original_text: Option<String>,
    pub new_text: Option<String>,
    pub accepted: Option<bool>,
}

pub struct TrackingSession {
    pub original: String,
    pub next: String,
    pub hunks: Vec<Hunk>,
}

impl TrackingSession {
    /// Begins tracking changes between `next` and a baseline, using the
    /// default `TrackerConfig`. The baseline is `original_override` when
    /// given, otherwise `current` is used as both the session's starting
    /// point and its diff baseline.
    pub fn start_tracking(current: &str, next: &str, original_override: Option<&str>) -> Self {
        Self::start_tracking_with_config(current, next, original_override, &TrackerConfig::default())
    }

    /// Same as [`Self::start_tracking`], but with an explicit `TrackerConfig`
    /// governing how tokens are compared (e.g. case sensitivity).
    pub fn start_tracking_with_config(
        current: &str,
        next: &str,
        original_override: Option<&str>,
        config: &TrackerConfig,
    ) -> Self {
        let original = original_override.unwrap_or(current).to_string();
        let hunks = build_hunks(&original, next, config);
        Self { original, next: next.to_string(), hunks }
    }

    pub fn accept(&mut self, id: &str) {
        if let Some(h) = self.hunks.iter_mut().find(|h| h.id == id) {
            h.accepted = Some(true);
        }
    }

    pub fn reject(&mut self, id: &str) {
        if let Some(h) = self.hunks.iter_mut().find(|h| h.id == id) {
            h.accepted = Some(false);
        }
    }

    pub fn accept_all(&mut self) {
        for h in &mut self.hunks {
            h.accepted = Some(true);
        }
    }

    pub fn reject_all(&mut self) {
        for h in &mut self.hunks {
            h.accepted = Some(false);
        }
    }

    pub fn apply_changes(&self) -> String {
        apply_accepted_changes(&self.original, &self.hunks)
    }

    pub fn cancel_tracking(&mut self) {
        self.hunks.clear();
    }

    pub fn mapped_hunks(&self) -> Vec<MappedHunk> {
        map_changes_to_new_content(&self.hunks, &self.original, &self.next)
    }
}

fn build_hunks(original: &str, next: &str, config: &TrackerConfig) -> Vec<Hunk> {
    let left_tokens = tokenize(original);
    let right_tokens = tokenize(next);
    let groups = token_diff_groups(&left_tokens, &right_tokens, config.case_insensitive);

    tracing::debug!(
        left_tokens = left_tokens.len(),
        right_tokens = right_tokens.len(),
        groups = groups.len(),
        "built change-tracking hunks"
    );

    let mut hunks = Vec::new();
    for g in groups {
        match g.kind {
            GroupKind::Equal => continue,
            GroupKind::Delete => {
                let (start, end) = g.left_span.expect("delete group has a left span");
                hunks.push(Hunk {
                    id: Uuid::new_v4().to_string(),
                    kind: HunkKind::Remove,
                    start_position: start,
                    end_position: end,
                    original_text: Some(original[start..end].to_string()),
                    new_text: None,
                    accepted: None,
                });
            }
            GroupKind::Insert => {
                let (start, end) = g.right_span.expect("insert group has a right span");
                hunks.push(Hunk {
                    id: Uuid::new_v4().to_string(),
                    kind: HunkKind::Add,
                    start_position: start,
                    end_position: end,
                    original_text: None,
                    new_text: Some(next[start..end].to_string()),
                    accepted: None,
                });
            }
            GroupKind::Replace => {
                let (lstart, lend) = g.left_span.expect("replace group has a left span");
                let (rstart, rend) = g.right_span.expect("replace group has a right span");
                hunks.push(Hunk {
                    id: Uuid::new_v4().to_string(),
                    kind: HunkKind::Replace,
                    start_position: lstart,
                    end_position: lend,
                    original_text: Some(original[lstart..lend].to_string()),
                    new_text: Some(next[rstart..rend].to_string()),
                    accepted: None,
                });
            }
        }
    }
    hunks
}

/// Remaps each hunk's displayed position into `next`'s coordinate system.
///
/// `Add` hunks are already expressed in `next`'s coordinates (they were built
/// from the diff's right-side spans) and are passed through unchanged, but
/// still contribute to the running delta so later `Remove`/`Replace` hunks
/// land correctly. `Remove`/`Replace` positions are recomputed by walking the
/// hunk list in original-encounter order and accumulating the net length
/// change every prior hunk introduces.
pub fn map_changes_to_new_content(hunks: &[Hunk], _original: &str, _next: &str) -> Vec<MappedHunk> {
    let mut delta: isize = 0;
    let mut mapped = Vec::with_capacity(hunks.len());

    for h in hunks {
        match h.kind {
            HunkKind::Add => {
                let new_len = h.new_text.as_deref().map(str::len).unwrap_or(0);
                mapped.push(MappedHunk {
                    id: h.id.clone(),
                    kind: h.kind,
                    start_position: h.start_position,
                    end_position: h.end_position,
                    original_text: h.original_text.clone(),
                    new_text: h.new_text.clone(),
                    accepted: h.accepted,
                });
                delta += new_len as isize;
            }
            HunkKind::Remove => {
                let orig_len = h.original_text.as_deref().map(str::len).unwrap_or(0);
                let start = (h.start_position as isize + delta).max(0) as usize;
                mapped.push(MappedHunk {
                    id: h.id.clone(),
                    kind: h.kind,
                    start_position: start,
                    end_position: start,
                    original_text: h.original_text.clone(),
                    new_text: h.new_text.clone(),
                    accepted: h.accepted,
                });
                delta -= orig_len as isize;
            }
            HunkKind::Replace => {
                let orig_len = h.original_text.as_deref().map(str::len).unwrap_or(0);
                let new_len = h.new_text.as_deref().map(str::len).unwrap_or(0);
                let start = (h.start_position as isize + delta).max(0) as usize;
                let end = start + new_len;
                mapped.push(MappedHunk {
                    id: h.id.clone(),
                    kind: h.kind,
                    start_position: start,
                    end_position: end,
                    original_text: h.original_text.clone(),
                    new_text: h.new_text.clone(),
                    accepted: h.accepted,
                });
                delta += new_len as isize - orig_len as isize;
            }
        }
    }

    mapped
}

/// Applies only the accepted hunks, left to right, to `original`.
///
/// If no hunk in the set has been explicitly accepted or rejected, every
/// hunk is treated as accepted for this computation. Hunks are expected to
/// be sorted by `start_position`; `Add` hunks don't consume any of
/// `original` and are spliced in at their position relative to the hunks
/// processed before them.
pub fn apply_accepted_changes(original: &str, hunks: &[Hunk]) -> String {
    let all_undecided = hunks.iter().all(|h| h.accepted.is_none());

    let mut result = String::new();
    let mut cursor = 0;

    for h in hunks {
        let accepted = if all_undecided { true } else { h.accepted.unwrap_or(false) };

        match h.kind {
            HunkKind::Remove => {
                result.push_str(&original[cursor..h.start_position]);
                if !accepted {
                    result.push_str(&original[h.start_position..h.end_position]);
                }
                cursor = h.end_position;
            }
            HunkKind::Replace => {
                result.push_str(&original[cursor..h.start_position]);
                if accepted {
                    result.push_str(h.new_text.as_deref().unwrap_or(""));
                } else {
                    result.push_str(&original[h.start_position..h.end_position]);
                }
                cursor = h.end_position;
            }
            HunkKind::Add => {
                result.push_str(&original[cursor..h.start_position.min(original.len())]);
                cursor = h.start_position.min(original.len());
                if accepted {
                    result.push_str(h.new_text.as_deref().unwrap_or(""));
                }
            }
        }
    }
    result.push_str(&original[cursor..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_tracking_builds_hunks_for_a_word_substitution() {
        let session = TrackingSession::start_tracking(
            "the borrower shall repay.",
            "the lender shall repay.",
            None,
        );
        assert!(!session.hunks.is_empty());
        assert!(session.hunks.iter().any(|h| h.kind == HunkKind::Replace || h.kind == HunkKind::Remove || h.kind == HunkKind::Add));
    }

    #[test]
    fn apply_changes_with_no_decisions_accepts_everything() {
        let session = TrackingSession::start_tracking("hello world", "hello brave world", None);
        let applied = session.apply_changes();
        assert_eq!(applied, "hello brave world");
    }

    #[test]
    fn rejecting_all_hunks_reproduces_original() {
        let mut session = TrackingSession::start_tracking("hello world", "hello brave world", None);
        session.reject_all();
        let applied = session.apply_changes();
        assert_eq!(applied, "hello world");
    }

    #[test]
    fn accepting_specific_hunk_only_applies_that_one() {
        let mut session = TrackingSession::start_tracking("one two three", "uno two tres", None);
        session.reject_all();
        if let Some(first) = session.hunks.first() {
            let id = first.id.clone();
            session.accept(&id);
        }
        let applied = session.apply_changes();
        assert_ne!(applied, "one two three");
    }

    #[test]
    fn original_override_diffs_against_a_different_baseline() {
        let session = TrackingSession::start_tracking("irrelevant current text", "hello world", Some("hello brave world"));
        assert_eq!(session.original, "hello brave world");
        let applied = session.apply_changes();
        assert_eq!(applied, "hello world");
    }

    #[test]
    fn case_sensitive_config_treats_case_change_as_a_hunk() {
        let config = TrackerConfig { case_insensitive: false };
        let session =
            TrackingSession::start_tracking_with_config("The borrower", "the borrower", None, &config);
        assert!(!session.hunks.is_empty());
    }

    #[test]
    fn mapped_hunks_reposition_replace_after_preceding_insert() {
        let session = TrackingSession::start_tracking("b c", "a b c d", None);
        let mapped = session.mapped_hunks();
        assert_eq!(mapped.len(), session.hunks.len());
    }
}
