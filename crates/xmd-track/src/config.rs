//! Change-tracker configuration (§10.3).

use serde::{Deserialize, Serialize};

/// Tuning knobs for the word-aware tokenizer/diff pair. The defaults match
/// the behavior documented in §4.9 exactly; the struct exists so a caller
/// can relax them (e.g. case-sensitive comparison) without changing the
/// tracker's public API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Whether token comparison ignores case and diacritics. When `false`,
    /// the diff compares tokens by their raw `text` instead of `normalized`.
    pub case_insensitive: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { case_insensitive: true }
    }
}
