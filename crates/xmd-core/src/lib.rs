//! Shared IR types, identity/hashing, and delta computation for the
//! document engine (C1, C4, C5). Parsing, rendering, and change-tracking
//! live in their own crates downstream of this one.

pub mod delta;
pub mod error;
pub mod hash;
pub mod ir;
pub mod snapshot;

pub use delta::{compute_delta, events_from_delta, Delta, Event};
pub use error::{Result, XmdError};
pub use hash::{content_hash_of, fnv1a32, fnv1a32_hex, stable_node_id};
pub use ir::{
    build_hash_map, build_index, collapse_ws, content_hash, normalize_newlines, normalize_text,
    walk, Align, BorderStyle, GridAlign, GridCell, IrNode, Margin, NodeHashMap, ParagraphStyle,
    Placement, Rule, SourceSpan, TextSize,
};
pub use snapshot::{IrStore, Snapshot};
