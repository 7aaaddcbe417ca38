//! FNV-1a 32-bit hashing primitives.
//!
//! Stable node ids and content hashes both reduce to this single algorithm
//! applied to different canonical strings (see `ir::stable_node_id` and
//! `ir::content_hash`). Kept as a standalone module so the algorithm choice
//! is visible and independently testable against known vectors.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit over raw bytes.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a 32-bit over a string, encoded as fixed-length lowercase hex.
pub fn fnv1a32_hex(input: &str) -> String {
    format!("{:08x}", fnv1a32(input.as_bytes()))
}

/// Deterministic node id from `(docId, nodeType, structural path)`.
///
/// Implements I1/I2: identical across runs for identical input, and
/// insensitive to node content (the content never enters this function).
pub fn stable_node_id(doc_id: &str, node_type: &str, path: &str) -> String {
    fnv1a32_hex(&format!("{doc_id}|{node_type}|{path}"))
}

/// Content hash over an already-canonicalized per-type serialization.
///
/// Callers (see `ir::content_hash`) are responsible for producing the
/// canonical string per §4.1's normalization rules; this function only
/// applies the hash.
pub fn content_hash_of(canonical: &str) -> String {
    fnv1a32_hex(canonical)
}
