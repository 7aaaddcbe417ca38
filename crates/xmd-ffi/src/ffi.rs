use std::os::raw::c_char;

use serde::{Deserialize, Serialize};

use xmd_core::{compute_delta, content_hash_of, events_from_delta, IrNode};
use xmd_latex::{render_latex, render_latex_fragment, LatexWriterConfig};
use xmd_render::{render_html, HtmlRendererConfig};
use xmd_track::{TrackerConfig, TrackingSession};

use crate::marshal::{cstring_to_json, cstring_to_str};
use crate::result::XmdResult;

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free an `XmdResult` that was returned by any `xmd_*` function.
///
/// Passing a null pointer is a no-op.
///
/// # Safety
///
/// `ptr` must be either null or a valid pointer that was previously returned
/// by one of the `xmd_*` functions and has not yet been freed.
#[no_mangle]
pub unsafe extern "C" fn xmd_free(ptr: *mut XmdResult) {
    XmdResult::free(ptr);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Runs `f`, turning an `Err(String)` into a failure `XmdResult` and an
/// `Ok(json)` into a success one. Centralizes the "stringify and wrap"
/// boilerplate every `xmd_*` entry point needs.
fn respond(f: impl FnOnce() -> Result<String, String>) -> *mut XmdResult {
    match f() {
        Ok(json) => XmdResult::success(&json),
        Err(msg) => XmdResult::failure(&msg),
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotDto {
    doc_id: String,
    root: IrNode,
    node_hash: Vec<(String, String)>,
}

fn snapshot_of(doc_id: &str, root: &IrNode) -> SnapshotDto {
    let hash_map = xmd_core::build_hash_map(root);
    let node_hash = hash_map
        .iter_ordered()
        .map(|(id, hash)| (id.to_string(), hash.to_string()))
        .collect();
    SnapshotDto { doc_id: doc_id.to_string(), root: root.clone(), node_hash }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses XMD source into IR. `data` on success is the serialized `Document`
/// (the root `IrNode`).
///
/// # Safety
///
/// Both pointer arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn xmd_parse(doc_id: *const c_char, xmd: *const c_char) -> *mut XmdResult {
    respond(|| unsafe {
        let doc_id = cstring_to_str(doc_id)?;
        let xmd = cstring_to_str(xmd)?;
        let root = xmd_parse::parse_xmd(&doc_id, &xmd);
        serde_json::to_string(&root).map_err(|e| e.to_string())
    })
}

/// Parses a bounded LaTeX subset into IR. `data` on success is the
/// serialized `Document`.
///
/// # Safety
///
/// Both pointer arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn xmd_parse_latex(
    doc_id: *const c_char,
    latex: *const c_char,
) -> *mut XmdResult {
    respond(|| unsafe {
        let doc_id = cstring_to_str(doc_id)?;
        let latex = cstring_to_str(latex)?;
        let root = xmd_latex::parse_latex(&doc_id, &latex);
        serde_json::to_string(&root).map_err(|e| e.to_string())
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Renders a `Document` (JSON-encoded `IrNode`) to preview HTML.
///
/// `config_json`, if non-null, overrides the default `HtmlRendererConfig`.
///
/// # Safety
///
/// `document_json` must be valid; `config_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn xmd_render_html(
    document_json: *const c_char,
    config_json: *const c_char,
) -> *mut XmdResult {
    respond(|| unsafe {
        let root: IrNode = cstring_to_json(document_json)?;
        let config = optional_config::<HtmlRendererConfig>(config_json)?;
        Ok(render_html(&root, &config))
    })
}

/// Renders a `Document` (JSON-encoded `IrNode`) to a complete LaTeX document.
///
/// # Safety
///
/// `document_json` must be valid; `config_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn xmd_render_latex(
    document_json: *const c_char,
    config_json: *const c_char,
) -> *mut XmdResult {
    respond(|| unsafe {
        let root: IrNode = cstring_to_json(document_json)?;
        let config = optional_config::<LatexWriterConfig>(config_json)?;
        Ok(render_latex(&root, &config))
    })
}

/// Renders a `Document` (JSON-encoded `IrNode`) to a LaTeX fragment without
/// a preamble.
///
/// # Safety
///
/// `document_json` must be valid; `config_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn xmd_render_latex_fragment(
    document_json: *const c_char,
    config_json: *const c_char,
) -> *mut XmdResult {
    respond(|| unsafe {
        let root: IrNode = cstring_to_json(document_json)?;
        let config = optional_config::<LatexWriterConfig>(config_json)?;
        Ok(render_latex_fragment(&root, &config))
    })
}

unsafe fn optional_config<T: serde::de::DeserializeOwned + Default>(
    ptr: *const c_char,
) -> Result<T, String> {
    if ptr.is_null() {
        Ok(T::default())
    } else {
        cstring_to_json(ptr)
    }
}

// ---------------------------------------------------------------------------
// Snapshot & delta
// ---------------------------------------------------------------------------

/// Builds a `Snapshot` (id → content-hash map) for a `Document`.
///
/// # Safety
///
/// `doc_id` and `document_json` must be valid, non-null, null-terminated C
/// strings.
#[no_mangle]
pub unsafe extern "C" fn xmd_snapshot(
    doc_id: *const c_char,
    document_json: *const c_char,
) -> *mut XmdResult {
    respond(|| unsafe {
        let doc_id = cstring_to_str(doc_id)?;
        let root: IrNode = cstring_to_json(document_json)?;
        let dto = snapshot_of(&doc_id, &root);
        serde_json::to_string(&dto).map_err(|e| e.to_string())
    })
}

/// Computes `{added, removed, changed}` between two snapshots produced by
/// `xmd_snapshot`. Fails if the snapshots belong to different documents.
///
/// # Safety
///
/// Both pointer arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn xmd_delta(
    prev_snapshot_json: *const c_char,
    next_snapshot_json: *const c_char,
) -> *mut XmdResult {
    respond(|| unsafe {
        let prev: SnapshotDto = cstring_to_json(prev_snapshot_json)?;
        let next: SnapshotDto = cstring_to_json(next_snapshot_json)?;
        if prev.doc_id != next.doc_id {
            return Err(format!(
                "snapshots belong to different documents: {} vs {}",
                prev.doc_id, next.doc_id
            ));
        }
        let prev_hm = xmd_core::build_hash_map(&prev.root);
        let next_hm = xmd_core::build_hash_map(&next.root);
        let delta = compute_delta(&prev_hm, &next_hm);
        serde_json::to_string(&delta).map_err(|e| e.to_string())
    })
}

/// Expands a `Delta` (JSON) into its caller-visible `Event` sequence.
///
/// # Safety
///
/// `delta_json` must be a valid, non-null, null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn xmd_events_from_delta(delta_json: *const c_char) -> *mut XmdResult {
    respond(|| unsafe {
        let delta = cstring_to_json(delta_json)?;
        let events = events_from_delta(&delta);
        serde_json::to_string(&events).map_err(|e| e.to_string())
    })
}

/// Content hash of a single node, re-exposed for callers that only have a
/// node and not a whole snapshot (e.g. incremental UI diffing).
///
/// # Safety
///
/// `node_json` must be a valid, non-null, null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn xmd_content_hash(node_json: *const c_char) -> *mut XmdResult {
    respond(|| unsafe {
        let node: IrNode = cstring_to_json(node_json)?;
        Ok(content_hash_of(&node))
    })
}

// ---------------------------------------------------------------------------
// Change tracking
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct TrackingSessionDto {
    original: String,
    next: String,
    hunks: Vec<xmd_track::Hunk>,
}

impl From<&TrackingSession> for TrackingSessionDto {
    fn from(s: &TrackingSession) -> Self {
        TrackingSessionDto { original: s.original.clone(), next: s.next.clone(), hunks: s.hunks.clone() }
    }
}

fn session_from_dto(dto: TrackingSessionDto) -> TrackingSession {
    TrackingSession { original: dto.original, next: dto.next, hunks: dto.hunks }
}

/// Starts a change-tracking session between `original` and `next`.
///
/// `config_json`, if non-null, overrides the default `TrackerConfig`. `data`
/// on success is a serialized `TrackingSession` with its initial hunk set.
///
/// # Safety
///
/// `original` and `next` must be valid, non-null, null-terminated C strings;
/// `config_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn xmd_start_tracking(
    original: *const c_char,
    next: *const c_char,
    config_json: *const c_char,
) -> *mut XmdResult {
    respond(|| unsafe {
        let original = cstring_to_str(original)?;
        let next = cstring_to_str(next)?;
        let config = optional_config::<TrackerConfig>(config_json)?;
        let session = TrackingSession::start_tracking_with_config(&original, &next, None, &config);
        serde_json::to_string(&TrackingSessionDto::from(&session)).map_err(|e| e.to_string())
    })
}

/// Accepts or rejects a single hunk by id within a `TrackingSession` (JSON).
/// `accept` selects which; returns the updated session.
///
/// # Safety
///
/// `session_json` and `hunk_id` must be valid, non-null, null-terminated C
/// strings.
#[no_mangle]
pub unsafe extern "C" fn xmd_set_hunk_decision(
    session_json: *const c_char,
    hunk_id: *const c_char,
    accept: bool,
) -> *mut XmdResult {
    respond(|| unsafe {
        let dto: TrackingSessionDto = cstring_to_json(session_json)?;
        let hunk_id = cstring_to_str(hunk_id)?;
        let mut session = session_from_dto(dto);
        if accept {
            session.accept(&hunk_id);
        } else {
            session.reject(&hunk_id);
        }
        serde_json::to_string(&TrackingSessionDto::from(&session)).map_err(|e| e.to_string())
    })
}

/// Applies the accepted hunks of a `TrackingSession` (JSON) to its original
/// text. `data` on success is the resulting plain text (not JSON-wrapped).
///
/// # Safety
///
/// `session_json` must be a valid, non-null, null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn xmd_apply_tracked_changes(session_json: *const c_char) -> *mut XmdResult {
    respond(|| unsafe {
        let dto: TrackingSessionDto = cstring_to_json(session_json)?;
        let session = session_from_dto(dto);
        Ok(session.apply_changes())
    })
}
