//! C-ABI surface for the document engine (§6), mirroring the pack's FFI
//! boundary crate: a `#[repr(C)]` result envelope plus a flat set of
//! `extern "C"` entry points that marshal JSON in and out.

pub mod ffi;
pub mod marshal;
pub mod result;

pub use result::XmdResult;
