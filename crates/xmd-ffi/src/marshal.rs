use std::ffi::CStr;
use std::os::raw::c_char;

/// Borrow the null-terminated C string at `ptr` and return it as an owned
/// `String`.
///
/// # Safety
///
/// `ptr` must be a valid, non-null pointer to a null-terminated UTF-8 string
/// that remains alive for the duration of this call.
pub unsafe fn cstring_to_str(ptr: *const c_char) -> Result<String, String> {
    if ptr.is_null() {
        return Err("received null pointer".to_string());
    }

    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| s.to_owned())
        .map_err(|e| format!("invalid UTF-8 in C string: {}", e))
}

/// Deserialize a JSON-encoded C string argument into `T`.
///
/// # Safety
///
/// `ptr` must be a valid, non-null, null-terminated UTF-8 C string.
pub unsafe fn cstring_to_json<T: serde::de::DeserializeOwned>(ptr: *const c_char) -> Result<T, String> {
    let s = cstring_to_str(ptr)?;
    serde_json::from_str(&s).map_err(|e| format!("invalid JSON: {}", e))
}
