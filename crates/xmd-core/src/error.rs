use thiserror::Error;

/// Errors surfaced across the document-engine crate boundary.
///
/// Per the engine's error taxonomy, most malformed-input conditions never
/// reach this type: they degrade in place (a `RawXmdBlock`, a default style)
/// rather than failing the call. `XmdError` is reserved for conditions a
/// caller can act on: genuine API misuse, or an invariant so broken that no
/// in-place repair applies.
#[derive(Debug, Error)]
pub enum XmdError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("node not found: {0}")]
    NotFound(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("snapshots belong to different documents: {left} vs {right}")]
    DocumentMismatch { left: String, right: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, XmdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        let e = XmdError::InvalidInput("empty docId".to_string());
        assert_eq!(e.to_string(), "invalid input: empty docId");

        let e = XmdError::HashMismatch {
            expected: "abc".into(),
            actual: "def".into(),
        };
        assert_eq!(e.to_string(), "hash mismatch: expected abc, got def");
    }

    #[test]
    fn serialization_errors_wrap_via_from() {
        let bad: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: XmdError = bad.unwrap_err().into();
        assert!(matches!(err, XmdError::Serialization(_)));
    }
}
