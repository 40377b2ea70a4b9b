use thiserror::Error;

use crate::record::ValueKind;

/// Structural misuse of the path or array APIs.
///
/// These indicate a defect in a wizard's wiring (a misconfigured descriptor
/// or an out-of-bounds structural edit), never bad user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("index {index} out of range at '{path}' (len {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("expected {expected} at '{path}', found {found}")]
    KindMismatch {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

impl PathError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
