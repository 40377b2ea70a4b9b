//! Field-level errors: data shown next to inputs, never `Err` values.

use std::collections::BTreeMap;
use std::fmt;

use ficha_core::Path;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FieldErrorKind {
    Required,
    Format,
    Checksum,
    ConditionalRequired,
    /// Reported by the submission service (e.g. CPF already registered).
    Duplicate,
    /// Reported by a lookup collaborator (e.g. unknown postal code).
    NotFound,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Required => "required",
            Self::Format => "format",
            Self::Checksum => "checksum",
            Self::ConditionalRequired => "conditional_required",
            Self::Duplicate => "duplicate",
            Self::NotFound => "not_found",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub message: String,
    /// Raised by a rule deferred to blur. Such errors survive keystrokes
    /// until the value satisfies the rule again.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deferred: bool,
}

impl FieldError {
    pub fn new(kind: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            deferred: false,
        }
    }
}

/// Current error per flattened path for one record snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorMap(BTreeMap<String, FieldError>);

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&FieldError> {
        self.0.get(path)
    }

    pub fn get_path(&self, path: &Path) -> Option<&FieldError> {
        self.0.get(&path.to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, error: FieldError) {
        self.0.insert(path.into(), error);
    }

    pub fn remove(&mut self, path: &str) -> Option<FieldError> {
        self.0.remove(path)
    }

    pub fn retain(&mut self, keep: impl FnMut(&String, &mut FieldError) -> bool) {
        self.0.retain(keep);
    }

    pub fn extend(&mut self, other: ErrorMap) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldError)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl FromIterator<(String, FieldError)> for ErrorMap {
    fn from_iter<I: IntoIterator<Item = (String, FieldError)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ErrorMap {
    type Item = (String, FieldError);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
