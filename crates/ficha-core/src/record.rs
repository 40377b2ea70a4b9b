//! The dynamic record edited by a wizard, and path-scoped reads and writes.
//!
//! Containers are reference counted. [`Record::set`] returns a new record in
//! which only the containers on the written path were copied; every other
//! subtree is shared with the input.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PathError;
use crate::path::{Path, Segment};

/// A leaf or container inside a [`Record`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Unset. Writing `Null` to a keyed slot removes the key.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Arc<Vec<Value>>),
    Record(Record),
}

/// Coarse shape of a [`Value`], used in structural errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Text,
    Sequence,
    Record,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::Text => "text",
            Self::Sequence => "sequence",
            Self::Record => "record",
        })
    }
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Arc::new(items))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
            Self::List(_) => ValueKind::Sequence,
            Self::Record(_) => ValueKind::Record,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for null, blank text and empty sequences: what a required field
    /// considers "not filled in".
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Number(_) | Self::Record(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Text rendering used when comparing a field against a literal
    /// (`possuiVeiculo == "sim"`). Containers and null have none.
    pub fn to_plain_string(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null | Self::List(_) | Self::Record(_) => None,
        }
    }

    fn child(&self, segment: &Segment) -> Option<&Value> {
        match (self, segment) {
            (Self::Record(record), Segment::Key(key)) => record.field(key),
            (Self::List(items), Segment::Index(index)) => items.get(*index),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::list(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Self::Record(Record::from(map)),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map_or(serde_json::Value::Null, serde_json::Value::Number)
                }
            }
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Record(record) => serde_json::Value::from(record),
        }
    }
}

/// A nested mapping from field names to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Arc<BTreeMap<String, Value>>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Builder-style insert used to assemble templates and fixtures.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let (key, value) = (key.into(), value.into());
        let fields = Arc::make_mut(&mut self.0);
        if value.is_null() {
            fields.remove(&key);
        } else {
            fields.insert(key, value);
        }
        self
    }

    /// Read the value at `path`.
    ///
    /// Missing keys, out-of-range indices and container-kind mismatches all
    /// read as `None`: wizards routinely address paths that do not exist yet.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.field(first.as_key()?)?;
        for segment in rest {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Text at `path`, if the value there is text.
    pub fn get_str(&self, path: &Path) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Write `value` at `path`, returning the updated record.
    ///
    /// Missing intermediate containers are created: a record, or an empty
    /// sequence when the following segment is an index. Sequences never grow
    /// here, so an index at or past the end is [`PathError::IndexOutOfRange`].
    pub fn set(&self, path: &Path, value: Value) -> Result<Record, PathError> {
        if path.is_empty() {
            return Err(PathError::malformed("", "cannot set the record root"));
        }
        let mut updated = self.clone();
        write_record(&mut updated, path, 0, value)?;
        Ok(updated)
    }

    /// Remove the value at `path`. Removing an absent key is a no-op.
    pub fn unset(&self, path: &Path) -> Result<Record, PathError> {
        if self.get(path).is_none() {
            return Ok(self.clone());
        }
        self.set(path, Value::Null)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(Arc::new(
            map.into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .filter(|(_, v)| !v.is_null())
                .collect(),
        ))
    }
}

impl From<&Record> for serde_json::Value {
    fn from(record: &Record) -> Self {
        serde_json::Value::Object(
            record
                .fields()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                .collect(),
        )
    }
}

fn write_record(
    record: &mut Record,
    path: &Path,
    depth: usize,
    value: Value,
) -> Result<(), PathError> {
    let segments = path.segments();
    let key = match &segments[depth] {
        Segment::Key(key) => key,
        Segment::Index(_) => {
            return Err(PathError::KindMismatch {
                path: path.prefix(depth).to_string(),
                expected: ValueKind::Sequence,
                found: ValueKind::Record,
            });
        }
    };

    let fields = Arc::make_mut(&mut record.0);
    if depth + 1 == segments.len() {
        if value.is_null() {
            fields.remove(key);
        } else {
            fields.insert(key.clone(), value);
        }
        return Ok(());
    }

    let child = fields.entry(key.clone()).or_insert(Value::Null);
    write_child(child, path, depth + 1, value)
}

fn write_list(
    items: &mut Arc<Vec<Value>>,
    path: &Path,
    depth: usize,
    value: Value,
) -> Result<(), PathError> {
    let segments = path.segments();
    let index = match &segments[depth] {
        Segment::Index(index) => *index,
        Segment::Key(_) => {
            return Err(PathError::KindMismatch {
                path: path.prefix(depth).to_string(),
                expected: ValueKind::Record,
                found: ValueKind::Sequence,
            });
        }
    };
    if index >= items.len() {
        return Err(PathError::IndexOutOfRange {
            path: path.prefix(depth).to_string(),
            index,
            len: items.len(),
        });
    }

    let items = Arc::make_mut(items);
    if depth + 1 == segments.len() {
        items[index] = value;
        return Ok(());
    }
    write_child(&mut items[index], path, depth + 1, value)
}

/// Descend into `slot`, the value found at `path[..depth]`.
fn write_child(slot: &mut Value, path: &Path, depth: usize, value: Value) -> Result<(), PathError> {
    if slot.is_null() {
        *slot = match path.segments()[depth] {
            Segment::Index(_) => Value::list(Vec::new()),
            Segment::Key(_) => Value::Record(Record::new()),
        };
    }
    match slot {
        Value::Record(record) => write_record(record, path, depth, value),
        Value::List(items) => write_list(items, path, depth, value),
        leaf => Err(PathError::KindMismatch {
            path: path.prefix(depth).to_string(),
            expected: match path.segments()[depth] {
                Segment::Index(_) => ValueKind::Sequence,
                Segment::Key(_) => ValueKind::Record,
            },
            found: leaf.kind(),
        }),
    }
}
