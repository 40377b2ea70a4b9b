//! Structural edits to array-valued sub-records.
//!
//! Removing an item shifts every later sibling down by one, so the error
//! map is rebuilt alongside the record: errors inside the removed item are
//! dropped and errors under later siblings move down with them.

use std::sync::Arc;

use ficha_core::{Path, PathError, Record, Segment, Value, ValueKind};

use crate::error_map::ErrorMap;

/// Append `template` to the sequence at `base`, creating the sequence if
/// the field is unset.
pub fn insert(record: &Record, base: &Path, template: Record) -> Result<Record, PathError> {
    let mut items = sequence_at(record, base)?.map(<[Value]>::to_vec).unwrap_or_default();
    items.push(Value::Record(template));
    tracing::debug!(base = %base, len = items.len(), "array item inserted");
    record.set(base, Value::list(items))
}

/// Remove the item at `index` from the sequence at `base`, returning the new
/// record and the error map re-keyed to the shifted indices.
pub fn remove_at(
    record: &Record,
    base: &Path,
    index: usize,
    errors: &ErrorMap,
) -> Result<(Record, ErrorMap), PathError> {
    let items = sequence_at(record, base)?.unwrap_or_default();
    if index >= items.len() {
        return Err(PathError::IndexOutOfRange {
            path: base.to_string(),
            index,
            len: items.len(),
        });
    }

    let mut remaining = items.to_vec();
    remaining.remove(index);
    let updated = record.set(base, Value::List(Arc::new(remaining)))?;

    tracing::debug!(base = %base, index, len = items.len() - 1, "array item removed");
    Ok((updated, reindex_errors(errors, base, index)))
}

/// Re-key `errors` after the item at `removed` left the sequence at `base`.
///
/// Keys that do not parse as paths (collaborator-supplied) are carried over
/// unchanged.
pub fn reindex_errors(errors: &ErrorMap, base: &Path, removed: usize) -> ErrorMap {
    errors
        .iter()
        .filter_map(|(key, error)| {
            let Ok(path) = Path::parse(key) else {
                return Some((key.clone(), error.clone()));
            };
            shift_path(&path, base, removed).map(|moved| (moved.to_string(), error.clone()))
        })
        .collect()
}

/// Where `path` lands once the item at `removed` leaves the sequence at
/// `base`: `None` inside the removed item, one index lower under a later
/// sibling, unchanged anywhere else.
pub fn shift_path(path: &Path, base: &Path, removed: usize) -> Option<Path> {
    if !path.starts_with(base) {
        return Some(path.clone());
    }
    let position = base.len();
    match path.segments().get(position) {
        Some(Segment::Index(i)) if *i == removed => None,
        Some(Segment::Index(i)) if *i > removed => {
            Some(path.with_segment(position, Segment::Index(i - 1)))
        }
        _ => Some(path.clone()),
    }
}

fn sequence_at<'r>(record: &'r Record, base: &Path) -> Result<Option<&'r [Value]>, PathError> {
    match record.get(base) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::List(items)) => Ok(Some(items.as_slice())),
        Some(other) => Err(PathError::KindMismatch {
            path: base.to_string(),
            expected: ValueKind::Sequence,
            found: other.kind(),
        }),
    }
}
