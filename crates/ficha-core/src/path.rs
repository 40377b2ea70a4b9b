//! Dotted/indexed paths into a nested record.
//!
//! A concrete [`Path`] such as `cuidadores.2.endereco.cep` addresses exactly
//! one location. A [`PathPattern`] may also contain `*` in place of an array
//! index (`cuidadores.*.cpf`) and is what field descriptors are declared
//! against.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PathError;

/// One step of a path: a field name or an array position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Ordered sequence of segments addressing one location in a record.
///
/// The empty path is the record root. It formats as the empty string but is
/// never produced by [`Path::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Parse the flat `a.b.0.c` form.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        split(raw)?
            .map(|part| match parse_part(raw, part)? {
                PatternSegment::Key(key) => Ok(Segment::Key(key)),
                PatternSegment::Index(index) => Ok(Segment::Index(index)),
                PatternSegment::Wildcard => Err(PathError::malformed(
                    raw,
                    "wildcard '*' is only allowed in path patterns",
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// The path with its final segment removed. `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    /// The first `len` segments (clamped to the path length).
    pub fn prefix(&self, len: usize) -> Path {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.0.push(Segment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.0.push(Segment::Index(index));
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.push_key(key);
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.push_index(index);
        self
    }

    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// Array indices appearing in the path, in order.
    pub fn indices(&self) -> Vec<usize> {
        self.0.iter().filter_map(Segment::as_index).collect()
    }

    /// Replace the segment at `position` with `segment`.
    pub fn with_segment(&self, position: usize, segment: Segment) -> Path {
        let mut segments = self.0.clone();
        if let Some(slot) = segments.get_mut(position) {
            *slot = segment;
        }
        Self(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Segment of a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
    Key(String),
    Index(usize),
    /// Any array index.
    Wildcard,
}

impl fmt::Display for PatternSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

/// A path whose array segments may be `*`.
///
/// Wildcards bind positionally: the n-th wildcard of the pattern takes the
/// index found at the same position of a concrete path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern(Vec<PatternSegment>);

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        split(raw)?
            .map(|part| parse_part(raw, part))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn wildcard_count(&self) -> usize {
        self.0
            .iter()
            .filter(|s| matches!(s, PatternSegment::Wildcard))
            .count()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.bind(path).is_some()
    }

    /// Indices captured by the wildcards when `path` matches the pattern.
    pub fn bind(&self, path: &Path) -> Option<Vec<usize>> {
        if self.0.len() != path.len() {
            return None;
        }
        let mut captured = Vec::new();
        for (pattern, segment) in self.0.iter().zip(path.segments()) {
            match (pattern, segment) {
                (PatternSegment::Key(a), Segment::Key(b)) if a == b => {}
                (PatternSegment::Index(a), Segment::Index(b)) if a == b => {}
                (PatternSegment::Wildcard, Segment::Index(i)) => captured.push(*i),
                _ => return None,
            }
        }
        Some(captured)
    }

    /// Substitute wildcards with `indices`, left to right.
    ///
    /// Extra indices are ignored so that a pattern may be bound with the
    /// captures of a deeper pattern sharing its array prefix.
    pub fn instantiate(&self, indices: &[usize]) -> Result<Path, PathError> {
        let mut remaining = indices.iter();
        let mut segments = Vec::with_capacity(self.0.len());
        for segment in &self.0 {
            segments.push(match segment {
                PatternSegment::Key(key) => Segment::Key(key.clone()),
                PatternSegment::Index(index) => Segment::Index(*index),
                PatternSegment::Wildcard => match remaining.next() {
                    Some(index) => Segment::Index(*index),
                    None => {
                        return Err(PathError::malformed(
                            &self.to_string(),
                            format!(
                                "{} indices supplied for {} wildcards",
                                indices.len(),
                                self.wildcard_count()
                            ),
                        ));
                    }
                },
            });
        }
        Ok(Path(segments))
    }

    /// Pattern with its last segment replaced by the key `sibling`.
    pub fn sibling(&self, sibling: &str) -> PathPattern {
        let mut segments = self.0.clone();
        segments.pop();
        segments.push(PatternSegment::Key(sibling.to_string()));
        Self(segments)
    }

    /// Whether `prefix` matches the start of this pattern segment by segment,
    /// a wildcard on either side accepting any index.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        prefix.len() <= self.0.len()
            && self
                .0
                .iter()
                .zip(prefix.segments())
                .all(|(pattern, segment)| match (pattern, segment) {
                    (PatternSegment::Key(a), Segment::Key(b)) => a == b,
                    (PatternSegment::Index(a), Segment::Index(b)) => a == b,
                    (PatternSegment::Wildcard, Segment::Index(_)) => true,
                    _ => false,
                })
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&Path> for PathPattern {
    fn from(path: &Path) -> Self {
        Self(
            path.segments()
                .iter()
                .map(|segment| match segment {
                    Segment::Key(key) => PatternSegment::Key(key.clone()),
                    Segment::Index(index) => PatternSegment::Index(*index),
                })
                .collect(),
        )
    }
}

impl FromStr for PathPattern {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PathPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn split(raw: &str) -> Result<std::str::Split<'_, char>, PathError> {
    if raw.is_empty() {
        return Err(PathError::malformed(raw, "empty path"));
    }
    Ok(raw.split('.'))
}

fn parse_part(raw: &str, part: &str) -> Result<PatternSegment, PathError> {
    if part.is_empty() {
        return Err(PathError::malformed(raw, "empty segment"));
    }
    if part == "*" {
        return Ok(PatternSegment::Wildcard);
    }
    if part.bytes().all(|b| b.is_ascii_digit()) {
        if part.len() > 1 && part.starts_with('0') {
            return Err(PathError::malformed(
                raw,
                format!("index '{part}' has a leading zero"),
            ));
        }
        return part
            .parse::<usize>()
            .map(PatternSegment::Index)
            .map_err(|_| PathError::malformed(raw, format!("index '{part}' is too large")));
    }
    let unsigned = part.strip_prefix(['-', '+']);
    if unsigned.is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())) {
        return Err(PathError::malformed(
            raw,
            format!("index '{part}' must be a non-negative integer"),
        ));
    }
    Ok(PatternSegment::Key(part.to_string()))
}
