//! ficha-core
//!
//! Typed path addressing and the copy-on-write record model that every
//! wizard edits. Pure data, no async: the shared vocabulary of the ficha
//! engine.

pub mod error;
pub mod path;
pub mod record;

pub use crate::error::PathError;
pub use crate::path::{Path, PathPattern, PatternSegment, Segment};
pub use crate::record::{Record, Value, ValueKind};
