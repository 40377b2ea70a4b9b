//! ficha-replay
//!
//! Replays a recorded edit session against a wizard definition, standing in
//! for the UI binding layer. Collaborators are served from memory out of the
//! session file; postal-code lookups run through the real debouncer.

pub mod config;
pub mod replay;
pub mod session;
