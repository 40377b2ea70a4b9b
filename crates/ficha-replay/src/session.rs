//! Recorded edit sessions.
//!
//! A session is the sequence of UI events a user produced, plus the canned
//! collaborator answers the replay serves them from.

use std::path::Path;

use ficha_core::Record;
use ficha_forms::collaborators::{
    CollaboratorError, MemoryAddressBook, MemoryReferenceData, SubmitOutcome,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Event {
    /// Raw keystroke input; masked by the wizard before it is stored.
    Update {
        path: String,
        value: serde_json::Value,
    },
    Blur {
        path: String,
    },
    Insert {
        path: String,
    },
    Remove {
        path: String,
        index: usize,
    },
    Next,
    Back,
    Goto {
        step: usize,
    },
    /// Idle time between keystrokes.
    Wait {
        ms: u64,
    },
    /// Wait for every pending lookup and apply the answers.
    Settle,
    Submit,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update { .. } => "update",
            Self::Blur { .. } => "blur",
            Self::Insert { .. } => "insert",
            Self::Remove { .. } => "remove",
            Self::Next => "next",
            Self::Back => "back",
            Self::Goto { .. } => "goto",
            Self::Wait { .. } => "wait",
            Self::Settle => "settle",
            Self::Submit => "submit",
        }
    }
}

/// One scripted answer of the submission service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptedResponse {
    Outcome(SubmitOutcome),
    /// Transport failure.
    Unavailable { unavailable: String },
}

impl ScriptedResponse {
    pub fn into_result(self) -> Result<SubmitOutcome, CollaboratorError> {
        match self {
            Self::Outcome(outcome) => Ok(outcome),
            Self::Unavailable { unavailable } => Err(CollaboratorError::Unavailable(unavailable)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collaborators {
    #[serde(default)]
    pub addresses: MemoryAddressBook,
    #[serde(default)]
    pub reference_data: MemoryReferenceData,
    #[serde(default)]
    pub submissions: Vec<ScriptedResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Existing record being amended; a fresh wizard starts empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(default)]
    pub collaborators: Collaborators,
    pub events: Vec<Event>,
}

impl Session {
    pub fn from_json_str(contents: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read session at {}: {e}", path.display()))?;
        let session = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            events = session.events.len(),
            "session loaded"
        );
        Ok(session)
    }
}
