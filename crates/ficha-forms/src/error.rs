use thiserror::Error;

use ficha_core::PathError;

use crate::collaborators::CollaboratorError;
use crate::wizard::Phase;

#[derive(Debug, Error)]
pub enum FormsError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("unknown step: {0}")]
    UnknownStep(usize),

    #[error("record is not editable while {0}")]
    Locked(Phase),

    #[error("a submission is already in flight")]
    SubmissionInFlight,

    #[error("wizard is not ready to submit")]
    NotSubmitting,

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("invalid wizard definition: {0}")]
    Definition(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
