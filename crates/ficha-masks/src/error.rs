use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("unknown mask kind: {0}")]
    UnknownKind(String),

    #[error("unknown payment key type: {0}")]
    UnknownKeyType(String),
}
