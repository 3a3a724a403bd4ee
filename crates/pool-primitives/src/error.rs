//! error types for pool primitives

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("point is not on babyjubjub")]
    PointNotOnCurve,

    #[error("poseidon width {0} is not supported")]
    UnsupportedWidth(usize),

    #[error("poseidon arity {0} is not supported")]
    UnsupportedArity(usize),

    #[error("decryption failed: {0}")]
    DecryptionFailed(&'static str),
}

pub type Result<T> = std::result::Result<T, PrimitiveError>;
