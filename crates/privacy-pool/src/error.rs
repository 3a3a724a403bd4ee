//! error types for the privacy pool

use pool_merkle::MerkleError;
use pool_primitives::PrimitiveError;
use thiserror::Error;

/// failure to recover a commitment from a ciphertext
///
/// expected while scanning: a candidate that fails is simply not ours.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    #[error("decryption failed: {0}")]
    Decryption(PrimitiveError),

    #[error("decrypted value does not fit an amount")]
    ValueOutOfRange,

    #[error("challenge mismatch on {0}")]
    ChallengeMismatch(&'static str),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("encryption consistency check failed: {0}")]
    EncryptionConsistency(&'static str),

    #[error("portable commitment disagrees on {0}")]
    PortableMismatch(&'static str),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("chain rolled back: local size {local}, remote size {remote}")]
    ChainRolledBack { local: u64, remote: u64 },

    #[error("desync detected: {0}")]
    DesyncDetected(String),

    #[error("commitment not in state: {0}")]
    CommitmentNotInState(String),

    #[error("expected 2 existing and 2 new commitments, got {existing} and {new}")]
    InvalidArity { existing: usize, new: usize },

    #[error("invalid external io: {0}")]
    InvalidExternIo(String),

    #[error("commitment in slot {slot} is bound to another scope")]
    ScopeMismatch { slot: usize },

    #[error("key material for slot {slot} does not match its commitment")]
    KeyMismatch { slot: usize },

    #[error("value overflow")]
    ValueOverflow,

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("public signal {index} differs from the expected value")]
    SignalMismatch { index: usize },

    #[error("proving failed: {0}")]
    ProvingFailed(String),

    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for PoolError {
    fn from(e: serde_json::Error) -> Self {
        PoolError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
