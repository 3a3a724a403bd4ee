//! privacy pool core
//!
//! shielded value lives in commitments: an encrypted `(value, scope, secret)`
//! tuple whose commitment root goes into an append-only on-chain log, and
//! whose null root is recorded next to the outputs when it is spent.
//!
//! - [`commitment`]: create, recover, compare, portable json
//! - [`keys`]: key derivation and nonce-bounded trial decryption
//! - [`state`]: local log synced against a [`chain::ChainReader`]
//! - [`circuit`]: 2-in / 2-out witness and expected public outputs
//! - [`proof`]: snarkjs proofs to verifier calldata and back
//! - [`process`]: prove and submit one transaction

pub mod chain;
pub mod circuit;
pub mod commitment;
pub mod config;
pub mod error;
pub mod keys;
pub mod portable;
pub mod process;
pub mod proof;
pub mod scan;
pub mod state;
pub mod value;

pub use chain::{Address, ChainReader, ChainWriter, MemoryChain, Request, TxHandle};
pub use circuit::{CircuitInputBuilder, CircuitInputs, CircuitWitness, ExpectedPublicOutputs};
pub use commitment::{Challenge, Commitment, LocatedCommitment, OwnershipCheck};
pub use config::PoolConfig;
pub use error::{PoolError, RecoveryError, Result};
pub use keys::{KeyStore, PrivacyKey};
pub use process::{process, DryRunProver, Intent, Prover};
pub use proof::{pack, unpack, PackedProof, PublicSignals, RawProof};
pub use scan::{CipherRecord, Scanner};
pub use state::{PoolState, SyncStatus};
pub use value::{Amount, ExternIo};

pub use pool_merkle::{IncrementalMerkleLog, MerkleProof};
pub use pool_primitives::{FieldElement, Point};
