//! field and curve primitives for the privacy pool
//!
//! - bn254 scalar field helpers with strict parsing
//! - babyjubjub point arithmetic
//! - circom poseidon (widths 3 to 5)
//! - poseidon duplex cipher keyed by an ecdh point

pub mod babyjubjub;
pub mod cipher;
pub mod error;
pub mod field;
pub mod poseidon;

pub use babyjubjub::{public_key, Point, BASE8};
pub use error::{PrimitiveError, Result};
pub use field::FieldElement;
pub use poseidon::{hash, hash2, hash4};
