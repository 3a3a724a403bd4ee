//! chain collaborators
//!
//! the pool contract is reached through two capabilities: a read side used
//! by sync and scanning, and a write side that submits packed proofs. both are
//! async, retry and backoff belong to the implementation.

mod memory;

pub use memory::MemoryChain;

use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

use pool_primitives::field::from_be_bytes;
use pool_primitives::FieldElement;

use crate::error::{PoolError, Result};
use crate::proof::PackedProof;
use crate::value::Amount;

pub use crate::scan::CipherRecord;

/// 20-byte account address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| PoolError::Serialization(e.to_string()))?;
        let inner: [u8; 20] = bytes
            .try_into()
            .map_err(|_| PoolError::Serialization("address must be 20 bytes".into()))?;
        Ok(Self(inner))
    }

    pub fn to_field(self) -> FieldElement {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        // 160 bits always fit below the modulus
        from_be_bytes(&word).unwrap_or_default()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// shape of a pool transaction, bound into the proof through its context
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Request {
    pub src: Address,
    pub sink: Address,
    pub fee_collector: Address,
    pub fee: Amount,
}

/// handle of a submitted transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxHandle(pub [u8; 32]);

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// read side of the pool contract
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// number of leaves in the on-chain log
    async fn get_log_size(&self) -> Result<u64>;

    /// leaves `from..=to`
    async fn get_roots_in_range(&self, range: RangeInclusive<u64>) -> Result<Vec<FieldElement>>;

    /// depth of the tree when `root` was its root, if it ever was
    async fn get_checkpoint(&self, root: FieldElement) -> Result<Option<u64>>;

    /// cipher records for leaf pairs `from..to`
    async fn get_ciphers_in_range(&self, range: Range<u64>) -> Result<Vec<CipherRecord>>;

    async fn get_scope(&self) -> Result<FieldElement>;

    /// anti-replay binding for `request`
    async fn get_context(&self, request: &Request) -> Result<FieldElement>;
}

/// write side of the pool contract
#[async_trait::async_trait]
pub trait ChainWriter: Send + Sync {
    /// submit a packed proof, failing with `SimulationFailed` when the
    /// contract would reject it
    async fn submit(
        &self,
        request: &Request,
        proof: &PackedProof,
        external_value: Amount,
    ) -> Result<TxHandle>;
}

#[async_trait::async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn get_log_size(&self) -> Result<u64> {
        (**self).get_log_size().await
    }

    async fn get_roots_in_range(&self, range: RangeInclusive<u64>) -> Result<Vec<FieldElement>> {
        (**self).get_roots_in_range(range).await
    }

    async fn get_checkpoint(&self, root: FieldElement) -> Result<Option<u64>> {
        (**self).get_checkpoint(root).await
    }

    async fn get_ciphers_in_range(&self, range: Range<u64>) -> Result<Vec<CipherRecord>> {
        (**self).get_ciphers_in_range(range).await
    }

    async fn get_scope(&self) -> Result<FieldElement> {
        (**self).get_scope().await
    }

    async fn get_context(&self, request: &Request) -> Result<FieldElement> {
        (**self).get_context(request).await
    }
}

#[async_trait::async_trait]
impl<T: ChainWriter + ?Sized> ChainWriter for Arc<T> {
    async fn submit(
        &self,
        request: &Request,
        proof: &PackedProof,
        external_value: Amount,
    ) -> Result<TxHandle> {
        (**self).submit(request, proof, external_value).await
    }
}

#[async_trait::async_trait]
impl<T: ChainReader + ?Sized> ChainReader for &T {
    async fn get_log_size(&self) -> Result<u64> {
        (**self).get_log_size().await
    }

    async fn get_roots_in_range(&self, range: RangeInclusive<u64>) -> Result<Vec<FieldElement>> {
        (**self).get_roots_in_range(range).await
    }

    async fn get_checkpoint(&self, root: FieldElement) -> Result<Option<u64>> {
        (**self).get_checkpoint(root).await
    }

    async fn get_ciphers_in_range(&self, range: Range<u64>) -> Result<Vec<CipherRecord>> {
        (**self).get_ciphers_in_range(range).await
    }

    async fn get_scope(&self) -> Result<FieldElement> {
        (**self).get_scope().await
    }

    async fn get_context(&self, request: &Request) -> Result<FieldElement> {
        (**self).get_context(request).await
    }
}

#[async_trait::async_trait]
impl<T: ChainWriter + ?Sized> ChainWriter for &T {
    async fn submit(
        &self,
        request: &Request,
        proof: &PackedProof,
        external_value: Amount,
    ) -> Result<TxHandle> {
        (**self).submit(request, proof, external_value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex() {
        let addr = Address::from_hex("0x00000000000000000000000000000000000000ff").unwrap();
        assert_eq!(addr.to_field(), FieldElement::from(255u64));
        assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000ff");
        assert!(Address::from_hex("0x1234").is_err());
    }
}
