//! in-process pool contract
//!
//! keeps the leaf log, the checkpoint map and the cipher store behind one
//! lock and applies packed proofs the way the deployed contract does: every
//! transaction appends `[newCommitmentRoot[2 + i], newNullRoot[i]]` for both
//! output pairs.

use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};

use ark_ff::Zero;
use pool_merkle::{fixed_root, IncrementalMerkleLog, DEFAULT_MAX_DEPTH};
use pool_primitives::field::{to_be_bytes, to_hex};
use pool_primitives::{hash2, hash4, FieldElement};
use tokio::sync::RwLock;

use super::{ChainReader, ChainWriter, Request, TxHandle};
use crate::circuit::ARITY;
use crate::error::{PoolError, Result};
use crate::proof::{PackedProof, PublicSignals};
use crate::scan::CipherRecord;
use crate::value::Amount;

struct Ledger {
    log: IncrementalMerkleLog,
    /// root -> depth, for every root the log ever had
    checkpoints: HashMap<FieldElement, u64>,
    ciphers: Vec<CipherRecord>,
}

impl Ledger {
    fn record_checkpoint(&mut self) {
        self.checkpoints
            .insert(self.log.root(), self.log.depth() as u64);
    }
}

pub struct MemoryChain {
    scope: FieldElement,
    ledger: RwLock<Ledger>,
}

impl MemoryChain {
    pub fn new(scope: FieldElement) -> Self {
        Self::with_max_depth(scope, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(scope: FieldElement, max_depth: usize) -> Self {
        let mut ledger = Ledger {
            log: IncrementalMerkleLog::new(max_depth),
            checkpoints: HashMap::new(),
            ciphers: Vec::new(),
        };
        ledger.record_checkpoint();
        Self {
            scope,
            ledger: RwLock::new(ledger),
        }
    }

    /// append raw leaves and checkpoint the resulting root
    pub async fn append_leaves(&self, leaves: &[FieldElement]) -> Result<FieldElement> {
        let mut ledger = self.ledger.write().await;
        let root = ledger.log.append(leaves)?;
        ledger.record_checkpoint();
        Ok(root)
    }

    /// append without a checkpoint, as a diverged contract would
    pub async fn append_without_checkpoint(&self, leaves: &[FieldElement]) -> Result<FieldElement> {
        let mut ledger = self.ledger.write().await;
        Ok(ledger.log.append(leaves)?)
    }

    /// publish a cipher record, its index is the next store slot
    pub async fn push_cipher(&self, mut record: CipherRecord) -> u64 {
        let mut ledger = self.ledger.write().await;
        record.index = ledger.ciphers.len() as u64;
        let index = record.index;
        ledger.ciphers.push(record);
        index
    }

    /// copy of the current log
    pub async fn snapshot(&self) -> IncrementalMerkleLog {
        self.ledger.read().await.log.clone()
    }

    fn context_for(&self, request: &Request) -> FieldElement {
        let shape = hash4(&[
            request.src.to_field(),
            request.sink.to_field(),
            request.fee_collector.to_field(),
            request.fee.to_field(),
        ]);
        hash2(&shape, &self.scope)
    }

    /// the contract's checks, against a read view of the ledger
    fn simulate(
        &self,
        ledger: &Ledger,
        request: &Request,
        signals: &PublicSignals,
        external_value: Amount,
    ) -> Result<()> {
        let reject = |msg: String| Err(PoolError::SimulationFailed(msg));

        if signals.scope() != self.scope {
            return reject("scope does not match the pool".into());
        }
        if signals.context() != self.context_for(request) {
            return reject("context does not match the request".into());
        }

        let root = signals.existing_state_root();
        match ledger.checkpoints.get(&root) {
            Some(&depth) if FieldElement::from(depth) == signals.actual_tree_depth() => {}
            Some(_) => return reject("tree depth does not match the checkpoint".into()),
            None => return reject(format!("unknown state root {}", to_hex(&root))),
        }

        if signals.external_input() != external_value.to_field() {
            return reject("attached value does not match the external input".into());
        }

        let null_roots = signals.new_null_roots();
        let commitment_roots = signals.new_commitment_roots();
        let hashes = signals.new_commitment_hashes();
        for null_root in &null_roots[..ARITY] {
            if ledger.log.contains(null_root) {
                return reject(format!("null root {} already spent", to_hex(null_root)));
            }
        }
        for (slot, (_, cipher)) in signals.new_outputs().iter().enumerate() {
            let out = ARITY + slot;
            if ledger.log.contains(&commitment_roots[out]) {
                return reject(format!("commitment root in slot {out} already exists"));
            }
            let mut leaves = cipher.to_vec();
            leaves.push(hashes[out]);
            if fixed_root(&leaves) != commitment_roots[out] {
                return reject(format!("commitment root in slot {out} does not bind its ciphertext"));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChainReader for MemoryChain {
    async fn get_log_size(&self) -> Result<u64> {
        Ok(self.ledger.read().await.log.size() as u64)
    }

    async fn get_roots_in_range(&self, range: RangeInclusive<u64>) -> Result<Vec<FieldElement>> {
        let ledger = self.ledger.read().await;
        let leaves = ledger.log.leaves();
        let (from, to) = (*range.start() as usize, *range.end() as usize);
        if from > to || to >= leaves.len() {
            return Err(PoolError::Chain(format!(
                "roots {from}..={to} outside log of size {}",
                leaves.len()
            )));
        }
        Ok(leaves[from..=to].to_vec())
    }

    async fn get_checkpoint(&self, root: FieldElement) -> Result<Option<u64>> {
        Ok(self.ledger.read().await.checkpoints.get(&root).copied())
    }

    async fn get_ciphers_in_range(&self, range: Range<u64>) -> Result<Vec<CipherRecord>> {
        let ledger = self.ledger.read().await;
        let end = (range.end as usize).min(ledger.ciphers.len());
        let start = (range.start as usize).min(end);
        Ok(ledger.ciphers[start..end].to_vec())
    }

    async fn get_scope(&self) -> Result<FieldElement> {
        Ok(self.scope)
    }

    async fn get_context(&self, request: &Request) -> Result<FieldElement> {
        Ok(self.context_for(request))
    }
}

#[async_trait::async_trait]
impl ChainWriter for MemoryChain {
    async fn submit(
        &self,
        request: &Request,
        proof: &PackedProof,
        external_value: Amount,
    ) -> Result<TxHandle> {
        let signals = &proof.signals;
        let mut ledger = self.ledger.write().await;
        self.simulate(&ledger, request, signals, external_value)?;

        let null_roots = signals.new_null_roots();
        let commitment_roots = signals.new_commitment_roots();
        let mut leaves = Vec::with_capacity(2 * ARITY);
        for slot in 0..ARITY {
            leaves.push(commitment_roots[ARITY + slot]);
            leaves.push(null_roots[slot]);
        }
        let root = ledger
            .log
            .append(&leaves)
            .map_err(|e| PoolError::SimulationFailed(e.to_string()))?;
        ledger.record_checkpoint();

        let hashes = signals.new_commitment_hashes();
        for (slot, (salt_public_key, cipher)) in signals.new_outputs().into_iter().enumerate() {
            let index = ledger.ciphers.len() as u64;
            ledger.ciphers.push(CipherRecord {
                cipher,
                salt_public_key,
                commitment_hash: hashes[ARITY + slot],
                index,
            });
        }

        tracing::info!(
            root = %to_hex(&root),
            size = ledger.log.size(),
            "applied pool transaction"
        );
        Ok(TxHandle(to_be_bytes(&root)))
    }
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new(FieldElement::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_root_is_checkpointed() {
        let chain = MemoryChain::new(FieldElement::from(1u64));
        assert_eq!(chain.get_log_size().await.unwrap(), 0);
        assert_eq!(chain.get_checkpoint(FieldElement::zero()).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_append_records_checkpoint() {
        let chain = MemoryChain::new(FieldElement::from(1u64));
        let leaves: Vec<FieldElement> = (1..=3u64).map(FieldElement::from).collect();
        let root = chain.append_leaves(&leaves).await.unwrap();
        assert_eq!(chain.get_checkpoint(root).await.unwrap(), Some(2));
        assert_eq!(chain.get_roots_in_range(1..=2).await.unwrap(), leaves[1..].to_vec());
        assert!(chain.get_roots_in_range(2..=3).await.is_err());

        let hidden = chain.append_without_checkpoint(&[FieldElement::from(9u64)]).await.unwrap();
        assert_eq!(chain.get_checkpoint(hidden).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cipher_range_clamps() {
        let chain = MemoryChain::default();
        assert!(chain.get_ciphers_in_range(0..10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_binds_scope() {
        let a = MemoryChain::new(FieldElement::from(1u64));
        let b = MemoryChain::new(FieldElement::from(2u64));
        let request = Request::default();
        assert_ne!(
            a.get_context(&request).await.unwrap(),
            b.get_context(&request).await.unwrap()
        );
    }
}
