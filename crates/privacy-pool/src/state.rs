//! local pool state
//!
//! a [`PoolState`] owns a local [`IncrementalMerkleLog`] that must stay a
//! provable prefix of the on-chain log. sync fetches the missing leaves,
//! appends them to a staged copy and accepts the copy only when the chain
//! has a checkpoint for the resulting root.
//!
//! a single state is not reentrant, `sync` and `decrypt_ciphers` take
//! `&mut self` / `&self` accordingly and callers serialize them.
//!
//! Sync outcomes:
//! - `Synced`: the local log matches a checkpointed chain root
//! - `Idle`: the reader failed, nothing changed, retry later
//! - `DesyncDetected`: the chain rolled back, returned a duplicate leaf or has
//!   no checkpoint for our root. the log is kept as it was and the caller
//!   decides whether to rebuild from scratch
//!
//! Usage:
//! ```ignore
//! let mut state = PoolState::new(&chain, PoolConfig::default());
//! state.sync().await?;
//! let mine = state.decrypt_ciphers(&[key], None).await?.remove(0);
//! let inputs = state.build_circuit_inputs(scope, context, &existing, &new, None)?;
//! ```

use std::ops::Range;

use pool_merkle::{IncrementalMerkleLog, MerkleError};
use pool_primitives::field::{parse_hex, to_hex};
use pool_primitives::FieldElement;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainReader, Request};
use crate::circuit::{CircuitInputBuilder, CircuitInputs};
use crate::commitment::{Commitment, LocatedCommitment};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::keys::PrivacyKey;
use crate::scan::Scanner;
use crate::value::ExternIo;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Synced,
    DesyncDetected,
}

pub struct PoolState<R> {
    reader: R,
    log: IncrementalMerkleLog,
    status: SyncStatus,
    last_synced_size: u64,
    scope: Option<FieldElement>,
    config: PoolConfig,
}

impl<R: ChainReader> PoolState<R> {
    pub fn new(reader: R, config: PoolConfig) -> Self {
        let log = IncrementalMerkleLog::new(config.max_depth);
        Self::from_parts(reader, log, config)
    }

    /// resume from a previously stored log
    pub fn from_parts(reader: R, log: IncrementalMerkleLog, config: PoolConfig) -> Self {
        Self {
            reader,
            last_synced_size: log.size() as u64,
            log,
            status: SyncStatus::Idle,
            scope: None,
            config,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn log(&self) -> &IncrementalMerkleLog {
        &self.log
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn last_synced_size(&self) -> u64 {
        self.last_synced_size
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// bring the local log up to the chain
    ///
    /// on failure the log is untouched. io errors leave the status `Idle`,
    /// anything that means the two logs disagree sets `DesyncDetected`.
    pub async fn sync(&mut self) -> Result<SyncStatus> {
        self.status = SyncStatus::Syncing;
        match self.sync_staged().await {
            Ok(staged) => {
                if let Some(log) = staged {
                    self.log = log;
                }
                self.last_synced_size = self.log.size() as u64;
                self.status = SyncStatus::Synced;
                Ok(self.status)
            }
            Err(e) => {
                self.status = match e {
                    PoolError::Chain(_) => SyncStatus::Idle,
                    _ => SyncStatus::DesyncDetected,
                };
                tracing::warn!(error = %e, status = ?self.status, "sync failed");
                Err(e)
            }
        }
    }

    /// the synced log, or `None` when nothing changed
    async fn sync_staged(&self) -> Result<Option<IncrementalMerkleLog>> {
        let local = self.log.size() as u64;
        let remote = self.reader.get_log_size().await?;

        if remote < local {
            return Err(PoolError::ChainRolledBack { local, remote });
        }
        if remote == local {
            tracing::debug!(size = local, "already synced");
            return Ok(None);
        }

        let roots = self.reader.get_roots_in_range(local..=remote - 1).await?;
        if roots.len() as u64 != remote - local {
            return Err(PoolError::DesyncDetected(format!(
                "asked for {} roots, chain returned {}",
                remote - local,
                roots.len()
            )));
        }

        let mut staged = self.log.clone();
        staged.append(&roots).map_err(|e| match e {
            MerkleError::DuplicateLeaf(leaf) => {
                PoolError::DesyncDetected(format!("duplicate leaf {leaf}"))
            }
            other => PoolError::Merkle(other),
        })?;

        let root = staged.root();
        match self.reader.get_checkpoint(root).await? {
            Some(depth) if depth == staged.depth() as u64 => {}
            Some(depth) => {
                return Err(PoolError::DesyncDetected(format!(
                    "checkpoint depth {depth} for root {}, local depth {}",
                    to_hex(&root),
                    staged.depth()
                )))
            }
            None => {
                return Err(PoolError::DesyncDetected(format!(
                    "no checkpoint for root {}",
                    to_hex(&root)
                )))
            }
        }

        tracing::info!(from = local, to = remote, root = %to_hex(&root), "synced pool log");
        Ok(Some(staged))
    }

    /// pool scope, read from the chain once
    pub async fn scope(&mut self) -> Result<FieldElement> {
        if let Some(scope) = self.scope {
            return Ok(scope);
        }
        let scope = self.reader.get_scope().await?;
        self.scope = Some(scope);
        Ok(scope)
    }

    pub async fn context(&self, request: &Request) -> Result<FieldElement> {
        self.reader.get_context(request).await
    }

    /// spendable commitments per key
    ///
    /// `range` is a half-open range of leaf pairs, defaulting to every pair
    /// on chain. records are fetched `batch_size` at a time.
    pub async fn decrypt_ciphers(
        &self,
        keys: &[PrivacyKey],
        range: Option<Range<u64>>,
    ) -> Result<Vec<Vec<LocatedCommitment>>> {
        let range = match range {
            Some(range) => range,
            None => 0..self.reader.get_log_size().await? / 2,
        };

        let batch = self.config.batch_size.max(1);
        let mut records = Vec::new();
        let mut start = range.start;
        while start < range.end {
            let end = start.saturating_add(batch).min(range.end);
            records.extend(self.reader.get_ciphers_in_range(start..end).await?);
            start = end;
        }
        tracing::debug!(records = records.len(), keys = keys.len(), "scanning ciphers");

        let owned: Vec<Vec<LocatedCommitment>> = keys
            .iter()
            .map(|key| {
                Scanner::new(key)
                    .scan(&records)
                    .into_iter()
                    .filter(|found| self.is_spendable(&found.commitment, found.index))
                    .collect()
            })
            .collect();
        Ok(owned)
    }

    fn is_spendable(&self, commitment: &Commitment, index: u64) -> bool {
        if commitment.is_void() {
            return false;
        }
        if !self.log.contains(&commitment.commitment_root()) {
            tracing::warn!(
                index,
                root = %to_hex(&commitment.commitment_root()),
                "recovered commitment is not in the local log"
            );
            return false;
        }
        !(self.config.ignore_nullified && self.log.contains(&commitment.null_root()))
    }

    /// circuit inputs against the current local log
    pub fn build_circuit_inputs(
        &self,
        scope: FieldElement,
        context: FieldElement,
        existing: &[Commitment],
        new: &[Commitment],
        extern_io: Option<ExternIo>,
    ) -> Result<CircuitInputs> {
        let mut builder = CircuitInputBuilder::new(&self.log, scope, context);
        if let Some(io) = extern_io {
            builder = builder.with_extern_io(io);
        }
        builder.build(existing, new)
    }

    pub fn export_rootset(&self) -> Result<String> {
        export_rootset(&self.log)
    }
}

#[derive(Serialize, Deserialize)]
struct RootSetJson {
    rootset: Vec<String>,
}

/// `{ "rootset": ["0x…"] }`, leaves in insertion order
pub fn export_rootset(log: &IncrementalMerkleLog) -> Result<String> {
    let doc = RootSetJson {
        rootset: log.leaves().iter().map(to_hex).collect(),
    };
    Ok(serde_json::to_string(&doc)?)
}

pub fn import_rootset(json: &str, max_depth: usize) -> Result<IncrementalMerkleLog> {
    let doc: RootSetJson = serde_json::from_str(json)?;
    let leaves = doc
        .rootset
        .iter()
        .map(|s| parse_hex(s))
        .collect::<std::result::Result<Vec<FieldElement>, _>>()?;
    Ok(IncrementalMerkleLog::from_leaves(max_depth, &leaves)?)
}
