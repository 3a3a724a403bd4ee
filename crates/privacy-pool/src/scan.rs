//! trial decryption of on-chain ciphertexts
//!
//! every record is tried against a bounded nonce window. records that do not
//! decrypt belong to someone else and are skipped silently.
//!
//! - [`ScanRecover`]: lazy iterator, stop whenever the caller has enough
//! - [`Scanner::scan_parallel`]: rayon across records, results in record order
//!
//! Cost is `records × nonces` decryptions in the worst case. a record that
//! is ours stops at the first nonce whose tuple hashes to the published
//! commitment hash, foreign records run the whole window. the window
//! defaults to [`PrivacyKey::nonce_range`], so a key that has made `n`
//! commitments pays `n + 1` attempts per foreign record.
//!
//! Without the `parallel` feature [`Scanner::scan`] falls back to the
//! sequential scan.
//!
//! Usage:
//! ```ignore
//! let records = reader.get_ciphers_in_range(0..size / 2).await?;
//! let owned = Scanner::new(&key).scan(&records);
//!
//! // or lazily, stopping at the first hit
//! let first = key.scan_recover(&records, 0..=8).next();
//! ```

use std::ops::RangeInclusive;

use pool_primitives::{FieldElement, Point};

use crate::commitment::{Cipher, Commitment, LocatedCommitment};
use crate::keys::PrivacyKey;

/// ciphertext as published by the pool contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CipherRecord {
    pub cipher: Cipher,
    pub salt_public_key: Point,
    pub commitment_hash: FieldElement,
    /// position in the chain cipher store (leaf-pair index)
    pub index: u64,
}

impl CipherRecord {
    /// public view of a commitment at `index`
    pub fn from_commitment(commitment: &Commitment, index: u64) -> Self {
        Self {
            cipher: *commitment.cipher(),
            salt_public_key: commitment.salt_public_key(),
            commitment_hash: commitment.hash(),
            index,
        }
    }
}

/// lazy scan over a record slice
///
/// `scanned()` reports how many records were consumed, so an abandoned scan
/// can be resumed on `&records[scanned..]`.
pub struct ScanRecover<'a> {
    key: &'a PrivacyKey,
    records: std::slice::Iter<'a, CipherRecord>,
    nonces: RangeInclusive<u64>,
    scanned: usize,
}

impl<'a> ScanRecover<'a> {
    pub(crate) fn new(
        key: &'a PrivacyKey,
        records: &'a [CipherRecord],
        nonces: RangeInclusive<u64>,
    ) -> Self {
        Self {
            key,
            records: records.iter(),
            nonces,
            scanned: 0,
        }
    }

    pub fn scanned(&self) -> usize {
        self.scanned
    }
}

impl Iterator for ScanRecover<'_> {
    type Item = LocatedCommitment;

    fn next(&mut self) -> Option<Self::Item> {
        for record in self.records.by_ref() {
            self.scanned += 1;
            if let Some(found) = self.key.try_record(record, self.nonces.clone()) {
                tracing::debug!(index = record.index, nonce = found.commitment.nonce(), "recovered commitment");
                return Some(found);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.records.size_hint().1)
    }
}

/// key plus nonce window
pub struct Scanner<'a> {
    key: &'a PrivacyKey,
    nonces: RangeInclusive<u64>,
}

impl<'a> Scanner<'a> {
    /// scans the key's own nonce range
    pub fn new(key: &'a PrivacyKey) -> Self {
        Self {
            key,
            nonces: key.nonce_range(),
        }
    }

    pub fn with_nonces(key: &'a PrivacyKey, nonces: RangeInclusive<u64>) -> Self {
        Self { key, nonces }
    }

    pub fn scan_sequential(&self, records: &[CipherRecord]) -> Vec<LocatedCommitment> {
        self.key.scan_recover(records, self.nonces.clone()).collect()
    }

    /// scan records in parallel using rayon
    #[cfg(feature = "parallel")]
    pub fn scan_parallel(&self, records: &[CipherRecord]) -> Vec<LocatedCommitment> {
        use rayon::prelude::*;
        records
            .par_iter()
            .filter_map(|r| self.key.try_record(r, self.nonces.clone()))
            .collect()
    }

    /// parallel when the feature is on, sequential otherwise
    pub fn scan(&self, records: &[CipherRecord]) -> Vec<LocatedCommitment> {
        #[cfg(feature = "parallel")]
        {
            self.scan_parallel(records)
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.scan_sequential(records)
        }
    }

    /// scan in chunks, callback receives (chunk_index, total_chunks, found)
    pub fn scan_with_progress<F>(
        &self,
        records: &[CipherRecord],
        chunk_size: usize,
        mut on_progress: F,
    ) -> Vec<LocatedCommitment>
    where
        F: FnMut(usize, usize, &[LocatedCommitment]),
    {
        let chunk_size = chunk_size.max(1);
        let total_chunks = records.len().div_ceil(chunk_size);
        let mut all = Vec::new();
        for (i, chunk) in records.chunks(chunk_size).enumerate() {
            let found = self.scan(chunk);
            on_progress(i, total_chunks, &found);
            all.extend(found);
        }
        all
    }
}

#[cfg(feature = "parallel")]
impl PrivacyKey {
    /// eager parallel scan, results in record order
    pub fn scan_recover_parallel(
        &self,
        records: &[CipherRecord],
        nonces: RangeInclusive<u64>,
    ) -> Vec<LocatedCommitment> {
        Scanner::with_nonces(self, nonces).scan_parallel(records)
    }
}
