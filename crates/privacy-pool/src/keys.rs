//! privacy keys
//!
//! a raw 32-byte key is expanded into a babyjubjub spending scalar. each key
//! numbers the commitments it creates with a counter, so finding our own
//! ciphertexts is a bounded search over `0..=nonce`.

use std::ops::RangeInclusive;

use blake2::{Blake2b512, Digest};
use pool_primitives::field::reduce_to_scalar;
use pool_primitives::{public_key, FieldElement, Point};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::commitment::{Challenge, Cipher, Commitment, LocatedCommitment};
use crate::error::{PoolError, RecoveryError, Result};
use crate::scan::{CipherRecord, ScanRecover};
use crate::value::Amount;

/// spending scalar for a raw key
///
/// blake2b-512, first half pruned, shifted right by 3, reduced mod l.
///
/// eddsa-poseidon's `deriveSecretScalar` runs the same pruning over
/// blake-512, so a raw key exported from a zk-kit wallet maps to a
/// different scalar here. see [`KeyStore`].
pub fn derive_scalar(raw: &[u8]) -> FieldElement {
    let digest = Blake2b512::digest(raw);
    let mut pruned = [0u8; 32];
    pruned.copy_from_slice(&digest[..32]);
    pruned[0] &= 0xf8;
    pruned[31] &= 0x7f;
    pruned[31] |= 0x40;

    let mut shifted = [0u8; 32];
    for i in 0..32 {
        let high = pruned.get(i + 1).copied().unwrap_or(0);
        shifted[i] = (pruned[i] >> 3) | (high << 5);
    }
    reduce_to_scalar(&shifted)
}

#[derive(Clone)]
pub struct PrivacyKey {
    raw: Zeroizing<[u8; 32]>,
    scalar: FieldElement,
    public_key: Point,
    nonce: u64,
}

impl std::fmt::Debug for PrivacyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivacyKey")
            .field("public_key", &self.public_key)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

impl PrivacyKey {
    pub fn from_raw(raw: [u8; 32], nonce: u64) -> Self {
        let scalar = derive_scalar(&raw);
        Self {
            raw: Zeroizing::new(raw),
            scalar,
            public_key: public_key(&scalar),
            nonce,
        }
    }

    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut raw = [0u8; 32];
        rng.fill_bytes(&mut raw);
        let key = Self::from_raw(raw, 0);
        zeroize::Zeroize::zeroize(&mut raw);
        key
    }

    /// `0x` prefixed or bare 64-digit hex
    pub fn from_hex(s: &str, nonce: u64) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|e| PoolError::InvalidKey(e.to_string()))?,
        );
        let raw: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PoolError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self::from_raw(raw, nonce))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(*self.raw))
    }

    pub fn scalar(&self) -> &FieldElement {
        &self.scalar
    }

    pub fn public_key(&self) -> &Point {
        &self.public_key
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// nonces this key may have used
    pub fn nonce_range(&self) -> RangeInclusive<u64> {
        0..=self.nonce
    }

    /// ecdh point shared with the holder of `other`
    pub fn shared_key(&self, other: &Point) -> Point {
        other.mul_scalar(&self.scalar)
    }

    /// new commitment at the current nonce, then advance the counter
    pub fn commit<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        scope: FieldElement,
        value: Amount,
    ) -> Result<Commitment> {
        let next = self
            .nonce
            .checked_add(1)
            .ok_or_else(|| PoolError::InvalidKey("nonce counter exhausted".into()))?;
        let commitment = Commitment::create(rng, &self.scalar, self.nonce, scope, value)?;
        self.nonce = next;
        Ok(commitment)
    }

    /// zero-value commitment, also consumes a nonce
    pub fn void<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        scope: FieldElement,
    ) -> Result<Commitment> {
        self.commit(rng, scope, Amount::ZERO)
    }

    pub fn recover(
        &self,
        salt_public_key: &Point,
        cipher: &Cipher,
        nonce: u64,
        challenge: Option<&Challenge>,
    ) -> std::result::Result<Commitment, RecoveryError> {
        let encryption_key = self.shared_key(salt_public_key);
        Commitment::recover_with_key(
            &self.scalar,
            &self.public_key,
            &encryption_key,
            salt_public_key,
            cipher,
            nonce,
            challenge,
        )
    }

    /// try every nonce in `nonces` against one record
    ///
    /// the shared key is derived once. the first nonce whose tuple hashes to
    /// the observed commitment hash wins.
    pub fn try_record(
        &self,
        record: &CipherRecord,
        nonces: RangeInclusive<u64>,
    ) -> Option<LocatedCommitment> {
        let encryption_key = self.shared_key(&record.salt_public_key);
        let challenge = Challenge::hash(record.commitment_hash);
        nonces
            .into_iter()
            .find_map(|nonce| {
                Commitment::recover_with_key(
                    &self.scalar,
                    &self.public_key,
                    &encryption_key,
                    &record.salt_public_key,
                    &record.cipher,
                    nonce,
                    Some(&challenge),
                )
                .ok()
            })
            .map(|commitment| LocatedCommitment {
                commitment,
                index: record.index,
            })
    }

    /// lazy scan over `records`
    pub fn scan_recover<'a>(
        &'a self,
        records: &'a [CipherRecord],
        nonces: RangeInclusive<u64>,
    ) -> ScanRecover<'a> {
        ScanRecover::new(self, records, nonces)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyEntryJson {
    private_key: String,
    nonce: String,
}

#[derive(Serialize, Deserialize)]
struct KeyStoreJson {
    keys: Vec<KeyEntryJson>,
}

/// exported key set, `{ keys: [{ privateKey, nonce }] }`
///
/// stores raw keys, not scalars. a store is only portable between
/// implementations that derive with blake2b-512 ([`derive_scalar`]); raw
/// keys from a zk-kit (blake-512) wallet load fine but own none of that
/// wallet's commitments.
#[derive(Clone, Debug, Default)]
pub struct KeyStore {
    pub keys: Vec<PrivacyKey>,
}

impl KeyStore {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, count: usize) -> Self {
        Self {
            keys: (0..count).map(|_| PrivacyKey::generate(rng)).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let doc = KeyStoreJson {
            keys: self
                .keys
                .iter()
                .map(|k| KeyEntryJson {
                    private_key: k.to_hex(),
                    nonce: k.nonce.to_string(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let doc: KeyStoreJson = serde_json::from_str(json)?;
        let keys = doc
            .keys
            .iter()
            .map(|entry| {
                let nonce = entry
                    .nonce
                    .parse::<u64>()
                    .map_err(|e| PoolError::InvalidKey(format!("nonce: {e}")))?;
                PrivacyKey::from_hex(&entry.private_key, nonce)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }
}
