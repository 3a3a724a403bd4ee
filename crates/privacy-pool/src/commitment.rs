//! commitments
//!
//! a commitment binds `(value, scope, secret)` to an owner. the tuple is
//! encrypted under an ecdh key shared between the owner and a one-time salt,
//! and two roots are derived from it:
//!
//! - commitment root: `fixed_root(cipher[0..7] ++ [hash(tuple)])`, public
//! - null root: `fixed_root([pk, secret, salt_pk, ek])` (x and y of each),
//!   which only the owner can rebuild and which marks the commitment spent
//!
//! commitments are immutable. the chain index travels next to them in a
//! [`LocatedCommitment`].
//!
//! # Ownership
//!
//! published parts can be tampered with. [`Commitment::check_ownership`]
//! replays what the spend circuit does with a claimed
//! `(owner, salt_public_key, cipher, nonce)`: it opens the cipher without
//! authenticating it, rehashes the result and looks the commitment root up
//! in the state log. a wrong salt never errors, it yields a check with a
//! fresh null root, commitment root `0` and value `0`.
//!
//! ```ignore
//! let check = Commitment::check_ownership(&owner, &salt, &cipher, nonce, &log)?;
//! if !check.is_owned() {
//!     // not spendable against this log
//! }
//! ```

use ark_ff::Zero;
use pool_merkle::{fixed_root, IncrementalMerkleLog, MerkleProof};
use pool_primitives::cipher::{decrypt, decrypt_unchecked, encrypt};
use pool_primitives::field::{random_scalar, to_hex};
use pool_primitives::{hash4, public_key, FieldElement, Point, PrimitiveError};
use rand::{CryptoRng, RngCore};

use crate::error::{PoolError, RecoveryError, Result};
use crate::value::Amount;

pub const TUPLE_SIZE: usize = 4;
pub const CIPHER_SIZE: usize = 7;

pub type Tuple = [FieldElement; TUPLE_SIZE];
pub type Cipher = [FieldElement; CIPHER_SIZE];

/// owner-only half of a commitment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrivateParts {
    /// owner spending scalar
    pub owner: FieldElement,
    pub nonce: u64,
    pub value: Amount,
    /// random blinding point
    pub secret: Point,
}

/// half of a commitment that is published on chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicParts {
    pub scope: FieldElement,
    pub cipher: Cipher,
    pub salt_public_key: Point,
}

/// expected values a recovered commitment must reproduce
#[derive(Clone, Copy, Debug, Default)]
pub struct Challenge {
    pub hash: Option<FieldElement>,
    pub tuple: Option<Tuple>,
}

impl Challenge {
    pub fn hash(hash: FieldElement) -> Self {
        Self {
            hash: Some(hash),
            tuple: None,
        }
    }

    pub fn full(commitment: &Commitment) -> Self {
        Self {
            hash: Some(commitment.hash()),
            tuple: Some(commitment.tuple()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Commitment {
    private: PrivateParts,
    public: PublicParts,
    hash: FieldElement,
    commitment_root: FieldElement,
    null_root: FieldElement,
}

/// what a claimed set of published parts proves against a state log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnershipCheck {
    pub null_root: FieldElement,
    /// root found in the log, zero when absent
    pub commitment_root: FieldElement,
    pub hash: FieldElement,
    /// zero unless the commitment root is in the log
    pub value: Amount,
}

impl OwnershipCheck {
    pub fn is_owned(&self) -> bool {
        !self.commitment_root.is_zero()
    }
}

/// commitment paired with its position in the chain cipher store
#[derive(Clone, Debug)]
pub struct LocatedCommitment {
    pub commitment: Commitment,
    pub index: u64,
}

impl Commitment {
    /// fresh commitment owned by `owner`
    pub fn create<R: RngCore + CryptoRng>(
        rng: &mut R,
        owner: &FieldElement,
        nonce: u64,
        scope: FieldElement,
        value: Amount,
    ) -> Result<Self> {
        let secret = public_key(&random_scalar(rng));
        let salt = random_scalar(rng);
        let salt_public_key = public_key(&salt);
        let owner_public_key = public_key(owner);

        let encryption_key = owner_public_key.mul_scalar(&salt);
        if encryption_key != salt_public_key.mul_scalar(owner) {
            return Err(PoolError::EncryptionConsistency("shared key is not symmetric"));
        }

        let tuple = [value.to_field(), scope, secret.x, secret.y];
        let cipher: Cipher = encrypt(&tuple, &encryption_key, nonce.into())?
            .try_into()
            .map_err(|_| PoolError::EncryptionConsistency("unexpected ciphertext length"))?;

        let commitment = Self::assemble(
            PrivateParts {
                owner: *owner,
                nonce,
                value,
                secret,
            },
            PublicParts {
                scope,
                cipher,
                salt_public_key,
            },
            &owner_public_key,
            &encryption_key,
        );

        let decrypted = decrypt(&commitment.public.cipher, &encryption_key, nonce.into(), TUPLE_SIZE)
            .map_err(|_| PoolError::EncryptionConsistency("fresh ciphertext does not decrypt"))?;
        if decrypted[..] != tuple[..] {
            return Err(PoolError::EncryptionConsistency("decrypted tuple differs"));
        }
        if commitment.hash != hash4(&tuple) {
            return Err(PoolError::EncryptionConsistency("hash differs"));
        }

        Ok(commitment)
    }

    /// zero-value commitment with real ciphertext and roots
    pub fn void<R: RngCore + CryptoRng>(
        rng: &mut R,
        owner: &FieldElement,
        nonce: u64,
        scope: FieldElement,
    ) -> Result<Self> {
        Self::create(rng, owner, nonce, scope, Amount::ZERO)
    }

    /// all-zero dummy commitment
    ///
    /// its ciphertext does not decrypt. only produced on explicit request.
    pub fn placeholder() -> Self {
        let zero = FieldElement::zero();
        Self::from_parts(
            PrivateParts {
                owner: zero,
                nonce: 0,
                value: Amount::ZERO,
                secret: Point::from_coordinates(zero, zero),
            },
            PublicParts {
                scope: zero,
                cipher: [zero; CIPHER_SIZE],
                salt_public_key: Point::from_coordinates(zero, zero),
            },
        )
    }

    /// rebuild from stored parts without decrypting
    pub fn from_parts(private: PrivateParts, public: PublicParts) -> Self {
        let owner_public_key = public_key(&private.owner);
        let encryption_key = public.salt_public_key.mul_scalar(&private.owner);
        Self::assemble(private, public, &owner_public_key, &encryption_key)
    }

    /// recover a commitment from its published parts
    pub fn recover(
        owner: &FieldElement,
        salt_public_key: &Point,
        cipher: &Cipher,
        nonce: u64,
        challenge: Option<&Challenge>,
    ) -> std::result::Result<Self, RecoveryError> {
        let owner_public_key = public_key(owner);
        let encryption_key = salt_public_key.mul_scalar(owner);
        Self::recover_with_key(
            owner,
            &owner_public_key,
            &encryption_key,
            salt_public_key,
            cipher,
            nonce,
            challenge,
        )
    }

    /// recovery with the owner public key and shared key already derived
    pub(crate) fn recover_with_key(
        owner: &FieldElement,
        owner_public_key: &Point,
        encryption_key: &Point,
        salt_public_key: &Point,
        cipher: &Cipher,
        nonce: u64,
        challenge: Option<&Challenge>,
    ) -> std::result::Result<Self, RecoveryError> {
        let tuple: Tuple = decrypt(cipher, encryption_key, nonce.into(), TUPLE_SIZE)
            .map_err(RecoveryError::Decryption)?
            .try_into()
            .map_err(|_| {
                RecoveryError::Decryption(PrimitiveError::DecryptionFailed("plaintext length"))
            })?;

        if let Some(challenge) = challenge {
            if challenge.hash.is_some_and(|h| h != hash4(&tuple)) {
                return Err(RecoveryError::ChallengeMismatch("hash"));
            }
            if challenge.tuple.is_some_and(|t| t != tuple) {
                return Err(RecoveryError::ChallengeMismatch("tuple"));
            }
        }

        let value = Amount::from_field(&tuple[0]).ok_or(RecoveryError::ValueOutOfRange)?;
        Ok(Self::assemble(
            PrivateParts {
                owner: *owner,
                nonce,
                value,
                secret: Point::from_coordinates(tuple[2], tuple[3]),
            },
            PublicParts {
                scope: tuple[1],
                cipher: *cipher,
                salt_public_key: *salt_public_key,
            },
            owner_public_key,
            encryption_key,
        ))
    }

    fn assemble(
        private: PrivateParts,
        public: PublicParts,
        owner_public_key: &Point,
        encryption_key: &Point,
    ) -> Self {
        let tuple = [
            private.value.to_field(),
            public.scope,
            private.secret.x,
            private.secret.y,
        ];
        let hash = hash4(&tuple);
        let commitment_root = commitment_root_of(&public.cipher, &hash);
        let null_root = null_root_of(
            owner_public_key,
            &private.secret,
            &public.salt_public_key,
            encryption_key,
        );

        Self {
            private,
            public,
            hash,
            commitment_root,
            null_root,
        }
    }

    pub fn tuple(&self) -> Tuple {
        [
            self.private.value.to_field(),
            self.public.scope,
            self.private.secret.x,
            self.private.secret.y,
        ]
    }

    pub fn hash(&self) -> FieldElement {
        self.hash
    }

    pub fn commitment_root(&self) -> FieldElement {
        self.commitment_root
    }

    pub fn null_root(&self) -> FieldElement {
        self.null_root
    }

    pub fn value(&self) -> Amount {
        self.private.value
    }

    pub fn scope(&self) -> FieldElement {
        self.public.scope
    }

    pub fn nonce(&self) -> u64 {
        self.private.nonce
    }

    pub fn owner(&self) -> FieldElement {
        self.private.owner
    }

    pub fn secret(&self) -> Point {
        self.private.secret
    }

    pub fn cipher(&self) -> &Cipher {
        &self.public.cipher
    }

    pub fn salt_public_key(&self) -> Point {
        self.public.salt_public_key
    }

    pub fn private_parts(&self) -> &PrivateParts {
        &self.private
    }

    pub fn public_parts(&self) -> &PublicParts {
        &self.public
    }

    pub fn is_void(&self) -> bool {
        self.private.value.is_zero()
    }

    /// tuple and scope always, ciphertext, salt and roots only when
    /// `compare_ephemeral` is set
    pub fn is_equal(&self, other: &Commitment, compare_ephemeral: bool) -> bool {
        let same_tuple = self.tuple() == other.tuple() && self.public.scope == other.public.scope;
        if !compare_ephemeral {
            return same_tuple;
        }
        same_tuple
            && self.public.cipher == other.public.cipher
            && self.public.salt_public_key == other.public.salt_public_key
            && self.null_root == other.null_root
            && self.commitment_root == other.commitment_root
    }

    /// open `cipher` with the key implied by `salt_public_key` and check the
    /// result against `log`
    ///
    /// fails only on primitive errors, never on a wrong key or salt.
    pub fn check_ownership(
        owner: &FieldElement,
        salt_public_key: &Point,
        cipher: &Cipher,
        nonce: u64,
        log: &IncrementalMerkleLog,
    ) -> Result<OwnershipCheck> {
        let owner_public_key = public_key(owner);
        let encryption_key = salt_public_key.mul_scalar(owner);
        let tuple: Tuple = decrypt_unchecked(cipher, &encryption_key, nonce.into(), TUPLE_SIZE)?
            .try_into()
            .map_err(|_| PrimitiveError::DecryptionFailed("plaintext length"))?;

        let hash = hash4(&tuple);
        let secret = Point::from_coordinates(tuple[2], tuple[3]);
        let null_root = null_root_of(&owner_public_key, &secret, salt_public_key, &encryption_key);
        let root = commitment_root_of(cipher, &hash);

        let (commitment_root, value) = if log.contains(&root) {
            let value = Amount::from_field(&tuple[0]).unwrap_or(Amount::ZERO);
            (root, value)
        } else {
            (FieldElement::zero(), Amount::ZERO)
        };
        Ok(OwnershipCheck {
            null_root,
            commitment_root,
            hash,
            value,
        })
    }

    /// [`Commitment::check_ownership`] on this commitment's own parts
    pub fn ownership(&self, log: &IncrementalMerkleLog) -> Result<OwnershipCheck> {
        Self::check_ownership(
            &self.private.owner,
            &self.public.salt_public_key,
            &self.public.cipher,
            self.private.nonce,
            log,
        )
    }

    /// inclusion proof of the commitment root in `log`
    ///
    /// the root is rederived from the published parts, so a commitment whose
    /// salt or ciphertext no longer opens to its tuple is not in state.
    /// void commitments are never inserted and get the dummy proof.
    pub fn membership_proof(&self, log: &IncrementalMerkleLog) -> Result<MerkleProof> {
        if self.is_void() {
            return Ok(MerkleProof::dummy(log.max_depth()));
        }
        let check = self.ownership(log)?;
        if check.commitment_root != self.commitment_root {
            return Err(PoolError::CommitmentNotInState(to_hex(&self.commitment_root)));
        }
        let index = log
            .index_of(&check.commitment_root)
            .ok_or_else(|| PoolError::CommitmentNotInState(to_hex(&self.commitment_root)))?;
        Ok(log.proof(index)?)
    }
}

fn commitment_root_of(cipher: &Cipher, hash: &FieldElement) -> FieldElement {
    let mut leaves = [FieldElement::zero(); CIPHER_SIZE + 1];
    leaves[..CIPHER_SIZE].copy_from_slice(cipher);
    leaves[CIPHER_SIZE] = *hash;
    fixed_root(&leaves)
}

fn null_root_of(
    owner_public_key: &Point,
    secret: &Point,
    salt_public_key: &Point,
    encryption_key: &Point,
) -> FieldElement {
    fixed_root(&[
        owner_public_key.x,
        owner_public_key.y,
        secret.x,
        secret.y,
        salt_public_key.x,
        salt_public_key.y,
        encryption_key.x,
        encryption_key.y,
    ])
}

impl PartialEq for Commitment {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other, true)
    }
}

impl Eq for Commitment {}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::One;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn owner() -> FieldElement {
        FieldElement::from(0xdead_beef_u64)
    }

    fn scope() -> FieldElement {
        FieldElement::from(1234u64)
    }

    #[test]
    fn test_create_then_recover() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 3, scope(), Amount(100)).unwrap();
        let r = Commitment::recover(
            &owner(),
            &c.salt_public_key(),
            c.cipher(),
            3,
            Some(&Challenge::full(&c)),
        )
        .unwrap();
        assert!(c.is_equal(&r, true));
        assert_eq!(r.value(), Amount(100));
        assert_eq!(r.scope(), scope());
        assert_eq!(r.null_root(), c.null_root());
    }

    #[test]
    fn test_recover_wrong_nonce() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 3, scope(), Amount(100)).unwrap();
        let err = Commitment::recover(&owner(), &c.salt_public_key(), c.cipher(), 4, None);
        assert!(matches!(err, Err(RecoveryError::Decryption(_))));
    }

    #[test]
    fn test_recover_wrong_owner() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 0, scope(), Amount(5)).unwrap();
        let other = FieldElement::from(77u64);
        assert!(Commitment::recover(&other, &c.salt_public_key(), c.cipher(), 0, None).is_err());
    }

    #[test]
    fn test_challenge_mismatch() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 0, scope(), Amount(5)).unwrap();
        let challenge = Challenge::hash(c.hash() + FieldElement::one());
        let err = Commitment::recover(&owner(), &c.salt_public_key(), c.cipher(), 0, Some(&challenge));
        assert_eq!(err.unwrap_err(), RecoveryError::ChallengeMismatch("hash"));
    }

    #[test]
    fn test_tampered_salt_is_not_owned() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 1, scope(), Amount(9)).unwrap();
        let mut log = IncrementalMerkleLog::default();
        log.append(&[c.commitment_root(), c.null_root()]).unwrap();

        let genuine = c.ownership(&log).unwrap();
        assert!(genuine.is_owned());
        assert_eq!(genuine.commitment_root, c.commitment_root());
        assert_eq!(genuine.null_root, c.null_root());
        assert_eq!(genuine.hash, c.hash());
        assert_eq!(genuine.value, Amount(9));

        let mut salt = c.salt_public_key();
        salt.x += FieldElement::one();
        let check = Commitment::check_ownership(&owner(), &salt, c.cipher(), 1, &log).unwrap();
        assert!(!check.is_owned());
        assert_ne!(check.null_root, c.null_root());
        assert_eq!(check.commitment_root, FieldElement::zero());
        assert_ne!(check.hash, c.hash());
        assert_eq!(check.value, Amount::ZERO);

        // rebuilt with the bad salt, the commitment is no longer in state
        let mut public = *c.public_parts();
        public.salt_public_key = salt;
        let tampered = Commitment::from_parts(*c.private_parts(), public);
        assert!(!tampered.is_equal(&c, true));
        assert_eq!(tampered.ownership(&log).unwrap(), check);
        assert!(matches!(
            tampered.membership_proof(&log),
            Err(PoolError::CommitmentNotInState(_))
        ));
    }

    #[test]
    fn test_ownership_against_wrong_log() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 4, scope(), Amount(30)).unwrap();
        let log = IncrementalMerkleLog::from_leaves(32, &[FieldElement::from(5u64)]).unwrap();
        let check = c.ownership(&log).unwrap();
        assert_eq!(check.null_root, c.null_root());
        assert_eq!(check.hash, c.hash());
        assert!(!check.is_owned());
        assert_eq!(check.value, Amount::ZERO);
    }

    #[test]
    fn test_void() {
        let mut rng = rng();
        let v = Commitment::void(&mut rng, &owner(), 0, scope()).unwrap();
        assert!(v.is_void());
        let c = Commitment::create(&mut rng, &owner(), 1, scope(), Amount(1)).unwrap();
        assert!(!c.is_void());
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        let a = Commitment::placeholder();
        let b = Commitment::placeholder();
        assert!(a.is_void());
        assert_eq!(a, b);
        assert_eq!(a.hash(), hash4(&[FieldElement::zero(); 4]));
    }

    #[test]
    fn test_from_parts_matches_create() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 2, scope(), Amount(44)).unwrap();
        let rebuilt = Commitment::from_parts(*c.private_parts(), *c.public_parts());
        assert_eq!(rebuilt, c);
    }

    #[test]
    fn test_ephemeral_comparison() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 2, scope(), Amount(44)).unwrap();
        // same private tuple, different salt and ciphertext
        let mut public = *c.public_parts();
        public.salt_public_key = public_key(&FieldElement::from(3u64));
        public.cipher[0] += FieldElement::one();
        let other = Commitment::from_parts(*c.private_parts(), public);
        assert!(c.is_equal(&other, false));
        assert!(!c.is_equal(&other, true));
    }

    #[test]
    fn test_membership_proof() {
        let mut rng = rng();
        let c = Commitment::create(&mut rng, &owner(), 0, scope(), Amount(10)).unwrap();
        let mut log = IncrementalMerkleLog::default();
        log.append(&[FieldElement::from(1u64), c.commitment_root()]).unwrap();
        let proof = c.membership_proof(&log).unwrap();
        assert_eq!(proof.leaf_index, 1);
        assert!(proof.verify_against(&log.root()));

        let missing = Commitment::create(&mut rng, &owner(), 1, scope(), Amount(10)).unwrap();
        assert!(matches!(
            missing.membership_proof(&log),
            Err(PoolError::CommitmentNotInState(_))
        ));

        let void = Commitment::void(&mut rng, &owner(), 2, scope()).unwrap();
        assert_eq!(void.membership_proof(&log).unwrap(), MerkleProof::dummy(32));
    }
}
