//! circuit input construction
//!
//! the circuit is fixed 2-in / 2-out. unused slots hold void commitments.
//! slot order everywhere is `existing[0], existing[1], new[0], new[1]`; the
//! verifier relies on it, a reordered vector still proves but means something
//! else.

use pool_merkle::{IncrementalMerkleLog, MerkleProof};
use pool_primitives::field::to_decimal;
use pool_primitives::{FieldElement, Point};
use serde::Serialize;

use crate::commitment::{Cipher, Commitment};
use crate::error::{PoolError, Result};
use crate::proof::{PublicSignals, PUBLIC_SIGNALS_LEN};
use crate::value::{Amount, ExternIo};

pub const ARITY: usize = 2;
pub const SLOTS: usize = 2 * ARITY;

/// private and public inputs of one transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitWitness {
    pub scope: FieldElement,
    pub actual_tree_depth: u64,
    pub context: FieldElement,
    pub extern_io: ExternIo,
    pub existing_state_root: FieldElement,
    pub new_salt_public_key: [Point; ARITY],
    pub new_ciphertext: [Cipher; ARITY],
    pub private_key: [FieldElement; SLOTS],
    pub nonce: [u64; SLOTS],
    pub ex_salt_public_key: [Point; ARITY],
    pub ex_ciphertext: [Cipher; ARITY],
    /// compressed merkle path of each existing commitment
    pub ex_index: [u64; ARITY],
    pub ex_siblings: [Vec<FieldElement>; ARITY],
}

/// outputs the verifier must see, in slot order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpectedPublicOutputs {
    pub new_null_root: [FieldElement; SLOTS],
    pub new_commitment_root: [FieldElement; SLOTS],
    pub new_commitment_hash: [FieldElement; SLOTS],
}

#[derive(Clone, Debug)]
pub struct CircuitInputs {
    pub witness: CircuitWitness,
    pub expected: ExpectedPublicOutputs,
    /// inclusion proofs used for the existing slots
    pub membership: [MerkleProof; ARITY],
}

/// builds circuit inputs against one log state
pub struct CircuitInputBuilder<'a> {
    log: &'a IncrementalMerkleLog,
    scope: FieldElement,
    context: FieldElement,
    extern_io: Option<ExternIo>,
}

impl<'a> CircuitInputBuilder<'a> {
    pub fn new(log: &'a IncrementalMerkleLog, scope: FieldElement, context: FieldElement) -> Self {
        Self {
            log,
            scope,
            context,
            extern_io: None,
        }
    }

    /// use an explicit external io instead of deriving it
    pub fn with_extern_io(mut self, extern_io: ExternIo) -> Self {
        self.extern_io = Some(extern_io);
        self
    }

    /// key material taken from the commitments themselves
    pub fn build(&self, existing: &[Commitment], new: &[Commitment]) -> Result<CircuitInputs> {
        check_arity(existing, new)?;
        let slots = slot_refs(existing, new);
        let pk_scalars = slots.map(|c| c.owner());
        let nonces = slots.map(|c| c.nonce());
        self.build_with_keys(&pk_scalars, &nonces, existing, new)
    }

    /// build with explicit owner scalars and nonces, which must agree with
    /// the commitments in each slot
    pub fn build_with_keys(
        &self,
        pk_scalars: &[FieldElement; SLOTS],
        nonces: &[u64; SLOTS],
        existing: &[Commitment],
        new: &[Commitment],
    ) -> Result<CircuitInputs> {
        check_arity(existing, new)?;
        let slots = slot_refs(existing, new);

        for (slot, c) in slots.iter().enumerate() {
            if c.owner() != pk_scalars[slot] || c.nonce() != nonces[slot] {
                return Err(PoolError::KeyMismatch { slot });
            }
            if !c.is_void() && c.scope() != self.scope {
                return Err(PoolError::ScopeMismatch { slot });
            }
        }

        let existing_sum = Amount::sum(existing.iter().map(|c| &c.private_parts().value))?;
        let new_sum = Amount::sum(new.iter().map(|c| &c.private_parts().value))?;
        let extern_io = match self.extern_io {
            Some(io) => {
                io.validate(existing_sum, new_sum)?;
                io
            }
            None => ExternIo::balance(existing_sum, new_sum),
        };

        let membership = [
            existing[0].membership_proof(self.log)?,
            existing[1].membership_proof(self.log)?,
        ];

        let witness = CircuitWitness {
            scope: self.scope,
            actual_tree_depth: self.log.depth() as u64,
            context: self.context,
            extern_io,
            existing_state_root: self.log.root(),
            new_salt_public_key: [new[0].salt_public_key(), new[1].salt_public_key()],
            new_ciphertext: [*new[0].cipher(), *new[1].cipher()],
            private_key: *pk_scalars,
            nonce: *nonces,
            ex_salt_public_key: [existing[0].salt_public_key(), existing[1].salt_public_key()],
            ex_ciphertext: [*existing[0].cipher(), *existing[1].cipher()],
            ex_index: [membership[0].index, membership[1].index],
            ex_siblings: [membership[0].siblings.clone(), membership[1].siblings.clone()],
        };

        let expected = ExpectedPublicOutputs {
            new_null_root: slots.map(|c| c.null_root()),
            new_commitment_root: slots.map(|c| c.commitment_root()),
            new_commitment_hash: slots.map(|c| c.hash()),
        };

        Ok(CircuitInputs {
            witness,
            expected,
            membership,
        })
    }
}

fn check_arity(existing: &[Commitment], new: &[Commitment]) -> Result<()> {
    if existing.len() != ARITY || new.len() != ARITY {
        return Err(PoolError::InvalidArity {
            existing: existing.len(),
            new: new.len(),
        });
    }
    Ok(())
}

fn slot_refs<'c>(existing: &'c [Commitment], new: &'c [Commitment]) -> [&'c Commitment; SLOTS] {
    [&existing[0], &existing[1], &new[0], &new[1]]
}

/// scale the desired new values so they balance `existing + in - out`
///
/// integer division remainders go to the first slot, so the result always
/// sums to the target exactly.
pub fn rebalance_outputs(
    existing: [Amount; ARITY],
    new: [Amount; ARITY],
    extern_io: ExternIo,
) -> Result<[Amount; ARITY]> {
    let total_in = Amount::sum(&existing)?
        .checked_add(extern_io.input)
        .ok_or(PoolError::ValueOverflow)?;
    let target = total_in.checked_sub(extern_io.output).ok_or_else(|| {
        PoolError::InvalidExternIo(format!(
            "output {} exceeds available {total_in}",
            extern_io.output
        ))
    })?;

    let new_sum = Amount::sum(&new)?;
    if new_sum.is_zero() {
        return Ok([target, Amount::ZERO]);
    }

    let scaled = new.map(|v| v.0.checked_mul(target.0).map(|p| Amount(p / new_sum.0)));
    let (first, second) = match scaled {
        [Some(a), Some(b)] => (a, b),
        _ => return Err(PoolError::ValueOverflow),
    };
    let remainder = target.0 - first.0 - second.0;
    Ok([Amount(first.0 + remainder), second])
}

impl CircuitInputs {
    pub fn extern_io(&self) -> ExternIo {
        self.witness.extern_io
    }

    /// the 36 public signals a valid proof of these inputs carries
    pub fn expected_public_signals(&self) -> PublicSignals {
        self.witness.public_signals(&self.expected)
    }
}

impl CircuitWitness {
    /// public signal vector for this witness and the given outputs
    pub fn public_signals(&self, outputs: &ExpectedPublicOutputs) -> PublicSignals {
        let mut out = Vec::with_capacity(PUBLIC_SIGNALS_LEN);
        out.extend_from_slice(&outputs.new_null_root);
        out.extend_from_slice(&outputs.new_commitment_root);
        out.extend_from_slice(&outputs.new_commitment_hash);
        out.push(self.scope);
        out.push(FieldElement::from(self.actual_tree_depth));
        out.push(self.context);
        out.extend_from_slice(&self.extern_io.to_fields());
        out.push(self.existing_state_root);
        for salt in &self.new_salt_public_key {
            out.extend_from_slice(&salt.coordinates());
        }
        for cipher in &self.new_ciphertext {
            out.extend_from_slice(cipher);
        }

        let mut signals = [FieldElement::default(); PUBLIC_SIGNALS_LEN];
        signals.copy_from_slice(&out);
        PublicSignals(signals)
    }

    /// recompute the outputs from the private witness alone
    ///
    /// mirrors what the circuit derives: each slot is decrypted with its
    /// owner scalar and nonce, then hashed into its roots.
    pub fn evaluate_outputs(&self) -> Result<ExpectedPublicOutputs> {
        let mut outputs = ExpectedPublicOutputs {
            new_null_root: [FieldElement::default(); SLOTS],
            new_commitment_root: [FieldElement::default(); SLOTS],
            new_commitment_hash: [FieldElement::default(); SLOTS],
        };
        for slot in 0..SLOTS {
            let (salt, cipher) = if slot < ARITY {
                (&self.ex_salt_public_key[slot], &self.ex_ciphertext[slot])
            } else {
                (
                    &self.new_salt_public_key[slot - ARITY],
                    &self.new_ciphertext[slot - ARITY],
                )
            };
            let c = Commitment::recover(
                &self.private_key[slot],
                salt,
                cipher,
                self.nonce[slot],
                None,
            )?;
            if !c.is_void() && c.scope() != self.scope {
                return Err(PoolError::ScopeMismatch { slot });
            }
            outputs.new_null_root[slot] = c.null_root();
            outputs.new_commitment_root[slot] = c.commitment_root();
            outputs.new_commitment_hash[slot] = c.hash();
        }
        Ok(outputs)
    }

    /// witness json with the circuit's signal names, decimal strings
    pub fn to_json(&self) -> Result<String> {
        fn d(f: &FieldElement) -> String {
            to_decimal(f)
        }
        fn point(p: &Point) -> [String; 2] {
            [d(&p.x), d(&p.y)]
        }
        fn cipher(c: &Cipher) -> Vec<String> {
            c.iter().map(d).collect()
        }

        let doc = WitnessJson {
            scope: d(&self.scope),
            actual_tree_depth: self.actual_tree_depth.to_string(),
            context: d(&self.context),
            extern_io: self.extern_io.to_fields().map(|f| d(&f)),
            existing_state_root: d(&self.existing_state_root),
            new_salt_public_key: self.new_salt_public_key.iter().map(point).collect(),
            new_ciphertext: self.new_ciphertext.iter().map(cipher).collect(),
            private_key: self.private_key.iter().map(d).collect(),
            nonce: self.nonce.iter().map(|n| n.to_string()).collect(),
            ex_salt_public_key: self.ex_salt_public_key.iter().map(point).collect(),
            ex_ciphertext: self.ex_ciphertext.iter().map(cipher).collect(),
            ex_index: self.ex_index.iter().map(|i| i.to_string()).collect(),
            ex_siblings: self
                .ex_siblings
                .iter()
                .map(|s| s.iter().map(d).collect())
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WitnessJson {
    scope: String,
    actual_tree_depth: String,
    context: String,
    #[serde(rename = "externIO")]
    extern_io: [String; 2],
    existing_state_root: String,
    new_salt_public_key: Vec<[String; 2]>,
    new_ciphertext: Vec<Vec<String>>,
    private_key: Vec<String>,
    nonce: Vec<String>,
    ex_salt_public_key: Vec<[String; 2]>,
    ex_ciphertext: Vec<Vec<String>>,
    ex_index: Vec<String>,
    ex_siblings: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PrivacyKey;
    use ark_ff::Zero;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Fixture {
        rng: ChaCha20Rng,
        key: PrivacyKey,
        scope: FieldElement,
    }

    fn fixture() -> Fixture {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let key = PrivacyKey::generate(&mut rng);
        Fixture {
            rng,
            key,
            scope: FieldElement::from(777u64),
        }
    }

    #[test]
    fn test_deposit_into_empty_pool() {
        let mut f = fixture();
        let existing = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let new = [
            f.key.commit(&mut f.rng, f.scope, Amount(100)).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let inputs = CircuitInputBuilder::new(&log, f.scope, FieldElement::from(5u64))
            .build(&existing, &new)
            .unwrap();

        assert_eq!(inputs.extern_io(), ExternIo::balance(Amount(0), Amount(100)));
        assert_eq!(inputs.expected.new_commitment_hash[2], new[0].hash());
        assert_eq!(inputs.expected.new_commitment_hash[3], new[1].hash());
        assert_eq!(inputs.expected.new_null_root[0], existing[0].null_root());
        assert_eq!(inputs.witness.ex_siblings[0], vec![FieldElement::zero(); 32]);
        assert_eq!(inputs.witness.existing_state_root, FieldElement::zero());
    }

    #[test]
    fn test_arity_is_enforced() {
        let mut f = fixture();
        let one = [f.key.void(&mut f.rng, f.scope).unwrap()];
        let two = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let builder = CircuitInputBuilder::new(&log, f.scope, FieldElement::zero());
        assert!(matches!(
            builder.build(&one, &two),
            Err(PoolError::InvalidArity { existing: 1, new: 2 })
        ));
    }

    #[test]
    fn test_missing_existing_commitment() {
        let mut f = fixture();
        let existing = [
            f.key.commit(&mut f.rng, f.scope, Amount(10)).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let new = [
            f.key.commit(&mut f.rng, f.scope, Amount(10)).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let result = CircuitInputBuilder::new(&log, f.scope, FieldElement::zero()).build(&existing, &new);
        assert!(matches!(result, Err(PoolError::CommitmentNotInState(_))));
    }

    #[test]
    fn test_scope_mismatch() {
        let mut f = fixture();
        let other_scope = FieldElement::from(1u64);
        let existing = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let new = [
            f.key.commit(&mut f.rng, other_scope, Amount(3)).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let result = CircuitInputBuilder::new(&log, f.scope, FieldElement::zero()).build(&existing, &new);
        assert!(matches!(result, Err(PoolError::ScopeMismatch { slot: 2 })));
    }

    #[test]
    fn test_key_mismatch() {
        let mut f = fixture();
        let existing = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let new = [
            f.key.commit(&mut f.rng, f.scope, Amount(3)).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let mut pks = [*f.key.scalar(); 4];
        pks[1] = FieldElement::from(2u64);
        let nonces = [0, 1, 2, 3];
        let result = CircuitInputBuilder::new(&log, f.scope, FieldElement::zero())
            .build_with_keys(&pks, &nonces, &existing, &new);
        assert!(matches!(result, Err(PoolError::KeyMismatch { slot: 1 })));
    }

    #[test]
    fn test_explicit_extern_io_must_balance() {
        let mut f = fixture();
        let existing = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let new = [
            f.key.commit(&mut f.rng, f.scope, Amount(50)).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let io = ExternIo {
            input: Amount(40),
            output: Amount::ZERO,
        };
        let result = CircuitInputBuilder::new(&log, f.scope, FieldElement::zero())
            .with_extern_io(io)
            .build(&existing, &new);
        assert!(matches!(result, Err(PoolError::InvalidExternIo(_))));
    }

    #[test]
    fn test_signals_match_evaluated_outputs() {
        let mut f = fixture();
        let existing = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let new = [
            f.key.commit(&mut f.rng, f.scope, Amount(8)).unwrap(),
            f.key.commit(&mut f.rng, f.scope, Amount(9)).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let inputs = CircuitInputBuilder::new(&log, f.scope, FieldElement::from(3u64))
            .build(&existing, &new)
            .unwrap();
        assert_eq!(inputs.witness.evaluate_outputs().unwrap(), inputs.expected);

        let signals = inputs.expected_public_signals();
        assert_eq!(signals.new_commitment_hashes(), inputs.expected.new_commitment_hash);
        assert_eq!(signals.external_input(), FieldElement::from(17u64));
        assert_eq!(signals.context(), FieldElement::from(3u64));
        assert_eq!(signals.new_ciphertext(1), Some(*new[1].cipher()));
        assert_eq!(signals.new_salt_public_key(0), Some(new[0].salt_public_key()));
    }

    #[test]
    fn test_witness_json_names() {
        let mut f = fixture();
        let existing = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let new = [
            f.key.void(&mut f.rng, f.scope).unwrap(),
            f.key.void(&mut f.rng, f.scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let inputs = CircuitInputBuilder::new(&log, f.scope, FieldElement::zero())
            .build(&existing, &new)
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&inputs.witness.to_json().unwrap()).unwrap();
        for name in [
            "scope",
            "actualTreeDepth",
            "context",
            "externIO",
            "existingStateRoot",
            "newSaltPublicKey",
            "newCiphertext",
            "privateKey",
            "nonce",
            "exSaltPublicKey",
            "exCiphertext",
            "exIndex",
            "exSiblings",
        ] {
            assert!(json.get(name).is_some(), "missing {name}");
        }
        assert_eq!(json["scope"], "777");
        assert_eq!(json["newCiphertext"][0].as_array().unwrap().len(), 7);
    }

    #[test]
    fn test_rebalance_outputs() {
        let io = ExternIo {
            input: Amount(0),
            output: Amount(100),
        };
        let out = rebalance_outputs([Amount(300), Amount(0)], [Amount(1), Amount(2)], io).unwrap();
        assert_eq!(out[0].0 + out[1].0, 200);
        assert_eq!(out, [Amount(67), Amount(133)]);

        let zero = rebalance_outputs([Amount(5), Amount(5)], [Amount(0), Amount(0)], ExternIo::default()).unwrap();
        assert_eq!(zero, [Amount(10), Amount(0)]);

        let too_much = ExternIo {
            input: Amount(0),
            output: Amount(11),
        };
        assert!(rebalance_outputs([Amount(5), Amount(5)], [Amount(1), Amount(1)], too_much).is_err());
    }
}
