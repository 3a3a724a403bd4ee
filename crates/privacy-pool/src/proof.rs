//! groth16 proof codec
//!
//! snarkjs emits g2 coordinates as `[c0, c1]`, the on-chain verifier and the
//! bn254 pairing precompile expect `[c1, c0]`. `pack` swaps each pair of
//! `pi_b`, `unpack` swaps them back. calldata is 8 proof words followed by
//! the 36 public signals, every word 32 bytes big-endian.
//!
//! ```text
//! word  0..2   a.x a.y
//! word  2..6   b.x.c1 b.x.c0 b.y.c1 b.y.c0
//! word  6..8   c.x c.y
//! word  8..44  public signals
//! ```
//!
//! an unswapped `b` still decodes and the point still parses, but the pairing
//! check fails on chain.
//!
//! Usage:
//! ```ignore
//! let raw = RawProof::from_snarkjs_files(&proof_json, &public_json)?;
//! let calldata = pack(&raw)?.to_calldata_hex();
//! ```

use std::ops::Range;

use pool_primitives::field::{from_be_bytes, parse_decimal, to_be_bytes, to_decimal};
use pool_primitives::{FieldElement, Point};
use serde::{Deserialize, Serialize};

use crate::commitment::{Cipher, CIPHER_SIZE};
use crate::error::{PoolError, Result};
use crate::value::{Amount, ExternIo};

/// bn254 base field, proof curve coordinates
pub type BaseField = ark_bn254::Fq;

pub const PUBLIC_SIGNALS_LEN: usize = 36;
pub const PROOF_WORDS: usize = 8;
pub const CALLDATA_LEN: usize = (PROOF_WORDS + PUBLIC_SIGNALS_LEN) * 32;

/// circuit public signals, outputs first
///
/// `newNullRoot[4] | newCommitmentRoot[4] | newCommitmentHash[4] | scope |
/// actualTreeDepth | context | externIO[2] | existingStateRoot |
/// newSaltPublicKey[2][2] | newCiphertext[2][7]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicSignals(pub [FieldElement; PUBLIC_SIGNALS_LEN]);

impl PublicSignals {
    pub const NEW_NULL_ROOT: Range<usize> = 0..4;
    pub const NEW_COMMITMENT_ROOT: Range<usize> = 4..8;
    pub const NEW_COMMITMENT_HASH: Range<usize> = 8..12;
    pub const SCOPE: usize = 12;
    pub const ACTUAL_TREE_DEPTH: usize = 13;
    pub const CONTEXT: usize = 14;
    pub const EXTERN_IO: Range<usize> = 15..17;
    pub const EXISTING_STATE_ROOT: usize = 17;
    pub const NEW_SALT_PUBLIC_KEY: Range<usize> = 18..22;
    pub const NEW_CIPHERTEXT: Range<usize> = 22..36;
    /// outputs whose salt key and ciphertext are public
    pub const NEW_OUTPUTS: usize = 2;

    pub fn from_slice(signals: &[FieldElement]) -> Result<Self> {
        let inner: [FieldElement; PUBLIC_SIGNALS_LEN] = signals.try_into().map_err(|_| {
            PoolError::InvalidProof(format!(
                "expected {PUBLIC_SIGNALS_LEN} public signals, got {}",
                signals.len()
            ))
        })?;
        Ok(Self(inner))
    }

    pub fn as_slice(&self) -> &[FieldElement] {
        &self.0
    }

    fn four(&self, range: Range<usize>) -> [FieldElement; 4] {
        let mut out = [FieldElement::default(); 4];
        out.copy_from_slice(&self.0[range]);
        out
    }

    pub fn new_null_roots(&self) -> [FieldElement; 4] {
        self.four(Self::NEW_NULL_ROOT)
    }

    pub fn new_commitment_roots(&self) -> [FieldElement; 4] {
        self.four(Self::NEW_COMMITMENT_ROOT)
    }

    pub fn new_commitment_hashes(&self) -> [FieldElement; 4] {
        self.four(Self::NEW_COMMITMENT_HASH)
    }

    pub fn scope(&self) -> FieldElement {
        self.0[Self::SCOPE]
    }

    pub fn actual_tree_depth(&self) -> FieldElement {
        self.0[Self::ACTUAL_TREE_DEPTH]
    }

    pub fn context(&self) -> FieldElement {
        self.0[Self::CONTEXT]
    }

    pub fn existing_state_root(&self) -> FieldElement {
        self.0[Self::EXISTING_STATE_ROOT]
    }

    /// value the contract moves in (deposit)
    pub fn external_input(&self) -> FieldElement {
        self.0[Self::EXTERN_IO.start]
    }

    pub fn extern_io(&self) -> Option<ExternIo> {
        Some(ExternIo {
            input: Amount::from_field(&self.0[Self::EXTERN_IO.start])?,
            output: Amount::from_field(&self.0[Self::EXTERN_IO.start + 1])?,
        })
    }

    /// salt key of new output `slot`, `None` past the last output
    pub fn new_salt_public_key(&self, slot: usize) -> Option<Point> {
        (slot < Self::NEW_OUTPUTS).then(|| self.salt_at(slot))
    }

    /// ciphertext of new output `slot`, `None` past the last output
    pub fn new_ciphertext(&self, slot: usize) -> Option<Cipher> {
        (slot < Self::NEW_OUTPUTS).then(|| self.cipher_at(slot))
    }

    /// `(salt_public_key, ciphertext)` of every new output
    pub fn new_outputs(&self) -> [(Point, Cipher); Self::NEW_OUTPUTS] {
        std::array::from_fn(|slot| (self.salt_at(slot), self.cipher_at(slot)))
    }

    fn salt_at(&self, slot: usize) -> Point {
        let base = Self::NEW_SALT_PUBLIC_KEY.start + 2 * slot;
        Point::from_coordinates(self.0[base], self.0[base + 1])
    }

    fn cipher_at(&self, slot: usize) -> Cipher {
        let base = Self::NEW_CIPHERTEXT.start + CIPHER_SIZE * slot;
        let mut out = [FieldElement::default(); CIPHER_SIZE];
        out.copy_from_slice(&self.0[base..base + CIPHER_SIZE]);
        out
    }
}

/// proof as produced by the prover
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawProof {
    pub pi_a: [BaseField; 2],
    /// g2 point, each pair in `[c0, c1]` order
    pub pi_b: [[BaseField; 2]; 2],
    pub pi_c: [BaseField; 2],
    pub public_signals: Vec<FieldElement>,
}

/// proof in the verifier's layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedProof {
    pub a: [BaseField; 2],
    /// g2 point, each pair in `[c1, c0]` order
    pub b: [[BaseField; 2]; 2],
    pub c: [BaseField; 2],
    pub signals: PublicSignals,
}

pub fn pack(raw: &RawProof) -> Result<PackedProof> {
    Ok(PackedProof {
        a: raw.pi_a,
        b: [
            [raw.pi_b[0][1], raw.pi_b[0][0]],
            [raw.pi_b[1][1], raw.pi_b[1][0]],
        ],
        c: raw.pi_c,
        signals: PublicSignals::from_slice(&raw.public_signals)?,
    })
}

pub fn unpack(packed: &PackedProof) -> RawProof {
    RawProof {
        pi_a: packed.a,
        pi_b: [
            [packed.b[0][1], packed.b[0][0]],
            [packed.b[1][1], packed.b[1][0]],
        ],
        pi_c: packed.c,
        public_signals: packed.signals.0.to_vec(),
    }
}

#[derive(Serialize, Deserialize)]
struct SnarkjsProof {
    pi_a: Vec<String>,
    pi_b: Vec<Vec<String>>,
    pi_c: Vec<String>,
    #[serde(default = "groth16")]
    protocol: String,
    #[serde(default = "bn128")]
    curve: String,
}

fn groth16() -> String {
    "groth16".into()
}

fn bn128() -> String {
    "bn128".into()
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnarkjsBundle {
    proof: SnarkjsProof,
    public_signals: Vec<String>,
}

fn coordinate(s: &str) -> Result<BaseField> {
    parse_decimal::<BaseField>(s).map_err(|e| PoolError::InvalidProof(e.to_string()))
}

fn affine_g1(coords: &[String], name: &str) -> Result<[BaseField; 2]> {
    match coords {
        [x, y, z] if z == "1" => Ok([coordinate(x)?, coordinate(y)?]),
        _ => Err(PoolError::InvalidProof(format!(
            "{name} must be an affine point [x, y, \"1\"]"
        ))),
    }
}

fn affine_g2(coords: &[Vec<String>]) -> Result<[[BaseField; 2]; 2]> {
    let pair = |v: &Vec<String>| -> Result<[BaseField; 2]> {
        match v.as_slice() {
            [c0, c1] => Ok([coordinate(c0)?, coordinate(c1)?]),
            _ => Err(PoolError::InvalidProof("pi_b coordinate must have 2 limbs".into())),
        }
    };
    match coords {
        [x, y, z] if z.len() == 2 && z[0] == "1" && z[1] == "0" => Ok([pair(x)?, pair(y)?]),
        _ => Err(PoolError::InvalidProof(
            "pi_b must be an affine point [x, y, [\"1\", \"0\"]]".into(),
        )),
    }
}

impl RawProof {
    /// `{ proof: { pi_a, pi_b, pi_c }, publicSignals }` as returned by snarkjs
    pub fn from_snarkjs_json(json: &str) -> Result<Self> {
        let bundle: SnarkjsBundle = serde_json::from_str(json)?;
        Self::from_snarkjs_parts(&bundle.proof, &bundle.public_signals)
    }

    /// separate `proof.json` and `public.json` documents
    pub fn from_snarkjs_files(proof_json: &str, public_json: &str) -> Result<Self> {
        let proof: SnarkjsProof = serde_json::from_str(proof_json)?;
        let public: Vec<String> = serde_json::from_str(public_json)?;
        Self::from_snarkjs_parts(&proof, &public)
    }

    fn from_snarkjs_parts(proof: &SnarkjsProof, public: &[String]) -> Result<Self> {
        if proof.protocol != "groth16" {
            return Err(PoolError::InvalidProof(format!(
                "unsupported protocol {}",
                proof.protocol
            )));
        }
        let public_signals = public
            .iter()
            .map(|s| parse_decimal::<FieldElement>(s).map_err(PoolError::from))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            pi_a: affine_g1(&proof.pi_a, "pi_a")?,
            pi_b: affine_g2(&proof.pi_b)?,
            pi_c: affine_g1(&proof.pi_c, "pi_c")?,
            public_signals,
        })
    }

    pub fn to_snarkjs_json(&self) -> Result<String> {
        let g1 = |p: &[BaseField; 2]| vec![to_decimal(&p[0]), to_decimal(&p[1]), "1".to_string()];
        let bundle = SnarkjsBundle {
            proof: SnarkjsProof {
                pi_a: g1(&self.pi_a),
                pi_b: vec![
                    vec![to_decimal(&self.pi_b[0][0]), to_decimal(&self.pi_b[0][1])],
                    vec![to_decimal(&self.pi_b[1][0]), to_decimal(&self.pi_b[1][1])],
                    vec!["1".to_string(), "0".to_string()],
                ],
                pi_c: g1(&self.pi_c),
                protocol: groth16(),
                curve: bn128(),
            },
            public_signals: self.public_signals.iter().map(to_decimal).collect(),
        };
        Ok(serde_json::to_string_pretty(&bundle)?)
    }
}

impl PackedProof {
    fn proof_words(&self) -> [BaseField; PROOF_WORDS] {
        [
            self.a[0], self.a[1], self.b[0][0], self.b[0][1], self.b[1][0], self.b[1][1],
            self.c[0], self.c[1],
        ]
    }

    pub fn to_calldata(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CALLDATA_LEN);
        for word in self.proof_words() {
            out.extend_from_slice(&to_be_bytes(&word));
        }
        for signal in self.signals.as_slice() {
            out.extend_from_slice(&to_be_bytes(signal));
        }
        out
    }

    pub fn from_calldata(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CALLDATA_LEN {
            return Err(PoolError::InvalidProof(format!(
                "calldata must be {CALLDATA_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let words: Vec<[u8; 32]> = bytes
            .chunks_exact(32)
            .map(|w| {
                let mut word = [0u8; 32];
                word.copy_from_slice(w);
                word
            })
            .collect();

        let mut proof = [BaseField::default(); PROOF_WORDS];
        for (slot, word) in proof.iter_mut().zip(&words[..PROOF_WORDS]) {
            *slot = from_be_bytes(word).map_err(|e| PoolError::InvalidProof(e.to_string()))?;
        }
        let signals = words[PROOF_WORDS..]
            .iter()
            .map(|w| from_be_bytes::<FieldElement>(w).map_err(PoolError::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            a: [proof[0], proof[1]],
            b: [[proof[2], proof[3]], [proof[4], proof[5]]],
            c: [proof[6], proof[7]],
            signals: PublicSignals::from_slice(&signals)?,
        })
    }

    pub fn to_calldata_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_calldata()))
    }

    pub fn from_calldata_hex(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| PoolError::InvalidProof(e.to_string()))?;
        Self::from_calldata(&bytes)
    }

    /// the verifier's argument tuple as decimal strings
    pub fn to_json(&self) -> Result<String> {
        let d = |p: &[BaseField; 2]| [to_decimal(&p[0]), to_decimal(&p[1])];
        let value = serde_json::json!({
            "a": d(&self.a),
            "b": [d(&self.b[0]), d(&self.b[1])],
            "c": d(&self.c),
            "publicSignals": self.signals.as_slice().iter().map(to_decimal).collect::<Vec<_>>(),
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
