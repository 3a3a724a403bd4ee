//! poseidon duplex cipher keyed by a babyjubjub shared point
//!
//! width-4 sponge. the state starts as `[0, k.x, k.y, nonce + len * 2^128]`,
//! each 3-element block is absorbed into lanes 1..4 and squeezed back out, and
//! a final permutation yields lane 1 as the authentication tag.

use ark_ff::{One, Zero};

use crate::babyjubjub::Point;
use crate::error::{PrimitiveError, Result};
use crate::field::{from_u128, FieldElement};
use crate::poseidon::permute;

const RATE: usize = 3;

/// ciphertext length for a message of `len` elements
pub fn ciphertext_len(len: usize) -> usize {
    padded_len(len) + 1
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(RATE) * RATE
}

fn two_pow_128() -> FieldElement {
    from_u128(u128::MAX) + FieldElement::one()
}

fn initial_state(key: &Point, nonce: u128, len: usize) -> [FieldElement; 4] {
    let domain = from_u128(nonce) + FieldElement::from(len as u64) * two_pow_128();
    [FieldElement::zero(), key.x, key.y, domain]
}

pub fn encrypt(message: &[FieldElement], key: &Point, nonce: u128) -> Result<Vec<FieldElement>> {
    let mut padded = message.to_vec();
    padded.resize(padded_len(message.len()), FieldElement::zero());

    let mut state = initial_state(key, nonce, message.len());
    let mut ciphertext = Vec::with_capacity(padded.len() + 1);

    for block in padded.chunks(RATE) {
        permute(&mut state)?;
        for (j, m) in block.iter().enumerate() {
            state[j + 1] += m;
            ciphertext.push(state[j + 1]);
        }
    }

    permute(&mut state)?;
    ciphertext.push(state[1]);
    Ok(ciphertext)
}

/// decrypt and authenticate
pub fn decrypt(
    ciphertext: &[FieldElement],
    key: &Point,
    nonce: u128,
    len: usize,
) -> Result<Vec<FieldElement>> {
    let (mut message, tag) = open(ciphertext, key, nonce, len)?;

    if message[len..].iter().any(|m| !m.is_zero()) {
        return Err(PrimitiveError::DecryptionFailed("non-zero padding"));
    }
    if tag != ciphertext[ciphertext.len() - 1] {
        return Err(PrimitiveError::DecryptionFailed("authentication tag mismatch"));
    }

    message.truncate(len);
    Ok(message)
}

/// decrypt without checking padding or tag
///
/// this is what the circuit computes: a wrong key yields an unrelated
/// message instead of an error. only a length mismatch fails.
pub fn decrypt_unchecked(
    ciphertext: &[FieldElement],
    key: &Point,
    nonce: u128,
    len: usize,
) -> Result<Vec<FieldElement>> {
    let (mut message, _) = open(ciphertext, key, nonce, len)?;
    message.truncate(len);
    Ok(message)
}

/// padded plaintext and the expected tag
fn open(
    ciphertext: &[FieldElement],
    key: &Point,
    nonce: u128,
    len: usize,
) -> Result<(Vec<FieldElement>, FieldElement)> {
    if ciphertext.len() != ciphertext_len(len) {
        return Err(PrimitiveError::DecryptionFailed("ciphertext length mismatch"));
    }

    let mut state = initial_state(key, nonce, len);
    let mut message = Vec::with_capacity(ciphertext.len() - 1);
    let body = &ciphertext[..ciphertext.len() - 1];

    for block in body.chunks(RATE) {
        permute(&mut state)?;
        for (j, c) in block.iter().enumerate() {
            message.push(*c - state[j + 1]);
            state[j + 1] = *c;
        }
    }

    permute(&mut state)?;
    Ok((message, state[1]))
}
