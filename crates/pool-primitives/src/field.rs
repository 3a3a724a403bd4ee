//! bn254 scalar field helpers
//!
//! every value that crosses a boundary (json, calldata, chain reads) is parsed
//! strictly: canonical digits only, and the integer must be below the modulus.
//! nothing is silently reduced.

use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

use crate::error::{PrimitiveError, Result};

/// element of the bn254 scalar field
pub type FieldElement = ark_bn254::Fr;

/// order of the babyjubjub prime-order subgroup
pub const SUBGROUP_ORDER: &str =
    "2736030358979909402780800718157159386076813972158567259200215660948447373041";

/// field modulus as an integer
pub fn modulus<F: PrimeField>() -> BigUint {
    BigUint::from_bytes_le(&F::MODULUS.to_bytes_le())
}

/// babyjubjub subgroup order as an integer
pub fn subgroup_order() -> BigUint {
    // constant literal, always parses
    BigUint::parse_bytes(SUBGROUP_ORDER.as_bytes(), 10).unwrap_or_default()
}

pub fn to_biguint<F: PrimeField>(value: &F) -> BigUint {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le())
}

/// integer to field element, rejecting values at or above the modulus
pub fn from_biguint<F: PrimeField>(value: &BigUint) -> Result<F> {
    if value >= &modulus::<F>() {
        return Err(PrimitiveError::InvalidFieldElement(format!(
            "{value} is not below the field modulus"
        )));
    }
    Ok(F::from_le_bytes_mod_order(&value.to_bytes_le()))
}

/// parse a canonical base-10 string
pub fn parse_decimal<F: PrimeField>(s: &str) -> Result<F> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PrimitiveError::InvalidFieldElement(format!(
            "{s:?} is not a decimal integer"
        )));
    }
    let value = BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| PrimitiveError::InvalidFieldElement(s.to_string()))?;
    from_biguint(&value)
}

pub fn to_decimal<F: PrimeField>(value: &F) -> String {
    to_biguint(value).to_str_radix(10)
}

/// parse a hex string, `0x` prefix optional
pub fn parse_hex<F: PrimeField>(s: &str) -> Result<F> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PrimitiveError::InvalidFieldElement(format!(
            "{s:?} is not a hex integer"
        )));
    }
    let value = BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| PrimitiveError::InvalidFieldElement(s.to_string()))?;
    from_biguint(&value)
}

/// minimal `0x` hex form
pub fn to_hex<F: PrimeField>(value: &F) -> String {
    format!("0x{}", to_biguint(value).to_str_radix(16))
}

/// 32-byte big-endian word
pub fn to_be_bytes<F: PrimeField>(value: &F) -> [u8; 32] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    // bn254 limbs are exactly 32 bytes, left pad anything shorter
    let start = 32usize.saturating_sub(bytes.len());
    out[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
    out
}

/// 32-byte big-endian word, rejecting non-canonical encodings
pub fn from_be_bytes<F: PrimeField>(bytes: &[u8; 32]) -> Result<F> {
    from_biguint(&BigUint::from_bytes_be(bytes))
}

/// little-endian bytes reduced modulo the subgroup order
pub fn reduce_to_scalar(bytes_le: &[u8]) -> FieldElement {
    let reduced = BigUint::from_bytes_le(bytes_le) % subgroup_order();
    FieldElement::from_le_bytes_mod_order(&reduced.to_bytes_le())
}

/// uniform non-zero scalar below the subgroup order
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> FieldElement {
    loop {
        // 512 bits keeps the modular bias negligible
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        let scalar = reduce_to_scalar(&wide);
        if !scalar.is_zero() {
            return scalar;
        }
    }
}

/// field element from an unsigned integer
pub fn from_u128(value: u128) -> FieldElement {
    FieldElement::from(value)
}

/// field element back to u128, `None` when it does not fit
pub fn to_u128(value: &FieldElement) -> Option<u128> {
    let bytes = value.into_bigint().to_bytes_le();
    if bytes[16..].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[..16]);
    Some(u128::from_le_bytes(low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fq;
    use rand::SeedableRng;

    const P: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn test_decimal_round_trip() {
        let f = FieldElement::from(123456789u64);
        assert_eq!(to_decimal(&f), "123456789");
        assert_eq!(parse_decimal::<FieldElement>("123456789").unwrap(), f);
    }

    #[test]
    fn test_decimal_rejects_modulus() {
        assert!(parse_decimal::<FieldElement>(P).is_err());
        let p_minus_one =
            "21888242871839275222246405745257275088548364400416034343698204186575808495616";
        assert_eq!(
            parse_decimal::<FieldElement>(p_minus_one).unwrap(),
            -FieldElement::from(1u64)
        );
    }

    #[test]
    fn test_decimal_rejects_garbage() {
        assert!(parse_decimal::<FieldElement>("").is_err());
        assert!(parse_decimal::<FieldElement>("-1").is_err());
        assert!(parse_decimal::<FieldElement>("12a").is_err());
        assert!(parse_decimal::<FieldElement>(" 1").is_err());
    }

    #[test]
    fn test_base_field_is_larger() {
        // p is a valid base-field element but not a scalar
        assert!(parse_decimal::<Fq>(P).is_ok());
    }

    #[test]
    fn test_hex() {
        let f = FieldElement::from(255u64);
        assert_eq!(to_hex(&f), "0xff");
        assert_eq!(parse_hex::<FieldElement>("0xff").unwrap(), f);
        assert_eq!(parse_hex::<FieldElement>("FF").unwrap(), f);
        assert!(parse_hex::<FieldElement>("0x").is_err());
        assert_eq!(to_hex(&FieldElement::zero()), "0x0");
    }

    #[test]
    fn test_be_bytes() {
        let f = FieldElement::from(0x0102u64);
        let bytes = to_be_bytes(&f);
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert_eq!(from_be_bytes::<FieldElement>(&bytes).unwrap(), f);
        assert!(from_be_bytes::<FieldElement>(&[0xff; 32]).is_err());
    }

    #[test]
    fn test_random_scalar_below_order() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(7);
        let l = subgroup_order();
        for _ in 0..32 {
            let s = random_scalar(&mut rng);
            assert!(to_biguint(&s) < l);
            assert!(!s.is_zero());
        }
    }

    #[test]
    fn test_u128_conversion() {
        assert_eq!(to_u128(&from_u128(u128::MAX)), Some(u128::MAX));
        assert_eq!(to_u128(&(from_u128(u128::MAX) + FieldElement::from(1u64))), None);
        assert_eq!(to_u128(&-FieldElement::from(1u64)), None);
    }
}
