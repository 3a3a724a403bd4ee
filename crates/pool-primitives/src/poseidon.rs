//! circom-compatible poseidon over bn254
//!
//! round constants and mds matrices come from `light-poseidon`. the full
//! permutation is exposed as well because the cipher consumes the whole state,
//! not only the first lane.

use std::sync::OnceLock;

use ark_ff::{Field, Zero};
use light_poseidon::parameters::bn254_x5::get_poseidon_parameters;
use light_poseidon::PoseidonParameters;

use crate::error::{PrimitiveError, Result};
use crate::field::FieldElement;

/// smallest supported state width (2 inputs)
pub const MIN_WIDTH: usize = 3;
/// largest supported state width (4 inputs)
pub const MAX_WIDTH: usize = 5;

struct ParameterTable {
    widths: Vec<PoseidonParameters<FieldElement>>,
}

fn table() -> &'static ParameterTable {
    static TABLE: OnceLock<ParameterTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let widths = (MIN_WIDTH..=MAX_WIDTH)
            .map(|t| {
                get_poseidon_parameters::<FieldElement>(t as u8)
                    .expect("bn254 x5 parameters are bundled for widths 3 to 5")
            })
            .collect();
        ParameterTable { widths }
    })
}

fn parameters(width: usize) -> Result<&'static PoseidonParameters<FieldElement>> {
    if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
        return Err(PrimitiveError::UnsupportedWidth(width));
    }
    Ok(&table().widths[width - MIN_WIDTH])
}

/// apply the permutation in place, `state.len()` selects the width
pub fn permute(state: &mut [FieldElement]) -> Result<()> {
    let params = parameters(state.len())?;
    permute_with(params, state);
    Ok(())
}

fn permute_with(params: &PoseidonParameters<FieldElement>, state: &mut [FieldElement]) {
    let width = params.width;
    let half_full = params.full_rounds / 2;
    let total = params.full_rounds + params.partial_rounds;
    let mut scratch = vec![FieldElement::zero(); width];

    for round in 0..total {
        for (i, lane) in state.iter_mut().enumerate() {
            *lane += params.ark[round * width + i];
        }

        if round < half_full || round >= half_full + params.partial_rounds {
            for lane in state.iter_mut() {
                *lane = lane.pow([params.alpha]);
            }
        } else {
            state[0] = state[0].pow([params.alpha]);
        }

        for (i, out) in scratch.iter_mut().enumerate() {
            *out = state
                .iter()
                .zip(params.mds[i].iter())
                .fold(FieldElement::zero(), |acc, (s, m)| acc + *s * m);
        }
        state.copy_from_slice(&scratch);
    }
}

/// hash 2 to 4 inputs
pub fn hash(inputs: &[FieldElement]) -> Result<FieldElement> {
    let width = inputs.len() + 1;
    if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
        return Err(PrimitiveError::UnsupportedArity(inputs.len()));
    }
    let mut state = Vec::with_capacity(width);
    state.push(FieldElement::zero());
    state.extend_from_slice(inputs);
    permute(&mut state)?;
    Ok(state[0])
}

/// two-to-one hash used for merkle nodes
pub fn hash2(left: &FieldElement, right: &FieldElement) -> FieldElement {
    let mut state = [FieldElement::zero(), *left, *right];
    permute_with(&table().widths[0], &mut state);
    state[0]
}

/// four-to-one hash used for commitment hashes
pub fn hash4(inputs: &[FieldElement; 4]) -> FieldElement {
    let mut state = [
        FieldElement::zero(),
        inputs[0],
        inputs[1],
        inputs[2],
        inputs[3],
    ];
    permute_with(&table().widths[2], &mut state);
    state[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::parse_decimal;
    use light_poseidon::{Poseidon, PoseidonHasher};
    use proptest::prelude::*;

    fn fe(n: u64) -> FieldElement {
        FieldElement::from(n)
    }

    #[test]
    fn test_known_vector() {
        let expected = parse_decimal::<FieldElement>(
            "7853200120776062878684798364095072458815029376092732009249414926327459813530",
        )
        .unwrap();
        assert_eq!(hash2(&fe(1), &fe(2)), expected);
        assert_eq!(hash(&[fe(1), fe(2)]).unwrap(), expected);
    }

    #[test]
    fn test_matches_light_poseidon() {
        for n in 2..=4usize {
            let inputs: Vec<FieldElement> = (1..=n as u64).map(fe).collect();
            let mut reference = Poseidon::<FieldElement>::new_circom(n).unwrap();
            assert_eq!(hash(&inputs).unwrap(), reference.hash(&inputs).unwrap());
        }
    }

    #[test]
    fn test_hash4_matches_generic() {
        let inputs = [fe(10), fe(20), fe(30), fe(40)];
        assert_eq!(hash4(&inputs), hash(&inputs).unwrap());
    }

    #[test]
    fn test_rejects_arity() {
        assert_eq!(hash(&[fe(1)]), Err(PrimitiveError::UnsupportedArity(1)));
        assert_eq!(hash(&[fe(1); 5]), Err(PrimitiveError::UnsupportedArity(5)));
        let mut state = [fe(0); 6];
        assert_eq!(permute(&mut state), Err(PrimitiveError::UnsupportedWidth(6)));
    }

    proptest! {
        #[test]
        fn prop_hash2_matches_light_poseidon(a in any::<u64>(), b in any::<u64>()) {
            let mut reference = Poseidon::<FieldElement>::new_circom(2).unwrap();
            prop_assert_eq!(hash2(&fe(a), &fe(b)), reference.hash(&[fe(a), fe(b)]).unwrap());
        }
    }
}
