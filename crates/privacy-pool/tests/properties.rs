//! property tests over commitments and circuit inputs

use privacy_pool::circuit::{rebalance_outputs, CircuitInputBuilder};
use privacy_pool::commitment::Challenge;
use privacy_pool::{Amount, Commitment, ExternIo, FieldElement, IncrementalMerkleLog, PrivacyKey};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_recover_reproduces_commitment(
        seed in any::<u64>(),
        nonce in 0u64..1_000,
        scope in any::<u64>(),
        value in any::<u128>(),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let key = PrivacyKey::generate(&mut rng);
        let c = Commitment::create(&mut rng, key.scalar(), nonce, FieldElement::from(scope), Amount(value)).unwrap();

        let challenge = Challenge::full(&c);
        let recovered = key
            .recover(&c.salt_public_key(), c.cipher(), nonce, Some(&challenge))
            .unwrap();
        prop_assert!(recovered.is_equal(&c, true));
    }

    #[test]
    fn prop_extern_io_balances(
        seed in any::<u64>(),
        new_values in prop::array::uniform2(0u128..1_000_000),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut key = PrivacyKey::generate(&mut rng);
        let scope = FieldElement::from(11u64);

        let existing = [key.void(&mut rng, scope).unwrap(), key.void(&mut rng, scope).unwrap()];
        let new = [
            key.commit(&mut rng, scope, Amount(new_values[0])).unwrap(),
            key.commit(&mut rng, scope, Amount(new_values[1])).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let inputs = CircuitInputBuilder::new(&log, scope, FieldElement::from(0u64))
            .build(&existing, &new)
            .unwrap();

        let io = inputs.extern_io();
        prop_assert!(io.input.is_zero() || io.output.is_zero());
        prop_assert_eq!(new_values[0] + new_values[1] + io.output.0, io.input.0);
    }

    #[test]
    fn prop_extern_io_balances_spent_commitments(
        seed in any::<u64>(),
        existing_values in prop::array::uniform2(0u128..1_000_000),
        new_values in prop::array::uniform2(0u128..1_000_000),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut key = PrivacyKey::generate(&mut rng);
        let scope = FieldElement::from(11u64);

        let existing = [
            key.commit(&mut rng, scope, Amount(existing_values[0])).unwrap(),
            key.commit(&mut rng, scope, Amount(existing_values[1])).unwrap(),
        ];
        let mut log = IncrementalMerkleLog::default();
        for c in existing.iter().filter(|c| !c.is_void()) {
            log.append(&[c.commitment_root(), c.null_root()]).unwrap();
        }
        let new = [
            key.commit(&mut rng, scope, Amount(new_values[0])).unwrap(),
            key.commit(&mut rng, scope, Amount(new_values[1])).unwrap(),
        ];
        let inputs = CircuitInputBuilder::new(&log, scope, FieldElement::from(0u64))
            .build(&existing, &new)
            .unwrap();

        let io = inputs.extern_io();
        prop_assert!(io.input.is_zero() || io.output.is_zero());
        prop_assert_eq!(
            new_values[0] + new_values[1] + io.output.0,
            existing_values[0] + existing_values[1] + io.input.0
        );
        for (slot, c) in existing.iter().enumerate() {
            if !c.is_void() {
                prop_assert!(inputs.membership[slot].verify_against(&log.root()));
            }
        }
    }

    #[test]
    fn prop_balance_sum_invariant(existing in any::<u64>(), new in any::<u64>()) {
        let io = ExternIo::balance(Amount::from(existing), Amount::from(new));
        prop_assert!(io.input.is_zero() || io.output.is_zero());
        prop_assert_eq!(new as u128 + io.output.0, existing as u128 + io.input.0);
        prop_assert!(io.validate(Amount::from(existing), Amount::from(new)).is_ok());
    }

    #[test]
    fn prop_rebalance_hits_target(
        existing in prop::array::uniform2(0u128..1 << 60),
        new in prop::array::uniform2(0u128..1 << 60),
        deposit in 0u128..1 << 60,
    ) {
        let io = ExternIo { input: Amount(deposit), output: Amount::ZERO };
        let out = rebalance_outputs(existing.map(Amount), new.map(Amount), io).unwrap();
        prop_assert_eq!(out[0].0 + out[1].0, existing[0] + existing[1] + deposit);
    }
}
