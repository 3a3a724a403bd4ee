//! transaction pipeline
//!
//! intent -> circuit inputs -> proof -> packed proof -> submission. every
//! step either succeeds or aborts the attempt. nothing here mutates the local
//! log, the caller syncs after a submission lands.
//!
//! the prover's public signals are compared against the ones computed from
//! the witness before anything is submitted. a mismatch is reported with the
//! first differing index.
//!
//! Usage:
//! ```ignore
//! let intent = Intent::new(
//!     vec![key.void(&mut rng, scope)?, key.void(&mut rng, scope)?],
//!     vec![key.commit(&mut rng, scope, Amount(100))?, key.void(&mut rng, scope)?],
//! );
//! let tx = process(&mut state, &prover, &chain, &request, &intent).await?;
//! state.sync().await?;
//! ```

use ark_ff::MontFp;

use crate::chain::{ChainReader, ChainWriter, Request, TxHandle};
use crate::circuit::CircuitWitness;
use crate::commitment::Commitment;
use crate::error::{PoolError, Result};
use crate::proof::{pack, BaseField, RawProof};
use crate::state::PoolState;
use crate::value::ExternIo;

/// groth16 prover behind the circuit
#[async_trait::async_trait]
pub trait Prover: Send + Sync {
    async fn prove(&self, witness: &CircuitWitness) -> Result<RawProof>;
}

/// what to spend and what to create
#[derive(Clone, Debug)]
pub struct Intent {
    pub existing: Vec<Commitment>,
    pub new: Vec<Commitment>,
    /// derived from the values when unset
    pub extern_io: Option<ExternIo>,
}

impl Intent {
    pub fn new(existing: Vec<Commitment>, new: Vec<Commitment>) -> Self {
        Self {
            existing,
            new,
            extern_io: None,
        }
    }
}

const G1_X: BaseField = MontFp!("1");
const G1_Y: BaseField = MontFp!("2");
const G2_X_C0: BaseField =
    MontFp!("10857046999023057135944570762232829481370756359578518086990519993285655852781");
const G2_X_C1: BaseField =
    MontFp!("11559732032986387107991004021392285783925812861821192530917403151452391805634");
const G2_Y_C0: BaseField =
    MontFp!("8495653923123431417604973247489272438418190587263600148770280649306958101930");
const G2_Y_C1: BaseField =
    MontFp!("4082367875863433681332203403145435568316851327593401208105741076214120093531");

/// evaluates the circuit outputs in the clear and returns generator points
/// in place of a proof
///
/// for offline simulation against a chain that does not verify pairings.
#[derive(Clone, Copy, Debug, Default)]
pub struct DryRunProver;

#[async_trait::async_trait]
impl Prover for DryRunProver {
    async fn prove(&self, witness: &CircuitWitness) -> Result<RawProof> {
        let outputs = witness
            .evaluate_outputs()
            .map_err(|e| PoolError::ProvingFailed(e.to_string()))?;
        Ok(RawProof {
            pi_a: [G1_X, G1_Y],
            pi_b: [[G2_X_C0, G2_X_C1], [G2_Y_C0, G2_Y_C1]],
            pi_c: [G1_X, G1_Y],
            public_signals: witness.public_signals(&outputs).0.to_vec(),
        })
    }
}

/// prove and submit one transaction
pub async fn process<R, P, W>(
    state: &mut PoolState<R>,
    prover: &P,
    writer: &W,
    request: &Request,
    intent: &Intent,
) -> Result<TxHandle>
where
    R: ChainReader,
    P: Prover + ?Sized,
    W: ChainWriter + ?Sized,
{
    let scope = state.scope().await?;
    let context = state.context(request).await?;
    let inputs = state.build_circuit_inputs(
        scope,
        context,
        &intent.existing,
        &intent.new,
        intent.extern_io,
    )?;
    let extern_io = inputs.extern_io();
    tracing::debug!(
        input = %extern_io.input,
        output = %extern_io.output,
        depth = inputs.witness.actual_tree_depth,
        "built circuit inputs"
    );

    let raw = prover.prove(&inputs.witness).await.map_err(|e| match e {
        PoolError::ProvingFailed(_) => e,
        other => PoolError::ProvingFailed(other.to_string()),
    })?;
    let packed = pack(&raw)?;

    let expected = inputs.expected_public_signals();
    if let Some(index) = expected
        .as_slice()
        .iter()
        .zip(packed.signals.as_slice())
        .position(|(want, got)| want != got)
    {
        return Err(PoolError::SignalMismatch { index });
    }

    let handle = writer.submit(request, &packed, extern_io.input).await?;
    tracing::info!(tx = %handle, "submitted pool transaction");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PrivacyKey;
    use crate::value::Amount;
    use pool_merkle::IncrementalMerkleLog;
    use pool_primitives::FieldElement;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[tokio::test]
    async fn test_dry_run_matches_expected_signals() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut key = PrivacyKey::generate(&mut rng);
        let scope = FieldElement::from(3u64);
        let existing = vec![key.void(&mut rng, scope).unwrap(), key.void(&mut rng, scope).unwrap()];
        let new = vec![
            key.commit(&mut rng, scope, Amount(40)).unwrap(),
            key.void(&mut rng, scope).unwrap(),
        ];
        let log = IncrementalMerkleLog::default();
        let inputs = crate::circuit::CircuitInputBuilder::new(&log, scope, FieldElement::from(8u64))
            .build(&existing, &new)
            .unwrap();

        let raw = DryRunProver.prove(&inputs.witness).await.unwrap();
        let packed = pack(&raw).unwrap();
        assert_eq!(packed.signals, inputs.expected_public_signals());
        assert_eq!(packed.b[0], [G2_X_C1, G2_X_C0]);
    }

    #[tokio::test]
    async fn test_dry_run_rejects_wrong_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut key = PrivacyKey::generate(&mut rng);
        let scope = FieldElement::from(3u64);
        let existing = vec![key.void(&mut rng, scope).unwrap(), key.void(&mut rng, scope).unwrap()];
        let new = vec![key.void(&mut rng, scope).unwrap(), key.void(&mut rng, scope).unwrap()];
        let log = IncrementalMerkleLog::default();
        let mut inputs = crate::circuit::CircuitInputBuilder::new(&log, scope, FieldElement::from(8u64))
            .build(&existing, &new)
            .unwrap();
        inputs.witness.private_key[0] = FieldElement::from(5u64);

        let err = DryRunProver.prove(&inputs.witness).await.unwrap_err();
        assert!(matches!(err, PoolError::ProvingFailed(_)));
    }
}
