//! # Groth16 Proof Generation
//!
//! The workflow for one request:
//!
//! 1. **Pre-check**: natively evaluate the relations the circuit enforces
//!    ([`Witness::diagnose`]). A bad signature or a commitment that does not
//!    open is reported by name, before any synthesis.
//!
//! 2. **Synthesize**: run the circuit with the witness assigned. Any
//!    violated gate is an [`UnsatisfiedConstraint`] error; the synthesized
//!    shape must equal the shape recorded in the loaded compiled circuit.
//!
//! 3. **Prove**: hand the full assignment and the *loaded* matrices to the
//!    backend, with fresh blinding from the caller's RNG.
//!
//! [`UnsatisfiedConstraint`]: ProtocolError::UnsatisfiedConstraint

use ark_bn254::{Bn254, Fr};
use ark_ff::Zero;
use ark_groth16::{Proof, ProvingKey};
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, OptimizationGoal, SynthesisMode,
};
use ark_serialize::CanonicalSerialize;
use ark_std::rand::{CryptoRng, RngCore};
use tracing::{debug, info, instrument};

use super::artifact::ArtifactKind;
use super::backend::{Groth16Backend, ProvingBackend};
use super::circuit::{CircuitDescriptor, SignatureCircuit};
use super::setup::{ArtifactSet, CircuitShape, CompiledCircuit};
use super::witness::{PublicInputVector, Witness};
use crate::error::{ProtocolError, Result};

/// A proof together with the public inputs it was produced for.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureProof {
    /// The Groth16 proof.
    pub proof: Proof<Bn254>,
    /// Public inputs, in declaration order.
    pub public_inputs: PublicInputVector,
}

impl SignatureProof {
    /// Compressed proof bytes (128 bytes on BN254).
    pub fn proof_bytes(&self) -> Result<Vec<u8>> {
        encode_proof(&self.proof)
    }
}

/// Compressed encoding of a proof.
pub fn encode_proof(proof: &Proof<Bn254>) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(proof.compressed_size());
    proof
        .serialize_compressed(&mut bytes)
        .map_err(|e| ProtocolError::Structural(format!("proof serialization failed: {e}")))?;
    Ok(bytes)
}

/// Prove ownership of the key in `witness` against a loaded artifact set.
#[instrument(skip_all, fields(arrangement = %witness.arrangement))]
pub fn prove<R: RngCore + CryptoRng>(
    witness: &Witness,
    artifacts: &ArtifactSet,
    rng: &mut R,
) -> Result<SignatureProof> {
    if let Some(reason) = witness.diagnose() {
        return Err(ProtocolError::UnsatisfiedConstraint(reason.to_string()));
    }

    let expected = CircuitDescriptor::new(witness.arrangement).id();
    if artifacts.circuit_id != expected {
        return Err(ProtocolError::deserialization(
            ArtifactKind::CompiledCircuit,
            format!(
                "artifacts were built for circuit {}, witness needs {expected}",
                artifacts.circuit_id
            ),
        ));
    }

    let (proof, public_inputs) = prove_circuit(
        SignatureCircuit::from_witness(witness),
        &artifacts.compiled,
        &artifacts.proving_key,
        rng,
    )?;
    let public_inputs = PublicInputVector(public_inputs);
    if public_inputs != witness.public_inputs() {
        return Err(ProtocolError::Compile(
            "synthesized public inputs disagree with the witness layout".into(),
        ));
    }
    info!(public_inputs = public_inputs.len(), "signature proof generated");
    Ok(SignatureProof {
        proof,
        public_inputs,
    })
}

/// Prove any circuit against its compiled matrices. Returns the proof and
/// the public inputs the synthesis produced.
pub fn prove_circuit<C, R>(
    circuit: C,
    compiled: &CompiledCircuit,
    pk: &ProvingKey<Bn254>,
    rng: &mut R,
) -> Result<(Proof<Bn254>, Vec<Fr>)>
where
    C: ConstraintSynthesizer<Fr>,
    R: RngCore + CryptoRng,
{
    let assignment = synthesize(circuit, compiled)?;
    let public_inputs = assignment[1..compiled.shape.num_instance_variables].to_vec();
    let proof = Groth16Backend.prove(pk, compiled, &assignment, rng)?;
    Ok((proof, public_inputs))
}

/// Synthesize `circuit` with its witness, check every gate, and return the
/// full assignment `1 ‖ public inputs ‖ witnesses`.
pub fn synthesize<C: ConstraintSynthesizer<Fr>>(
    circuit: C,
    compiled: &CompiledCircuit,
) -> Result<Vec<Fr>> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(SynthesisMode::Prove {
        construct_matrices: true,
    });
    circuit.generate_constraints(cs.clone())?;
    cs.finalize();

    if let Some(failing) = cs.which_is_unsatisfied()? {
        return Err(ProtocolError::UnsatisfiedConstraint(format!(
            "constraint {failing} is violated"
        )));
    }

    let shape = CircuitShape {
        num_constraints: cs.num_constraints(),
        num_instance_variables: cs.num_instance_variables(),
        num_witness_variables: cs.num_witness_variables(),
    };
    if shape != compiled.shape {
        return Err(ProtocolError::deserialization(
            ArtifactKind::CompiledCircuit,
            format!(
                "circuit definition synthesizes to {shape:?}, loaded artifact records {:?}",
                compiled.shape
            ),
        ));
    }

    let cs = cs
        .borrow()
        .ok_or_else(|| ProtocolError::Compile("constraint system was dropped".into()))?;
    let mut assignment = cs.instance_assignment.clone();
    assignment.extend_from_slice(&cs.witness_assignment);

    enforce_compiled_rows(compiled, &assignment)?;
    debug!(constraints = shape.num_constraints, "witness satisfies compiled circuit");
    Ok(assignment)
}

/// Evaluate `A·z ∘ B·z = C·z` row by row on the *loaded* matrices. The
/// proof is built from these matrices, so a circuit definition that drifted
/// without changing shape is caught here rather than at verification.
fn enforce_compiled_rows(compiled: &CompiledCircuit, assignment: &[Fr]) -> Result<()> {
    let eval = |row: &[(Fr, usize)]| -> Result<Fr> {
        row.iter().try_fold(Fr::zero(), |acc, (coeff, column)| {
            let value = assignment.get(*column).ok_or_else(|| {
                ProtocolError::deserialization(
                    ArtifactKind::CompiledCircuit,
                    format!("row references variable {column}, assignment has {}", assignment.len()),
                )
            })?;
            Ok(acc + *coeff * value)
        })
    };

    let m = &compiled.matrices;
    for (i, ((a, b), c)) in m.a.iter().zip(&m.b).zip(&m.c).enumerate() {
        if eval(a)? * eval(b)? != eval(c)? {
            return Err(ProtocolError::UnsatisfiedConstraint(format!(
                "row {i} of compiled circuit `{}` is violated; the circuit definition \
                 no longer matches the loaded artifact",
                compiled.label
            )));
        }
    }
    Ok(())
}
