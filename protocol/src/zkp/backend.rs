//! # Proving Backend
//!
//! The pipeline talks to the proof system through [`ProvingBackend`]. Every
//! method is driven by a [`CompiledCircuit`]'s matrices rather than by a
//! fresh synthesis, so keys and proofs stay tied to the compiled artifact.
//!
//! [`Groth16Backend`] is the only implementation: Groth16 over BN254 with
//! the libsnark R1CS-to-QAP reduction.

use ark_bn254::{Bn254, Fr};
use ark_ff::UniformRand;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_relations::lc;
use ark_relations::r1cs::{
    ConstraintMatrices, ConstraintSynthesizer, ConstraintSystemRef, LinearCombination,
    SynthesisError, Variable,
};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};
use tracing::debug;

use super::setup::CompiledCircuit;
use crate::error::{ProtocolError, Result};

/// A proof system that works from compiled R1CS matrices.
pub trait ProvingBackend {
    /// Prover-side key.
    type ProvingKey;
    /// Verifier-side key.
    type VerifyingKey;
    /// Proof object.
    type Proof;

    /// Short name recorded in setup manifests.
    fn name(&self) -> &'static str;

    /// Generate keys for `compiled`.
    fn setup<R: RngCore + CryptoRng>(
        &self,
        compiled: &CompiledCircuit,
        rng: &mut R,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey)>;

    /// Prove from a full assignment: `1 ‖ public inputs ‖ witnesses`.
    fn prove<R: RngCore + CryptoRng>(
        &self,
        pk: &Self::ProvingKey,
        compiled: &CompiledCircuit,
        full_assignment: &[Fr],
        rng: &mut R,
    ) -> Result<Self::Proof>;

    /// Check a proof. The caller guarantees `public_inputs` has the length
    /// the key expects.
    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        public_inputs: &[Fr],
        proof: &Self::Proof,
    ) -> Result<bool>;
}

/// Groth16 over BN254.
#[derive(Clone, Copy, Debug, Default)]
pub struct Groth16Backend;

impl ProvingBackend for Groth16Backend {
    type ProvingKey = ProvingKey<Bn254>;
    type VerifyingKey = VerifyingKey<Bn254>;
    type Proof = Proof<Bn254>;

    fn name(&self) -> &'static str {
        "groth16"
    }

    fn setup<R: RngCore + CryptoRng>(
        &self,
        compiled: &CompiledCircuit,
        rng: &mut R,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey)> {
        let replay = CompiledReplay {
            matrices: &compiled.matrices,
        };
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(replay, rng)?;
        if vk.gamma_abc_g1.len() != compiled.shape.num_instance_variables {
            return Err(ProtocolError::Compile(format!(
                "setup produced {} input bases for {} instance variables",
                vk.gamma_abc_g1.len(),
                compiled.shape.num_instance_variables
            )));
        }
        debug!(label = %compiled.label, "groth16 keys generated");
        Ok((pk, vk))
    }

    fn prove<R: RngCore + CryptoRng>(
        &self,
        pk: &Self::ProvingKey,
        compiled: &CompiledCircuit,
        full_assignment: &[Fr],
        rng: &mut R,
    ) -> Result<Self::Proof> {
        let shape = compiled.shape;
        let expected = shape.num_instance_variables + shape.num_witness_variables;
        if full_assignment.len() != expected {
            return Err(ProtocolError::UnsatisfiedConstraint(format!(
                "assignment has {} entries, circuit has {expected} variables",
                full_assignment.len()
            )));
        }
        let r = Fr::rand(rng);
        let s = Fr::rand(rng);
        let proof = Groth16::<Bn254>::create_proof_with_reduction_and_matrices(
            pk,
            r,
            s,
            &compiled.matrices,
            shape.num_instance_variables,
            shape.num_constraints,
            full_assignment,
        )?;
        Ok(proof)
    }

    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        public_inputs: &[Fr],
        proof: &Self::Proof,
    ) -> Result<bool> {
        let pvk: PreparedVerifyingKey<Bn254> = ark_groth16::prepare_verifying_key(vk);
        Ok(Groth16::<Bn254>::verify_proof(&pvk, proof, public_inputs)?)
    }
}

/// Re-synthesizes a constraint system from its matrices. Only usable in
/// setup mode: no variable carries an assignment.
struct CompiledReplay<'a> {
    matrices: &'a ConstraintMatrices<Fr>,
}

impl ConstraintSynthesizer<Fr> for CompiledReplay<'_> {
    fn generate_constraints(
        self,
        cs: ConstraintSystemRef<Fr>,
    ) -> std::result::Result<(), SynthesisError> {
        let m = self.matrices;
        let mut vars = Vec::with_capacity(m.num_instance_variables + m.num_witness_variables);
        vars.push(Variable::One);
        for _ in 1..m.num_instance_variables {
            vars.push(cs.new_input_variable(|| Err(SynthesisError::AssignmentMissing))?);
        }
        for _ in 0..m.num_witness_variables {
            vars.push(cs.new_witness_variable(|| Err(SynthesisError::AssignmentMissing))?);
        }

        let row_lc = |row: &[(Fr, usize)]| -> std::result::Result<LinearCombination<Fr>, SynthesisError> {
            let mut lc = lc!();
            for (coeff, column) in row {
                let var = vars.get(*column).ok_or(SynthesisError::Unsatisfiable)?;
                lc = lc + (*coeff, *var);
            }
            Ok(lc)
        };
        for ((a, b), c) in m.a.iter().zip(&m.b).zip(&m.c) {
            cs.enforce_constraint(row_lc(a)?, row_lc(b)?, row_lc(c)?)?;
        }
        Ok(())
    }
}
