//! Test fixtures: a commitment-opening circuit small enough to push through
//! the whole compile / setup / prove / verify lifecycle in milliseconds.

use ark_bn254::{Bn254, Fr};
use ark_ff::{One, UniformRand, Zero};
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::rand::{rngs::StdRng, SeedableRng};

use super::circuit::CircuitId;
use super::gadgets::mimc;
use super::setup::{compile_circuit, setup, CompiledCircuit};
use crate::crypto::mimc::mimc_hash;

/// "I know `(address, nonce)` with `MiMC(address, nonce) + shift = com`",
/// `com` public. `shift` is a circuit constant, zero unless a test needs a
/// second relation with the same shape.
#[derive(Clone, Default)]
pub struct OpeningCircuit {
    pub address: Option<Fr>,
    pub nonce: Option<Fr>,
    pub com: Option<Fr>,
    pub shift: Fr,
}

impl OpeningCircuit {
    pub fn blank() -> Self {
        Self::default()
    }

    /// A satisfied instance and its public input.
    pub fn satisfied(seed: u64) -> (Self, Vec<Fr>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let address = Fr::rand(&mut rng);
        let nonce = Fr::rand(&mut rng);
        let com = mimc_hash(&[address, nonce]);
        let circuit = Self {
            address: Some(address),
            nonce: Some(nonce),
            com: Some(com),
            shift: Fr::zero(),
        };
        (circuit, vec![com])
    }

    /// A satisfied instance of the relation shifted by one: same shape,
    /// different matrices.
    pub fn shifted(seed: u64) -> (Self, Vec<Fr>) {
        let (mut circuit, _) = Self::satisfied(seed);
        circuit.shift = Fr::one();
        let com = circuit.com.map(|c| c + Fr::one());
        circuit.com = com;
        (circuit, com.into_iter().collect())
    }
}

impl ConstraintSynthesizer<Fr> for OpeningCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let com = FpVar::new_input(ark_relations::ns!(cs, "com"), || {
            self.com.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let address = FpVar::new_witness(ark_relations::ns!(cs, "address"), || {
            self.address.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let nonce = FpVar::new_witness(ark_relations::ns!(cs, "nonce"), || {
            self.nonce.ok_or(SynthesisError::AssignmentMissing)
        })?;
        (mimc::hash(&[address, nonce])? + self.shift).enforce_equal(&com)
    }
}

pub fn opening_circuit_id() -> CircuitId {
    CircuitId::for_label("opening")
}

/// Compile and set up the opening circuit with a seeded RNG.
pub fn toy_setup(seed: u64) -> (CompiledCircuit, ProvingKey<Bn254>, VerifyingKey<Bn254>) {
    let compiled = compile_circuit("opening", OpeningCircuit::blank()).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let (pk, vk) = setup(&compiled, &mut rng).unwrap();
    (compiled, pk, vk)
}
