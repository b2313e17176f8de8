// Proving-pipeline benchmarks for ShadowSig.
//
// Runs compile, setup, prove and verify on a MiMC commitment-opening
// circuit, the same matrix-driven path the signature circuit takes. The
// signature circuit itself is too large for criterion's sampling.

use criterion::{criterion_group, criterion_main, Criterion};

use ark_bn254::Fr;
use ark_ff::UniformRand;
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::rand::{rngs::StdRng, SeedableRng};

use shadowsig::crypto::mimc_hash;
use shadowsig::export::{export_calldata, export_verifier_source};
use shadowsig::zkp::gadgets::mimc;
use shadowsig::zkp::{compile_circuit, prove_circuit, setup, verify};

#[derive(Clone, Default)]
struct Opening {
    secret: Option<Fr>,
    nonce: Option<Fr>,
    com: Option<Fr>,
}

impl ConstraintSynthesizer<Fr> for Opening {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let com = FpVar::new_input(cs.clone(), || self.com.ok_or(SynthesisError::AssignmentMissing))?;
        let secret =
            FpVar::new_witness(cs.clone(), || self.secret.ok_or(SynthesisError::AssignmentMissing))?;
        let nonce =
            FpVar::new_witness(cs, || self.nonce.ok_or(SynthesisError::AssignmentMissing))?;
        mimc::hash(&[secret, nonce])?.enforce_equal(&com)
    }
}

fn satisfied(rng: &mut StdRng) -> Opening {
    let secret = Fr::rand(rng);
    let nonce = Fr::rand(rng);
    Opening {
        secret: Some(secret),
        nonce: Some(nonce),
        com: Some(mimc_hash(&[secret, nonce])),
    }
}

fn bench_compile_and_setup(c: &mut Criterion) {
    c.bench_function("pipeline/compile", |b| {
        b.iter(|| compile_circuit("opening", Opening::default()).unwrap());
    });

    let compiled = compile_circuit("opening", Opening::default()).unwrap();
    c.bench_function("pipeline/setup", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(42);
            setup(&compiled, &mut rng).unwrap()
        });
    });
}

fn bench_prove_verify(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let compiled = compile_circuit("opening", Opening::default()).unwrap();
    let (pk, vk) = setup(&compiled, &mut rng).unwrap();
    let circuit = satisfied(&mut rng);

    c.bench_function("pipeline/prove", |b| {
        b.iter(|| prove_circuit(circuit.clone(), &compiled, &pk, &mut rng).unwrap());
    });

    let (proof, inputs) = prove_circuit(circuit, &compiled, &pk, &mut rng).unwrap();
    c.bench_function("pipeline/verify", |b| {
        b.iter(|| verify(&vk, &inputs, &proof).unwrap());
    });
    c.bench_function("export/calldata", |b| {
        b.iter(|| export_calldata(&proof, &inputs));
    });
    c.bench_function("export/solidity", |b| {
        b.iter(|| export_verifier_source(&vk, "OpeningVerifier").unwrap());
    });
}

criterion_group!(benches, bench_compile_and_setup, bench_prove_verify);
criterion_main!(benches);
