//! In-circuit MiMC. Three multiplication gates per round.

use ark_bn254::Fr;
use ark_r1cs_std::fields::{fp::FpVar, FieldVar};
use ark_relations::r1cs::SynthesisError;

use crate::crypto::mimc::Mimc;

/// `E_key(x)`, constraint-for-round identical to [`Mimc::permute`].
pub fn permute(mimc: &Mimc, x: &FpVar<Fr>, key: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    let mut x = x.clone();
    for c in mimc.constants() {
        let t = &x + key + *c;
        let t4 = t.square()?.square()?;
        x = t4 * &t;
    }
    Ok(x + key)
}

/// Miyaguchi–Preneel hash of `elements` with the shared parameters.
pub fn hash(elements: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let mimc = Mimc::shared();
    let mut h = FpVar::zero();
    for m in elements {
        h = permute(mimc, m, &h)? + &h + m;
    }
    Ok(h)
}
