//! # Circuit Gadgets
//!
//! R1CS building blocks over BN254 `Fr`:
//!
//! ```text
//! ecdsa.rs:       non-native secp256k1 points and ECDSA verification
//! mimc.rs:        MiMC permutation/hash, twin of crypto::mimc
//! commitment.rs:  in-circuit recomputation of identity commitments
//! ```
//!
//! This module holds the shared plumbing: canonical bit decomposition of
//! emulated values, byte/bit packing, and the public-limb binding that
//! exposes a secp256k1 value as [`NUM_LIMBS`](crate::config::NUM_LIMBS)
//! BN254 public inputs.

pub mod commitment;
pub mod ecdsa;
pub mod mimc;

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{fp::FpVar, nonnative::NonNativeFieldVar},
    uint8::UInt8,
    ToBitsGadget,
};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::crypto::field::{to_biguint, FieldParams};

/// Little-endian bits of an emulated value, exactly `T::MODULUS_BIT_SIZE`
/// long. The decomposition is enforced canonical by `NonNativeFieldVar`.
pub fn canonical_bits<T: PrimeField>(
    value: &NonNativeFieldVar<T, Fr>,
) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let width = T::MODULUS_BIT_SIZE as usize;
    let mut bits = value.to_bits_le()?;
    if bits.len() < width {
        return Err(SynthesisError::Unsatisfiable);
    }
    bits.truncate(width);
    Ok(bits)
}

/// Pack little-endian bits into one `Fr` element. At most 253 bits.
pub fn bits_to_fp(bits: &[Boolean<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    Boolean::le_bits_to_fp_var(bits)
}

/// Interpret big-endian bytes as an integer in `Fr`.
pub fn be_bytes_to_fp(bytes: &[UInt8<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes.iter().rev() {
        bits.extend(byte.to_bits_le()?);
    }
    bits_to_fp(&bits)
}

/// Big-endian bytes of a 256-bit little-endian bit vector.
pub fn le_bits_to_be_bytes(bits: &[Boolean<Fr>]) -> Vec<UInt8<Fr>> {
    bits.chunks(8).rev().map(UInt8::from_bits_le).collect()
}

/// Allocate `value` as a private emulated element and expose it as public
/// limbs, in the limb layout of `params`. The limbs are declared as inputs
/// in order, so callers control the public-input layout by call order.
pub fn alloc_public_limbs<T: PrimeField>(
    cs: ConstraintSystemRef<Fr>,
    value: Option<T>,
    params: &FieldParams,
) -> Result<NonNativeFieldVar<T, Fr>, SynthesisError> {
    let limb_values = value.map(|v| params.limbs(&to_biguint(&v)));
    let mut limbs = Vec::with_capacity(params.num_limbs);
    for i in 0..params.num_limbs {
        limbs.push(FpVar::new_input(ark_relations::ns!(cs, "limb"), || {
            limb_values
                .as_ref()
                .map(|l| l[i])
                .ok_or(SynthesisError::AssignmentMissing)
        })?);
    }

    let var = NonNativeFieldVar::new_witness(ark_relations::ns!(cs, "value"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    enforce_limbs(&var, &limbs, params)?;
    Ok(var)
}

/// Enforce that `limbs` is the limb decomposition of `var`.
pub fn enforce_limbs<T: PrimeField>(
    var: &NonNativeFieldVar<T, Fr>,
    limbs: &[FpVar<Fr>],
    params: &FieldParams,
) -> Result<(), SynthesisError> {
    let bits = var.to_bits_le()?;
    if limbs.len() != params.num_limbs || bits.len() < params.limb_bits * params.num_limbs {
        return Err(SynthesisError::Unsatisfiable);
    }
    for (chunk, limb) in bits.chunks(params.limb_bits).zip(limbs) {
        bits_to_fp(chunk)?.enforce_equal(limb)?;
    }
    // Anything above the last limb must be zero.
    for bit in &bits[params.limb_bits * params.num_limbs..] {
        bit.enforce_equal(&Boolean::FALSE)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::field::SigningCurve;
    use ark_r1cs_std::R1CSVar;
    use ark_relations::r1cs::ConstraintSystem;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use ark_ff::UniformRand;

    #[test]
    fn public_limbs_match_native_layout() {
        let mut rng = StdRng::seed_from_u64(9);
        let params = SigningCurve::secp256k1().base;
        let value = ark_secp256k1::Fq::rand(&mut rng);

        let cs = ConstraintSystem::<Fr>::new_ref();
        let var = alloc_public_limbs(cs.clone(), Some(value), &params).unwrap();
        assert!(cs.is_satisfied().unwrap());
        assert_eq!(var.value().unwrap(), value);

        let cs = cs.borrow().unwrap();
        // instance_assignment[0] is the constant one.
        assert_eq!(&cs.instance_assignment[1..], &params.limbs(&to_biguint(&value))[..]);
    }

    #[test]
    fn byte_packing_is_big_endian() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let bytes = UInt8::new_witness_vec(cs.clone(), &[0x01u8, 0x02][..]).unwrap();
        assert_eq!(be_bytes_to_fp(&bytes).unwrap().value().unwrap(), Fr::from(0x0102u64));
    }

    #[test]
    fn canonical_bits_have_modulus_width() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let var = NonNativeFieldVar::<ark_secp256k1::Fr, Fr>::new_witness(cs.clone(), || {
            Ok(ark_secp256k1::Fr::from(5u64))
        })
        .unwrap();
        let bits = canonical_bits(&var).unwrap();
        assert_eq!(bits.len(), 256);
        assert!(bits[0].value().unwrap());
        assert!(!bits[1].value().unwrap());
        assert!(bits[2].value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }
}
