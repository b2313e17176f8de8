//! In-circuit commitment recomputation.
//!
//! The preimage is rebuilt from the canonical bits of the *private*
//! public-key coordinates, so the address inside a commitment is always the
//! address of the key that passed ECDSA verification. The output layout is
//! that of [`Commitment::public_elements`](crate::zkp::commitment::Commitment::public_elements).

use ark_bn254::Fr;
use ark_crypto_primitives::crh::sha256::constraints::Sha256Gadget;
use ark_r1cs_std::{fields::fp::FpVar, uint8::UInt8};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use super::ecdsa::BaseVar;
use super::{be_bytes_to_fp, bits_to_fp, canonical_bits, le_bits_to_be_bytes, mimc};
use crate::config::{ADDRESS_LENGTH, NONCE_LENGTH};
use crate::zkp::commitment::{HashFamily, IdentityKind, Nonce};

/// Allocate the nonce as private bytes. Each byte is boolean-constrained,
/// which bounds the nonce to 160 bits.
pub fn alloc_nonce(
    cs: ConstraintSystemRef<Fr>,
    nonce: Option<&Nonce>,
) -> Result<Vec<UInt8<Fr>>, SynthesisError> {
    let bytes = nonce.map(|n| n.0).unwrap_or([0u8; NONCE_LENGTH]);
    UInt8::new_witness_vec(ark_relations::ns!(cs, "nonce"), &bytes[..])
}

/// Recompute the commitment to the key `(x, y)` under `nonce`.
pub fn commit(
    family: HashFamily,
    kind: IdentityKind,
    x: &BaseVar,
    y: &BaseVar,
    nonce: &[UInt8<Fr>],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    let x_bits = canonical_bits(x)?;
    let y_bits = canonical_bits(y)?;
    // The address is the top 160 bits of X.
    let address_bits = &x_bits[256 - 8 * ADDRESS_LENGTH..];

    match family {
        HashFamily::Algebraic => {
            let nonce = be_bytes_to_fp(nonce)?;
            let preimage = match kind {
                IdentityKind::Address => vec![bits_to_fp(address_bits)?, nonce],
                IdentityKind::PublicKey => vec![
                    bits_to_fp(&x_bits[128..])?,
                    bits_to_fp(&x_bits[..128])?,
                    bits_to_fp(&y_bits[128..])?,
                    bits_to_fp(&y_bits[..128])?,
                    nonce,
                ],
            };
            Ok(vec![mimc::hash(&preimage)?])
        }
        HashFamily::General => {
            let mut preimage = match kind {
                IdentityKind::Address => le_bits_to_be_bytes(address_bits),
                IdentityKind::PublicKey => {
                    let mut bytes = le_bits_to_be_bytes(&x_bits);
                    bytes.extend(le_bits_to_be_bytes(&y_bits));
                    bytes
                }
            };
            preimage.extend_from_slice(nonce);
            let digest = Sha256Gadget::digest(&preimage)?;
            Ok(vec![
                be_bytes_to_fp(&digest.0[..16])?,
                be_bytes_to_fp(&digest.0[16..])?,
            ])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ecdsa::SigningKey;
    use crate::zkp::commitment::{self as native, Identity, PublicKey};
    use ark_r1cs_std::R1CSVar;
    use ark_relations::r1cs::ConstraintSystem;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    fn check(family: HashFamily, kind: IdentityKind) {
        let mut rng = StdRng::seed_from_u64(11);
        let point = SigningKey::random(&mut rng).public_key();
        let nonce = Nonce::random(&mut rng);
        let expected = native::commit(
            &Identity::of(kind, &PublicKey::from_affine(&point)),
            &nonce,
            family,
        );

        let cs = ConstraintSystem::<Fr>::new_ref();
        let x = BaseVar::new_witness(cs.clone(), || Ok(point.x)).unwrap();
        let y = BaseVar::new_witness(cs.clone(), || Ok(point.y)).unwrap();
        let nonce = alloc_nonce(cs.clone(), Some(&nonce)).unwrap();
        let out = commit(family, kind, &x, &y, &nonce).unwrap();

        let values: Vec<Fr> = out.iter().map(|v| v.value().unwrap()).collect();
        assert_eq!(values, expected.public_elements(), "{family:?}/{kind:?}");
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn mimc_address_matches_native() {
        check(HashFamily::Algebraic, IdentityKind::Address);
    }

    #[test]
    fn mimc_public_key_matches_native() {
        check(HashFamily::Algebraic, IdentityKind::PublicKey);
    }

    #[test]
    fn sha256_address_matches_native() {
        check(HashFamily::General, IdentityKind::Address);
    }

    #[test]
    fn sha256_public_key_matches_native() {
        check(HashFamily::General, IdentityKind::PublicKey);
    }
}
