//! # Groth16 Proof Verification
//!
//! Verification has three outcomes, and only one of them is an error:
//!
//! | input                                   | result                      |
//! |-----------------------------------------|-----------------------------|
//! | well-formed, statement holds            | `Ok(Verdict::Accepted)`     |
//! | well-formed, statement false            | `Ok(Verdict::Rejected)`     |
//! | wrong input count, non-canonical input, |                             |
//! | proof point off curve or undecodable    | `Err(Structural)`           |
//!
//! Groth16 verification is three pairings plus a small MSM, independent of
//! circuit size.

use std::fmt;

use ark_bn254::{Bn254, Fr};
use ark_ec::AffineRepr;
use ark_groth16::{Proof, VerifyingKey};
use ark_serialize::CanonicalDeserialize;
use num_bigint::BigUint;
use tracing::{info, instrument, warn};

use super::backend::{Groth16Backend, ProvingBackend};
use crate::crypto::field::from_biguint;
use crate::error::{ProtocolError, Result};

/// Outcome of checking a well-formed proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The proof is valid for the public inputs.
    Accepted,
    /// The proof is well-formed but does not prove this statement.
    Rejected,
}

impl Verdict {
    /// `true` for [`Verdict::Accepted`].
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "accepted"),
            Verdict::Rejected => write!(f, "rejected"),
        }
    }
}

/// Check `proof` against `public_inputs`.
#[instrument(skip_all, fields(inputs = public_inputs.len()))]
pub fn verify(
    vk: &VerifyingKey<Bn254>,
    public_inputs: &[Fr],
    proof: &Proof<Bn254>,
) -> Result<Verdict> {
    let expected = vk.gamma_abc_g1.len().saturating_sub(1);
    if public_inputs.len() != expected {
        return Err(ProtocolError::Structural(format!(
            "expected {expected} public inputs, got {}",
            public_inputs.len()
        )));
    }
    check_proof_points(proof)?;

    let verdict = if Groth16Backend.verify(vk, public_inputs, proof)? {
        Verdict::Accepted
    } else {
        Verdict::Rejected
    };
    match verdict {
        Verdict::Accepted => info!("proof accepted"),
        Verdict::Rejected => warn!("proof rejected"),
    }
    Ok(verdict)
}

/// Decode a compressed proof. Points are checked to be on the curve and in
/// the prime-order subgroup; trailing bytes are refused.
pub fn decode_proof(bytes: &[u8]) -> Result<Proof<Bn254>> {
    let mut reader = bytes;
    let proof = Proof::<Bn254>::deserialize_compressed(&mut reader)
        .map_err(|e| ProtocolError::Structural(format!("undecodable proof: {e}")))?;
    if !reader.is_empty() {
        return Err(ProtocolError::Structural(format!(
            "{} trailing bytes after proof",
            reader.len()
        )));
    }
    Ok(proof)
}

/// Parse decimal public inputs. Each must be a canonical rendering of an
/// element below the BN254 scalar modulus.
pub fn parse_public_inputs<S: AsRef<str>>(values: &[S]) -> Result<Vec<Fr>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| parse_decimal(v.as_ref()).map_err(|reason| {
            ProtocolError::Structural(format!("public input {i}: {reason}"))
        }))
        .collect()
}

/// Parse one canonical decimal field element.
pub(crate) fn parse_decimal(value: &str) -> std::result::Result<Fr, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("`{value}` is not a decimal integer"));
    }
    if value.len() > 1 && value.starts_with('0') {
        return Err(format!("`{value}` has leading zeros"));
    }
    let n = BigUint::parse_bytes(value.as_bytes(), 10)
        .ok_or_else(|| format!("`{value}` is not a decimal integer"))?;
    from_biguint::<Fr>(&n).ok_or_else(|| format!("`{value}` is not below the field modulus"))
}

fn check_proof_points(proof: &Proof<Bn254>) -> Result<()> {
    let g1_ok = |p: &ark_bn254::G1Affine| {
        p.is_zero() || (p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve())
    };
    let g2_ok = |p: &ark_bn254::G2Affine| {
        p.is_zero() || (p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve())
    };
    if !g1_ok(&proof.a) || !g1_ok(&proof.c) {
        return Err(ProtocolError::Structural("proof G1 point is not on the curve".into()));
    }
    if !g2_ok(&proof.b) {
        return Err(ProtocolError::Structural("proof G2 point is not on the curve".into()));
    }
    Ok(())
}
