//! # Signature-Ownership R1CS Circuit
//!
//! One parametrized circuit covers every arrangement. The statement is:
//!
//! ```text
//! Direct:   "(r, s) is a valid ECDSA signature on msg_hash under Q = (X, Y)"
//!           public: msg_hash, X, Y
//!
//! Blinded:  "I know Q, nonce and (r, s) such that (r, s) is valid on
//!            msg_hash under Q, and com = H(identity(Q) ‖ nonce)"
//!           public: msg_hash, com
//! ```
//!
//! ## Public inputs (in order)
//!
//! | arrangement        | layout                          | count |
//! |--------------------|---------------------------------|-------|
//! | direct             | `msg[4] ‖ X[4] ‖ Y[4]`          | 12    |
//! | blinded, MiMC      | `msg[4] ‖ com`                  | 5     |
//! | blinded, SHA-256   | `msg[4] ‖ com_hi ‖ com_lo`      | 6     |
//!
//! Non-native values are split into 64-bit little-endian limbs (layout taken
//! from the [`SigningCurve`] descriptor). SHA-256 digests are split into
//! 128-bit big-endian halves.
//!
//! All witness fields are `Option<_>` so the same struct synthesizes in setup
//! mode, where only the constraint topology matters.

use std::fmt;
use std::str::FromStr;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_secp256k1::{Affine, Fq, Fr as Scalar};

use super::commitment::{Commitment, HashFamily, IdentityKind, Nonce};
use super::gadgets::{
    alloc_public_limbs, commitment as commitment_gadget,
    ecdsa::{enforce_ecdsa, offset_point, BaseVar, PointVar, ScalarVar},
};
use super::witness::Witness;
use crate::config::CIRCUIT_VERSION;
use crate::crypto::field::SigningCurve;
use crate::crypto::mimc::Mimc;
use crate::error::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// Arrangement
// ---------------------------------------------------------------------------

/// Which values the proof reveals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CircuitArrangement {
    /// Public key and message hash are public.
    Direct,
    /// The identity is hidden behind a one-time commitment.
    Blinded {
        /// Commitment hash.
        hash: HashFamily,
        /// What the commitment hides.
        identity: IdentityKind,
    },
}

impl CircuitArrangement {
    /// Every supported arrangement.
    pub const ALL: [Self; 5] = [
        Self::Direct,
        Self::Blinded { hash: HashFamily::Algebraic, identity: IdentityKind::Address },
        Self::Blinded { hash: HashFamily::Algebraic, identity: IdentityKind::PublicKey },
        Self::Blinded { hash: HashFamily::General, identity: IdentityKind::Address },
        Self::Blinded { hash: HashFamily::General, identity: IdentityKind::PublicKey },
    ];

    /// Commitment hash, for blinded arrangements.
    pub fn hash_family(&self) -> Option<HashFamily> {
        match self {
            Self::Direct => None,
            Self::Blinded { hash, .. } => Some(*hash),
        }
    }

    /// `true` for blinded arrangements.
    pub fn is_blinded(&self) -> bool {
        matches!(self, Self::Blinded { .. })
    }
}

impl fmt::Display for CircuitArrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Blinded { hash, identity } => {
                write!(f, "blinded-{}-{}", hash.as_str(), identity.as_str())
            }
        }
    }
}

impl FromStr for CircuitArrangement {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.to_string() == s)
            .ok_or_else(|| {
                let names: Vec<String> = Self::ALL.iter().map(ToString::to_string).collect();
                format!("unknown arrangement `{s}` (expected one of: {})", names.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// 32-byte circuit identifier. Every persisted artifact carries one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CircuitId(pub [u8; 32]);

impl CircuitId {
    /// Identifier for an arbitrary label, for circuits outside the
    /// arrangement family.
    pub fn for_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&CIRCUIT_VERSION.to_le_bytes());
        hasher.update(label.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Everything that fixes the circuit's constraint topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitDescriptor {
    /// Revealed-value arrangement.
    pub arrangement: CircuitArrangement,
    /// Signing-curve field descriptors.
    pub curve: SigningCurve,
}

impl CircuitDescriptor {
    /// Descriptor for `arrangement` over secp256k1.
    pub fn new(arrangement: CircuitArrangement) -> Self {
        Self {
            arrangement,
            curve: SigningCurve::secp256k1(),
        }
    }

    /// Check the field descriptors against the emulated field types.
    pub fn validate(&self) -> Result<()> {
        self.curve
            .validate_against::<Fq, Scalar>()
            .map_err(ProtocolError::Compile)
    }

    /// BLAKE3 over circuit version, arrangement, field descriptors and the
    /// constants the gadgets bake into the matrices (MiMC round constants,
    /// the scalar-multiplication offset point).
    pub fn id(&self) -> CircuitId {
        self.id_with(Mimc::shared(), &offset_point())
    }

    fn id_with(&self, mimc: &Mimc, offset: &Affine) -> CircuitId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&CIRCUIT_VERSION.to_le_bytes());
        hasher.update(format!("{}|{}", self.arrangement, self.curve.describe()).as_bytes());
        for constant in mimc.constants() {
            hasher.update(&constant.into_bigint().to_bytes_le());
        }
        hasher.update(&offset.x.into_bigint().to_bytes_le());
        hasher.update(&offset.y.into_bigint().to_bytes_le());
        CircuitId(*hasher.finalize().as_bytes())
    }

    /// Length of the public-input vector.
    pub fn num_public_inputs(&self) -> usize {
        self.public_input_labels().len()
    }

    /// Human-readable name of each public input, in order.
    pub fn public_input_labels(&self) -> Vec<String> {
        let limbs = |name: &str, count: usize| -> Vec<String> {
            (0..count).map(|i| format!("{name}[{i}]")).collect()
        };
        let mut labels = limbs("msgHash", self.curve.scalar.num_limbs);
        match self.arrangement {
            CircuitArrangement::Direct => {
                labels.extend(limbs("pubX", self.curve.base.num_limbs));
                labels.extend(limbs("pubY", self.curve.base.num_limbs));
            }
            CircuitArrangement::Blinded { hash: HashFamily::Algebraic, .. } => {
                labels.push("com".into());
            }
            CircuitArrangement::Blinded { hash: HashFamily::General, .. } => {
                labels.push("comHi".into());
                labels.push("comLo".into());
            }
        }
        labels
    }
}

// ---------------------------------------------------------------------------
// Circuit
// ---------------------------------------------------------------------------

/// The ECDSA-ownership circuit for one arrangement.
#[derive(Clone, Debug)]
pub struct SignatureCircuit {
    descriptor: CircuitDescriptor,

    // -- Public -------------------------------------------------------------
    /// Message digest reduced mod n.
    pub msg_hash: Option<Scalar>,
    /// Commitment (blinded arrangements).
    pub commitment: Option<Commitment>,

    // -- Private (public key is public in `Direct`) -------------------------
    /// Signature `r`.
    pub r: Option<Scalar>,
    /// Signature `s`.
    pub s: Option<Scalar>,
    /// Signer's public key.
    pub public_key: Option<Affine>,
    /// Commitment nonce (blinded arrangements).
    pub nonce: Option<Nonce>,
}

impl SignatureCircuit {
    /// Witness-free circuit for compilation and setup.
    pub fn blank(descriptor: CircuitDescriptor) -> Self {
        Self {
            descriptor,
            msg_hash: None,
            commitment: None,
            r: None,
            s: None,
            public_key: None,
            nonce: None,
        }
    }

    /// Fully assigned circuit.
    pub fn from_witness(witness: &Witness) -> Self {
        Self {
            descriptor: CircuitDescriptor::new(witness.arrangement),
            msg_hash: Some(witness.msg_hash),
            commitment: witness.commitment,
            r: Some(witness.signature.r),
            s: Some(witness.signature.s),
            public_key: Some(witness.public_key),
            nonce: witness.nonce,
        }
    }

    /// The descriptor this circuit was built for.
    pub fn descriptor(&self) -> &CircuitDescriptor {
        &self.descriptor
    }
}

impl ConstraintSynthesizer<Fr> for SignatureCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> std::result::Result<(), SynthesisError> {
        let curve = &self.descriptor.curve;

        // ===================================================================
        // 1. Public inputs, in declaration order
        // ===================================================================

        let e = alloc_public_limbs(cs.clone(), self.msg_hash, &curve.scalar)?;

        let public_key = match self.descriptor.arrangement {
            CircuitArrangement::Direct => {
                let x = alloc_public_limbs(cs.clone(), self.public_key.map(|q| q.x), &curve.base)?;
                let y = alloc_public_limbs(cs.clone(), self.public_key.map(|q| q.y), &curve.base)?;
                PointVar { x, y }
            }
            CircuitArrangement::Blinded { hash, identity } => {
                let expected = self.commitment.map(|c| c.public_elements());
                let count = if hash == HashFamily::Algebraic { 1 } else { 2 };
                let mut com = Vec::with_capacity(count);
                for i in 0..count {
                    com.push(FpVar::new_input(ark_relations::ns!(cs, "com"), || {
                        expected
                            .as_ref()
                            .and_then(|v| v.get(i).copied())
                            .ok_or(SynthesisError::AssignmentMissing)
                    })?);
                }

                // ===========================================================
                // 2. Private identity and its commitment
                // ===========================================================

                let x = BaseVar::new_witness(ark_relations::ns!(cs, "pub_x"), || {
                    self.public_key.map(|q| q.x).ok_or(SynthesisError::AssignmentMissing)
                })?;
                let y = BaseVar::new_witness(ark_relations::ns!(cs, "pub_y"), || {
                    self.public_key.map(|q| q.y).ok_or(SynthesisError::AssignmentMissing)
                })?;
                let nonce = commitment_gadget::alloc_nonce(cs.clone(), self.nonce.as_ref())?;
                let recomputed = commitment_gadget::commit(hash, identity, &x, &y, &nonce)?;
                recomputed[..].enforce_equal(&com[..])?;

                PointVar { x, y }
            }
        };

        // ===================================================================
        // 3. Signature
        // ===================================================================

        let r = ScalarVar::new_witness(ark_relations::ns!(cs, "r"), || {
            self.r.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let s = ScalarVar::new_witness(ark_relations::ns!(cs, "s"), || {
            self.s.ok_or(SynthesisError::AssignmentMissing)
        })?;
        enforce_ecdsa(&e, &r, &s, &public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zkp::witness::{build_witness_with_nonce, TransactionRecord};
    use crate::crypto::ecdsa::SigningKey;
    use ark_ec::CurveGroup;
    use ark_relations::r1cs::ConstraintSystem;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn arrangement_names_round_trip() {
        for a in CircuitArrangement::ALL {
            assert_eq!(a.to_string().parse::<CircuitArrangement>().unwrap(), a);
        }
        assert_eq!(
            "blinded-mimc-address".parse::<CircuitArrangement>().unwrap(),
            CircuitArrangement::Blinded {
                hash: HashFamily::Algebraic,
                identity: IdentityKind::Address
            }
        );
        assert!("blinded-md5-address".parse::<CircuitArrangement>().is_err());
    }

    #[test]
    fn public_input_counts() {
        let counts: Vec<usize> = CircuitArrangement::ALL
            .iter()
            .map(|a| CircuitDescriptor::new(*a).num_public_inputs())
            .collect();
        assert_eq!(counts, vec![12, 5, 5, 6, 6]);
    }

    #[test]
    fn circuit_ids_are_distinct_and_stable() {
        let ids: Vec<CircuitId> = CircuitArrangement::ALL
            .iter()
            .map(|a| CircuitDescriptor::new(*a).id())
            .collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(ids[0], CircuitDescriptor::new(CircuitArrangement::Direct).id());
    }

    #[test]
    fn circuit_id_covers_gadget_constants() {
        let descriptor = CircuitDescriptor::new(CircuitArrangement::Direct);
        let offset = offset_point();
        let shared = descriptor.id_with(Mimc::shared(), &offset);
        assert_eq!(shared, descriptor.id());

        let reseeded = Mimc::new(b"another seed", crate::config::MIMC_ROUNDS);
        assert_ne!(descriptor.id_with(&reseeded, &offset), shared);

        let doubled = (offset + offset).into_affine();
        assert_ne!(descriptor.id_with(Mimc::shared(), &doubled), shared);
    }

    #[test]
    fn mismatched_descriptor_is_a_compile_error() {
        let mut descriptor = CircuitDescriptor::new(CircuitArrangement::Direct);
        std::mem::swap(&mut descriptor.curve.base, &mut descriptor.curve.scalar);
        assert!(matches!(descriptor.validate(), Err(ProtocolError::Compile(_))));
    }

    fn synthesize(arrangement: CircuitArrangement, tamper: bool) -> bool {
        let mut rng = StdRng::seed_from_u64(21);
        let key = SigningKey::random(&mut rng);
        let tx = TransactionRecord::sign(&key, b"circuit", &mut rng);
        let (mut witness, _) =
            build_witness_with_nonce(&tx, arrangement, Nonce([3u8; 20])).unwrap();
        if tamper {
            witness.nonce = Some(Nonce([4u8; 20]));
        }
        let cs = ConstraintSystem::<Fr>::new_ref();
        SignatureCircuit::from_witness(&witness)
            .generate_constraints(cs.clone())
            .unwrap();
        assert_eq!(cs.num_instance_variables() - 1, witness.public_inputs().len());
        cs.is_satisfied().unwrap()
    }

    #[test]
    #[ignore = "multi-million-constraint synthesis; run with --ignored"]
    fn every_arrangement_is_satisfiable() {
        for a in CircuitArrangement::ALL {
            assert!(synthesize(a, false), "{a}");
        }
    }

    #[test]
    #[ignore = "multi-million-constraint synthesis; run with --ignored"]
    fn wrong_nonce_breaks_commitment() {
        let a = CircuitArrangement::Blinded {
            hash: HashFamily::Algebraic,
            identity: IdentityKind::Address,
        };
        assert!(!synthesize(a, true));
    }
}
