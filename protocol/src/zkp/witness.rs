//! # Witness Builder
//!
//! Turns a signed transaction record (hex JSON) into a [`Witness`]: the
//! decoded signature material, the public key, and, for blinded
//! arrangements, a fresh nonce and the commitment to the signer's identity.
//!
//! Every hex field must decode to exactly 32 bytes (an optional `0x` prefix
//! is accepted). `r`, `s` must be below the group order and the coordinates
//! below the base-field modulus; anything else is rejected as a
//! [`ProtocolError::Decode`] before any cryptographic work happens. The
//! message hash is the exception: like every ECDSA implementation, it is
//! reduced modulo the group order.
//!
//! Alongside the witness the builder emits a [`WitnessRecord`], the JSON
//! echo of everything the prover used (including nonce and commitment). It
//! is the only place the nonce survives, so the prover can later open the
//! commitment or re-prove with [`Witness::from_record`].

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_secp256k1::{Affine, Fr as Scalar};
use ark_std::rand::{CryptoRng, Rng};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::circuit::{CircuitArrangement, CircuitDescriptor};
use super::commitment::{commit, Address, Commitment, Identity, Nonce, PublicKey};
use crate::config::{ADDRESS_LENGTH, COMMITMENT_LENGTH, FIELD_BYTES, NONCE_LENGTH};
use crate::crypto::ecdsa::{hash_to_scalar, verify_reduced, Signature, SigningKey};
use crate::crypto::field::{from_biguint, to_be_bytes32, to_biguint, to_decimal};
use crate::error::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A signed transaction, as handed to the prover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// 32-byte message digest.
    pub msg_hash: String,
    /// Signature `r`.
    pub r: String,
    /// Signature `s`.
    pub s: String,
    /// Public-key x-coordinate.
    pub pub_x: String,
    /// Public-key y-coordinate.
    pub pub_y: String,
}

impl TransactionRecord {
    /// Sign `message` with `key` and record the result.
    pub fn sign<R: Rng + CryptoRng>(key: &SigningKey, message: &[u8], rng: &mut R) -> Self {
        let (digest, signature) = key.sign(message, rng);
        let public_key = PublicKey::from_affine(&key.public_key());
        Self {
            msg_hash: encode_hex(&digest),
            r: encode_hex(&to_be_bytes32(&signature.r)),
            s: encode_hex(&to_be_bytes32(&signature.s)),
            pub_x: encode_hex(&public_key.x),
            pub_y: encode_hex(&public_key.y),
        }
    }
}

/// Auxiliary record of a built witness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessRecord {
    /// Arrangement name.
    pub arrangement: String,
    /// Message digest as given in the transaction record.
    pub msg_hash: String,
    /// Signature `r`.
    pub r: String,
    /// Signature `s`.
    pub s: String,
    /// Public-key x-coordinate.
    pub pub_x: String,
    /// Public-key y-coordinate.
    pub pub_y: String,
    /// Address derived from `pubX`.
    pub address: String,
    /// Commitment nonce (blinded only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Commitment (blinded only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub com: Option<String>,
}

// ---------------------------------------------------------------------------
// Witness
// ---------------------------------------------------------------------------

/// Ordered BN254 public inputs, in circuit declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInputVector(pub Vec<Fr>);

impl PublicInputVector {
    /// The inputs as a slice.
    pub fn as_slice(&self) -> &[Fr] {
        &self.0
    }

    /// Number of inputs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no inputs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decimal renderings, as calldata expects.
    pub fn to_decimal_strings(&self) -> Vec<String> {
        self.0.iter().map(to_decimal).collect()
    }
}

/// A complete assignment for one arrangement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness {
    /// Arrangement the witness was built for.
    pub arrangement: CircuitArrangement,
    /// Message digest as given.
    pub msg_digest: [u8; FIELD_BYTES],
    /// Message digest reduced mod n.
    pub msg_hash: Scalar,
    /// The signature.
    pub signature: Signature,
    /// The signer's public key.
    pub public_key: Affine,
    /// Commitment nonce (blinded only).
    pub nonce: Option<Nonce>,
    /// Commitment (blinded only).
    pub commitment: Option<Commitment>,
}

impl Witness {
    /// Public-key coordinates as bytes.
    pub fn public_key_bytes(&self) -> PublicKey {
        PublicKey::from_affine(&self.public_key)
    }

    /// The public inputs this witness proves against.
    pub fn public_inputs(&self) -> PublicInputVector {
        let curve = CircuitDescriptor::new(self.arrangement).curve;
        let mut inputs = curve.scalar.limbs(&to_biguint(&self.msg_hash));
        match self.arrangement {
            CircuitArrangement::Direct => {
                inputs.extend(curve.base.limbs(&to_biguint(&self.public_key.x)));
                inputs.extend(curve.base.limbs(&to_biguint(&self.public_key.y)));
            }
            CircuitArrangement::Blinded { .. } => {
                if let Some(commitment) = &self.commitment {
                    inputs.extend(commitment.public_elements());
                }
            }
        }
        PublicInputVector(inputs)
    }

    /// Natively check the relations the circuit enforces and name the first
    /// one that fails. `None` means the witness should satisfy the circuit.
    pub fn diagnose(&self) -> Option<&'static str> {
        if !self.public_key.is_on_curve() {
            return Some("public key is not on secp256k1");
        }
        if !verify_reduced(&self.public_key, &self.msg_hash, &self.signature) {
            return Some("ecdsa signature does not verify");
        }
        if let CircuitArrangement::Blinded { hash, identity } = self.arrangement {
            let (Some(nonce), Some(commitment)) = (&self.nonce, &self.commitment) else {
                return Some("blinded witness lacks nonce or commitment");
            };
            let id = Identity::of(identity, &self.public_key_bytes());
            if commit(&id, nonce, hash) != *commitment {
                return Some("commitment does not open to the signer's identity");
            }
        }
        None
    }

    /// The JSON record of this witness.
    pub fn record(&self) -> WitnessRecord {
        let key = self.public_key_bytes();
        WitnessRecord {
            arrangement: self.arrangement.to_string(),
            msg_hash: encode_hex(&self.msg_digest),
            r: encode_hex(&to_be_bytes32(&self.signature.r)),
            s: encode_hex(&to_be_bytes32(&self.signature.s)),
            pub_x: encode_hex(&key.x),
            pub_y: encode_hex(&key.y),
            address: key.address().to_string(),
            nonce: self.nonce.map(|n| n.to_string()),
            com: self.commitment.map(|c| c.to_string()),
        }
    }

    /// Rebuild a witness from a persisted record. The stored address and
    /// commitment must agree with a recomputation from the stored key and
    /// nonce.
    pub fn from_record(record: &WitnessRecord) -> Result<Self> {
        let arrangement: CircuitArrangement = record
            .arrangement
            .parse()
            .map_err(|e: String| ProtocolError::decode("arrangement", e))?;
        let tx = TransactionRecord {
            msg_hash: record.msg_hash.clone(),
            r: record.r.clone(),
            s: record.s.clone(),
            pub_x: record.pub_x.clone(),
            pub_y: record.pub_y.clone(),
        };

        let address = Address(decode_hex::<ADDRESS_LENGTH>("address", &record.address)?);
        let key = PublicKey {
            x: decode_hex::<FIELD_BYTES>("pubX", &record.pub_x)?,
            y: decode_hex::<FIELD_BYTES>("pubY", &record.pub_y)?,
        };
        if key.address() != address {
            return Err(ProtocolError::decode("address", "does not match pubX"));
        }

        let nonce = match (&record.nonce, arrangement.is_blinded()) {
            (Some(hex), true) => Nonce(decode_hex::<NONCE_LENGTH>("nonce", hex)?),
            (None, true) => return Err(ProtocolError::decode("nonce", "missing")),
            (_, false) => return build_witness_inner(&tx, arrangement, None),
        };
        let witness = build_witness_inner(&tx, arrangement, Some(nonce))?;

        let stored = record
            .com
            .as_deref()
            .ok_or_else(|| ProtocolError::decode("com", "missing"))?;
        let stored = decode_hex::<COMMITMENT_LENGTH>("com", stored)?;
        if witness.commitment.map(|c| *c.as_bytes()) != Some(stored) {
            return Err(ProtocolError::decode(
                "com",
                "does not open to the recorded key and nonce",
            ));
        }
        Ok(witness)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Build a witness with a fresh nonce from the OS CSPRNG.
pub fn build_witness(
    tx: &TransactionRecord,
    arrangement: CircuitArrangement,
) -> Result<(Witness, WitnessRecord)> {
    let nonce = arrangement.is_blinded().then(|| Nonce::random(&mut OsRng));
    let witness = build_witness_inner(tx, arrangement, nonce)?;
    let record = witness.record();
    Ok((witness, record))
}

/// Build a witness with a caller-chosen nonce (ignored for `Direct`).
///
/// Reusing a nonce links proofs by the same signer. Meant for tests and
/// deterministic re-proving.
pub fn build_witness_with_nonce(
    tx: &TransactionRecord,
    arrangement: CircuitArrangement,
    nonce: Nonce,
) -> Result<(Witness, WitnessRecord)> {
    let witness = build_witness_inner(tx, arrangement, arrangement.is_blinded().then_some(nonce))?;
    let record = witness.record();
    Ok((witness, record))
}

fn build_witness_inner(
    tx: &TransactionRecord,
    arrangement: CircuitArrangement,
    nonce: Option<Nonce>,
) -> Result<Witness> {
    let digest = decode_hex::<FIELD_BYTES>("msgHash", &tx.msg_hash)?;
    let r = decode_field::<Scalar>("r", &tx.r)?;
    let s = decode_field::<Scalar>("s", &tx.s)?;
    let x = decode_field::<ark_secp256k1::Fq>("pubX", &tx.pub_x)?;
    let y = decode_field::<ark_secp256k1::Fq>("pubY", &tx.pub_y)?;

    let public_key = Affine::new_unchecked(x, y);
    let commitment = match (arrangement, nonce) {
        (CircuitArrangement::Blinded { hash, identity }, Some(nonce)) => {
            let id = Identity::of(identity, &PublicKey::from_affine(&public_key));
            Some(commit(&id, &nonce, hash))
        }
        _ => None,
    };

    debug!(%arrangement, blinded = arrangement.is_blinded(), "witness built");

    Ok(Witness {
        arrangement,
        msg_digest: digest,
        msg_hash: hash_to_scalar(&digest),
        signature: Signature { r, s },
        public_key,
        nonce,
        commitment,
    })
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `N` bytes of hex, with an optional `0x` prefix.
pub fn decode_hex<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).map_err(|e| ProtocolError::decode(field, e.to_string()))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        ProtocolError::decode(field, format!("expected {N} bytes, got {}", bytes.len()))
    })
}

/// Decode a 32-byte big-endian field element, rejecting values not below
/// the modulus.
pub fn decode_field<F: PrimeField>(field: &'static str, value: &str) -> Result<F> {
    let bytes = decode_hex::<FIELD_BYTES>(field, value)?;
    from_biguint(&BigUint::from_bytes_be(&bytes))
        .ok_or_else(|| ProtocolError::decode(field, "value is not below the field modulus"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zkp::commitment::{HashFamily, IdentityKind};
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    const BLINDED: CircuitArrangement = CircuitArrangement::Blinded {
        hash: HashFamily::Algebraic,
        identity: IdentityKind::Address,
    };

    fn signed(seed: u64) -> TransactionRecord {
        let mut rng = StdRng::seed_from_u64(seed);
        TransactionRecord::sign(&SigningKey::random(&mut rng), b"witness", &mut rng)
    }

    #[test]
    fn direct_public_inputs_are_limbs() {
        let (witness, record) = build_witness(&signed(1), CircuitArrangement::Direct).unwrap();
        assert_eq!(witness.public_inputs().len(), 12);
        assert!(witness.diagnose().is_none());
        assert!(record.nonce.is_none() && record.com.is_none());
    }

    #[test]
    fn blinded_witness_has_fresh_nonce() {
        let tx = signed(2);
        let (a, ra) = build_witness(&tx, BLINDED).unwrap();
        let (b, _) = build_witness(&tx, BLINDED).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.commitment, b.commitment);
        assert_eq!(a.public_inputs().len(), 5);
        assert!(ra.com.is_some());
        assert!(a.diagnose().is_none());
    }

    #[test]
    fn sha256_arrangement_exposes_two_commitment_halves() {
        let a = CircuitArrangement::Blinded {
            hash: HashFamily::General,
            identity: IdentityKind::PublicKey,
        };
        let (w, _) = build_witness_with_nonce(&signed(3), a, Nonce([9u8; 20])).unwrap();
        assert_eq!(w.public_inputs().len(), 6);
        assert_eq!(w.public_inputs().len(), CircuitDescriptor::new(a).num_public_inputs());
    }

    #[test]
    fn short_hex_is_a_decode_error() {
        let mut tx = signed(4);
        tx.r = "0xabcd".into();
        let err = build_witness(&tx, CircuitArrangement::Direct).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode { field: "r", .. }), "{err}");
    }

    #[test]
    fn bad_hex_is_a_decode_error() {
        let mut tx = signed(4);
        tx.pub_y = "zz".repeat(32);
        assert!(matches!(
            build_witness(&tx, BLINDED).unwrap_err(),
            ProtocolError::Decode { field: "pubY", .. }
        ));
    }

    #[test]
    fn out_of_range_scalar_is_a_decode_error() {
        let mut tx = signed(5);
        tx.s = format!("0x{}", "ff".repeat(32));
        assert!(matches!(
            build_witness(&tx, CircuitArrangement::Direct).unwrap_err(),
            ProtocolError::Decode { field: "s", .. }
        ));
    }

    #[test]
    fn msg_hash_above_order_is_reduced() {
        let mut tx = signed(6);
        tx.msg_hash = "ff".repeat(32);
        let (w, _) = build_witness(&tx, CircuitArrangement::Direct).unwrap();
        assert_eq!(w.msg_hash, hash_to_scalar(&[0xff; 32]));
    }

    #[test]
    fn record_echoes_unreduced_digest() {
        let mut tx = signed(6);
        tx.msg_hash = encode_hex(&[0xff; 32]);
        let (w, record) = build_witness(&tx, CircuitArrangement::Direct).unwrap();
        assert_eq!(record.msg_hash, tx.msg_hash);
        assert_ne!(to_be_bytes32(&w.msg_hash), [0xff; 32]);
        assert_eq!(Witness::from_record(&record).unwrap(), w);
    }

    #[test]
    fn prefix_is_optional() {
        let mut tx = signed(7);
        let (a, _) = build_witness(&tx, CircuitArrangement::Direct).unwrap();
        tx.r = tx.r.trim_start_matches("0x").to_string();
        let (b, _) = build_witness(&tx, CircuitArrangement::Direct).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn record_round_trips_through_json() {
        let (w, record) = build_witness(&signed(8), BLINDED).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"msgHash\"") && json.contains("\"pubX\""));
        let restored: WitnessRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(Witness::from_record(&restored).unwrap(), w);
    }

    #[test]
    fn tampered_record_commitment_is_rejected() {
        let (_, mut record) = build_witness(&signed(9), BLINDED).unwrap();
        record.nonce = Some(Nonce([0u8; 20]).to_string());
        assert!(matches!(
            Witness::from_record(&record).unwrap_err(),
            ProtocolError::Decode { field: "com", .. }
        ));
    }

    #[test]
    fn forged_signature_is_diagnosed() {
        let mut tx = signed(10);
        tx.msg_hash = encode_hex(&[1u8; 32]);
        let (w, _) = build_witness(&tx, BLINDED).unwrap();
        assert_eq!(w.diagnose(), Some("ecdsa signature does not verify"));
    }
}
