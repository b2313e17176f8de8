//! # One-Time Identity Commitments
//!
//! A blinded proof hides the signer behind
//!
//! ```text
//! com = H(identity ‖ nonce)
//! ```
//!
//! where `identity` is either the truncated address or the full public key,
//! `nonce` is 160 fresh bits per request, and `H` is one of two families:
//!
//! | family    | identity   | preimage                                         |
//! |-----------|------------|--------------------------------------------------|
//! | algebraic | address    | `[addr, nonce]` as two `Fr` elements             |
//! | algebraic | public key | `[X_hi, X_lo, Y_hi, Y_lo, nonce]`, 128-bit halves|
//! | general   | address    | `addr ‖ nonce` (40 bytes)                        |
//! | general   | public key | `X ‖ Y ‖ nonce` (84 bytes)                       |
//!
//! The algebraic family is MiMC ([`crate::crypto::mimc`]) and yields one
//! field element; the general family is SHA-256 and yields 32 bytes that are
//! exposed as two 128-bit public inputs. The circuit recomputes exactly the
//! same preimage from its private inputs, so native and in-circuit
//! commitments agree bit-for-bit.
//!
//! Coordinates split into 128-bit halves because a 256-bit `X` does not fit
//! in the 254-bit BN254 scalar field.

use std::fmt;

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_std::rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{ADDRESS_LENGTH, COMMITMENT_LENGTH, FIELD_BYTES, NONCE_LENGTH};
use crate::crypto::field::{from_biguint, to_be_bytes32};
use crate::crypto::mimc::mimc_hash;

// ---------------------------------------------------------------------------
// Identity material
// ---------------------------------------------------------------------------

/// Which hash backs a commitment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFamily {
    /// MiMC over BN254 `Fr`. Cheap in-circuit.
    Algebraic,
    /// SHA-256. Matches what external systems compute.
    General,
}

impl HashFamily {
    /// Short name used in arrangement identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Algebraic => "mimc",
            Self::General => "sha256",
        }
    }
}

/// What a commitment hides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    /// The 20-byte truncated address.
    Address,
    /// Both public-key coordinates.
    PublicKey,
}

impl IdentityKind {
    /// Short name used in arrangement identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::PublicKey => "pubkey",
        }
    }
}

/// secp256k1 public key as big-endian affine coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    /// x-coordinate, big-endian.
    pub x: [u8; FIELD_BYTES],
    /// y-coordinate, big-endian.
    pub y: [u8; FIELD_BYTES],
}

impl PublicKey {
    /// Encode an affine point. The point at infinity has no coordinates and
    /// maps to all zeros, which the circuit's on-curve check rejects.
    pub fn from_affine(point: &ark_secp256k1::Affine) -> Self {
        Self {
            x: to_be_bytes32(&point.x),
            y: to_be_bytes32(&point.y),
        }
    }

    /// The address derived from this key.
    pub fn address(&self) -> Address {
        Address::from_x(&self.x)
    }
}

/// Truncated address: the first [`ADDRESS_LENGTH`] bytes of big-endian `X`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// Derive from a big-endian x-coordinate.
    pub fn from_x(x: &[u8; FIELD_BYTES]) -> Self {
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&x[..ADDRESS_LENGTH]);
        Self(out)
    }

    /// The address as a single field element (160 bits, big-endian).
    pub fn to_field(&self) -> Fr {
        Fr::from_be_bytes_mod_order(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Per-request blinding nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nonce(pub [u8; NONCE_LENGTH]);

impl Nonce {
    /// Fresh nonce from a cryptographic RNG.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; NONCE_LENGTH];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The nonce as a single field element (160 bits, big-endian).
    pub fn to_field(&self) -> Fr {
        Fr::from_be_bytes_mod_order(&self.0)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// The value a commitment hides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    /// Commit to the truncated address.
    Address(Address),
    /// Commit to the full public key.
    PublicKey(PublicKey),
}

impl Identity {
    /// Select the identity of `kind` for `key`.
    pub fn of(kind: IdentityKind, key: &PublicKey) -> Self {
        match kind {
            IdentityKind::Address => Self::Address(key.address()),
            IdentityKind::PublicKey => Self::PublicKey(*key),
        }
    }

    /// Which kind of identity this is.
    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::Address(_) => IdentityKind::Address,
            Self::PublicKey(_) => IdentityKind::PublicKey,
        }
    }
}

// ---------------------------------------------------------------------------
// Commitment
// ---------------------------------------------------------------------------

/// A 32-byte commitment digest tagged with the family that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commitment {
    family: HashFamily,
    bytes: [u8; COMMITMENT_LENGTH],
}

impl Commitment {
    /// Wrap a digest. For the algebraic family the bytes must be the
    /// big-endian encoding of a canonical `Fr` element.
    pub fn from_bytes(family: HashFamily, bytes: [u8; COMMITMENT_LENGTH]) -> Option<Self> {
        if family == HashFamily::Algebraic {
            from_biguint::<Fr>(&num_bigint::BigUint::from_bytes_be(&bytes))?;
        }
        Some(Self { family, bytes })
    }

    /// The family that produced this commitment.
    pub fn family(&self) -> HashFamily {
        self.family
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LENGTH] {
        &self.bytes
    }

    /// The commitment as it appears in the public-input vector: one element
    /// for the algebraic family, `[hi, lo]` 128-bit halves for the general
    /// family.
    pub fn public_elements(&self) -> Vec<Fr> {
        match self.family {
            HashFamily::Algebraic => vec![Fr::from_be_bytes_mod_order(&self.bytes)],
            HashFamily::General => vec![
                Fr::from_be_bytes_mod_order(&self.bytes[..16]),
                Fr::from_be_bytes_mod_order(&self.bytes[16..]),
            ],
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.bytes))
    }
}

/// Algebraic-family preimage.
pub fn preimage_elements(identity: &Identity, nonce: &Nonce) -> Vec<Fr> {
    match identity {
        Identity::Address(address) => vec![address.to_field(), nonce.to_field()],
        Identity::PublicKey(key) => vec![
            Fr::from_be_bytes_mod_order(&key.x[..16]),
            Fr::from_be_bytes_mod_order(&key.x[16..]),
            Fr::from_be_bytes_mod_order(&key.y[..16]),
            Fr::from_be_bytes_mod_order(&key.y[16..]),
            nonce.to_field(),
        ],
    }
}

/// General-family preimage.
pub fn preimage_bytes(identity: &Identity, nonce: &Nonce) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 * FIELD_BYTES + NONCE_LENGTH);
    match identity {
        Identity::Address(address) => out.extend_from_slice(&address.0),
        Identity::PublicKey(key) => {
            out.extend_from_slice(&key.x);
            out.extend_from_slice(&key.y);
        }
    }
    out.extend_from_slice(&nonce.0);
    out
}

/// Commit to `identity` under `nonce`. Deterministic.
pub fn commit(identity: &Identity, nonce: &Nonce, family: HashFamily) -> Commitment {
    let bytes = match family {
        HashFamily::Algebraic => to_be_bytes32(&mimc_hash(&preimage_elements(identity, nonce))),
        HashFamily::General => Sha256::digest(preimage_bytes(identity, nonce)).into(),
    };
    Commitment { family, bytes }
}

/// Check that `commitment` opens to `(identity, nonce)`.
///
/// Reveals the opening; meant for audits, not for the proof path.
pub fn open(identity: &Identity, nonce: &Nonce, commitment: &Commitment) -> bool {
    commit(identity, nonce, commitment.family) == *commitment
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    fn sample_key() -> PublicKey {
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        for i in 0..32 {
            x[i] = i as u8;
            y[i] = 0xff - i as u8;
        }
        PublicKey { x, y }
    }

    #[test]
    fn commitment_deterministic() {
        let mut rng = StdRng::seed_from_u64(42);
        let nonce = Nonce::random(&mut rng);
        let id = Identity::of(IdentityKind::Address, &sample_key());
        for family in [HashFamily::Algebraic, HashFamily::General] {
            assert_eq!(commit(&id, &nonce, family), commit(&id, &nonce, family));
        }
    }

    #[test]
    fn fresh_nonce_unlinks_commitments() {
        let mut rng = StdRng::seed_from_u64(42);
        let id = Identity::of(IdentityKind::PublicKey, &sample_key());
        let a = commit(&id, &Nonce::random(&mut rng), HashFamily::Algebraic);
        let b = commit(&id, &Nonce::random(&mut rng), HashFamily::Algebraic);
        assert_ne!(a, b);
    }

    #[test]
    fn open_rejects_wrong_identity_or_nonce() {
        let mut rng = StdRng::seed_from_u64(3);
        let key = sample_key();
        let nonce = Nonce::random(&mut rng);
        let id = Identity::of(IdentityKind::Address, &key);
        let com = commit(&id, &nonce, HashFamily::General);
        assert!(open(&id, &nonce, &com));

        let mut other = key;
        other.x[0] ^= 1;
        assert!(!open(&Identity::of(IdentityKind::Address, &other), &nonce, &com));
        assert!(!open(&id, &Nonce::random(&mut rng), &com));
    }

    #[test]
    fn address_is_prefix_of_x() {
        let key = sample_key();
        assert_eq!(&key.address().0[..], &key.x[..20]);
    }

    #[test]
    fn general_address_preimage_matches_plain_sha256() {
        let key = sample_key();
        let nonce = Nonce([7u8; 20]);
        let com = commit(&Identity::of(IdentityKind::Address, &key), &nonce, HashFamily::General);
        let mut preimage = key.x[..20].to_vec();
        preimage.extend_from_slice(&[7u8; 20]);
        let expected: [u8; 32] = Sha256::digest(&preimage).into();
        assert_eq!(com.as_bytes(), &expected);
    }

    #[test]
    fn public_key_preimage_is_84_bytes() {
        let id = Identity::of(IdentityKind::PublicKey, &sample_key());
        assert_eq!(preimage_bytes(&id, &Nonce([0u8; 20])).len(), 84);
        assert_eq!(preimage_elements(&id, &Nonce([0u8; 20])).len(), 5);
    }

    #[test]
    fn public_element_layout() {
        let id = Identity::of(IdentityKind::Address, &sample_key());
        let nonce = Nonce([1u8; 20]);
        assert_eq!(commit(&id, &nonce, HashFamily::Algebraic).public_elements().len(), 1);

        let com = commit(&id, &nonce, HashFamily::General);
        let halves = com.public_elements();
        assert_eq!(halves.len(), 2);
        assert_eq!(halves[0], Fr::from_be_bytes_mod_order(&com.as_bytes()[..16]));
    }

    #[test]
    fn non_canonical_algebraic_commitment_rejected() {
        assert!(Commitment::from_bytes(HashFamily::Algebraic, [0xff; 32]).is_none());
        assert!(Commitment::from_bytes(HashFamily::General, [0xff; 32]).is_some());
    }
}
