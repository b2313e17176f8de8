//! # Native secp256k1 ECDSA
//!
//! Off-circuit signing and verification over `ark-secp256k1`. The prover
//! never needs the secret key; this module exists to produce signed
//! transaction records (the `sign` execution mode, test fixtures) and to
//! cross-check inputs before paying for a multi-million-constraint proof.
//!
//! Message hashing is SHA-256 and the digest is reduced modulo the group
//! order, exactly as the circuit reduces it.

use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, Field, PrimeField, UniformRand, Zero};
use ark_secp256k1::{Affine, Fq, Fr as Scalar};
use ark_std::rand::{CryptoRng, Rng};
use sha2::{Digest, Sha256};

use super::field::to_be_bytes32;

/// An ECDSA signature `(r, s)` over secp256k1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// x-coordinate of the nonce point, reduced mod n.
    pub r: Scalar,
    /// Signature proof scalar.
    pub s: Scalar,
}

/// A secp256k1 secret key.
#[derive(Clone)]
pub struct SigningKey {
    secret: Scalar,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

impl SigningKey {
    /// Sample a fresh key.
    pub fn random<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let secret = Scalar::rand(rng);
            if !secret.is_zero() {
                return Self { secret };
            }
        }
    }

    /// Parse a big-endian secret. Rejects zero and values `>= n`.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        let value = num_bigint::BigUint::from_bytes_be(bytes);
        let secret = super::field::from_biguint::<Scalar>(&value)?;
        if secret.is_zero() {
            return None;
        }
        Some(Self { secret })
    }

    /// Big-endian encoding of the secret.
    pub fn to_bytes(&self) -> [u8; 32] {
        to_be_bytes32(&self.secret)
    }

    /// The public key `d·G`.
    pub fn public_key(&self) -> Affine {
        (Affine::generator() * self.secret).into_affine()
    }

    /// Sign a 32-byte digest.
    pub fn sign_prehash<R: Rng + CryptoRng>(&self, digest: &[u8; 32], rng: &mut R) -> Signature {
        let e = hash_to_scalar(digest);
        loop {
            let k = Scalar::rand(rng);
            let Some(k_inv) = k.inverse() else {
                continue;
            };
            let nonce_point = (Affine::generator() * k).into_affine();
            let r = base_to_scalar(&nonce_point.x);
            if r.is_zero() {
                continue;
            }
            let s = k_inv * (e + r * self.secret);
            if s.is_zero() {
                continue;
            }
            return Signature { r, s };
        }
    }

    /// Hash `message` with SHA-256 and sign the digest. Returns the digest
    /// alongside the signature, since the circuit consumes the digest.
    pub fn sign<R: Rng + CryptoRng>(&self, message: &[u8], rng: &mut R) -> ([u8; 32], Signature) {
        let digest = message_digest(message);
        let signature = self.sign_prehash(&digest, rng);
        (digest, signature)
    }
}

/// SHA-256 digest of a message.
pub fn message_digest(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}

/// ECDSA hash-to-integer for a 256-bit digest: big-endian, reduced mod n.
pub fn hash_to_scalar(digest: &[u8; 32]) -> Scalar {
    Scalar::from_be_bytes_mod_order(digest)
}

/// Reinterpret a base-field element as a scalar (reduced mod n).
pub fn base_to_scalar(x: &Fq) -> Scalar {
    Scalar::from_le_bytes_mod_order(&x.into_bigint().to_bytes_le())
}

/// Verify `signature` over `digest` under `public_key`.
pub fn verify_prehash(public_key: &Affine, digest: &[u8; 32], signature: &Signature) -> bool {
    verify_reduced(public_key, &hash_to_scalar(digest), signature)
}

/// Verify against an already-reduced message scalar `e`.
pub fn verify_reduced(public_key: &Affine, e: &Scalar, signature: &Signature) -> bool {
    if signature.r.is_zero() || signature.s.is_zero() {
        return false;
    }
    if public_key.is_zero() || !public_key.is_on_curve() {
        return false;
    }
    let Some(w) = signature.s.inverse() else {
        return false;
    };
    let u1 = *e * w;
    let u2 = signature.r * w;
    let point = (Affine::generator() * u1 + *public_key * u2).into_affine();
    if point.is_zero() {
        return false;
    }
    base_to_scalar(&point.x) == signature.r
}
