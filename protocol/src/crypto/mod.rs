//! # Cryptographic Primitives
//!
//! Native (off-circuit) building blocks. Everything here has an in-circuit
//! twin under `zkp::gadgets`, and the two must agree bit-for-bit:
//!
//! - **field**: descriptors of the emulated secp256k1 fields and the limb
//!   layout used to expose them as BN254 public inputs.
//! - **ecdsa**: secp256k1 signing and verification, for producing and
//!   pre-checking transaction records.
//! - **mimc**: the algebraic commitment hash over BN254 `Fr`.
//!
//! SHA-256 comes straight from the `sha2` crate and needs no wrapper.

pub mod ecdsa;
pub mod field;
pub mod mimc;

pub use ecdsa::{message_digest, verify_prehash, Signature, SigningKey};
pub use field::{FieldParams, SigningCurve};
pub use mimc::{mimc_hash, Mimc};
