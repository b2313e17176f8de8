//! # Zero-Knowledge Proof Module
//!
//! Groth16 over BN254 proving that the prover holds a secp256k1 key whose
//! signature verifies on a message hash, optionally hiding the key behind a
//! one-time commitment.
//!
//! ## Architecture
//!
//! ```text
//! commitment.rs:   identity commitments (MiMC or SHA-256, address or key)
//! gadgets/:        non-native ECDSA, MiMC and commitment gadgets
//! circuit.rs:      arrangements, descriptors, SignatureCircuit
//! witness.rs:      transaction record → witness + public inputs
//! setup.rs:        compile, untrusted setup, manifest, artifact sets
//! artifact.rs:     typed, checksummed, circuit-bound artifact blobs
//! backend.rs:      proving backend trait, Groth16 implementation
//! prover.rs:       pre-check, synthesis, proof generation
//! verifier.rs:     three-way verification outcome
//! ```
//!
//! ## Security Model
//!
//! - **Commitment hiding**: the 160-bit nonce is fresh per request.
//! - **Commitment binding**: collision resistance of MiMC / SHA-256.
//! - **Key binding**: in blinded arrangements the committed identity is
//!   derived in-circuit from the same point that verified the signature.
//! - **Soundness**: Groth16 knowledge-soundness, *conditional on the setup*.
//!   The setup shipped here is single-party and untrusted.

pub mod artifact;
pub mod backend;
pub mod circuit;
pub mod commitment;
pub mod gadgets;
pub mod prover;
pub mod setup;
pub mod verifier;
pub mod witness;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::{Artifact, ArtifactKind};
pub use backend::{Groth16Backend, ProvingBackend};
pub use circuit::{CircuitArrangement, CircuitDescriptor, CircuitId, SignatureCircuit};
pub use commitment::{commit, open, Address, Commitment, HashFamily, Identity, IdentityKind, Nonce};
pub use prover::{prove, prove_circuit, SignatureProof};
pub use setup::{compile, compile_circuit, setup, ArtifactSet, CircuitShape, CompiledCircuit};
pub use verifier::{decode_proof, parse_public_inputs, verify, Verdict};
pub use witness::{build_witness, build_witness_with_nonce, PublicInputVector, TransactionRecord, Witness};
