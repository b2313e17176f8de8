// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ShadowSig Core Library
//!
//! Zero-knowledge proofs that the prover owns a secp256k1 ECDSA key, with
//! the public key or its address optionally hidden behind a one-time
//! commitment, verifiable by an on-chain contract.
//!
//! ## Architecture
//!
//! - **crypto**: native secp256k1 ECDSA, MiMC, field descriptors.
//! - **zkp**: commitments, the signature circuit, witnesses, setup,
//!   artifacts, proving and verification.
//! - **export**: Solidity verifier source and EVM calldata.
//! - **config**: protocol constants and artifact file names.
//! - **error**: the crate-wide error taxonomy.
//!
//! ## Lifecycle
//!
//! ```text
//! compile(descriptor) ─► setup ─► persist            (once per arrangement)
//! build_witness(tx) ─► prove ─► verify ─► export     (per request)
//! ```
//!
//! The setup is a single-party demonstration and is **not** trusted.

pub mod config;
pub mod crypto;
pub mod error;
pub mod export;
pub mod zkp;

pub use error::{ProtocolError, Result};
