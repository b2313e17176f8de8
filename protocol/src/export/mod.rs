//! # On-chain Export
//!
//! Everything an EVM verifier needs:
//!
//! ```text
//! solidity.rs:  verifier contract, Foundry fixture, native replay
//! calldata.rs:  proof/input coordinates, ABI encoding
//! ```
//!
//! Groth16 as implemented by arkworks has no commit-extension points, so
//! the optional commitment / proof-of-knowledge group some verifiers take
//! is never emitted.

pub mod calldata;
pub mod solidity;

pub use calldata::{export_calldata, function_signature, selector, Calldata};
pub use solidity::{
    export_foundry_test, export_labeled_verifier_source, export_verifier_source, replay,
};
