//! # Protocol Configuration & Constants
//!
//! Every fixed size, file name and domain tag used by the proving pipeline
//! lives here. Anything that changes the circuit shape or the artifact
//! encoding also bumps [`CIRCUIT_VERSION`] or [`ARTIFACT_FORMAT_VERSION`],
//! so that stale keys are rejected at load time instead of "almost working".

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Version of the circuit definition. Folded into every circuit identifier,
/// so artifacts produced by an older circuit fail to load.
pub const CIRCUIT_VERSION: u32 = 1;

/// Binary layout version of persisted artifacts.
pub const ARTIFACT_FORMAT_VERSION: u16 = 1;

/// Magic prefix of every persisted artifact blob.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"SSIG";

/// Curve tag for BN254, the only proving curve this crate ships.
pub const CURVE_TAG_BN254: u8 = 0x01;

/// Human-readable proving curve, for logs and manifests.
pub const PROVING_CURVE: &str = "BN254";

/// Human-readable signing curve, for logs and manifests.
pub const SIGNING_CURVE: &str = "secp256k1";

// ---------------------------------------------------------------------------
// Data sizes
// ---------------------------------------------------------------------------

/// Byte length of every field-sized value in a transaction record.
pub const FIELD_BYTES: usize = 32;

/// Byte length of the truncated address.
pub const ADDRESS_LENGTH: usize = 20;

/// Byte length of the commitment nonce (160 bits).
pub const NONCE_LENGTH: usize = 20;

/// Byte length of a commitment digest.
pub const COMMITMENT_LENGTH: usize = 32;

/// Width of each public limb used to expose a non-native value.
pub const LIMB_BITS: usize = 64;

/// Number of public limbs per non-native value.
pub const NUM_LIMBS: usize = 4;

// ---------------------------------------------------------------------------
// Hash parameters
// ---------------------------------------------------------------------------

/// Number of rounds of the MiMC permutation.
pub const MIMC_ROUNDS: usize = 110;

/// Seed from which MiMC round constants are derived. Matches gnark-crypto's
/// MiMC-BN254 seed.
pub const MIMC_SEED: &[u8] = b"seed";

/// Domain tag for the offset point used by in-circuit scalar multiplication.
pub const OFFSET_POINT_SEED: &[u8] = b"shadowsig.secp256k1.offset";

// ---------------------------------------------------------------------------
// Artifact layout
// ---------------------------------------------------------------------------

/// Compiled constraint system.
pub const CIRCUIT_FILE: &str = "circuit.bin";

/// Groth16 proving key.
pub const PROVING_KEY_FILE: &str = "proving_key.bin";

/// Groth16 verifying key.
pub const VERIFYING_KEY_FILE: &str = "verifying_key.bin";

/// Setup manifest (JSON).
pub const MANIFEST_FILE: &str = "manifest.json";

/// Auxiliary witness record written by the prove mode.
pub const WITNESS_RECORD_FILE: &str = "witness.json";

/// Serialized proof written by the prove mode.
pub const PROOF_FILE: &str = "proof.bin";

/// Calldata written by the prove mode.
pub const CALLDATA_FILE: &str = "calldata.json";

/// Foundry fixture written by the prove mode.
pub const SOLIDITY_TEST_FILE: &str = "Verifier.t.sol";

// ---------------------------------------------------------------------------
// On-chain export
// ---------------------------------------------------------------------------

/// Default name of the generated verifier contract.
pub const DEFAULT_CONTRACT_NAME: &str = "ShadowSigVerifier";

/// Solidity compiler pragma for generated sources.
pub const SOLIDITY_PRAGMA: &str = "^0.8.25";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limb_geometry_covers_field_bytes() {
        assert!(LIMB_BITS * NUM_LIMBS >= FIELD_BYTES * 8);
        assert!(LIMB_BITS < 253, "limbs must fit in the BN254 scalar field");
    }

    #[test]
    fn address_is_a_prefix_of_a_coordinate() {
        assert!(ADDRESS_LENGTH <= FIELD_BYTES);
        assert_eq!(NONCE_LENGTH, 20);
    }

    #[test]
    fn artifact_files_are_distinct() {
        let files = [CIRCUIT_FILE, PROVING_KEY_FILE, VERIFYING_KEY_FILE, MANIFEST_FILE];
        for (i, a) in files.iter().enumerate() {
            for b in &files[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
