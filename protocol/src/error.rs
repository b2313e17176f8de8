//! Error types for the proving pipeline.
//!
//! Every fallible operation returns a [`ProtocolError`]. The variants map
//! one-to-one onto the failure categories callers need to tell apart:
//! bad input, broken circuit wiring, damaged or foreign artifacts, a witness
//! that violates the circuit, and structurally invalid proofs. A false
//! statement with a well-formed proof is *not* an error; it is
//! [`Verdict::Rejected`](crate::zkp::verifier::Verdict::Rejected).

use std::path::PathBuf;

use ark_relations::r1cs::SynthesisError;
use thiserror::Error;

use crate::zkp::artifact::ArtifactKind;

/// Errors that can occur anywhere between decoding a transaction record and
/// exporting calldata.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A hex field was malformed, mis-sized, or out of range for its field.
    #[error("decode error in `{field}`: {reason}")]
    Decode {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The circuit could not be compiled. Indicates a code defect.
    #[error("circuit compile error: {0}")]
    Compile(String),

    /// A persisted artifact is corrupted, truncated, or belongs to a
    /// different curve or circuit version.
    #[error("cannot load {artifact} artifact: {reason}")]
    Deserialization {
        /// Which artifact failed to load.
        artifact: ArtifactKind,
        /// Why it was rejected.
        reason: String,
    },

    /// The witness violates a circuit gate (bad signature, commitment
    /// mismatch). Raised before a proof is constructed.
    #[error("witness does not satisfy the circuit: {0}")]
    UnsatisfiedConstraint(String),

    /// A proof or public-input vector is malformed: wrong length,
    /// non-canonical field element, point off the curve.
    #[error("malformed verification input: {0}")]
    Structural(String),

    /// The proving engine itself failed.
    #[error("proving backend failed: {0}")]
    Backend(#[from] SynthesisError),

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A JSON record could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Convenience constructor for [`ProtocolError::Decode`].
    pub fn decode(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            field,
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`ProtocolError::Deserialization`].
    pub fn deserialization(artifact: ArtifactKind, reason: impl Into<String>) -> Self {
        Self::Deserialization {
            artifact,
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` when the caller's input was wrong (as opposed to the pipeline
    /// being broken). Useful for exit codes and error reporting.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::UnsatisfiedConstraint(_) | Self::Structural(_) | Self::Json(_)
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_classified() {
        assert!(ProtocolError::decode("r", "bad hex").is_input_error());
        assert!(ProtocolError::UnsatisfiedConstraint("ecdsa".into()).is_input_error());
        assert!(!ProtocolError::Compile("boom".into()).is_input_error());
        assert!(!ProtocolError::deserialization(ArtifactKind::ProvingKey, "bad magic")
            .is_input_error());
    }

    #[test]
    fn messages_name_the_failing_part() {
        let err = ProtocolError::decode("pubX", "expected 32 bytes, got 31");
        assert_eq!(err.to_string(), "decode error in `pubX`: expected 32 bytes, got 31");

        let err = ProtocolError::deserialization(ArtifactKind::VerifyingKey, "checksum mismatch");
        assert!(err.to_string().contains("verifying key"));
    }
}
