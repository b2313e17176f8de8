//! # Persisted Artifacts
//!
//! Compiled circuits and Groth16 keys are expensive to produce and must
//! never be paired with the wrong circuit. Every blob is framed by a fixed
//! header that pins it to one circuit:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "SSIG"
//! 4       2     format version (LE)
//! 6       1     curve tag (0x01 = BN254)
//! 7       1     artifact kind
//! 8       32    circuit id
//! 40      8     payload length (LE)
//! 48      32    BLAKE3(payload)
//! 80      …     payload
//! ```
//!
//! Any mismatch is a [`ProtocolError::Deserialization`] naming the artifact.
//! Writes go to a temporary sibling, are fsynced, then renamed into place, so
//! a crash never leaves a half-written key under the final name.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ark_bn254::{Bn254, Fr};
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintMatrices;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use tracing::{debug, instrument};

use super::circuit::CircuitId;
use super::setup::{CircuitShape, CompiledCircuit};
use crate::config::{
    ARTIFACT_FORMAT_VERSION, ARTIFACT_MAGIC, CIRCUIT_FILE, CURVE_TAG_BN254, PROVING_KEY_FILE,
    VERIFYING_KEY_FILE,
};
use crate::error::{ProtocolError, Result};

/// Length of the fixed header.
pub const HEADER_LEN: usize = 80;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// What a persisted blob contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Constraint matrices and shape.
    CompiledCircuit,
    /// Groth16 proving key.
    ProvingKey,
    /// Groth16 verifying key.
    VerifyingKey,
}

impl ArtifactKind {
    /// Header tag byte.
    pub fn tag(self) -> u8 {
        match self {
            Self::CompiledCircuit => 1,
            Self::ProvingKey => 2,
            Self::VerifyingKey => 3,
        }
    }

    /// Inverse of [`ArtifactKind::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::CompiledCircuit),
            2 => Some(Self::ProvingKey),
            3 => Some(Self::VerifyingKey),
            _ => None,
        }
    }

    /// File name inside an artifact directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::CompiledCircuit => CIRCUIT_FILE,
            Self::ProvingKey => PROVING_KEY_FILE,
            Self::VerifyingKey => VERIFYING_KEY_FILE,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CompiledCircuit => "compiled circuit",
            Self::ProvingKey => "proving key",
            Self::VerifyingKey => "verifying key",
        })
    }
}

// ---------------------------------------------------------------------------
// Artifact trait
// ---------------------------------------------------------------------------

/// A typed, persistable artifact. One implementation per [`ArtifactKind`].
pub trait Artifact: Sized {
    /// The kind written into the header.
    const KIND: ArtifactKind;

    /// Serialize the payload (without header).
    fn write_payload(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Deserialize a payload whose integrity has already been checked.
    fn read_payload(payload: &[u8]) -> Result<Self>;
}

fn ser_err(kind: ArtifactKind) -> impl Fn(ark_serialize::SerializationError) -> ProtocolError {
    move |e| ProtocolError::deserialization(kind, e.to_string())
}

impl Artifact for ProvingKey<Bn254> {
    const KIND: ArtifactKind = ArtifactKind::ProvingKey;

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<()> {
        self.serialize_uncompressed(out).map_err(ser_err(Self::KIND))
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        // The checksum already covers integrity; subgroup checks on a
        // multi-megabyte key would dominate load time.
        Self::deserialize_uncompressed_unchecked(payload).map_err(ser_err(Self::KIND))
    }
}

impl Artifact for VerifyingKey<Bn254> {
    const KIND: ArtifactKind = ArtifactKind::VerifyingKey;

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<()> {
        self.serialize_compressed(out).map_err(ser_err(Self::KIND))
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        Self::deserialize_compressed(payload).map_err(ser_err(Self::KIND))
    }
}

impl Artifact for CompiledCircuit {
    const KIND: ArtifactKind = ArtifactKind::CompiledCircuit;

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<()> {
        let err = ser_err(Self::KIND);
        let m = &self.matrices;
        self.label.serialize_compressed(&mut *out).map_err(&err)?;
        for n in [
            m.num_instance_variables,
            m.num_witness_variables,
            m.num_constraints,
            m.a_num_non_zero,
            m.b_num_non_zero,
            m.c_num_non_zero,
        ] {
            (n as u64).serialize_compressed(&mut *out).map_err(&err)?;
        }
        for matrix in [&m.a, &m.b, &m.c] {
            (matrix.len() as u64).serialize_compressed(&mut *out).map_err(&err)?;
            for row in matrix {
                (row.len() as u64).serialize_compressed(&mut *out).map_err(&err)?;
                for (coeff, column) in row {
                    coeff.serialize_compressed(&mut *out).map_err(&err)?;
                    (*column as u64).serialize_compressed(&mut *out).map_err(&err)?;
                }
            }
        }
        Ok(())
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        let err = ser_err(Self::KIND);
        let mut reader = payload;
        let label = String::deserialize_compressed(&mut reader).map_err(&err)?;
        let mut counts = [0usize; 6];
        for n in counts.iter_mut() {
            *n = u64::deserialize_compressed(&mut reader).map_err(&err)? as usize;
        }
        let [num_instance_variables, num_witness_variables, num_constraints, a_nnz, b_nnz, c_nnz] =
            counts;

        let read_matrix = |reader: &mut &[u8]| -> Result<Vec<Vec<(Fr, usize)>>> {
            let rows = u64::deserialize_compressed(&mut *reader).map_err(&err)? as usize;
            if rows != num_constraints {
                return Err(ProtocolError::deserialization(
                    Self::KIND,
                    format!("matrix has {rows} rows, expected {num_constraints}"),
                ));
            }
            let mut matrix = Vec::with_capacity(rows);
            for _ in 0..rows {
                let len = u64::deserialize_compressed(&mut *reader).map_err(&err)? as usize;
                let mut row = Vec::with_capacity(len.min(reader.len()));
                for _ in 0..len {
                    let coeff = Fr::deserialize_compressed(&mut *reader).map_err(&err)?;
                    let column = u64::deserialize_compressed(&mut *reader).map_err(&err)? as usize;
                    if column >= num_instance_variables + num_witness_variables {
                        return Err(ProtocolError::deserialization(
                            Self::KIND,
                            format!("column {column} out of range"),
                        ));
                    }
                    row.push((coeff, column));
                }
                matrix.push(row);
            }
            Ok(matrix)
        };
        let a = read_matrix(&mut reader)?;
        let b = read_matrix(&mut reader)?;
        let c = read_matrix(&mut reader)?;
        if !reader.is_empty() {
            return Err(ProtocolError::deserialization(Self::KIND, "trailing bytes"));
        }

        let matrices = ConstraintMatrices {
            num_instance_variables,
            num_witness_variables,
            num_constraints,
            a_num_non_zero: a_nnz,
            b_num_non_zero: b_nnz,
            c_num_non_zero: c_nnz,
            a,
            b,
            c,
        };
        Ok(CompiledCircuit {
            label,
            shape: CircuitShape::of(&matrices),
            matrices,
        })
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Frame `artifact` with a header binding it to `circuit`.
pub fn encode<A: Artifact>(artifact: &A, circuit: &CircuitId) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    artifact.write_payload(&mut payload)?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&ARTIFACT_MAGIC);
    out.extend_from_slice(&ARTIFACT_FORMAT_VERSION.to_le_bytes());
    out.push(CURVE_TAG_BN254);
    out.push(A::KIND.tag());
    out.extend_from_slice(&circuit.0);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(blake3::hash(&payload).as_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Check the header of `bytes` against `A` and `circuit`, then decode.
pub fn decode<A: Artifact>(bytes: &[u8], circuit: &CircuitId) -> Result<A> {
    let kind = A::KIND;
    let fail = |reason: String| ProtocolError::deserialization(kind, reason);

    if bytes.len() < HEADER_LEN {
        return Err(fail(format!("{} bytes is shorter than the header", bytes.len())));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[0..4] != ARTIFACT_MAGIC {
        return Err(fail("bad magic".into()));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != ARTIFACT_FORMAT_VERSION {
        return Err(fail(format!(
            "format version {version}, expected {ARTIFACT_FORMAT_VERSION}"
        )));
    }
    if header[6] != CURVE_TAG_BN254 {
        return Err(fail(format!("curve tag {:#04x} is not BN254", header[6])));
    }
    match ArtifactKind::from_tag(header[7]) {
        Some(found) if found == kind => {}
        Some(found) => return Err(fail(format!("blob holds a {found}"))),
        None => return Err(fail(format!("unknown kind tag {}", header[7]))),
    }
    if header[8..40] != circuit.0 {
        return Err(fail(format!(
            "built for circuit {}, expected {circuit}",
            hex::encode(&header[8..40])
        )));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&header[40..48]);
    let len = u64::from_le_bytes(len);
    if len != payload.len() as u64 {
        return Err(fail(format!(
            "truncated: header declares {len} payload bytes, found {}",
            payload.len()
        )));
    }
    if blake3::hash(payload).as_bytes()[..] != header[48..80] {
        return Err(fail("checksum mismatch".into()));
    }
    A::read_payload(payload)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` via temp file, fsync and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ProtocolError::io(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{file_name}.tmp-{}", std::process::id()));
    {
        let mut file = fs::File::create(&tmp).map_err(|e| ProtocolError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| ProtocolError::io(&tmp, e))?;
        file.sync_all().map_err(|e| ProtocolError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| ProtocolError::io(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}

/// Persist `artifact` under its canonical file name in `dir`.
#[instrument(skip(artifact), fields(kind = %A::KIND))]
pub fn persist<A: Artifact>(dir: &Path, artifact: &A, circuit: &CircuitId) -> Result<PathBuf> {
    let path = dir.join(A::KIND.file_name());
    write_atomic(&path, &encode(artifact, circuit)?)?;
    Ok(path)
}

/// Load the artifact of type `A` from `dir`.
#[instrument(fields(kind = %A::KIND))]
pub fn load<A: Artifact>(dir: &Path, circuit: &CircuitId) -> Result<A> {
    let path = dir.join(A::KIND.file_name());
    let bytes = fs::read(&path).map_err(|e| ProtocolError::io(&path, e))?;
    decode(&bytes, circuit)
}
