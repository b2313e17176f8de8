//! # Setup Lifecycle
//!
//! ```text
//! compile(descriptor) ──► CompiledCircuit ──► setup(rng) ──► (ProvingKey, VerifyingKey)
//!                              │                                  │
//!                              └────────── persist / load ────────┘
//! ```
//!
//! Compilation synthesizes the witness-free circuit once and keeps its R1CS
//! matrices. Setup and proving both run against those matrices, so the keys
//! and proofs are guaranteed to describe the compiled circuit rather than
//! whatever the current code happens to synthesize.
//!
//! Each arrangement's shape is also pinned in a recorded table
//! (`shapes.json`). Once an entry is recorded, a circuit edit that moves the
//! constraint count fails [`compile`] and [`ArtifactSet::load_signature`]
//! until the table is re-recorded with
//! `SHADOWSIG_RECORD_SHAPES=1 cargo test --release -- --ignored recorded_shapes`.
//!
//! The setup here draws its toxic waste from the caller's RNG. It is a
//! single-party demonstration setup and is **not** trusted: whoever ran it
//! can forge proofs. Every run logs a warning to that effect.

use std::collections::BTreeMap;
use std::path::Path;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_relations::r1cs::{
    ConstraintMatrices, ConstraintSynthesizer, ConstraintSystem, OptimizationGoal, SynthesisMode,
};
use ark_std::rand::{CryptoRng, RngCore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::artifact;
use super::backend::{Groth16Backend, ProvingBackend};
use super::circuit::{CircuitArrangement, CircuitDescriptor, CircuitId, SignatureCircuit};
use crate::config::{CIRCUIT_VERSION, MANIFEST_FILE, PROVING_CURVE, SIGNING_CURVE};
use crate::error::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// Compiled circuit
// ---------------------------------------------------------------------------

/// Size of a constraint system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitShape {
    /// Number of constraints.
    pub num_constraints: usize,
    /// Instance variables, including the constant one.
    pub num_instance_variables: usize,
    /// Witness variables.
    pub num_witness_variables: usize,
}

impl CircuitShape {
    /// Shape recorded in a set of matrices.
    pub fn of(matrices: &ConstraintMatrices<Fr>) -> Self {
        Self {
            num_constraints: matrices.num_constraints,
            num_instance_variables: matrices.num_instance_variables,
            num_witness_variables: matrices.num_witness_variables,
        }
    }

    /// Length of the public-input vector.
    pub fn num_public_inputs(&self) -> usize {
        self.num_instance_variables - 1
    }
}

/// R1CS matrices of a witness-free synthesis.
#[derive(Clone, Debug)]
pub struct CompiledCircuit {
    /// Human-readable circuit label (the arrangement name).
    pub label: String,
    /// Recorded shape.
    pub shape: CircuitShape,
    /// `A`, `B`, `C` matrices.
    pub matrices: ConstraintMatrices<Fr>,
}

/// Compile the signature circuit for `descriptor`.
#[instrument(skip_all, fields(arrangement = %descriptor.arrangement))]
pub fn compile(descriptor: &CircuitDescriptor) -> Result<CompiledCircuit> {
    descriptor.validate()?;
    let compiled = compile_circuit(
        &descriptor.arrangement.to_string(),
        SignatureCircuit::blank(descriptor.clone()),
    )?;
    if compiled.shape.num_public_inputs() != descriptor.num_public_inputs() {
        return Err(ProtocolError::Compile(format!(
            "circuit declares {} public inputs, descriptor expects {}",
            compiled.shape.num_public_inputs(),
            descriptor.num_public_inputs()
        )));
    }
    if let Some(reason) = shape_drift(recorded_shape(descriptor.arrangement)?, compiled.shape) {
        return Err(ProtocolError::Compile(format!(
            "{}: {reason}",
            descriptor.arrangement
        )));
    }
    Ok(compiled)
}

/// Compile any circuit. Deterministic for a given circuit definition.
pub fn compile_circuit<C: ConstraintSynthesizer<Fr>>(label: &str, circuit: C) -> Result<CompiledCircuit> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(SynthesisMode::Setup);
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| ProtocolError::Compile(e.to_string()))?;
    cs.finalize();

    let matrices = cs
        .to_matrices()
        .ok_or_else(|| ProtocolError::Compile("constraint matrices unavailable".into()))?;
    let shape = CircuitShape::of(&matrices);
    info!(
        label,
        constraints = shape.num_constraints,
        public_inputs = shape.num_public_inputs(),
        witnesses = shape.num_witness_variables,
        "circuit compiled"
    );
    Ok(CompiledCircuit {
        label: label.to_string(),
        shape,
        matrices,
    })
}

// ---------------------------------------------------------------------------
// Recorded shapes
// ---------------------------------------------------------------------------

/// Location of the recorded-shape table inside the crate.
pub const RECORDED_SHAPES_PATH: &str = "src/zkp/shapes.json";

/// Arrangement name → shape of its compiled signature circuit.
const RECORDED_SHAPES: &str = include_str!("shapes.json");

/// The recorded shape of `arrangement`'s circuit, if one is recorded.
pub fn recorded_shape(arrangement: CircuitArrangement) -> Result<Option<CircuitShape>> {
    lookup_shape(RECORDED_SHAPES, arrangement)
}

fn lookup_shape(table: &str, arrangement: CircuitArrangement) -> Result<Option<CircuitShape>> {
    let table: BTreeMap<String, CircuitShape> = serde_json::from_str(table)?;
    Ok(table.get(&arrangement.to_string()).copied())
}

/// Why `actual` disagrees with the recorded shape, if it does.
fn shape_drift(recorded: Option<CircuitShape>, actual: CircuitShape) -> Option<String> {
    let recorded = recorded?;
    (recorded != actual).then(|| {
        format!(
            "shape {actual:?} differs from the recorded {recorded:?}; re-record {RECORDED_SHAPES_PATH} \
             if the circuit change is intended"
        )
    })
}

/// Run the (untrusted) Groth16 setup for a compiled circuit.
pub fn setup<R: RngCore + CryptoRng>(
    compiled: &CompiledCircuit,
    rng: &mut R,
) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>)> {
    warn!(
        label = %compiled.label,
        "running a single-party setup: the resulting keys are NOT trusted and \
         the operator can forge proofs; use an MPC ceremony for production"
    );
    Groth16Backend.setup(compiled, rng)
}

// ---------------------------------------------------------------------------
// Manifest & artifact set
// ---------------------------------------------------------------------------

/// `manifest.json`: what an artifact directory was built for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupManifest {
    /// Hex circuit identifier.
    pub circuit_id: String,
    /// Circuit label (arrangement name).
    pub label: String,
    /// Circuit definition version.
    pub circuit_version: u32,
    /// Proving curve.
    pub proving_curve: String,
    /// Signing curve.
    pub signing_curve: String,
    /// Backend that produced the keys.
    pub backend: String,
    /// Recorded constraint-system shape.
    pub shape: CircuitShape,
    /// Whether the keys come from a trusted ceremony.
    pub trusted: bool,
    /// When the setup ran.
    pub created_at: DateTime<Utc>,
}

/// Everything produced by one setup run.
#[derive(Clone, Debug)]
pub struct ArtifactSet {
    /// Identifier every artifact is bound to.
    pub circuit_id: CircuitId,
    /// Compiled circuit.
    pub compiled: CompiledCircuit,
    /// Proving key.
    pub proving_key: ProvingKey<Bn254>,
    /// Verifying key.
    pub verifying_key: VerifyingKey<Bn254>,
}

impl ArtifactSet {
    /// Compile and set up the signature circuit for `arrangement`.
    pub fn generate<R: RngCore + CryptoRng>(
        arrangement: CircuitArrangement,
        rng: &mut R,
    ) -> Result<Self> {
        let descriptor = CircuitDescriptor::new(arrangement);
        let compiled = compile(&descriptor)?;
        Self::from_compiled(descriptor.id(), compiled, rng)
    }

    /// Set up an already compiled circuit.
    pub fn from_compiled<R: RngCore + CryptoRng>(
        circuit_id: CircuitId,
        compiled: CompiledCircuit,
        rng: &mut R,
    ) -> Result<Self> {
        let (proving_key, verifying_key) = setup(&compiled, rng)?;
        Ok(Self {
            circuit_id,
            compiled,
            proving_key,
            verifying_key,
        })
    }

    /// Manifest describing this set.
    pub fn manifest(&self) -> SetupManifest {
        SetupManifest {
            circuit_id: self.circuit_id.to_string(),
            label: self.compiled.label.clone(),
            circuit_version: CIRCUIT_VERSION,
            proving_curve: PROVING_CURVE.to_string(),
            signing_curve: SIGNING_CURVE.to_string(),
            backend: Groth16Backend.name().to_string(),
            shape: self.compiled.shape,
            trusted: false,
            created_at: Utc::now(),
        }
    }

    /// Write all artifacts and the manifest into `dir`.
    #[instrument(skip(self), fields(circuit = %self.circuit_id))]
    pub fn persist(&self, dir: &Path) -> Result<()> {
        artifact::persist(dir, &self.compiled, &self.circuit_id)?;
        artifact::persist(dir, &self.proving_key, &self.circuit_id)?;
        artifact::persist(dir, &self.verifying_key, &self.circuit_id)?;
        let manifest = serde_json::to_vec_pretty(&self.manifest())?;
        artifact::write_atomic(&dir.join(MANIFEST_FILE), &manifest)?;
        info!(dir = %dir.display(), "artifacts persisted");
        Ok(())
    }

    /// Load a set written by [`ArtifactSet::persist`], checking that every
    /// artifact belongs to `circuit_id` and that the compiled circuit still
    /// has the shape recorded in the manifest.
    #[instrument(fields(circuit = %circuit_id))]
    pub fn load(dir: &Path, circuit_id: CircuitId) -> Result<Self> {
        let manifest = read_manifest(dir)?;
        let compiled: CompiledCircuit = artifact::load(dir, &circuit_id)?;
        if compiled.shape != manifest.shape {
            return Err(ProtocolError::deserialization(
                artifact::ArtifactKind::CompiledCircuit,
                format!(
                    "shape {:?} disagrees with manifest {:?}",
                    compiled.shape, manifest.shape
                ),
            ));
        }
        let proving_key = artifact::load(dir, &circuit_id)?;
        let verifying_key = load_verifying_key(dir, circuit_id)?;
        Ok(Self {
            circuit_id,
            compiled,
            proving_key,
            verifying_key,
        })
    }

    /// Load the signature-circuit set recorded in `dir`'s manifest. The
    /// compiled circuit must also match the recorded shape table.
    pub fn load_signature(dir: &Path) -> Result<(CircuitArrangement, Self)> {
        let arrangement = manifest_arrangement(dir)?;
        let set = Self::load(dir, CircuitDescriptor::new(arrangement).id())?;
        if let Some(reason) = shape_drift(recorded_shape(arrangement)?, set.compiled.shape) {
            return Err(ProtocolError::deserialization(
                artifact::ArtifactKind::CompiledCircuit,
                format!("{arrangement}: {reason}"),
            ));
        }
        Ok((arrangement, set))
    }
}

/// Read `manifest.json` from `dir`.
pub fn read_manifest(dir: &Path) -> Result<SetupManifest> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = std::fs::read(&path).map_err(|e| ProtocolError::io(&path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Arrangement recorded in `dir`'s manifest.
pub fn manifest_arrangement(dir: &Path) -> Result<CircuitArrangement> {
    let manifest = read_manifest(dir)?;
    manifest.label.parse().map_err(|e: String| {
        ProtocolError::deserialization(artifact::ArtifactKind::CompiledCircuit, e)
    })
}

/// Load only the verifying key, for verifiers and exporters.
pub fn load_verifying_key(dir: &Path, circuit_id: CircuitId) -> Result<VerifyingKey<Bn254>> {
    artifact::load(dir, &circuit_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zkp::testing::{opening_circuit_id, toy_setup, OpeningCircuit};
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn compilation_is_deterministic() {
        let a = compile_circuit("opening", OpeningCircuit::blank()).unwrap();
        let b = compile_circuit("opening", OpeningCircuit::blank()).unwrap();
        assert_eq!(a.shape, b.shape);
        assert_eq!(a.matrices.a, b.matrices.a);
        assert_eq!(a.matrices.b, b.matrices.b);
        assert_eq!(a.shape.num_public_inputs(), 1);
    }

    #[test]
    fn keys_match_compiled_shape() {
        let (compiled, pk, vk) = toy_setup(1);
        assert_eq!(vk.gamma_abc_g1.len(), compiled.shape.num_instance_variables);
        assert_eq!(pk.vk, vk);
    }

    #[test]
    fn persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let compiled = compile_circuit("opening", OpeningCircuit::blank()).unwrap();
        let set = ArtifactSet::from_compiled(opening_circuit_id(), compiled, &mut rng).unwrap();
        set.persist(dir.path()).unwrap();

        let manifest = read_manifest(dir.path()).unwrap();
        assert!(!manifest.trusted);
        assert_eq!(manifest.shape, set.compiled.shape);
        assert_eq!(manifest.circuit_id, opening_circuit_id().to_string());

        let loaded = ArtifactSet::load(dir.path(), opening_circuit_id()).unwrap();
        assert_eq!(loaded.verifying_key, set.verifying_key);
        assert_eq!(loaded.compiled.shape, set.compiled.shape);
    }

    #[test]
    fn manifest_shape_drift_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let compiled = compile_circuit("opening", OpeningCircuit::blank()).unwrap();
        let set = ArtifactSet::from_compiled(opening_circuit_id(), compiled, &mut rng).unwrap();
        set.persist(dir.path()).unwrap();

        let mut manifest = read_manifest(dir.path()).unwrap();
        manifest.shape.num_constraints += 1;
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            ArtifactSet::load(dir.path(), opening_circuit_id()),
            Err(ProtocolError::Deserialization { .. })
        ));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactSet::load(&dir.path().join("absent"), opening_circuit_id()).unwrap_err();
        assert!(matches!(err, ProtocolError::Io { .. }));
    }

    #[test]
    fn recorded_shape_table_parses() {
        for arrangement in CircuitArrangement::ALL {
            recorded_shape(arrangement).unwrap();
        }
    }

    #[test]
    fn shape_lookup_is_by_arrangement_name() {
        let table = r#"{"direct": {"num_constraints": 10, "num_instance_variables": 13, "num_witness_variables": 40}}"#;
        let direct = lookup_shape(table, CircuitArrangement::Direct).unwrap().unwrap();
        assert_eq!(direct.num_constraints, 10);
        assert_eq!(direct.num_public_inputs(), 12);
        let blinded = CircuitArrangement::Blinded {
            hash: crate::zkp::HashFamily::Algebraic,
            identity: crate::zkp::IdentityKind::Address,
        };
        assert_eq!(lookup_shape(table, blinded).unwrap(), None);
        assert!(lookup_shape("[1, 2]", blinded).is_err());
    }

    #[test]
    fn drift_from_recorded_shape_is_reported() {
        let recorded = CircuitShape {
            num_constraints: 10,
            num_instance_variables: 13,
            num_witness_variables: 40,
        };
        let grown = CircuitShape {
            num_constraints: 11,
            ..recorded
        };
        assert_eq!(shape_drift(Some(recorded), recorded), None);
        assert_eq!(shape_drift(None, grown), None);
        let reason = shape_drift(Some(recorded), grown).unwrap();
        assert!(reason.contains(RECORDED_SHAPES_PATH), "{reason}");
    }

    /// Checks every arrangement against the recorded table. With
    /// `SHADOWSIG_RECORD_SHAPES` set it rewrites the table instead.
    #[test]
    #[ignore = "compiles every arrangement; run with --ignored"]
    fn recorded_shapes_match_circuit_definition() {
        let record = std::env::var_os("SHADOWSIG_RECORD_SHAPES").is_some();
        let mut table = BTreeMap::new();
        for arrangement in CircuitArrangement::ALL {
            let descriptor = CircuitDescriptor::new(arrangement);
            descriptor.validate().unwrap();
            let shape = compile_circuit(
                &arrangement.to_string(),
                SignatureCircuit::blank(descriptor),
            )
            .unwrap()
            .shape;
            if !record {
                assert_eq!(
                    recorded_shape(arrangement).unwrap(),
                    Some(shape),
                    "{arrangement}: re-record with SHADOWSIG_RECORD_SHAPES=1"
                );
            }
            table.insert(arrangement.to_string(), shape);
        }
        if record {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(RECORDED_SHAPES_PATH);
            let json = serde_json::to_string_pretty(&table).unwrap();
            std::fs::write(path, json + "\n").unwrap();
        }
    }

    #[test]
    #[ignore = "multi-million-constraint synthesis; run with --ignored"]
    fn signature_circuit_compiles_with_expected_inputs() {
        for arrangement in CircuitArrangement::ALL {
            let descriptor = CircuitDescriptor::new(arrangement);
            let compiled = compile(&descriptor).unwrap();
            assert_eq!(compiled.shape.num_public_inputs(), descriptor.num_public_inputs());
        }
    }
}
