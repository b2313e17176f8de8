// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ShadowSig CLI
//!
//! Entry point for the `shadowsig` binary. Parses arguments, initializes
//! logging and dispatches to one execution mode:
//!
//! - `setup`:  compile a circuit, run the untrusted setup, persist artifacts
//! - `prove`:  transaction record → witness → proof → calldata
//! - `verify`: three-way outcome: accepted (0), rejected (1), error (2)
//! - `export`: Solidity verifier for an artifact directory
//! - `sign`:   produce a transaction record from a message

mod cli;
mod logging;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::OsRng;

use shadowsig::config::{
    CALLDATA_FILE, PROOF_FILE, SOLIDITY_TEST_FILE, WITNESS_RECORD_FILE,
};
use shadowsig::crypto::SigningKey;
use shadowsig::export::{
    export_calldata, export_foundry_test, export_labeled_verifier_source, replay, Calldata,
};
use shadowsig::zkp::artifact::write_atomic;
use shadowsig::zkp::commitment::PublicKey;
use shadowsig::zkp::setup::{load_verifying_key, manifest_arrangement};
use shadowsig::zkp::witness::{decode_hex, WitnessRecord};
use shadowsig::zkp::{
    build_witness, prove, verify, ArtifactSet, CircuitDescriptor, TransactionRecord, Verdict,
    Witness,
};

use cli::{Commands, ShadowSigCli};

fn main() -> ExitCode {
    let cli = ShadowSigCli::parse();
    logging::init_logging("shadowsig=info,shadowsig_cli=info", cli.log_format);

    let outcome = run(cli.command);
    if let Err(err) = &outcome {
        tracing::error!("{err:#}");
    }
    ExitCode::from(exit_status(&outcome))
}

fn run(command: Commands) -> Result<Verdict> {
    match command {
        Commands::Setup(args) => run_setup(args),
        Commands::Prove(args) => run_prove(args),
        Commands::Verify(args) => run_verify(args),
        Commands::Export(args) => run_export(args),
        Commands::Sign(args) => run_sign(args),
    }
}

/// Process status: 0 accepted, 1 rejected, 2 error.
fn exit_status(outcome: &Result<Verdict>) -> u8 {
    match outcome {
        Ok(Verdict::Accepted) => 0,
        Ok(Verdict::Rejected) => 1,
        Err(_) => 2,
    }
}

fn run_setup(args: cli::SetupArgs) -> Result<Verdict> {
    let dir = &args.dir.artifacts;
    tracing::info!(arrangement = %args.arrangement, dir = %dir.display(), "starting setup");

    let set = ArtifactSet::generate(args.arrangement, &mut OsRng)
        .with_context(|| format!("setup failed for {}", args.arrangement))?;
    set.persist(dir)
        .with_context(|| format!("failed to persist artifacts in {}", dir.display()))?;

    if let Some(path) = &args.contract {
        let descriptor = CircuitDescriptor::new(args.arrangement);
        let source =
            export_labeled_verifier_source(&set.verifying_key, &args.contract_name, &descriptor)?;
        write_file(path, source.as_bytes())?;
    }
    println!("{}", dir.display());
    Ok(Verdict::Accepted)
}

fn run_prove(args: cli::ProveArgs) -> Result<Verdict> {
    let dir = &args.dir.artifacts;
    let (arrangement, set) = ArtifactSet::load_signature(dir)
        .with_context(|| format!("failed to load artifacts from {}", dir.display()))?;

    let witness = match (&args.transaction, &args.witness) {
        (Some(path), _) => {
            let tx: TransactionRecord = read_json(path)?;
            let (witness, record) = build_witness(&tx, arrangement)
                .with_context(|| format!("invalid transaction record {}", path.display()))?;
            write_file(
                &args.out.join(WITNESS_RECORD_FILE),
                &serde_json::to_vec_pretty(&record)?,
            )?;
            witness
        }
        (None, Some(path)) => {
            let record: WitnessRecord = read_json(path)?;
            let witness = Witness::from_record(&record)
                .with_context(|| format!("invalid witness record {}", path.display()))?;
            if witness.arrangement != arrangement {
                bail!(
                    "witness is for {}, artifacts in {} are for {arrangement}",
                    witness.arrangement,
                    dir.display()
                );
            }
            witness
        }
        (None, None) => bail!("either --transaction or --witness is required"),
    };

    let proof = prove(&witness, &set, &mut OsRng).context("proof generation failed")?;
    let verdict = verify(&set.verifying_key, proof.public_inputs.as_slice(), &proof.proof)?;
    if !verdict.is_accepted() {
        bail!("freshly generated proof did not verify; artifacts are inconsistent");
    }

    let calldata = export_calldata(&proof.proof, proof.public_inputs.as_slice());
    write_file(&args.out.join(PROOF_FILE), &proof.proof_bytes()?)?;
    write_file(&args.out.join(CALLDATA_FILE), &serde_json::to_vec_pretty(&calldata)?)?;
    write_file(
        &args.out.join(SOLIDITY_TEST_FILE),
        export_foundry_test(&args.contract_name, &calldata)?.as_bytes(),
    )?;

    tracing::info!(out = %args.out.display(), %arrangement, "proof written");
    println!("{}", args.out.display());
    Ok(verdict)
}

fn run_verify(args: cli::VerifyArgs) -> Result<Verdict> {
    let dir = &args.dir.artifacts;
    let arrangement = manifest_arrangement(dir)?;
    let vk = load_verifying_key(dir, CircuitDescriptor::new(arrangement).id())
        .with_context(|| format!("failed to load verifying key from {}", dir.display()))?;

    let calldata: Calldata = read_json(&args.calldata)?;
    let proof = calldata.to_proof()?;
    let inputs = calldata.public_input_values()?;
    let verdict = verify(&vk, &inputs, &proof)?;

    if let Some(path) = &args.contract {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let replayed = replay(&source, &calldata)?;
        if replayed != verdict {
            bail!("contract {} says {replayed}, verifying key says {verdict}", path.display());
        }
    }

    println!("{verdict}");
    Ok(verdict)
}

fn run_export(args: cli::ExportArgs) -> Result<Verdict> {
    let dir = &args.dir.artifacts;
    let arrangement = manifest_arrangement(dir)?;
    let descriptor = CircuitDescriptor::new(arrangement);
    let vk = load_verifying_key(dir, descriptor.id())
        .with_context(|| format!("failed to load verifying key from {}", dir.display()))?;
    let source = export_labeled_verifier_source(&vk, &args.contract_name, &descriptor)?;
    write_file(&args.contract, source.as_bytes())?;
    println!("{}", args.contract.display());
    Ok(Verdict::Accepted)
}

fn run_sign(args: cli::SignArgs) -> Result<Verdict> {
    let key = match &args.secret_key {
        Some(hex) => {
            let bytes = decode_hex::<32>("secretKey", hex)?;
            SigningKey::from_bytes(&bytes).context("secret key is zero or not below the group order")?
        }
        None => SigningKey::random(&mut OsRng),
    };
    let tx = TransactionRecord::sign(&key, args.message.as_bytes(), &mut OsRng);
    write_file(&args.out, &serde_json::to_vec_pretty(&tx)?)?;

    let address = PublicKey::from_affine(&key.public_key()).address();
    tracing::info!(%address, "transaction signed");
    println!("{}", args.out.display());
    Ok(Verdict::Accepted)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("malformed JSON in {}", path.display()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
