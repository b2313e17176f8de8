//! # CLI Interface
//!
//! Command-line structure for the `shadowsig` binary, using `clap` derive.
//! One subcommand per execution mode: `setup`, `prove`, `verify`, `export`
//! and `sign`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use shadowsig::config::DEFAULT_CONTRACT_NAME;
use shadowsig::zkp::CircuitArrangement;

use crate::logging::LogFormat;

/// Zero-knowledge proofs of secp256k1 key ownership.
#[derive(Parser, Debug)]
#[command(name = "shadowsig", version, propagate_version = true)]
pub struct ShadowSigCli {
    /// Log output format.
    #[arg(long, global = true, env = "SHADOWSIG_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Execution modes.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a circuit and run the (untrusted) setup.
    Setup(SetupArgs),
    /// Build a witness from a transaction record and prove it.
    Prove(ProveArgs),
    /// Check calldata against the verifying key.
    Verify(VerifyArgs),
    /// Write the Solidity verifier for an artifact directory.
    Export(ExportArgs),
    /// Sign a message with a secp256k1 key and write a transaction record.
    Sign(SignArgs),
}

/// Artifact directory shared by most modes.
#[derive(Args, Debug)]
pub struct ArtifactDir {
    /// Directory holding `circuit.bin`, the keys and `manifest.json`.
    #[arg(long, short = 'a', env = "SHADOWSIG_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,
}

/// Arguments for `setup`.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Which values the proof reveals: `direct`, `blinded-mimc-address`,
    /// `blinded-mimc-pubkey`, `blinded-sha256-address`, `blinded-sha256-pubkey`.
    #[arg(long, value_parser = parse_arrangement)]
    pub arrangement: CircuitArrangement,

    #[command(flatten)]
    pub dir: ArtifactDir,

    /// Also write the Solidity verifier here.
    #[arg(long)]
    pub contract: Option<PathBuf>,

    /// Name of the generated contract.
    #[arg(long, default_value = DEFAULT_CONTRACT_NAME)]
    pub contract_name: String,
}

/// Arguments for `prove`.
#[derive(Args, Debug)]
pub struct ProveArgs {
    #[command(flatten)]
    pub dir: ArtifactDir,

    /// Transaction record (JSON: msgHash, r, s, pubX, pubY).
    #[arg(long, short = 't', conflicts_with = "witness")]
    pub transaction: Option<PathBuf>,

    /// Re-prove from a previously written `witness.json`.
    #[arg(long, short = 'w')]
    pub witness: Option<PathBuf>,

    /// Output directory for the witness record, proof and calldata.
    #[arg(long, short = 'o', default_value = "proof")]
    pub out: PathBuf,

    /// Contract name used by the Foundry fixture.
    #[arg(long, default_value = DEFAULT_CONTRACT_NAME)]
    pub contract_name: String,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub dir: ArtifactDir,

    /// Calldata JSON written by `prove`.
    #[arg(long, short = 'c')]
    pub calldata: PathBuf,

    /// Also replay the pairing check of this generated contract.
    #[arg(long)]
    pub contract: Option<PathBuf>,
}

/// Arguments for `export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub dir: ArtifactDir,

    /// Destination `.sol` file.
    #[arg(long)]
    pub contract: PathBuf,

    /// Name of the generated contract.
    #[arg(long, default_value = DEFAULT_CONTRACT_NAME)]
    pub contract_name: String,
}

/// Arguments for `sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Message to sign (hashed with SHA-256).
    #[arg(long, short = 'm')]
    pub message: String,

    /// Hex secret key. A fresh key is generated when omitted.
    ///
    /// **Never pass a real key on the command line**; it ends up in shell
    /// history.
    #[arg(long, env = "SHADOWSIG_SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Where to write the transaction record.
    #[arg(long, short = 'o', default_value = "transaction.json")]
    pub out: PathBuf,
}

fn parse_arrangement(value: &str) -> Result<CircuitArrangement, String> {
    value.parse()
}
