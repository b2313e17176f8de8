//! Solidity Groth16 verifier and Foundry fixture generation.
//!
//! The emitted contract embeds the verifying key as `uint256 constant`
//! literals and checks
//!
//! ```text
//! e(-A, B) · e(α, β) · e(vk_x, γ) · e(C, δ) == 1,   vk_x = IC₀ + Σ inputᵢ · ICᵢ₊₁
//! ```
//!
//! with the BN254 precompiles `0x06` (add), `0x07` (mul), `0x08` (pairing).
//! [`replay`] reads the constants back out of a generated source and
//! evaluates the same equation natively, so contract and key can be checked
//! against each other without an EVM.

use std::collections::HashMap;
use std::fmt::Write;

use ark_bn254::{Bn254, Fq, Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::One;
use ark_groth16::VerifyingKey;
use num_bigint::BigUint;

use super::calldata::{g1_from_words, g1_words, g2_from_words, g2_words, parse_uint, Calldata};
use crate::config::SOLIDITY_PRAGMA;
use crate::crypto::field::{from_biguint, modulus_of};
use crate::error::{ProtocolError, Result};
use crate::zkp::artifact::ArtifactKind;
use crate::zkp::circuit::CircuitDescriptor;
use crate::zkp::verifier::Verdict;

/// Verifier contract source for `vk`.
pub fn export_verifier_source(vk: &VerifyingKey<Bn254>, name: &str) -> Result<String> {
    render(vk, name, None)
}

/// Verifier contract source annotated with the circuit's input labels.
/// The key must match the descriptor's input count.
pub fn export_labeled_verifier_source(
    vk: &VerifyingKey<Bn254>,
    name: &str,
    descriptor: &CircuitDescriptor,
) -> Result<String> {
    let inputs = vk.gamma_abc_g1.len().saturating_sub(1);
    if inputs != descriptor.num_public_inputs() {
        return Err(ProtocolError::deserialization(
            ArtifactKind::VerifyingKey,
            format!(
                "key has {inputs} public inputs, arrangement {} has {}",
                descriptor.arrangement,
                descriptor.num_public_inputs()
            ),
        ));
    }
    render(vk, name, Some((descriptor.arrangement.to_string(), descriptor.public_input_labels())))
}

fn render(
    vk: &VerifyingKey<Bn254>,
    name: &str,
    labels: Option<(String, Vec<String>)>,
) -> Result<String> {
    validate_identifier(name)?;
    if vk.gamma_abc_g1.is_empty() {
        return Err(ProtocolError::deserialization(
            ArtifactKind::VerifyingKey,
            "verifying key has no input bases",
        ));
    }
    let n = vk.gamma_abc_g1.len() - 1;

    // `write!` into a String cannot fail; results are discarded below.
    let mut s = String::new();
    let _ = writeln!(s, "// SPDX-License-Identifier: MIT");
    let _ = writeln!(s, "pragma solidity {SOLIDITY_PRAGMA};");
    let _ = writeln!(s);
    let _ = writeln!(s, "/// @title {name}");
    match &labels {
        Some((arrangement, _)) => {
            let _ = writeln!(s, "/// @notice Groth16 (BN254) verifier for the `{arrangement}` ownership circuit.");
        }
        None => {
            let _ = writeln!(s, "/// @notice Groth16 (BN254) verifier.");
        }
    }
    let _ = writeln!(s, "/// @dev Generated from a verifying key. Do not edit.");
    let _ = writeln!(s, "contract {name} {{");
    let _ = writeln!(s, "    uint256 constant R = {};", modulus_of::<Fr>());
    let _ = writeln!(s, "    uint256 constant Q = {};", modulus_of::<Fq>());
    let _ = writeln!(s);

    let [ax, ay] = g1_words(&vk.alpha_g1);
    let _ = writeln!(s, "    uint256 constant ALPHA_X = {ax};");
    let _ = writeln!(s, "    uint256 constant ALPHA_Y = {ay};");
    for (label, point) in [("BETA", &vk.beta_g2), ("GAMMA", &vk.gamma_g2), ("DELTA", &vk.delta_g2)] {
        let [x1, x0, y1, y0] = g2_words(point);
        let _ = writeln!(s, "    uint256 constant {label}_X1 = {x1};");
        let _ = writeln!(s, "    uint256 constant {label}_X0 = {x0};");
        let _ = writeln!(s, "    uint256 constant {label}_Y1 = {y1};");
        let _ = writeln!(s, "    uint256 constant {label}_Y0 = {y0};");
    }
    let _ = writeln!(s);
    for (i, point) in vk.gamma_abc_g1.iter().enumerate() {
        let [x, y] = g1_words(point);
        match (i, &labels) {
            (0, _) => {
                let _ = writeln!(s, "    // constant term");
            }
            (i, Some((_, names))) => {
                if let Some(label) = names.get(i - 1) {
                    let _ = writeln!(s, "    // input[{}]: {label}", i - 1);
                }
            }
            _ => {}
        }
        let _ = writeln!(s, "    uint256 constant IC{i}_X = {x};");
        let _ = writeln!(s, "    uint256 constant IC{i}_Y = {y};");
    }
    let _ = writeln!(s);

    let accumulate: String = (1..=n)
        .map(|i| format!("        ok = ok && _accumulate(acc, IC{i}_X, IC{i}_Y, input[{}]);\n", i - 1))
        .collect();
    let _ = write!(
        s,
        r#"    /// @param proof [A.x, A.y, B.x1, B.x0, B.y1, B.y0, C.x, C.y]
    /// @param input public inputs, each below R
    function verifyProof(uint256[8] calldata proof, uint256[{n}] calldata input) external view returns (bool) {{
        for (uint256 i = 0; i < 8; i++) {{
            if (proof[i] >= Q) return false;
        }}
        for (uint256 i = 0; i < {n}; i++) {{
            if (input[i] >= R) return false;
        }}

        uint256[2] memory acc = [IC0_X, IC0_Y];
        bool ok = true;
{accumulate}        if (!ok) return false;

        uint256[24] memory p;
        p[0] = proof[0];
        p[1] = (Q - proof[1]) % Q;
        p[2] = proof[2];
        p[3] = proof[3];
        p[4] = proof[4];
        p[5] = proof[5];
        p[6] = ALPHA_X;
        p[7] = ALPHA_Y;
        p[8] = BETA_X1;
        p[9] = BETA_X0;
        p[10] = BETA_Y1;
        p[11] = BETA_Y0;
        p[12] = acc[0];
        p[13] = acc[1];
        p[14] = GAMMA_X1;
        p[15] = GAMMA_X0;
        p[16] = GAMMA_Y1;
        p[17] = GAMMA_Y0;
        p[18] = proof[6];
        p[19] = proof[7];
        p[20] = DELTA_X1;
        p[21] = DELTA_X0;
        p[22] = DELTA_Y1;
        p[23] = DELTA_Y0;

        uint256[1] memory out;
        assembly {{
            ok := staticcall(gas(), 0x08, p, 768, out, 0x20)
        }}
        return ok && out[0] == 1;
    }}

    /// @dev acc += scalar * (x, y), via ecMul (0x07) and ecAdd (0x06).
    function _accumulate(uint256[2] memory acc, uint256 x, uint256 y, uint256 scalar) private view returns (bool ok) {{
        uint256[3] memory mulIn = [x, y, scalar];
        uint256[4] memory addIn;
        assembly {{
            ok := staticcall(gas(), 0x07, mulIn, 96, add(addIn, 64), 64)
        }}
        if (!ok) return false;
        addIn[0] = acc[0];
        addIn[1] = acc[1];
        assembly {{
            ok := staticcall(gas(), 0x06, addIn, 128, acc, 64)
        }}
    }}
}}
"#
    );
    Ok(s)
}

/// Foundry test asserting that `contract` accepts `calldata` and rejects it
/// once the first public input is bumped.
pub fn export_foundry_test(contract: &str, calldata: &Calldata) -> Result<String> {
    validate_identifier(contract)?;
    let n = calldata.public_inputs.len();
    let assignments: String = calldata
        .proof
        .iter()
        .enumerate()
        .map(|(i, w)| format!("        proof[{i}] = {w};\n"))
        .chain(
            calldata
                .public_inputs
                .iter()
                .enumerate()
                .map(|(i, w)| format!("        input[{i}] = {w};\n")),
        )
        .collect();

    Ok(format!(
        r#"// SPDX-License-Identifier: MIT
pragma solidity {SOLIDITY_PRAGMA};

import {{Test}} from "forge-std/Test.sol";
import {{{contract}}} from "../src/{contract}.sol";

contract {contract}Test is Test {{
    uint256 constant R = {r};

    {contract} verifier;

    function setUp() public {{
        verifier = new {contract}();
    }}

    function _fixture() internal pure returns (uint256[8] memory proof, uint256[{n}] memory input) {{
{assignments}    }}

    function test_acceptsProof() public view {{
        (uint256[8] memory proof, uint256[{n}] memory input) = _fixture();
        assertTrue(verifier.verifyProof(proof, input));
    }}

    function test_rejectsTamperedInput() public view {{
        (uint256[8] memory proof, uint256[{n}] memory input) = _fixture();
        input[0] = addmod(input[0], 1, R);
        assertFalse(verifier.verifyProof(proof, input));
    }}
}}
"#,
        r = modulus_of::<Fr>(),
    ))
}

/// Evaluate a generated verifier's pairing check natively.
///
/// Mirrors the contract: out-of-range words and invalid points make it
/// return `Rejected`, not an error. A source whose constants cannot be read
/// back is `Err(Structural)`.
pub fn replay(source: &str, calldata: &Calldata) -> Result<Verdict> {
    let constants = parse_constants(source);
    let get = |name: &str| {
        constants
            .get(name)
            .cloned()
            .ok_or_else(|| ProtocolError::Structural(format!("constant {name} missing from source")))
    };
    let g1 = |prefix: &str, x: &str, y: &str| -> Result<G1Affine> {
        g1_from_words(&get(x)?, &get(y)?)
            .map_err(|e| ProtocolError::Structural(format!("{prefix}: {e}")))
    };
    let g2 = |prefix: &str| -> Result<G2Affine> {
        let words = [
            get(&format!("{prefix}_X1"))?,
            get(&format!("{prefix}_X0"))?,
            get(&format!("{prefix}_Y1"))?,
            get(&format!("{prefix}_Y0"))?,
        ];
        g2_from_words(&words).map_err(|e| ProtocolError::Structural(format!("{prefix}: {e}")))
    };

    let alpha = g1("ALPHA", "ALPHA_X", "ALPHA_Y")?;
    let (beta, gamma, delta) = (g2("BETA")?, g2("GAMMA")?, g2("DELTA")?);
    let mut ic = Vec::new();
    while constants.contains_key(&format!("IC{}_X", ic.len())) {
        let i = ic.len();
        ic.push(g1("IC", &format!("IC{i}_X"), &format!("IC{i}_Y"))?);
    }
    if ic.len() != calldata.public_inputs.len() + 1 {
        return Err(ProtocolError::Structural(format!(
            "contract takes {} public inputs, calldata has {}",
            ic.len().saturating_sub(1),
            calldata.public_inputs.len()
        )));
    }

    let mut vk_x: G1Projective = ic[0].into_group();
    for (word, base) in calldata.public_inputs.iter().zip(&ic[1..]) {
        let Some(scalar) = parse_uint(word).ok().and_then(|v| from_biguint::<Fr>(&v)) else {
            return Ok(Verdict::Rejected);
        };
        vk_x += *base * scalar;
    }

    let Ok(proof) = calldata.to_proof() else {
        return Ok(Verdict::Rejected);
    };
    let result = Bn254::multi_pairing(
        [(-proof.a.into_group()).into_affine(), alpha, vk_x.into_affine(), proof.c],
        [proof.b, beta, gamma, delta],
    );
    Ok(if result.0.is_one() {
        Verdict::Accepted
    } else {
        Verdict::Rejected
    })
}

/// `uint256 constant NAME = DIGITS;` lines of a generated source.
fn parse_constants(source: &str) -> HashMap<String, BigUint> {
    source
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("uint256 constant ")?;
            let (name, value) = rest.strip_suffix(';')?.split_once(" = ")?;
            Some((name.to_string(), parse_uint(value).ok()?))
        })
        .collect()
}

fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ProtocolError::decode("contract", format!("`{name}` is not a Solidity identifier")))
    }
}
