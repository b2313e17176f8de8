//! EVM calldata for `verifyProof(uint256[8], uint256[N])`.
//!
//! Proof words are laid out the way the BN254 pairing precompile reads G2
//! points, imaginary part first:
//!
//! ```text
//! [A.x, A.y, B.x.c1, B.x.c0, B.y.c1, B.y.c0, C.x, C.y]
//! ```
//!
//! Both arrays are static, so the ABI encoding is the 4-byte selector
//! followed by `8 + N` big-endian words with no offsets.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_groth16::Proof;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::crypto::field::{from_biguint, to_biguint};
use crate::error::{ProtocolError, Result};
use crate::zkp::verifier::parse_public_inputs;

/// Width of one ABI word.
const WORD: usize = 32;

/// Decimal calldata, as written to `calldata.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calldata {
    /// Proof coordinates in precompile order.
    pub proof: [String; 8],
    /// Public inputs in declaration order.
    pub public_inputs: Vec<String>,
}

/// Calldata for `proof` and `public_inputs`.
pub fn export_calldata(proof: &Proof<Bn254>, public_inputs: &[Fr]) -> Calldata {
    let words = proof_words(proof);
    Calldata {
        proof: words.map(|w| w.to_str_radix(10)),
        public_inputs: public_inputs.iter().map(|x| to_biguint(x).to_str_radix(10)).collect(),
    }
}

impl Calldata {
    /// Solidity signature of the verifier entry point for this input count.
    pub fn function_signature(&self) -> String {
        function_signature(self.public_inputs.len())
    }

    /// Rebuild the proof, checking every coordinate is canonical and every
    /// point lies in its group.
    pub fn to_proof(&self) -> Result<Proof<Bn254>> {
        let mut words = Vec::with_capacity(8);
        for (i, w) in self.proof.iter().enumerate() {
            let word = parse_uint(w)
                .map_err(|reason| ProtocolError::Structural(format!("proof word {i}: {reason}")))?;
            words.push(word);
        }
        proof_from_words(&words)
    }

    /// Parse the public inputs.
    pub fn public_input_values(&self) -> Result<Vec<Fr>> {
        parse_public_inputs(&self.public_inputs)
    }

    /// ABI-encoded call: selector followed by the static arrays.
    pub fn abi_encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(4 + WORD * (8 + self.public_inputs.len()));
        out.extend_from_slice(&selector(&self.function_signature()));
        for (i, w) in self.proof.iter().chain(&self.public_inputs).enumerate() {
            let word = parse_uint(w)
                .map_err(|reason| ProtocolError::Structural(format!("calldata word {i}: {reason}")))?;
            let bytes = word.to_bytes_be();
            if bytes.len() > WORD {
                return Err(ProtocolError::Structural(format!("calldata word {i} exceeds 256 bits")));
            }
            out.extend(std::iter::repeat(0u8).take(WORD - bytes.len()));
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Decode ABI bytes produced by [`Calldata::abi_encode`].
    pub fn from_abi(bytes: &[u8], num_public_inputs: usize) -> Result<Self> {
        let expected = 4 + WORD * (8 + num_public_inputs);
        if bytes.len() != expected {
            return Err(ProtocolError::Structural(format!(
                "calldata is {} bytes, expected {expected}",
                bytes.len()
            )));
        }
        if bytes[..4] != selector(&function_signature(num_public_inputs)) {
            return Err(ProtocolError::Structural("function selector mismatch".into()));
        }
        let mut words = bytes[4..]
            .chunks(WORD)
            .map(|w| BigUint::from_bytes_be(w).to_str_radix(10));
        let mut proof: [String; 8] = Default::default();
        for slot in proof.iter_mut() {
            *slot = words.next().unwrap_or_default();
        }
        Ok(Self {
            proof,
            public_inputs: words.collect(),
        })
    }
}

/// `verifyProof(uint256[8],uint256[N])`.
pub fn function_signature(num_public_inputs: usize) -> String {
    format!("verifyProof(uint256[8],uint256[{num_public_inputs}])")
}

/// First four bytes of the Keccak-256 of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// `(x, y)`; the point at infinity is `(0, 0)`.
pub(crate) fn g1_words(p: &G1Affine) -> [BigUint; 2] {
    match p.xy() {
        Some((x, y)) => [to_biguint(x), to_biguint(y)],
        None => [BigUint::default(), BigUint::default()],
    }
}

/// `(x.c1, x.c0, y.c1, y.c0)`; the point at infinity is all zeros.
pub(crate) fn g2_words(p: &G2Affine) -> [BigUint; 4] {
    match p.xy() {
        Some((x, y)) => [
            to_biguint(&x.c1),
            to_biguint(&x.c0),
            to_biguint(&y.c1),
            to_biguint(&y.c0),
        ],
        None => Default::default(),
    }
}

fn proof_words(proof: &Proof<Bn254>) -> [BigUint; 8] {
    let [ax, ay] = g1_words(&proof.a);
    let [bx1, bx0, by1, by0] = g2_words(&proof.b);
    let [cx, cy] = g1_words(&proof.c);
    [ax, ay, bx1, bx0, by1, by0, cx, cy]
}

pub(crate) fn g1_from_words(x: &BigUint, y: &BigUint) -> std::result::Result<G1Affine, String> {
    let (x, y) = (base(x)?, base(y)?);
    if x == Fq::from(0u64) && y == Fq::from(0u64) {
        return Ok(G1Affine::zero());
    }
    let p = G1Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G1 point is not on the curve".into());
    }
    Ok(p)
}

pub(crate) fn g2_from_words(words: &[BigUint]) -> std::result::Result<G2Affine, String> {
    let [x1, x0, y1, y0] = words else {
        return Err("G2 point needs four words".into());
    };
    let x = Fq2::new(base(x0)?, base(x1)?);
    let y = Fq2::new(base(y0)?, base(y1)?);
    if x == Fq2::from(0u64) && y == Fq2::from(0u64) {
        return Ok(G2Affine::zero());
    }
    let p = G2Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G2 point is not in the prime-order subgroup".into());
    }
    Ok(p)
}

pub(crate) fn proof_from_words(words: &[BigUint]) -> Result<Proof<Bn254>> {
    let structural = |part: &str| {
        let part = part.to_string();
        move |reason: String| ProtocolError::Structural(format!("proof {part}: {reason}"))
    };
    if words.len() != 8 {
        return Err(ProtocolError::Structural(format!(
            "proof has {} words, expected 8",
            words.len()
        )));
    }
    Ok(Proof {
        a: g1_from_words(&words[0], &words[1]).map_err(structural("A"))?,
        b: g2_from_words(&words[2..6]).map_err(structural("B"))?,
        c: g1_from_words(&words[6], &words[7]).map_err(structural("C"))?,
    })
}

fn base(word: &BigUint) -> std::result::Result<Fq, String> {
    from_biguint::<Fq>(word).ok_or_else(|| "coordinate is not below the base-field modulus".into())
}

/// Parse a canonical decimal unsigned integer.
pub(crate) fn parse_uint(value: &str) -> std::result::Result<BigUint, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("`{value}` is not a decimal integer"));
    }
    if value.len() > 1 && value.starts_with('0') {
        return Err(format!("`{value}` has leading zeros"));
    }
    BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(|| format!("`{value}` is not a decimal integer"))
}
