//! # Field Parameter Descriptors
//!
//! The signing curve (secp256k1) lives over fields that differ from the
//! proving field (BN254 `Fr`). Every secp256k1 value that crosses into the
//! circuit is therefore described by a [`FieldParams`]: its modulus and the
//! limb geometry used to expose it as public inputs.
//!
//! A [`SigningCurve`] bundles the base-field and scalar-field descriptors and
//! acts as the per-curve strategy handed to the circuit builder. Compilation
//! validates the descriptor against the emulated field types, so a mismatch
//! surfaces as a compile error rather than as an unsatisfiable witness.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

use crate::config::{LIMB_BITS, NUM_LIMBS};

/// Modulus and limb geometry of an emulated prime field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldParams {
    /// Short name, folded into circuit identifiers.
    pub name: &'static str,
    /// Field modulus.
    pub modulus: BigUint,
    /// Width of each public limb, in bits.
    pub limb_bits: usize,
    /// Number of public limbs.
    pub num_limbs: usize,
}

impl FieldParams {
    /// Descriptor for the prime field `F` with the given limb geometry.
    pub fn of<F: PrimeField>(name: &'static str, limb_bits: usize, num_limbs: usize) -> Self {
        Self {
            name,
            modulus: modulus_of::<F>(),
            limb_bits,
            num_limbs,
        }
    }

    /// Bit length of the modulus.
    pub fn modulus_bits(&self) -> usize {
        self.modulus.bits() as usize
    }

    /// Check the limb geometry: limbs must fit in the proving field and
    /// together cover every value below the modulus.
    pub fn validate(&self) -> Result<(), String> {
        if self.limb_bits == 0 || self.num_limbs == 0 {
            return Err(format!("{}: empty limb geometry", self.name));
        }
        if self.limb_bits >= Fr::MODULUS_BIT_SIZE as usize {
            return Err(format!(
                "{}: {}-bit limbs do not fit in the {}-bit proving field",
                self.name,
                self.limb_bits,
                Fr::MODULUS_BIT_SIZE
            ));
        }
        if self.limb_bits * self.num_limbs < self.modulus_bits() {
            return Err(format!(
                "{}: {} limbs of {} bits cannot hold a {}-bit modulus",
                self.name,
                self.num_limbs,
                self.limb_bits,
                self.modulus_bits()
            ));
        }
        Ok(())
    }

    /// `true` if `value` is a canonical element of this field.
    pub fn contains(&self, value: &BigUint) -> bool {
        value < &self.modulus
    }

    /// Split `value` into little-endian limbs, each embedded in `Fr`.
    pub fn limbs(&self, value: &BigUint) -> Vec<Fr> {
        let mask = (BigUint::from(1u8) << self.limb_bits) - 1u8;
        (0..self.num_limbs)
            .map(|i| {
                let limb = (value >> (i * self.limb_bits)) & &mask;
                Fr::from_le_bytes_mod_order(&limb.to_bytes_le())
            })
            .collect()
    }

    /// Inverse of [`FieldParams::limbs`]. Returns `None` when the limb count
    /// is wrong or a limb overflows its width.
    pub fn recompose(&self, limbs: &[Fr]) -> Option<BigUint> {
        if limbs.len() != self.num_limbs {
            return None;
        }
        let mut value = BigUint::default();
        for (i, limb) in limbs.iter().enumerate() {
            let limb = to_biguint(limb);
            if limb.bits() as usize > self.limb_bits {
                return None;
            }
            value |= limb << (i * self.limb_bits);
        }
        Some(value)
    }

    /// Stable textual description, hashed into circuit identifiers.
    pub fn describe(&self) -> String {
        format!(
            "{}:{}:{}x{}",
            self.name,
            self.modulus.to_str_radix(16),
            self.num_limbs,
            self.limb_bits
        )
    }
}

/// Descriptor of a signing curve: its base field (coordinates) and scalar
/// field (signature scalars, message hash).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningCurve {
    /// Curve name.
    pub name: &'static str,
    /// Coordinate field.
    pub base: FieldParams,
    /// Group-order field.
    pub scalar: FieldParams,
}

impl SigningCurve {
    /// secp256k1 with 4 × 64-bit public limbs.
    pub fn secp256k1() -> Self {
        Self {
            name: "secp256k1",
            base: FieldParams::of::<ark_secp256k1::Fq>("secp256k1.fp", LIMB_BITS, NUM_LIMBS),
            scalar: FieldParams::of::<ark_secp256k1::Fr>("secp256k1.fn", LIMB_BITS, NUM_LIMBS),
        }
    }

    /// Check that this descriptor matches the field types `Base` and
    /// `Scalar` the circuit actually emulates.
    pub fn validate_against<Base: PrimeField, Scalar: PrimeField>(&self) -> Result<(), String> {
        self.base.validate()?;
        self.scalar.validate()?;
        if self.base.modulus != modulus_of::<Base>() {
            return Err(format!(
                "{}: base-field modulus does not match the emulated field",
                self.name
            ));
        }
        if self.scalar.modulus != modulus_of::<Scalar>() {
            return Err(format!(
                "{}: scalar-field modulus does not match the emulated field",
                self.name
            ));
        }
        Ok(())
    }

    /// Stable textual description, hashed into circuit identifiers.
    pub fn describe(&self) -> String {
        format!("{}|{}|{}", self.name, self.base.describe(), self.scalar.describe())
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Modulus of `F` as a big unsigned integer.
pub fn modulus_of<F: PrimeField>() -> BigUint {
    BigUint::from_bytes_le(&F::MODULUS.to_bytes_le())
}

/// Canonical integer value of a field element.
pub fn to_biguint<F: PrimeField>(value: &F) -> BigUint {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le())
}

/// Field element for `value`, or `None` if `value` is not below the modulus.
pub fn from_biguint<F: PrimeField>(value: &BigUint) -> Option<F> {
    if value >= &modulus_of::<F>() {
        return None;
    }
    Some(F::from_le_bytes_mod_order(&value.to_bytes_le()))
}

/// Decimal rendering of a field element, as Solidity literals expect.
pub fn to_decimal<F: PrimeField>(value: &F) -> String {
    to_biguint(value).to_str_radix(10)
}

/// Big-endian fixed-width encoding of a field element.
pub fn to_be_bytes32<F: PrimeField>(value: &F) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = value.into_bigint().to_bytes_be();
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}
