//! # Non-native secp256k1 ECDSA
//!
//! secp256k1 coordinates live in a 256-bit field that does not embed in the
//! 254-bit BN254 scalar field, so every coordinate is a [`NonNativeFieldVar`]
//! and every field operation costs a few hundred constraints. The gadget
//! keeps the operation count down in three ways:
//!
//! 1. **Incomplete affine formulas.** Addition and doubling skip the
//!    special cases (`P = ±Q`, point at infinity). Divisions are a witness
//!    quotient checked with one multiplication.
//! 2. **Offset accumulator.** Scalar multiplications start from a fixed
//!    point `O` whose discrete log nobody knows, so the accumulator never
//!    hits infinity and never collides with the point being added, except
//!    with negligible probability. `O` is subtracted once at the end.
//! 3. **Fixed-base table for `G`.** The `2^i·G` multiples are constants, so
//!    `u1·G` needs additions only.
//!
//! Verification of `(e, r, s)` under `Q`:
//!
//! ```text
//! Q on curve;  w = s⁻¹;  u1 = e·w;  u2 = r·w
//! A = O + u2·Q + u1·G;   R = A - O
//! bits(R.x) == bits(r)
//! ```
//!
//! `R.x` is compared to `r` without the final reduction mod `n`, which only
//! loses signatures whose nonce point has `x ≥ n` (probability ≈ 2⁻¹²⁸).

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_ec::{AffineRepr, CurveGroup, Group};
use ark_ff::{Field, PrimeField};
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{nonnative::NonNativeFieldVar, FieldVar},
    select::CondSelectGadget,
    R1CSVar,
};
use ark_relations::r1cs::SynthesisError;
use ark_secp256k1::{Affine, Fq, Fr as Scalar, Projective};
use sha2::{Digest, Sha256};

use super::canonical_bits;
use crate::config::OFFSET_POINT_SEED;

/// Emulated secp256k1 base-field element.
pub type BaseVar = NonNativeFieldVar<Fq, Fr>;

/// Emulated secp256k1 scalar-field element.
pub type ScalarVar = NonNativeFieldVar<Scalar, Fr>;

/// `b` in `y² = x³ + b`.
const CURVE_B: u64 = 7;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The offset point, derived by try-and-increment hashing of
/// [`OFFSET_POINT_SEED`]. secp256k1 has cofactor 1, so any point on the
/// curve is in the prime-order group.
pub fn offset_point() -> Affine {
    static OFFSET: OnceLock<Affine> = OnceLock::new();
    *OFFSET.get_or_init(|| {
        let mut counter = 0u32;
        loop {
            let mut hasher = Sha256::new();
            hasher.update(OFFSET_POINT_SEED);
            hasher.update(counter.to_be_bytes());
            let x = Fq::from_be_bytes_mod_order(&hasher.finalize());
            let rhs = x.square() * x + Fq::from(CURVE_B);
            if let Some(y) = rhs.sqrt() {
                return Affine::new_unchecked(x, y);
            }
            counter += 1;
        }
    })
}

/// `[G, 2G, 4G, …, 2^255·G]`.
pub fn generator_table() -> &'static [Affine] {
    static TABLE: OnceLock<Vec<Affine>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut point = Projective::from(Affine::generator());
        let mut table = Vec::with_capacity(Scalar::MODULUS_BIT_SIZE as usize);
        for _ in 0..Scalar::MODULUS_BIT_SIZE {
            table.push(point);
            point.double_in_place();
        }
        Projective::normalize_batch(&table)
    })
}

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// Affine secp256k1 point with emulated coordinates. Never the identity.
#[derive(Clone, Debug)]
pub struct PointVar {
    /// x-coordinate.
    pub x: BaseVar,
    /// y-coordinate.
    pub y: BaseVar,
}

/// `num / den` as a single witness, enforced by `q · den = num`. Folds to a
/// constant when both operands are constant.
fn quotient(num: &BaseVar, den: &BaseVar) -> Result<BaseVar, SynthesisError> {
    if num.is_constant() && den.is_constant() {
        let inv = den.value()?.inverse().ok_or(SynthesisError::DivisionByZero)?;
        return Ok(BaseVar::constant(num.value()? * inv));
    }
    let cs = num.cs().or(den.cs());
    let q = BaseVar::new_witness(ark_relations::ns!(cs, "quotient"), || {
        let inv = den.value()?.inverse().ok_or(SynthesisError::DivisionByZero)?;
        Ok(num.value()? * inv)
    })?;
    q.mul_equals(den, num)?;
    Ok(q)
}

impl PointVar {
    /// Embed a native point as constants.
    pub fn constant(point: &Affine) -> Self {
        Self {
            x: BaseVar::constant(point.x),
            y: BaseVar::constant(point.y),
        }
    }

    /// Native value, if assigned.
    pub fn value(&self) -> Result<Affine, SynthesisError> {
        Ok(Affine::new_unchecked(self.x.value()?, self.y.value()?))
    }

    /// Enforce `y² = x³ + 7`.
    pub fn enforce_on_curve(&self) -> Result<(), SynthesisError> {
        let rhs = self.x.square()? * &self.x + Fq::from(CURVE_B);
        self.y.square()?.enforce_equal(&rhs)
    }

    /// `P + Q` for `P ≠ ±Q`.
    pub fn add_incomplete(&self, other: &Self) -> Result<Self, SynthesisError> {
        let lambda = quotient(&(&other.y - &self.y), &(&other.x - &self.x))?;
        let x = lambda.square()? - &self.x - &other.x;
        let y = &lambda * &(&self.x - &x) - &self.y;
        Ok(Self { x, y })
    }

    /// `2P` for `P` of order > 2.
    pub fn double_incomplete(&self) -> Result<Self, SynthesisError> {
        let numerator = self.x.square()? * Fq::from(3u64);
        let lambda = quotient(&numerator, &self.y.double()?)?;
        let x = lambda.square()? - &self.x.double()?;
        let y = &lambda * &(&self.x - &x) - &self.y;
        Ok(Self { x, y })
    }

    /// `if bit { a } else { b }`.
    pub fn select(bit: &Boolean<Fr>, a: &Self, b: &Self) -> Result<Self, SynthesisError> {
        Ok(Self {
            x: BaseVar::conditionally_select(bit, &a.x, &b.x)?,
            y: BaseVar::conditionally_select(bit, &a.y, &b.y)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Scalar multiplication
// ---------------------------------------------------------------------------

/// `acc + k·P`, with `k` given as little-endian bits. Double-and-add.
pub fn variable_base_mul(
    acc: &PointVar,
    bits: &[Boolean<Fr>],
    point: &PointVar,
) -> Result<PointVar, SynthesisError> {
    let mut acc = acc.clone();
    let mut base = point.clone();
    for (i, bit) in bits.iter().enumerate() {
        let sum = acc.add_incomplete(&base)?;
        acc = PointVar::select(bit, &sum, &acc)?;
        if i + 1 < bits.len() {
            base = base.double_incomplete()?;
        }
    }
    Ok(acc)
}

/// `acc + k·G` using [`generator_table`]. Additions only.
pub fn fixed_base_mul(acc: &PointVar, bits: &[Boolean<Fr>]) -> Result<PointVar, SynthesisError> {
    let table = generator_table();
    if bits.len() > table.len() {
        return Err(SynthesisError::Unsatisfiable);
    }
    let mut acc = acc.clone();
    for (bit, multiple) in bits.iter().zip(table) {
        let sum = acc.add_incomplete(&PointVar::constant(multiple))?;
        acc = PointVar::select(bit, &sum, &acc)?;
    }
    Ok(acc)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Enforce that `(r, s)` is a valid signature on the reduced digest `e`
/// under `public_key`.
pub fn enforce_ecdsa(
    e: &ScalarVar,
    r: &ScalarVar,
    s: &ScalarVar,
    public_key: &PointVar,
) -> Result<(), SynthesisError> {
    enforce_ecdsa_bounded(e, r, s, public_key, Scalar::MODULUS_BIT_SIZE as usize)
}

/// [`enforce_ecdsa`] for signatures whose multipliers `u1` and `u2` fit in
/// `scalar_bits` bits. The bits above are enforced zero, so every satisfying
/// assignment is also a valid signature; the scalar multiplications cost
/// `scalar_bits` steps each instead of 256.
pub fn enforce_ecdsa_bounded(
    e: &ScalarVar,
    r: &ScalarVar,
    s: &ScalarVar,
    public_key: &PointVar,
    scalar_bits: usize,
) -> Result<(), SynthesisError> {
    public_key.enforce_on_curve()?;

    // r ≠ 0 and s ≠ 0: both must be invertible.
    let _ = r.inverse()?;
    let w = s.inverse()?;
    let u1 = e * &w;
    let u2 = r * &w;

    let offset = offset_point();
    let acc = PointVar::constant(&offset);
    let acc = variable_base_mul(&acc, &low_bits(&u2, scalar_bits)?, public_key)?;
    let acc = fixed_base_mul(&acc, &low_bits(&u1, scalar_bits)?)?;
    let nonce_point = acc.add_incomplete(&PointVar::constant(&-offset))?;

    canonical_bits(&nonce_point.x)?[..].enforce_equal(&canonical_bits(r)?[..])
}

/// The low `width` canonical bits of `value`, with every higher bit
/// enforced zero.
fn low_bits(value: &ScalarVar, width: usize) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let mut bits = canonical_bits(value)?;
    if width > bits.len() {
        return Err(SynthesisError::Unsatisfiable);
    }
    for bit in &bits[width..] {
        bit.enforce_equal(&Boolean::FALSE)?;
    }
    bits.truncate(width);
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ecdsa::{base_to_scalar, hash_to_scalar, verify_reduced, Signature, SigningKey};
    use ark_ff::UniformRand;
    use ark_relations::r1cs::{ConstraintSystem, ConstraintSystemRef};
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    fn witness_point(
        cs: &ark_relations::r1cs::ConstraintSystemRef<Fr>,
        point: Affine,
    ) -> PointVar {
        PointVar {
            x: BaseVar::new_witness(cs.clone(), || Ok(point.x)).unwrap(),
            y: BaseVar::new_witness(cs.clone(), || Ok(point.y)).unwrap(),
        }
    }

    #[test]
    fn offset_point_is_on_curve() {
        let o = offset_point();
        assert!(o.is_on_curve());
        assert!(!o.is_zero());
        assert_ne!(o, Affine::generator());
    }

    #[test]
    fn table_doubles() {
        let table = generator_table();
        assert_eq!(table.len(), 256);
        assert_eq!(table[0], Affine::generator());
        assert_eq!(table[3], (Affine::generator() * Scalar::from(8u64)).into_affine());
    }

    #[test]
    fn add_and_double_match_native() {
        let mut rng = StdRng::seed_from_u64(5);
        let p = Projective::rand(&mut rng).into_affine();
        let q = Projective::rand(&mut rng).into_affine();

        let cs = ConstraintSystem::<Fr>::new_ref();
        let pv = witness_point(&cs, p);
        let qv = witness_point(&cs, q);
        pv.enforce_on_curve().unwrap();

        assert_eq!(pv.add_incomplete(&qv).unwrap().value().unwrap(), (p + q).into_affine());
        assert_eq!(pv.double_incomplete().unwrap().value().unwrap(), (p + p).into_affine());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn off_curve_point_is_unsatisfied() {
        let mut rng = StdRng::seed_from_u64(5);
        let p = Projective::rand(&mut rng).into_affine();
        let bad = Affine::new_unchecked(p.x, p.y + Fq::from(1u64));

        let cs = ConstraintSystem::<Fr>::new_ref();
        witness_point(&cs, bad).enforce_on_curve().unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn short_scalar_multiplications_match_native() {
        let mut rng = StdRng::seed_from_u64(6);
        let q = Projective::rand(&mut rng).into_affine();
        let k = 0b1011_0110u64;

        let cs = ConstraintSystem::<Fr>::new_ref();
        let bits: Vec<_> = (0..8)
            .map(|i| Boolean::new_witness(cs.clone(), || Ok((k >> i) & 1 == 1)).unwrap())
            .collect();
        let qv = witness_point(&cs, q);
        let start = PointVar::constant(&offset_point());

        let var = variable_base_mul(&start, &bits, &qv).unwrap();
        let expected = q * Scalar::from(k) + offset_point();
        assert_eq!(var.value().unwrap(), expected.into_affine());

        let fixed = fixed_base_mul(&start, &bits).unwrap();
        let expected = Affine::generator() * Scalar::from(k) + offset_point();
        assert_eq!(fixed.value().unwrap(), expected.into_affine());

        assert!(cs.is_satisfied().unwrap());
    }

    /// A valid signature on `e` under `q` whose multipliers are exactly
    /// `u1` and `u2`: `R = u1·G + u2·Q`, `r = R.x`, `s = r / u2`, `e = u1·s`.
    fn signature_with_multipliers(q: Affine, u1: u64, u2: u64) -> (Scalar, Signature) {
        let (u1, u2) = (Scalar::from(u1), Scalar::from(u2));
        let nonce_point = (Affine::generator() * u1 + q * u2).into_affine();
        assert!(nonce_point.x.into_bigint() < Scalar::MODULUS);
        let r = base_to_scalar(&nonce_point.x);
        let s = r * u2.inverse().unwrap();
        (u1 * s, Signature { r, s })
    }

    fn bounded_system(q: Affine, e: Scalar, sig: &Signature) -> ConstraintSystemRef<Fr> {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let e = ScalarVar::new_witness(cs.clone(), || Ok(e)).unwrap();
        let r = ScalarVar::new_witness(cs.clone(), || Ok(sig.r)).unwrap();
        let s = ScalarVar::new_witness(cs.clone(), || Ok(sig.s)).unwrap();
        let qv = witness_point(&cs, q);
        enforce_ecdsa_bounded(&e, &r, &s, &qv, 8).unwrap();
        cs
    }

    #[test]
    fn bounded_signature_satisfies() {
        let mut rng = StdRng::seed_from_u64(8);
        let q = Projective::rand(&mut rng).into_affine();
        let (e, sig) = signature_with_multipliers(q, 181, 77);
        assert!(verify_reduced(&q, &e, &sig));

        let cs = bounded_system(q, e, &sig);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn bounded_signature_under_another_key_is_unsatisfied() {
        let mut rng = StdRng::seed_from_u64(8);
        let q = Projective::rand(&mut rng).into_affine();
        let other = Projective::rand(&mut rng).into_affine();
        let (e, sig) = signature_with_multipliers(q, 181, 77);

        let cs = bounded_system(other, e, &sig);
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn bounded_signature_with_tampered_s_is_unsatisfied() {
        let mut rng = StdRng::seed_from_u64(8);
        let q = Projective::rand(&mut rng).into_affine();
        let (e, mut sig) = signature_with_multipliers(q, 181, 77);
        sig.s += Scalar::from(1u64);

        let cs = bounded_system(q, e, &sig);
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn bounded_signature_on_another_digest_is_unsatisfied() {
        let mut rng = StdRng::seed_from_u64(8);
        let q = Projective::rand(&mut rng).into_affine();
        let (e, sig) = signature_with_multipliers(q, 181, 77);

        let cs = bounded_system(q, e + Scalar::from(1u64), &sig);
        assert!(!cs.is_satisfied().unwrap());
    }

    /// Full verification synthesizes a few million constraints.
    #[test]
    #[ignore = "multi-million-constraint synthesis; run with --ignored"]
    fn valid_signature_satisfies() {
        let mut rng = StdRng::seed_from_u64(7);
        let key = SigningKey::random(&mut rng);
        let (digest, sig) = key.sign(b"ownership", &mut rng);

        let cs = ConstraintSystem::<Fr>::new_ref();
        let e = ScalarVar::new_witness(cs.clone(), || Ok(hash_to_scalar(&digest))).unwrap();
        let r = ScalarVar::new_witness(cs.clone(), || Ok(sig.r)).unwrap();
        let s = ScalarVar::new_witness(cs.clone(), || Ok(sig.s)).unwrap();
        let q = witness_point(&cs, key.public_key());
        enforce_ecdsa(&e, &r, &s, &q).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    #[ignore = "multi-million-constraint synthesis; run with --ignored"]
    fn forged_signature_is_unsatisfied() {
        let mut rng = StdRng::seed_from_u64(7);
        let key = SigningKey::random(&mut rng);
        let (digest, sig) = key.sign(b"ownership", &mut rng);

        let cs = ConstraintSystem::<Fr>::new_ref();
        let e = ScalarVar::new_witness(cs.clone(), || Ok(hash_to_scalar(&digest))).unwrap();
        let r = ScalarVar::new_witness(cs.clone(), || Ok(sig.r)).unwrap();
        let s = ScalarVar::new_witness(cs.clone(), || Ok(sig.s + Scalar::from(1u64))).unwrap();
        let q = witness_point(&cs, key.public_key());
        enforce_ecdsa(&e, &r, &s, &q).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
