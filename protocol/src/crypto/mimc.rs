//! # MiMC over BN254
//!
//! The algebraic commitment hash. MiMC is cheap inside an R1CS over `Fr`
//! because each round is a single power map: three multiplication gates per
//! round with exponent 5, versus tens of thousands of constraints for one
//! SHA-256 compression.
//!
//! ## Construction
//!
//! ```text
//! E_k(x):   for c_i in constants:  x = (x + k + c_i)^5
//!           return x + k
//!
//! H(m_1..m_n):  h_0 = 0
//!               h_i = E_{h_{i-1}}(m_i) + h_{i-1} + m_i      (Miyaguchi–Preneel)
//! ```
//!
//! `gcd(5, r - 1) = 1` for the BN254 scalar field, so `x ↦ x^5` is a
//! permutation. Round constants follow gnark-crypto's MiMC-BN254 derivation:
//! a Keccak-256 chain over [`MIMC_SEED`], where the first constant is the
//! hash of the pre-hashed seed and each value is read big-endian mod `r`.
//! With the same seed and round count the hash agrees with gnark's. The
//! in-circuit gadget
//! (`zkp::gadgets::mimc`) reads the same constants through [`Mimc::shared`].

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_ff::{Field, PrimeField, Zero};
use sha3::{Digest, Keccak256};

use crate::config::{MIMC_ROUNDS, MIMC_SEED};

/// Exponent of the round function.
pub const MIMC_EXPONENT: u64 = 5;

/// MiMC permutation parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mimc {
    constants: Vec<Fr>,
}

impl Mimc {
    /// Derive `rounds` round constants from `seed`.
    pub fn new(seed: &[u8], rounds: usize) -> Self {
        let mut state: [u8; 32] = Keccak256::digest(seed).into();
        let mut constants = Vec::with_capacity(rounds);
        for _ in 0..rounds {
            state = Keccak256::digest(state).into();
            constants.push(Fr::from_be_bytes_mod_order(&state));
        }
        Self { constants }
    }

    /// The process-wide instance with the protocol's seed and round count.
    pub fn shared() -> &'static Mimc {
        static SHARED: OnceLock<Mimc> = OnceLock::new();
        SHARED.get_or_init(|| Mimc::new(MIMC_SEED, MIMC_ROUNDS))
    }

    /// Round constants, in application order.
    pub fn constants(&self) -> &[Fr] {
        &self.constants
    }

    /// Keyed permutation `E_key(x)`.
    pub fn permute(&self, x: Fr, key: Fr) -> Fr {
        let mut x = x;
        for c in &self.constants {
            x = (x + key + c).pow([MIMC_EXPONENT]);
        }
        x + key
    }

    /// Miyaguchi–Preneel compression of a sequence of field elements.
    pub fn hash(&self, elements: &[Fr]) -> Fr {
        elements.iter().fold(Fr::zero(), |h, m| self.permute(*m, h) + h + m)
    }
}

/// Hash with the shared parameters.
pub fn mimc_hash(elements: &[Fr]) -> Fr {
    Mimc::shared().hash(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_instance_has_protocol_round_count() {
        assert_eq!(Mimc::shared().constants().len(), MIMC_ROUNDS);
    }

    #[test]
    fn constants_are_deterministic_and_seed_dependent() {
        let a = Mimc::new(b"seed", 8);
        let b = Mimc::new(b"seed", 8);
        let c = Mimc::new(b"other", 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn constants_follow_keccak_chain() {
        let pre: [u8; 32] = Keccak256::digest(MIMC_SEED).into();
        let first: [u8; 32] = Keccak256::digest(pre).into();
        let second: [u8; 32] = Keccak256::digest(first).into();
        let constants = Mimc::shared().constants();
        assert_eq!(constants[0], Fr::from_be_bytes_mod_order(&first));
        assert_eq!(constants[1], Fr::from_be_bytes_mod_order(&second));
    }

    #[test]
    fn hash_depends_on_order_and_length() {
        let x = Fr::from(1u64);
        let y = Fr::from(2u64);
        assert_ne!(mimc_hash(&[x, y]), mimc_hash(&[y, x]));
        assert_ne!(mimc_hash(&[x]), mimc_hash(&[x, Fr::zero()]));
    }

    #[test]
    fn permutation_is_keyed() {
        let mimc = Mimc::shared();
        let x = Fr::from(42u64);
        assert_ne!(mimc.permute(x, Fr::from(1u64)), mimc.permute(x, Fr::from(2u64)));
    }

    #[test]
    fn exponent_is_a_permutation_of_fr() {
        // x ↦ x^5 is bijective iff gcd(5, r - 1) = 1.
        let r_minus_one = crate::crypto::field::modulus_of::<Fr>() - 1u8;
        assert_ne!(r_minus_one % 5u8, num_bigint::BigUint::from(0u8));
    }
}
