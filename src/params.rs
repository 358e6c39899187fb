//! CKKS instance parameters shared by every evaluator variant.

use crate::common::poly_degree_to_max_mod_bits;
use crate::errors::{HeError, Result};
use crate::math::generate_primes;
use serde::{Deserialize, Serialize};

/// Parameters fixing the slot count, the modulus chain, and the nominal
/// encoding scale.
///
/// All evaluator variants operating on the same circuit must share one
/// `CkksParams` value (typically behind an `Arc`): the chain primes feed the
/// scale arithmetic of every variant, and metadata trajectories are
/// bit-identical only when the primes are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CkksParams {
    num_slots: usize,
    max_level: usize,
    log_scale: u32,
    /// Modulus chain, one prime per level: `primes[l]` is removed when a
    /// ciphertext rescales from level `l` to `l - 1`. `primes[0]` is the
    /// base prime and is never removed.
    primes: Vec<u64>,
}

impl CkksParams {
    /// Build parameters for `num_slots` plaintext slots (a power of two), a
    /// modulus chain of `max_level + 1` primes, and nominal scale
    /// `2^log_scale`.
    ///
    /// The chain primes are NTT-friendly primes found just below
    /// `2^log_scale`, so rescaling keeps the scale close to nominal. Fails
    /// when the total modulus bit budget exceeds what the ring dimension
    /// supports.
    pub fn new(num_slots: usize, max_level: usize, log_scale: u32) -> Result<Self> {
        if !num_slots.is_power_of_two() || num_slots < 2 {
            return Err(HeError::parameter(format!(
                "num_slots must be a power of two >= 2, got {num_slots}"
            )));
        }
        let poly_degree = 2 * num_slots;
        let budget = poly_degree_to_max_mod_bits(poly_degree)?;
        let requested = (max_level as u32 + 1) * log_scale;
        if requested > budget {
            return Err(HeError::parameter(format!(
                "modulus chain needs {requested} bits but ring dimension \
                 {poly_degree} supports at most {budget}"
            )));
        }
        if log_scale >= 60 {
            return Err(HeError::parameter(format!(
                "log_scale must be below 60, got {log_scale}"
            )));
        }
        // chain primes are NTT-friendly (p ≡ 1 mod 2·poly_degree), so the
        // scale must clear the ring size for any to exist near it
        let min_log_scale = (2 * poly_degree).ilog2() + 1;
        if log_scale < min_log_scale {
            return Err(HeError::parameter(format!(
                "log_scale {log_scale} is too small for ring dimension {poly_degree}; \
                 need at least {min_log_scale}"
            )));
        }

        let primes = generate_primes(log_scale, max_level + 1, poly_degree as u64);
        Ok(CkksParams {
            num_slots,
            max_level,
            log_scale,
            primes,
        })
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Polynomial ring dimension; slots are half of it.
    pub fn poly_degree(&self) -> usize {
        2 * self.num_slots
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    pub fn log_scale(&self) -> u32 {
        self.log_scale
    }

    /// Nominal encoding scale `2^log_scale`.
    pub fn scale(&self) -> f64 {
        2f64.powi(self.log_scale as i32)
    }

    /// The chain prime removed when rescaling away from `level`.
    pub fn prime(&self, level: usize) -> u64 {
        self.primes[level]
    }

    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    /// Maximum total modulus bit budget for this ring dimension.
    pub fn max_mod_bits(&self) -> u32 {
        poly_degree_to_max_mod_bits(self.poly_degree()).expect("validated at construction")
    }

    /// Encoding scale for a fresh ciphertext at `level`.
    ///
    /// Encrypting below the top of the chain adjusts the scale as if the
    /// ciphertext had been rescaled down from the top: `s ← s²/pₗ` for each
    /// skipped level. Floating-point order of operations matters here and
    /// must match the rescale path exactly.
    pub fn encryption_scale(&self, level: usize) -> f64 {
        let mut scale = self.scale();
        let mut l = self.max_level;
        while l > level {
            scale = (scale * scale) / self.primes[l] as f64;
            l -= 1;
        }
        scale
    }
}
