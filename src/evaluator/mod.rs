//! The evaluator family.
//!
//! [`Evaluate`] is the uniform interface a circuit is written against. Its
//! provided methods implement the public API: they validate operands, then
//! delegate to per-variant `*_internal` hooks that mutate the ciphertext in
//! place. A circuit written once against this trait runs unchanged under
//! any variant:
//!
//! - [`DepthFinder`] walks only level metadata and reports circuit depth;
//! - [`PlaintextEval`] carries the exact plaintext through every op;
//! - [`ScaleEstimator`] bounds the largest safe encoding scale;
//! - [`OpCount`] accumulates per-operation counters;
//! - [`HomomorphicEval`] drives the backend;
//! - [`DebugEval`] runs the homomorphic and estimator sides in lockstep and
//!   cross-checks them after every operation.
//!
//! All variants share the metadata routines in [`meta`], so the level and
//! scale trajectories they produce for the same circuit are bit-identical.
//! The debug evaluator depends on that property.

pub mod debug;
pub mod depth_finder;
pub mod homomorphic;
pub mod opcount;
pub mod plaintext;
pub mod scale_estimator;

pub use debug::DebugEval;
pub use depth_finder::DepthFinder;
pub use homomorphic::HomomorphicEval;
pub use opcount::{OpCount, OpCounts};
pub use plaintext::PlaintextEval;
pub use scale_estimator::ScaleEstimator;

use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::{HeError, Result};
use crate::params::CkksParams;
use std::sync::Arc;

/// Shared metadata evolution. Every variant routes level/scale updates
/// through these functions; bit-identical trajectories across variants
/// depend on the floating-point operations here happening in exactly one
/// place.
pub(crate) mod meta {
    use super::*;
    use crate::ciphertext::Encoding;

    /// Base record for a fresh encryption at `level`: nominal scale for
    /// that chain position, full-slot matrix shape, no payload.
    pub(crate) fn fresh<B: Backend>(params: &CkksParams, level: usize) -> CkksCiphertext<B> {
        let mut ct = CkksCiphertext::uninitialized();
        ct.level = level;
        ct.scale = params.encryption_scale(level);
        ct.num_slots = params.num_slots();
        ct.initialized = true;
        ct.set_shape(Encoding::Matrix, 1, params.num_slots(), 1, params.num_slots());
        ct
    }

    /// Ciphertext × ciphertext (or × encoded plaintext) multiplies scales.
    pub(crate) fn on_multiply<B: Backend>(ct: &mut CkksCiphertext<B>, other_scale: f64) {
        ct.scale *= other_scale;
    }

    pub(crate) fn on_square<B: Backend>(ct: &mut CkksCiphertext<B>) {
        ct.scale *= ct.scale;
    }

    /// Drop one chain prime: the level decreases, the scale divides by the
    /// removed prime.
    pub(crate) fn on_rescale<B: Backend>(params: &CkksParams, ct: &mut CkksCiphertext<B>) {
        ct.scale /= params.prime(ct.level) as f64;
        ct.level -= 1;
    }

    /// Modulus switch: level moves down, scale is untouched.
    pub(crate) fn on_mod_down<B: Backend>(ct: &mut CkksCiphertext<B>, level: usize) {
        ct.level = level;
    }
}

pub(crate) fn check_initialized<B: Backend>(
    op: &'static str,
    ct: &CkksCiphertext<B>,
) -> Result<()> {
    if !ct.initialized {
        return Err(HeError::Uninitialized { op });
    }
    Ok(())
}

/// Binary-operation preamble: both operands initialized, same slot count,
/// same level, same scale. Scales are compared exactly; operands are never
/// auto-aligned.
pub(crate) fn check_binary_args<B: Backend>(
    op: &'static str,
    ct1: &CkksCiphertext<B>,
    ct2: &CkksCiphertext<B>,
) -> Result<()> {
    check_initialized(op, ct1)?;
    check_initialized(op, ct2)?;
    if ct1.num_slots != ct2.num_slots {
        return Err(HeError::shape(
            op,
            format!(
                "operand slot counts differ ({} vs {})",
                ct1.num_slots, ct2.num_slots
            ),
        ));
    }
    if ct1.level != ct2.level {
        return Err(HeError::level(
            op,
            format!("operand levels differ ({} vs {})", ct1.level, ct2.level),
        ));
    }
    if ct1.scale != ct2.scale {
        return Err(HeError::ScaleMismatch {
            op,
            lhs: ct1.scale,
            rhs: ct2.scale,
        });
    }
    Ok(())
}

pub(crate) fn check_plain_len<B: Backend>(
    op: &'static str,
    ct: &CkksCiphertext<B>,
    plain: &[f64],
) -> Result<()> {
    if plain.len() != ct.num_slots {
        return Err(HeError::shape(
            op,
            format!(
                "plaintext length {} does not match slot count {}",
                plain.len(),
                ct.num_slots
            ),
        ));
    }
    Ok(())
}

pub(crate) fn check_rotation_steps<B: Backend>(
    op: &'static str,
    ct: &CkksCiphertext<B>,
    steps: usize,
) -> Result<()> {
    if steps == 0 || steps > ct.num_slots / 2 {
        return Err(HeError::parameter(format!(
            "{op}: steps must be in 1..={}, got {steps}",
            ct.num_slots / 2
        )));
    }
    Ok(())
}

fn all_zero(plain: &[f64]) -> bool {
    plain.iter().all(|v| *v == 0.0)
}

/// The uniform evaluator interface.
///
/// The `*_internal` methods are implementation hooks; call the public
/// methods instead, which perform the shared validation first. Hooks are
/// part of the trait so that composite evaluators can drive their
/// sub-evaluators without re-validating.
pub trait Evaluate<B: Backend> {
    fn params(&self) -> &Arc<CkksParams>;

    // ---- encryption and decryption ----

    /// Encrypt a full slot vector. `level` defaults to the top of the
    /// modulus chain; encrypting lower uses the adjusted nominal scale for
    /// that chain position.
    fn encrypt(&self, values: &[f64], level: Option<usize>) -> Result<CkksCiphertext<B>> {
        let params = self.params();
        if values.len() != params.num_slots() {
            return Err(HeError::shape(
                "encrypt",
                format!(
                    "input must fill all {} slots, got {}",
                    params.num_slots(),
                    values.len()
                ),
            ));
        }
        let level = level.unwrap_or(params.max_level());
        if level > params.max_level() {
            return Err(HeError::parameter(format!(
                "encrypt: level {level} exceeds chain top {}",
                params.max_level()
            )));
        }
        self.encrypt_internal(values, level)
    }

    /// Decrypt to the full slot vector.
    ///
    /// Metadata-only variants cannot decrypt; the plaintext variants return
    /// the tracked plaintext oracle.
    fn decrypt(&self, ct: &CkksCiphertext<B>) -> Result<Vec<f64>> {
        check_initialized("decrypt", ct)?;
        if ct.level != 0 {
            tracing::warn!(
                level = ct.level,
                "decrypting a ciphertext above level 0; consider a smaller modulus"
            );
        }
        self.decrypt_internal(ct)
    }

    // ---- public operations ----

    fn rotate_left_inplace(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        check_initialized("rotate_left", ct)?;
        check_rotation_steps("rotate_left", ct, steps)?;
        self.rotate_left_internal(ct, steps)
    }

    fn rotate_left(&self, ct: &CkksCiphertext<B>, steps: usize) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.rotate_left_inplace(&mut out, steps)?;
        Ok(out)
    }

    fn rotate_right_inplace(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        check_initialized("rotate_right", ct)?;
        check_rotation_steps("rotate_right", ct, steps)?;
        self.rotate_right_internal(ct, steps)
    }

    fn rotate_right(&self, ct: &CkksCiphertext<B>, steps: usize) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.rotate_right_inplace(&mut out, steps)?;
        Ok(out)
    }

    fn negate_inplace(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        check_initialized("negate", ct)?;
        self.negate_internal(ct)
    }

    fn negate(&self, ct: &CkksCiphertext<B>) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.negate_inplace(&mut out)?;
        Ok(out)
    }

    fn add_inplace(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        check_binary_args("add", ct1, ct2)?;
        self.add_internal(ct1, ct2)
    }

    fn add(&self, ct1: &CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<CkksCiphertext<B>> {
        let mut out = ct1.clone();
        self.add_inplace(&mut out, ct2)?;
        Ok(out)
    }

    fn sub_inplace(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        check_binary_args("sub", ct1, ct2)?;
        self.sub_internal(ct1, ct2)
    }

    fn sub(&self, ct1: &CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<CkksCiphertext<B>> {
        let mut out = ct1.clone();
        self.sub_inplace(&mut out, ct2)?;
        Ok(out)
    }

    fn add_plain_inplace(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        check_initialized("add_plain", ct)?;
        self.add_plain_internal(ct, scalar)
    }

    fn add_plain(&self, ct: &CkksCiphertext<B>, scalar: f64) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.add_plain_inplace(&mut out, scalar)?;
        Ok(out)
    }

    fn add_plain_vec_inplace(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        check_initialized("add_plain", ct)?;
        check_plain_len("add_plain", ct, plain)?;
        self.add_plain_vec_internal(ct, plain)
    }

    fn sub_plain_inplace(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        check_initialized("sub_plain", ct)?;
        self.sub_plain_internal(ct, scalar)
    }

    fn sub_plain_vec_inplace(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        check_initialized("sub_plain", ct)?;
        check_plain_len("sub_plain", ct, plain)?;
        self.sub_plain_vec_internal(ct, plain)
    }

    fn multiply_inplace(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        check_binary_args("multiply", ct1, ct2)?;
        self.multiply_internal(ct1, ct2)
    }

    fn multiply(
        &self,
        ct1: &CkksCiphertext<B>,
        ct2: &CkksCiphertext<B>,
    ) -> Result<CkksCiphertext<B>> {
        let mut out = ct1.clone();
        self.multiply_inplace(&mut out, ct2)?;
        Ok(out)
    }

    /// Multiply by a plain scalar. An exactly-zero scalar yields a valid
    /// zero ciphertext at the input's level and scale rather than touching
    /// backend primitives that reject transparent ciphertexts.
    fn multiply_plain_inplace(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        check_initialized("multiply_plain", ct)?;
        if scalar == 0.0 {
            return self.multiply_plain_zero_internal(ct);
        }
        self.multiply_plain_internal(ct, scalar)
    }

    fn multiply_plain(&self, ct: &CkksCiphertext<B>, scalar: f64) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.multiply_plain_inplace(&mut out, scalar)?;
        Ok(out)
    }

    fn multiply_plain_vec_inplace(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        check_initialized("multiply_plain", ct)?;
        check_plain_len("multiply_plain", ct, plain)?;
        if all_zero(plain) {
            return self.multiply_plain_zero_internal(ct);
        }
        self.multiply_plain_vec_internal(ct, plain)
    }

    fn square_inplace(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        check_initialized("square", ct)?;
        self.square_internal(ct)
    }

    fn square(&self, ct: &CkksCiphertext<B>) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.square_inplace(&mut out)?;
        Ok(out)
    }

    /// Reduce a quadratic ciphertext back to linear. Idempotent until the
    /// next multiplication.
    fn relinearize_inplace(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        check_initialized("relinearize", ct)?;
        self.relinearize_internal(ct)
    }

    fn rescale_to_next_inplace(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        check_initialized("rescale_to_next", ct)?;
        if ct.level == 0 {
            return Err(HeError::level(
                "rescale_to_next",
                "ciphertext is already at the bottom of the modulus chain",
            ));
        }
        self.rescale_to_next_internal(ct)
    }

    fn rescale_to_next(&self, ct: &CkksCiphertext<B>) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.rescale_to_next_inplace(&mut out)?;
        Ok(out)
    }

    /// Drop the ciphertext to `level` without changing its scale. A no-op
    /// when the ciphertext is already there.
    fn mod_down_to_level_inplace(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()> {
        check_initialized("mod_down_to_level", ct)?;
        if level > ct.level {
            return Err(HeError::level(
                "mod_down_to_level",
                format!("target level {level} is above ciphertext level {}", ct.level),
            ));
        }
        self.mod_down_to_level_internal(ct, level)
    }

    fn mod_down_to_level(&self, ct: &CkksCiphertext<B>, level: usize) -> Result<CkksCiphertext<B>> {
        let mut out = ct.clone();
        self.mod_down_to_level_inplace(&mut out, level)?;
        Ok(out)
    }

    /// Bring both operands to the lower of their two levels. At most one of
    /// them is modified.
    fn reduce_level_to_min_inplace(
        &self,
        ct1: &mut CkksCiphertext<B>,
        ct2: &mut CkksCiphertext<B>,
    ) -> Result<()> {
        check_initialized("reduce_level_to_min", ct1)?;
        check_initialized("reduce_level_to_min", ct2)?;
        if ct1.level > ct2.level {
            self.mod_down_to_level_inplace(ct1, ct2.level)
        } else if ct2.level > ct1.level {
            self.mod_down_to_level_inplace(ct2, ct1.level)
        } else {
            Ok(())
        }
    }

    /// Clear accumulated statistics so this evaluator can measure another
    /// circuit. Keys and backend context survive; outstanding ciphertexts
    /// stay valid but no longer contribute to the statistics.
    fn reset(&self) {
        self.reset_internal();
    }

    // ---- implementation hooks ----

    fn encrypt_internal(&self, values: &[f64], level: usize) -> Result<CkksCiphertext<B>>;
    fn decrypt_internal(&self, ct: &CkksCiphertext<B>) -> Result<Vec<f64>>;
    fn rotate_left_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()>;
    fn rotate_right_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()>;
    fn negate_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()>;
    fn add_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()>;
    fn add_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()>;
    fn add_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()>;
    fn sub_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()>;
    fn sub_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()>;
    fn sub_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()>;
    fn multiply_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>)
    -> Result<()>;
    fn multiply_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()>;
    fn multiply_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()>;

    /// Hook for the distinguished zero-plaintext multiplication. The
    /// default zeroes the tracked plaintext and leaves level and scale
    /// alone, which is correct for every metadata variant; backend-driving
    /// variants override it to materialize a fresh zero ciphertext.
    fn multiply_plain_zero_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        if let Some(pt) = ct.raw_pt.as_mut() {
            pt.fill(0.0);
        }
        Ok(())
    }

    fn square_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()>;
    fn relinearize_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()>;
    fn rescale_to_next_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()>;
    fn mod_down_to_level_internal(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()>;

    fn reset_internal(&self) {}
}
