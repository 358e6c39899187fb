//! The full debug evaluator: homomorphic evaluation and the scale
//! estimator run in lockstep, cross-checked after every operation.

use super::Evaluate;
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::common::{MAX_NORM, relative_diff_2norm};
use crate::errors::{HeError, Result};
use crate::evaluator::{HomomorphicEval, ScaleEstimator};
use crate::params::CkksParams;
use std::sync::Arc;

/// Runs a [`HomomorphicEval`] and a [`ScaleEstimator`] (which itself
/// composes the plaintext and depth evaluators) on the same ciphertexts.
///
/// After each operation the two projections must agree: the scale and level
/// computed by the metadata side must exactly equal the backend's view, and
/// the decrypted ciphertext must match the tracked plaintext to within
/// [`MAX_NORM`] relative 2-norm. Divergence is a fatal
/// [`HeError::DebugInconsistency`].
pub struct DebugEval<B: Backend> {
    homomorphic: HomomorphicEval<B>,
    estimator: ScaleEstimator,
    params: Arc<CkksParams>,
}

impl<B: Backend> DebugEval<B> {
    pub fn new(backend: Arc<B>, params: Arc<CkksParams>) -> Result<Self> {
        Ok(DebugEval {
            homomorphic: HomomorphicEval::new(backend, params.clone())?,
            estimator: ScaleEstimator::new(params.clone()),
            params,
        })
    }

    pub fn update_plaintext_max_val(&self, x: f64) {
        self.estimator.update_plaintext_max_val(x);
    }

    pub fn get_exact_max_log_plain_val(&self) -> f64 {
        self.estimator.get_exact_max_log_plain_val()
    }

    pub fn get_estimated_max_log_scale(&self) -> f64 {
        self.estimator.get_estimated_max_log_scale()
    }

    pub fn get_multiplicative_depth(&self) -> usize {
        self.estimator.get_multiplicative_depth()
    }

    /// Cross-check one ciphertext after an operation. `meta_level` and
    /// `meta_scale` are the estimator-side values captured before the
    /// homomorphic side synced the metadata from the backend.
    fn check(
        &self,
        op: &'static str,
        ct: &CkksCiphertext<B>,
        meta_level: usize,
        meta_scale: f64,
    ) -> Result<()> {
        if ct.he_level() != meta_level || ct.scale() != meta_scale {
            return Err(HeError::DebugInconsistency {
                op: op.to_string(),
                detail: format!(
                    "sub-evaluators disagree: estimator at level {meta_level} scale \
                     {meta_scale}, backend at level {} scale {}",
                    ct.he_level(),
                    ct.scale()
                ),
            });
        }

        let expected = ct
            .plaintext()
            .ok_or(HeError::Uninitialized { op })?;
        let actual = self.homomorphic.decrypt_internal(ct)?;
        let expected_log2 = norm_2(expected).log2();
        let actual_log2 = norm_2(&actual).log2();
        match relative_diff_2norm(expected, &actual)? {
            None => {}
            Some(diff) if diff > MAX_NORM => {
                return Err(HeError::DebugInconsistency {
                    op: op.to_string(),
                    detail: format!(
                        "plaintext/ciphertext divergence: relative 2-norm {diff:.6e} \
                         exceeds {MAX_NORM} (log2 |expected| = {expected_log2:.4}, \
                         log2 |actual| = {actual_log2:.4})"
                    ),
                });
            }
            Some(diff) => {
                tracing::debug!(
                    op,
                    diff_norm = diff,
                    expected_log2_norm = expected_log2,
                    actual_log2_norm = actual_log2,
                    level = ct.he_level(),
                    scale = ct.scale(),
                    "debug check passed"
                );
            }
        }

        let max_log_scale = self.estimator.get_estimated_max_log_scale();
        if ct.scale().log2() > max_log_scale {
            tracing::warn!(
                op,
                scale_log2 = ct.scale().log2(),
                max_log_scale,
                "ciphertext scale exceeds the estimated safe maximum"
            );
        }
        Ok(())
    }

    fn snapshot(ct: &CkksCiphertext<B>) -> (usize, f64) {
        (ct.he_level(), ct.scale())
    }
}

fn norm_2(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

impl<B: Backend> Evaluate<B> for DebugEval<B> {
    fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn encrypt_internal(&self, values: &[f64], level: usize) -> Result<CkksCiphertext<B>> {
        let mut ct = self.estimator.encrypt_internal(values, level)?;
        let pt = self
            .homomorphic
            .backend()
            .encode(values, level, ct.scale())?;
        ct.raw_ct = Some(self.homomorphic.backend().encrypt(&pt)?);
        Ok(ct)
    }

    fn decrypt_internal(&self, ct: &CkksCiphertext<B>) -> Result<Vec<f64>> {
        self.homomorphic.decrypt_internal(ct)
    }

    fn rotate_left_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.estimator.rotate_left_internal(ct, steps)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.rotate_left_internal(ct, steps)?;
        self.check("rotate_left", ct, level, scale)
    }

    fn rotate_right_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.estimator.rotate_right_internal(ct, steps)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.rotate_right_internal(ct, steps)?;
        self.check("rotate_right", ct, level, scale)
    }

    fn negate_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.estimator.negate_internal(ct)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.negate_internal(ct)?;
        self.check("negate", ct, level, scale)
    }

    fn add_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.estimator.add_internal(ct1, ct2)?;
        let (level, scale) = Self::snapshot(ct1);
        self.homomorphic.add_internal(ct1, ct2)?;
        self.check("add", ct1, level, scale)
    }

    fn add_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.estimator.add_plain_internal(ct, scalar)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.add_plain_internal(ct, scalar)?;
        self.check("add_plain", ct, level, scale)
    }

    fn add_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.estimator.add_plain_vec_internal(ct, plain)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.add_plain_vec_internal(ct, plain)?;
        self.check("add_plain", ct, level, scale)
    }

    fn sub_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.estimator.sub_internal(ct1, ct2)?;
        let (level, scale) = Self::snapshot(ct1);
        self.homomorphic.sub_internal(ct1, ct2)?;
        self.check("sub", ct1, level, scale)
    }

    fn sub_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.estimator.sub_plain_internal(ct, scalar)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.sub_plain_internal(ct, scalar)?;
        self.check("sub_plain", ct, level, scale)
    }

    fn sub_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.estimator.sub_plain_vec_internal(ct, plain)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.sub_plain_vec_internal(ct, plain)?;
        self.check("sub_plain", ct, level, scale)
    }

    fn multiply_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.estimator.multiply_internal(ct1, ct2)?;
        let (level, scale) = Self::snapshot(ct1);
        self.homomorphic.multiply_internal(ct1, ct2)?;
        self.check("multiply", ct1, level, scale)
    }

    fn multiply_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.estimator.multiply_plain_internal(ct, scalar)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.multiply_plain_internal(ct, scalar)?;
        self.check("multiply_plain", ct, level, scale)
    }

    fn multiply_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.estimator.multiply_plain_vec_internal(ct, plain)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.multiply_plain_vec_internal(ct, plain)?;
        self.check("multiply_plain", ct, level, scale)
    }

    fn multiply_plain_zero_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.estimator.multiply_plain_zero_internal(ct)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.multiply_plain_zero_internal(ct)?;
        self.check("multiply_plain", ct, level, scale)
    }

    fn square_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.estimator.square_internal(ct)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.square_internal(ct)?;
        self.check("square", ct, level, scale)
    }

    fn relinearize_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.estimator.relinearize_internal(ct)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.relinearize_internal(ct)?;
        self.check("relinearize", ct, level, scale)
    }

    fn rescale_to_next_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.estimator.rescale_to_next_internal(ct)?;
        let (level, scale) = Self::snapshot(ct);
        self.homomorphic.rescale_to_next_internal(ct)?;
        self.check("rescale_to_next", ct, level, scale)
    }

    fn mod_down_to_level_internal(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()> {
        self.estimator.mod_down_to_level_internal(ct, level)?;
        let (meta_level, meta_scale) = Self::snapshot(ct);
        self.homomorphic.mod_down_to_level_internal(ct, level)?;
        self.check("mod_down_to_level", ct, meta_level, meta_scale)
    }

    fn reset_internal(&self) {
        self.estimator.clear();
    }
}
