//! Evaluator that determines the largest safe encoding scale for a circuit.

use super::Evaluate;
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::Result;
use crate::evaluator::{DepthFinder, PlaintextEval};
use crate::params::CkksParams;
use std::sync::Arc;

/// Headroom, in bits, subtracted from the ring's modulus budget when
/// bounding the encoding scale. Matches the special-modulus reserve of
/// typical CKKS parameter sets.
pub const LOG_SCALE_MARGIN: f64 = 60.0;

/// Tracks scale evolution exactly and bounds the encoding scale.
///
/// Internally composes a [`PlaintextEval`] (whose running plaintext maximum
/// feeds the bound) and a [`DepthFinder`]. A scale at or below
/// `2^get_estimated_max_log_scale()` keeps every encoded value within the
/// backend's representable range for this circuit.
pub struct ScaleEstimator {
    ptxt: PlaintextEval,
    depth: DepthFinder,
    params: Arc<CkksParams>,
}

impl ScaleEstimator {
    pub fn new(params: Arc<CkksParams>) -> Self {
        ScaleEstimator {
            ptxt: PlaintextEval::new(params.clone()),
            depth: DepthFinder::new(params.clone()),
            params,
        }
    }

    /// Inject an upper bound on the input magnitude; see
    /// [`PlaintextEval::update_plaintext_max_val`].
    pub fn update_plaintext_max_val(&self, x: f64) {
        self.ptxt.update_plaintext_max_val(x);
    }

    pub fn get_exact_max_log_plain_val(&self) -> f64 {
        self.ptxt.get_exact_max_log_plain_val()
    }

    /// Base-2 log of the largest scale this circuit can be evaluated at.
    pub fn get_estimated_max_log_scale(&self) -> f64 {
        self.params.max_mod_bits() as f64 - self.get_exact_max_log_plain_val() - LOG_SCALE_MARGIN
    }

    pub fn get_multiplicative_depth(&self) -> usize {
        self.depth.get_multiplicative_depth()
    }

    pub(crate) fn clear(&self) {
        self.ptxt.clear_max();
        self.depth.clear_depth();
    }

    /// Reuse this evaluator for another circuit.
    pub fn reset(&self) {
        self.clear();
    }
}

impl<B: Backend> Evaluate<B> for ScaleEstimator {
    fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn encrypt_internal(&self, values: &[f64], level: usize) -> Result<CkksCiphertext<B>> {
        self.ptxt.encrypt_internal(values, level)
    }

    fn decrypt_internal(&self, ct: &CkksCiphertext<B>) -> Result<Vec<f64>> {
        self.ptxt.decrypt_internal(ct)
    }

    fn rotate_left_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.ptxt.rotate_left_internal(ct, steps)
    }

    fn rotate_right_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.ptxt.rotate_right_internal(ct, steps)
    }

    fn negate_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.ptxt.negate_internal(ct)
    }

    fn add_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.ptxt.add_internal(ct1, ct2)
    }

    fn add_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.ptxt.add_plain_internal(ct, scalar)
    }

    fn add_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.ptxt.add_plain_vec_internal(ct, plain)
    }

    fn sub_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.ptxt.sub_internal(ct1, ct2)
    }

    fn sub_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.ptxt.sub_plain_internal(ct, scalar)
    }

    fn sub_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.ptxt.sub_plain_vec_internal(ct, plain)
    }

    fn multiply_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.ptxt.multiply_internal(ct1, ct2)
    }

    fn multiply_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.ptxt.multiply_plain_internal(ct, scalar)
    }

    fn multiply_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.ptxt.multiply_plain_vec_internal(ct, plain)
    }

    fn square_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.ptxt.square_internal(ct)
    }

    fn relinearize_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.ptxt.relinearize_internal(ct)
    }

    fn rescale_to_next_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.ptxt.rescale_to_next_internal(ct)?;
        self.depth.observe_rescaled_level(ct.he_level());
        Ok(())
    }

    fn mod_down_to_level_internal(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()> {
        self.ptxt.mod_down_to_level_internal(ct, level)
    }

    fn reset_internal(&self) {
        self.clear();
    }
}
