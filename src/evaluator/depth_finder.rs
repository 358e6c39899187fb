//! Metadata-only evaluator that discovers the multiplicative depth of a
//! circuit.

use super::{Evaluate, meta};
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::{HeError, Result};
use crate::params::CkksParams;
use std::sync::{Arc, RwLock};

/// Tracks the `he_level` trajectory of a circuit and nothing else.
///
/// Ciphertexts produced by this evaluator carry no raw ciphertext and no
/// plaintext; the values passed to `encrypt` are ignored. Depth is the
/// largest distance below the top of the modulus chain reached through
/// rescaling.
pub struct DepthFinder {
    params: Arc<CkksParams>,
    multiplicative_depth: RwLock<usize>,
}

impl DepthFinder {
    pub fn new(params: Arc<CkksParams>) -> Self {
        DepthFinder {
            params,
            multiplicative_depth: RwLock::new(0),
        }
    }

    pub fn get_multiplicative_depth(&self) -> usize {
        *self.multiplicative_depth.read().expect("depth lock poisoned")
    }

    /// Reuse this evaluator for another circuit.
    pub fn reset(&self) {
        self.clear_depth();
    }

    /// Record the level a ciphertext landed on after a rescale.
    pub(crate) fn observe_rescaled_level(&self, level: usize) {
        let depth = self.params.max_level() - level;
        let mut guard = self.multiplicative_depth.write().expect("depth lock poisoned");
        if depth > *guard {
            *guard = depth;
        }
    }

    pub(crate) fn clear_depth(&self) {
        *self.multiplicative_depth.write().expect("depth lock poisoned") = 0;
    }
}

impl<B: Backend> Evaluate<B> for DepthFinder {
    fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn encrypt_internal(&self, _values: &[f64], level: usize) -> Result<CkksCiphertext<B>> {
        Ok(meta::fresh(&self.params, level))
    }

    fn decrypt_internal(&self, _ct: &CkksCiphertext<B>) -> Result<Vec<f64>> {
        Err(HeError::parameter(
            "decrypt: the depth finder tracks no plaintext or ciphertext data",
        ))
    }

    fn rotate_left_internal(&self, _ct: &mut CkksCiphertext<B>, _steps: usize) -> Result<()> {
        Ok(())
    }

    fn rotate_right_internal(&self, _ct: &mut CkksCiphertext<B>, _steps: usize) -> Result<()> {
        Ok(())
    }

    fn negate_internal(&self, _ct: &mut CkksCiphertext<B>) -> Result<()> {
        Ok(())
    }

    fn add_internal(&self, _ct1: &mut CkksCiphertext<B>, _ct2: &CkksCiphertext<B>) -> Result<()> {
        Ok(())
    }

    fn add_plain_internal(&self, _ct: &mut CkksCiphertext<B>, _scalar: f64) -> Result<()> {
        Ok(())
    }

    fn add_plain_vec_internal(&self, _ct: &mut CkksCiphertext<B>, _plain: &[f64]) -> Result<()> {
        Ok(())
    }

    fn sub_internal(&self, _ct1: &mut CkksCiphertext<B>, _ct2: &CkksCiphertext<B>) -> Result<()> {
        Ok(())
    }

    fn sub_plain_internal(&self, _ct: &mut CkksCiphertext<B>, _scalar: f64) -> Result<()> {
        Ok(())
    }

    fn sub_plain_vec_internal(&self, _ct: &mut CkksCiphertext<B>, _plain: &[f64]) -> Result<()> {
        Ok(())
    }

    fn multiply_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        meta::on_multiply(ct1, ct2.scale());
        Ok(())
    }

    fn multiply_plain_internal(&self, ct: &mut CkksCiphertext<B>, _scalar: f64) -> Result<()> {
        meta::on_square(ct);
        Ok(())
    }

    fn multiply_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, _plain: &[f64]) -> Result<()> {
        meta::on_square(ct);
        Ok(())
    }

    fn square_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        meta::on_square(ct);
        Ok(())
    }

    fn relinearize_internal(&self, _ct: &mut CkksCiphertext<B>) -> Result<()> {
        Ok(())
    }

    fn rescale_to_next_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        meta::on_rescale(&self.params, ct);
        self.observe_rescaled_level(ct.he_level());
        Ok(())
    }

    fn mod_down_to_level_internal(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()> {
        meta::on_mod_down(ct, level);
        Ok(())
    }

    fn reset_internal(&self) {
        self.clear_depth();
    }
}
