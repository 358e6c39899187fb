//! Evaluator that counts primitive operations.

use super::Evaluate;
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::{HeError, Result};
use crate::evaluator::DepthFinder;
use crate::params::CkksParams;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Accumulated operation counts for one circuit.
///
/// A rotation costs one rotation plus one addition (the key switch inside
/// it); additions, subtractions and their plaintext forms each cost one
/// addition; every multiplication flavor costs one multiply. A modulus
/// switch counts one invocation when the level actually drops, and the
/// total number of levels dropped is accumulated separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCounts {
    pub multiplies: u64,
    pub additions: u64,
    pub negations: u64,
    pub rotations: u64,
    pub mod_downs: u64,
    pub mod_down_levels: u64,
}

/// Counts operations while an embedded [`DepthFinder`] tracks metadata.
pub struct OpCount {
    counts: RwLock<OpCounts>,
    depth_finder: DepthFinder,
    params: Arc<CkksParams>,
}

impl OpCount {
    pub fn new(params: Arc<CkksParams>) -> Self {
        OpCount {
            counts: RwLock::new(OpCounts::default()),
            depth_finder: DepthFinder::new(params.clone()),
            params,
        }
    }

    pub fn counts(&self) -> OpCounts {
        *self.counts.read().expect("op count lock poisoned")
    }

    pub fn get_multiplicative_depth(&self) -> usize {
        self.depth_finder.get_multiplicative_depth()
    }

    /// Reuse this evaluator for another circuit.
    pub fn reset(&self) {
        *self.counts.write().expect("op count lock poisoned") = OpCounts::default();
        self.depth_finder.clear_depth();
    }

    /// Emit the counters through the log.
    pub fn log_op_count(&self) {
        let c = self.counts();
        tracing::info!(
            multiplies = c.multiplies,
            additions = c.additions,
            negations = c.negations,
            rotations = c.rotations,
            mod_downs = c.mod_downs,
            mod_down_levels = c.mod_down_levels,
            "operation counts"
        );
    }

    fn count_multiply(&self) {
        self.counts.write().expect("op count lock poisoned").multiplies += 1;
    }

    fn count_addition(&self) {
        self.counts.write().expect("op count lock poisoned").additions += 1;
    }

    fn count_rotation(&self) {
        let mut guard = self.counts.write().expect("op count lock poisoned");
        guard.rotations += 1;
        guard.additions += 1;
    }
}

impl<B: Backend> Evaluate<B> for OpCount {
    fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn encrypt_internal(&self, values: &[f64], level: usize) -> Result<CkksCiphertext<B>> {
        self.depth_finder.encrypt_internal(values, level)
    }

    fn decrypt_internal(&self, _ct: &CkksCiphertext<B>) -> Result<Vec<f64>> {
        Err(HeError::parameter(
            "decrypt: the op counter tracks no plaintext or ciphertext data",
        ))
    }

    fn rotate_left_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.count_rotation();
        self.depth_finder.rotate_left_internal(ct, steps)
    }

    fn rotate_right_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.count_rotation();
        self.depth_finder.rotate_right_internal(ct, steps)
    }

    fn negate_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.counts.write().expect("op count lock poisoned").negations += 1;
        self.depth_finder.negate_internal(ct)
    }

    fn add_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.count_addition();
        self.depth_finder.add_internal(ct1, ct2)
    }

    fn add_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.count_addition();
        self.depth_finder.add_plain_internal(ct, scalar)
    }

    fn add_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.count_addition();
        self.depth_finder.add_plain_vec_internal(ct, plain)
    }

    fn sub_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.count_addition();
        self.depth_finder.sub_internal(ct1, ct2)
    }

    fn sub_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.count_addition();
        self.depth_finder.sub_plain_internal(ct, scalar)
    }

    fn sub_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.count_addition();
        self.depth_finder.sub_plain_vec_internal(ct, plain)
    }

    fn multiply_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        self.count_multiply();
        self.depth_finder.multiply_internal(ct1, ct2)
    }

    fn multiply_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        self.count_multiply();
        self.depth_finder.multiply_plain_internal(ct, scalar)
    }

    fn multiply_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        self.count_multiply();
        self.depth_finder.multiply_plain_vec_internal(ct, plain)
    }

    fn multiply_plain_zero_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.count_multiply();
        self.depth_finder.multiply_plain_zero_internal(ct)
    }

    fn square_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.count_multiply();
        self.depth_finder.square_internal(ct)
    }

    fn relinearize_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.depth_finder.relinearize_internal(ct)
    }

    fn rescale_to_next_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.depth_finder.rescale_to_next_internal(ct)
    }

    fn mod_down_to_level_internal(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()> {
        {
            let mut guard = self.counts.write().expect("op count lock poisoned");
            if ct.he_level() > level {
                guard.mod_downs += 1;
            }
            guard.mod_down_levels += (ct.he_level() - level) as u64;
        }
        self.depth_finder.mod_down_to_level_internal(ct, level)
    }

    fn reset_internal(&self) {
        OpCount::reset(self);
    }
}
