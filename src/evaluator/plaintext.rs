//! Evaluator that carries the exact plaintext alongside every ciphertext.

use super::{Evaluate, meta};
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::common::l_inf_norm;
use crate::errors::{HeError, Result};
use crate::params::CkksParams;
use std::sync::{Arc, RwLock};

/// Applies every operation to the unscaled real slot values, while level
/// and scale still evolve as if the circuit were homomorphic. Serves as the
/// reference oracle for the debug evaluator, and tracks the largest
/// plaintext magnitude seen anywhere in the computation.
pub struct PlaintextEval {
    params: Arc<CkksParams>,
    max_abs_plain: RwLock<f64>,
}

impl PlaintextEval {
    pub fn new(params: Arc<CkksParams>) -> Self {
        PlaintextEval {
            params,
            max_abs_plain: RwLock::new(0.0),
        }
    }

    /// Base-2 log of the largest plaintext magnitude produced so far.
    pub fn get_exact_max_log_plain_val(&self) -> f64 {
        self.max_abs_plain
            .read()
            .expect("plaintext max lock poisoned")
            .log2()
    }

    /// Inject an upper bound on the plaintext magnitude. Needed when a
    /// circuit is a no-op and the evaluator would otherwise never see its
    /// inputs.
    pub fn update_plaintext_max_val(&self, x: f64) {
        let x = x.abs();
        let mut guard = self.max_abs_plain.write().expect("plaintext max lock poisoned");
        if x > *guard {
            *guard = x;
        }
    }

    pub(crate) fn clear_max(&self) {
        *self.max_abs_plain.write().expect("plaintext max lock poisoned") = 0.0;
    }

    /// Reuse this evaluator for another circuit.
    pub fn reset(&self) {
        self.clear_max();
    }

    fn track<B: Backend>(&self, ct: &CkksCiphertext<B>) {
        if let Some(pt) = ct.plaintext() {
            self.update_plaintext_max_val(l_inf_norm(pt));
        }
    }

    fn raw_pt_mut<'a, B: Backend>(
        op: &'static str,
        ct: &'a mut CkksCiphertext<B>,
    ) -> Result<&'a mut Vec<f64>> {
        ct.raw_pt.as_mut().ok_or(HeError::Uninitialized { op })
    }
}

impl<B: Backend> Evaluate<B> for PlaintextEval {
    fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn encrypt_internal(&self, values: &[f64], level: usize) -> Result<CkksCiphertext<B>> {
        let mut ct = meta::fresh(&self.params, level);
        ct.raw_pt = Some(values.to_vec());
        self.track(&ct);
        Ok(ct)
    }

    fn decrypt_internal(&self, ct: &CkksCiphertext<B>) -> Result<Vec<f64>> {
        ct.plaintext()
            .map(|pt| pt.to_vec())
            .ok_or_else(|| HeError::parameter("decrypt: ciphertext carries no tracked plaintext"))
    }

    fn rotate_left_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        Self::raw_pt_mut("rotate_left", ct)?.rotate_left(steps);
        Ok(())
    }

    fn rotate_right_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        Self::raw_pt_mut("rotate_right", ct)?.rotate_right(steps);
        Ok(())
    }

    fn negate_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        for v in Self::raw_pt_mut("negate", ct)? {
            *v = -*v;
        }
        Ok(())
    }

    fn add_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        let other = ct2
            .plaintext()
            .ok_or(HeError::Uninitialized { op: "add" })?
            .to_vec();
        for (a, b) in Self::raw_pt_mut("add", ct1)?.iter_mut().zip(&other) {
            *a += b;
        }
        self.track(ct1);
        Ok(())
    }

    fn add_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        for v in Self::raw_pt_mut("add_plain", ct)? {
            *v += scalar;
        }
        self.track(ct);
        Ok(())
    }

    fn add_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        for (a, b) in Self::raw_pt_mut("add_plain", ct)?.iter_mut().zip(plain) {
            *a += b;
        }
        self.track(ct);
        Ok(())
    }

    fn sub_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        let other = ct2
            .plaintext()
            .ok_or(HeError::Uninitialized { op: "sub" })?
            .to_vec();
        for (a, b) in Self::raw_pt_mut("sub", ct1)?.iter_mut().zip(&other) {
            *a -= b;
        }
        self.track(ct1);
        Ok(())
    }

    fn sub_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        for v in Self::raw_pt_mut("sub_plain", ct)? {
            *v -= scalar;
        }
        self.track(ct);
        Ok(())
    }

    fn sub_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        for (a, b) in Self::raw_pt_mut("sub_plain", ct)?.iter_mut().zip(plain) {
            *a -= b;
        }
        self.track(ct);
        Ok(())
    }

    fn multiply_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        let other = ct2
            .plaintext()
            .ok_or(HeError::Uninitialized { op: "multiply" })?
            .to_vec();
        for (a, b) in Self::raw_pt_mut("multiply", ct1)?.iter_mut().zip(&other) {
            *a *= b;
        }
        meta::on_multiply(ct1, ct2.scale());
        self.track(ct1);
        Ok(())
    }

    fn multiply_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        for v in Self::raw_pt_mut("multiply_plain", ct)? {
            *v *= scalar;
        }
        meta::on_square(ct);
        self.track(ct);
        Ok(())
    }

    fn multiply_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        for (a, b) in Self::raw_pt_mut("multiply_plain", ct)?.iter_mut().zip(plain) {
            *a *= b;
        }
        meta::on_square(ct);
        self.track(ct);
        Ok(())
    }

    fn square_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        for v in Self::raw_pt_mut("square", ct)? {
            *v *= *v;
        }
        meta::on_square(ct);
        self.track(ct);
        Ok(())
    }

    fn relinearize_internal(&self, _ct: &mut CkksCiphertext<B>) -> Result<()> {
        Ok(())
    }

    fn rescale_to_next_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        // the tracked plaintext is unscaled; only the metadata moves
        meta::on_rescale(&self.params, ct);
        Ok(())
    }

    fn mod_down_to_level_internal(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()> {
        meta::on_mod_down(ct, level);
        Ok(())
    }

    fn reset_internal(&self) {
        self.clear_max();
    }
}
