//! Evaluator that drives the backend.

use super::{Evaluate, meta};
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::{HeError, Result};
use crate::params::CkksParams;
use std::sync::Arc;

/// Performs real ciphertext operations through the [`Backend`] and mirrors
/// the backend's level/scale view into the ciphertext metadata after every
/// call. Does not track plaintexts.
pub struct HomomorphicEval<B: Backend> {
    backend: Arc<B>,
    params: Arc<CkksParams>,
}

impl<B: Backend> HomomorphicEval<B> {
    pub fn new(backend: Arc<B>, params: Arc<CkksParams>) -> Result<Self> {
        if backend.num_slots() != params.num_slots() || backend.max_level() != params.max_level() {
            return Err(HeError::parameter(format!(
                "backend geometry ({} slots, {} levels) does not match parameters \
                 ({} slots, {} levels)",
                backend.num_slots(),
                backend.max_level(),
                params.num_slots(),
                params.max_level()
            )));
        }
        Ok(HomomorphicEval { backend, params })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn with_raw<F>(&self, op: &'static str, ct: &mut CkksCiphertext<B>, f: F) -> Result<()>
    where
        F: FnOnce(&B, &mut B::RawCt) -> Result<()>,
    {
        let mut raw = ct.raw_ct.take().ok_or(HeError::Uninitialized { op })?;
        let outcome = f(self.backend.as_ref(), &mut raw);
        ct.level = self.backend.ct_level(&raw);
        ct.scale = self.backend.ct_scale(&raw);
        ct.raw_ct = Some(raw);
        outcome
    }

    fn encode_broadcast(&self, scalar: f64, level: usize, scale: f64) -> Result<B::Plaintext> {
        let values = vec![scalar; self.params.num_slots()];
        Ok(self.backend.encode(&values, level, scale)?)
    }

    /// Fresh encryption of the all-zero plaintext at the given chain
    /// position and scale; used for the zero-plaintext multiplication rule.
    pub(crate) fn zero_ciphertext(&self, level: usize, scale: f64) -> Result<B::RawCt> {
        let zeros = vec![0.0; self.params.num_slots()];
        let pt = self.backend.encode(&zeros, level, scale)?;
        Ok(self.backend.encrypt(&pt)?)
    }
}

impl<B: Backend> Evaluate<B> for HomomorphicEval<B> {
    fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn encrypt_internal(&self, values: &[f64], level: usize) -> Result<CkksCiphertext<B>> {
        let mut ct = meta::fresh(&self.params, level);
        let pt = self.backend.encode(values, level, ct.scale())?;
        ct.raw_ct = Some(self.backend.encrypt(&pt)?);
        Ok(ct)
    }

    fn decrypt_internal(&self, ct: &CkksCiphertext<B>) -> Result<Vec<f64>> {
        let raw = ct.raw_ct.as_ref().ok_or(HeError::Uninitialized { op: "decrypt" })?;
        Ok(self.backend.decrypt(raw)?)
    }

    fn rotate_left_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.with_raw("rotate_left", ct, |b, raw| Ok(b.rotate(raw, steps as isize)?))
    }

    fn rotate_right_internal(&self, ct: &mut CkksCiphertext<B>, steps: usize) -> Result<()> {
        self.with_raw("rotate_right", ct, |b, raw| {
            Ok(b.rotate(raw, -(steps as isize))?)
        })
    }

    fn negate_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.with_raw("negate", ct, |b, raw| Ok(b.negate(raw)?))
    }

    fn add_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        let other = ct2.raw_ct.as_ref().ok_or(HeError::Uninitialized { op: "add" })?;
        self.with_raw("add", ct1, |b, raw| Ok(b.add_ct(raw, other)?))
    }

    fn add_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        let pt = self.encode_broadcast(scalar, ct.he_level(), ct.scale())?;
        self.with_raw("add_plain", ct, |b, raw| Ok(b.add_plain(raw, &pt)?))
    }

    fn add_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        let pt = self.backend.encode(plain, ct.he_level(), ct.scale())?;
        self.with_raw("add_plain", ct, |b, raw| Ok(b.add_plain(raw, &pt)?))
    }

    fn sub_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        let other = ct2.raw_ct.as_ref().ok_or(HeError::Uninitialized { op: "sub" })?;
        self.with_raw("sub", ct1, |b, raw| Ok(b.sub_ct(raw, other)?))
    }

    fn sub_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        let pt = self.encode_broadcast(scalar, ct.he_level(), ct.scale())?;
        self.with_raw("sub_plain", ct, |b, raw| Ok(b.sub_plain(raw, &pt)?))
    }

    fn sub_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        let pt = self.backend.encode(plain, ct.he_level(), ct.scale())?;
        self.with_raw("sub_plain", ct, |b, raw| Ok(b.sub_plain(raw, &pt)?))
    }

    fn multiply_internal(&self, ct1: &mut CkksCiphertext<B>, ct2: &CkksCiphertext<B>) -> Result<()> {
        let other = ct2
            .raw_ct
            .as_ref()
            .ok_or(HeError::Uninitialized { op: "multiply" })?;
        self.with_raw("multiply", ct1, |b, raw| Ok(b.mul_ct(raw, other)?))
    }

    fn multiply_plain_internal(&self, ct: &mut CkksCiphertext<B>, scalar: f64) -> Result<()> {
        let pt = self.encode_broadcast(scalar, ct.he_level(), ct.scale())?;
        self.with_raw("multiply_plain", ct, |b, raw| Ok(b.mul_plain(raw, &pt)?))
    }

    fn multiply_plain_vec_internal(&self, ct: &mut CkksCiphertext<B>, plain: &[f64]) -> Result<()> {
        let pt = self.backend.encode(plain, ct.he_level(), ct.scale())?;
        self.with_raw("multiply_plain", ct, |b, raw| Ok(b.mul_plain(raw, &pt)?))
    }

    fn multiply_plain_zero_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        check_zero_target(ct)?;
        ct.raw_ct = Some(self.zero_ciphertext(ct.he_level(), ct.scale())?);
        if let Some(pt) = ct.raw_pt.as_mut() {
            pt.fill(0.0);
        }
        Ok(())
    }

    fn square_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.with_raw("square", ct, |b, raw| Ok(b.square(raw)?))
    }

    fn relinearize_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.with_raw("relinearize", ct, |b, raw| Ok(b.relinearize(raw)?))
    }

    fn rescale_to_next_internal(&self, ct: &mut CkksCiphertext<B>) -> Result<()> {
        self.with_raw("rescale_to_next", ct, |b, raw| Ok(b.rescale_to_next(raw)?))
    }

    fn mod_down_to_level_internal(&self, ct: &mut CkksCiphertext<B>, level: usize) -> Result<()> {
        self.with_raw("mod_down_to_level", ct, |b, raw| {
            Ok(b.mod_switch_to_level(raw, level)?)
        })
    }
}

fn check_zero_target<B: Backend>(ct: &CkksCiphertext<B>) -> Result<()> {
    if ct.raw_ct.is_none() {
        return Err(HeError::Uninitialized {
            op: "multiply_plain",
        });
    }
    Ok(())
}
