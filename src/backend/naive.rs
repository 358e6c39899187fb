//! Reference backend operating on cleartext slot vectors.
//!
//! This backend performs no encryption: a "ciphertext" is the scaled slot
//! vector itself, together with the level/scale/degree bookkeeping a real
//! CKKS backend would carry. Encoding still quantizes through the canonical
//! embedding (inverse FFT, integer coefficient rounding, forward FFT), so
//! encoding precision behaves like the real scheme and norm comparisons are
//! meaningful. Use it for tests, circuit profiling, and as the homomorphic
//! side of the debug evaluator; it provides no secrecy.

use super::{Backend, BackendError, BackendResult};
use crate::params::CkksParams;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// An encoded plaintext: quantized slot values at a fixed level and scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaivePlaintext {
    slots: Vec<f64>,
    level: usize,
    scale: f64,
}

/// A "ciphertext": scaled slots plus the metadata a real backend tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveCiphertext {
    slots: Vec<f64>,
    level: usize,
    scale: f64,
    /// Polynomial degree of the ciphertext: 2 when linear, 3 after an
    /// unrelinearized multiplication.
    degree: usize,
}

impl NaiveCiphertext {
    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

pub struct NaiveBackend {
    params: Arc<CkksParams>,
    /// Standard deviation of simulated encryption noise, in the value
    /// domain. Zero by default.
    noise_std: f64,
    rng: Mutex<ChaCha20Rng>,
}

impl NaiveBackend {
    pub fn new(params: Arc<CkksParams>) -> Self {
        NaiveBackend {
            params,
            noise_std: 0.0,
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(0)),
        }
    }

    /// Add seeded Gaussian noise at encryption time, simulating the error
    /// growth of a real scheme.
    pub fn with_encryption_noise(params: Arc<CkksParams>, noise_std: f64, seed: u64) -> Self {
        NaiveBackend {
            params,
            noise_std,
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    pub fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn check_level(&self, op: &'static str, lhs: usize, rhs: usize) -> BackendResult<()> {
        if lhs != rhs {
            return Err(BackendError::new(
                "level_mismatch",
                format!("{op}: operand levels differ ({lhs} vs {rhs})"),
            ));
        }
        Ok(())
    }

    fn check_scale(&self, op: &'static str, lhs: f64, rhs: f64) -> BackendResult<()> {
        if lhs != rhs {
            return Err(BackendError::new(
                "scale_mismatch",
                format!("{op}: operand scales differ ({lhs} vs {rhs})"),
            ));
        }
        Ok(())
    }

    fn check_linear(&self, op: &'static str, ct: &NaiveCiphertext) -> BackendResult<()> {
        if ct.degree > 2 {
            return Err(BackendError::new(
                "degree_overflow",
                format!("{op}: ciphertext must be relinearized first (degree {})", ct.degree),
            ));
        }
        Ok(())
    }
}

/// Quantize scaled slot values through the canonical embedding: inverse FFT
/// to polynomial coefficients, round to integers, forward FFT back to slots.
/// The rounding step is where CKKS encoding precision is lost.
fn quantize_slots(scaled: &[f64]) -> Vec<f64> {
    let num_slots = scaled.len();
    let degree = 2 * num_slots;

    let mut spectrum = vec![Complex64::new(0.0, 0.0); degree];
    for (i, &v) in scaled.iter().enumerate() {
        spectrum[i] = Complex64::new(v, 0.0);
    }
    // conjugate symmetry keeps the polynomial coefficients real
    for i in 1..num_slots {
        spectrum[degree - i] = spectrum[i].conj();
    }

    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(degree).process(&mut spectrum);

    let norm = (degree as f64).recip();
    let mut coeffs: Vec<Complex64> = spectrum
        .iter()
        .map(|c| Complex64::new((c.re * norm).round(), 0.0))
        .collect();

    planner.plan_fft_forward(degree).process(&mut coeffs);
    coeffs.iter().take(num_slots).map(|c| c.re).collect()
}

impl Backend for NaiveBackend {
    type Plaintext = NaivePlaintext;
    type RawCt = NaiveCiphertext;

    fn num_slots(&self) -> usize {
        self.params.num_slots()
    }

    fn max_level(&self) -> usize {
        self.params.max_level()
    }

    fn encode(&self, values: &[f64], level: usize, scale: f64) -> BackendResult<Self::Plaintext> {
        if values.len() != self.params.num_slots() {
            return Err(BackendError::new(
                "slot_count",
                format!(
                    "encode expects exactly {} values, got {}",
                    self.params.num_slots(),
                    values.len()
                ),
            ));
        }
        if level > self.params.max_level() {
            return Err(BackendError::new(
                "level_out_of_range",
                format!("level {level} exceeds chain top {}", self.params.max_level()),
            ));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(BackendError::new("scale", format!("invalid scale {scale}")));
        }

        let scaled: Vec<f64> = values.iter().map(|v| v * scale).collect();
        Ok(NaivePlaintext {
            slots: quantize_slots(&scaled),
            level,
            scale,
        })
    }

    fn encrypt(&self, plaintext: &Self::Plaintext) -> BackendResult<Self::RawCt> {
        let mut slots = plaintext.slots.clone();
        if self.noise_std > 0.0 {
            let normal = Normal::new(0.0, self.noise_std * plaintext.scale)
                .map_err(|e| BackendError::new("noise", e.to_string()))?;
            let mut rng = self.rng.lock().expect("noise rng poisoned");
            for s in slots.iter_mut() {
                *s += normal.sample(&mut *rng);
            }
        }
        Ok(NaiveCiphertext {
            slots,
            level: plaintext.level,
            scale: plaintext.scale,
            degree: 2,
        })
    }

    fn decrypt(&self, ct: &Self::RawCt) -> BackendResult<Vec<f64>> {
        Ok(ct.slots.iter().map(|s| s / ct.scale).collect())
    }

    fn add_ct(&self, ct: &mut Self::RawCt, other: &Self::RawCt) -> BackendResult<()> {
        self.check_level("add_ct", ct.level, other.level)?;
        self.check_scale("add_ct", ct.scale, other.scale)?;
        for (a, b) in ct.slots.iter_mut().zip(&other.slots) {
            *a += b;
        }
        ct.degree = ct.degree.max(other.degree);
        Ok(())
    }

    fn add_plain(&self, ct: &mut Self::RawCt, plain: &Self::Plaintext) -> BackendResult<()> {
        self.check_level("add_plain", ct.level, plain.level)?;
        self.check_scale("add_plain", ct.scale, plain.scale)?;
        for (a, b) in ct.slots.iter_mut().zip(&plain.slots) {
            *a += b;
        }
        Ok(())
    }

    fn sub_ct(&self, ct: &mut Self::RawCt, other: &Self::RawCt) -> BackendResult<()> {
        self.check_level("sub_ct", ct.level, other.level)?;
        self.check_scale("sub_ct", ct.scale, other.scale)?;
        for (a, b) in ct.slots.iter_mut().zip(&other.slots) {
            *a -= b;
        }
        ct.degree = ct.degree.max(other.degree);
        Ok(())
    }

    fn sub_plain(&self, ct: &mut Self::RawCt, plain: &Self::Plaintext) -> BackendResult<()> {
        self.check_level("sub_plain", ct.level, plain.level)?;
        self.check_scale("sub_plain", ct.scale, plain.scale)?;
        for (a, b) in ct.slots.iter_mut().zip(&plain.slots) {
            *a -= b;
        }
        Ok(())
    }

    fn negate(&self, ct: &mut Self::RawCt) -> BackendResult<()> {
        for a in ct.slots.iter_mut() {
            *a = -*a;
        }
        Ok(())
    }

    fn mul_ct(&self, ct: &mut Self::RawCt, other: &Self::RawCt) -> BackendResult<()> {
        self.check_level("mul_ct", ct.level, other.level)?;
        self.check_linear("mul_ct", ct)?;
        self.check_linear("mul_ct", other)?;
        for (a, b) in ct.slots.iter_mut().zip(&other.slots) {
            *a *= b;
        }
        ct.scale *= other.scale;
        ct.degree = ct.degree + other.degree - 1;
        Ok(())
    }

    fn mul_plain(&self, ct: &mut Self::RawCt, plain: &Self::Plaintext) -> BackendResult<()> {
        self.check_level("mul_plain", ct.level, plain.level)?;
        self.check_linear("mul_plain", ct)?;
        for (a, b) in ct.slots.iter_mut().zip(&plain.slots) {
            *a *= b;
        }
        ct.scale *= plain.scale;
        Ok(())
    }

    fn square(&self, ct: &mut Self::RawCt) -> BackendResult<()> {
        self.check_linear("square", ct)?;
        for a in ct.slots.iter_mut() {
            *a *= *a;
        }
        ct.scale *= ct.scale;
        ct.degree = 2 * ct.degree - 1;
        Ok(())
    }

    fn relinearize(&self, ct: &mut Self::RawCt) -> BackendResult<()> {
        if ct.degree > 2 {
            ct.degree = 2;
        }
        Ok(())
    }

    fn rescale_to_next(&self, ct: &mut Self::RawCt) -> BackendResult<()> {
        if ct.level == 0 {
            return Err(BackendError::new(
                "level_out_of_range",
                "cannot rescale below the bottom of the modulus chain",
            ));
        }
        let prime = self.params.prime(ct.level) as f64;
        for a in ct.slots.iter_mut() {
            *a /= prime;
        }
        ct.scale /= prime;
        ct.level -= 1;
        Ok(())
    }

    fn mod_switch_to_level(&self, ct: &mut Self::RawCt, level: usize) -> BackendResult<()> {
        if level > ct.level {
            return Err(BackendError::new(
                "level_out_of_range",
                format!("cannot switch up from level {} to {level}", ct.level),
            ));
        }
        ct.level = level;
        Ok(())
    }

    fn rotate(&self, ct: &mut Self::RawCt, steps: isize) -> BackendResult<()> {
        self.check_linear("rotate", ct)?;
        let n = ct.slots.len();
        let k = steps.unsigned_abs() % n;
        if steps >= 0 {
            ct.slots.rotate_left(k);
        } else {
            ct.slots.rotate_right(k);
        }
        Ok(())
    }

    fn ct_level(&self, ct: &Self::RawCt) -> usize {
        ct.level
    }

    fn ct_scale(&self, ct: &Self::RawCt) -> f64 {
        ct.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_backend() -> NaiveBackend {
        let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
        NaiveBackend::new(params)
    }

    fn encode_front(backend: &NaiveBackend, front: &[f64]) -> NaivePlaintext {
        let mut values = vec![0.0; backend.num_slots()];
        values[..front.len()].copy_from_slice(front);
        backend
            .encode(&values, backend.max_level(), backend.params().scale())
            .unwrap()
    }

    #[test]
    fn encode_decrypt_roundtrip_is_close() {
        let backend = test_backend();
        let pt = encode_front(&backend, &[1.5, -2.25, 3.0, 0.125]);
        let ct = backend.encrypt(&pt).unwrap();
        let out = backend.decrypt(&ct).unwrap();
        for (i, expected) in [1.5, -2.25, 3.0, 0.125].into_iter().enumerate() {
            assert_relative_eq!(out[i], expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn multiply_squares_scale_and_bumps_degree() {
        let backend = test_backend();
        let pt = encode_front(&backend, &[2.0]);
        let mut ct = backend.encrypt(&pt).unwrap();
        let other = ct.clone();
        backend.mul_ct(&mut ct, &other).unwrap();
        assert_eq!(ct.degree(), 3);
        assert_eq!(backend.ct_scale(&ct), backend.params().scale().powi(2));

        // a second multiply without relinearization is rejected
        let err = backend.mul_ct(&mut ct.clone(), &other).unwrap_err();
        assert_eq!(err.code, "degree_overflow");

        backend.relinearize(&mut ct).unwrap();
        assert_eq!(ct.degree(), 2);
        backend.rescale_to_next(&mut ct).unwrap();
        assert_eq!(backend.ct_level(&ct), backend.max_level() - 1);
        let out = backend.decrypt(&ct).unwrap();
        assert_relative_eq!(out[0], 4.0, epsilon = 1e-5);
    }

    #[test]
    fn rescale_at_bottom_fails() {
        let backend = test_backend();
        let pt = backend
            .encode(&vec![0.0; backend.num_slots()], 0, backend.params().encryption_scale(0))
            .unwrap();
        let mut ct = backend.encrypt(&pt).unwrap();
        let err = backend.rescale_to_next(&mut ct).unwrap_err();
        assert_eq!(err.code, "level_out_of_range");
    }

    #[test]
    fn rotation_is_cyclic() {
        let backend = test_backend();
        let mut values = vec![0.0; backend.num_slots()];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (i % 17) as f64;
        }
        let pt = backend
            .encode(&values, backend.max_level(), backend.params().scale())
            .unwrap();
        let mut ct = backend.encrypt(&pt).unwrap();
        backend.rotate(&mut ct, 3).unwrap();
        backend.rotate(&mut ct, -3).unwrap();
        let out = backend.decrypt(&ct).unwrap();
        for (o, v) in out.iter().zip(&values) {
            assert_relative_eq!(o, v, epsilon = 1e-6);
        }
    }
}
