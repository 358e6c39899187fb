//! The backend seam: everything the toolkit needs from a CKKS
//! implementation, expressed over opaque handle types.
//!
//! The evaluator layer never looks inside a raw ciphertext; it drives the
//! nine primitive operations and the encode/encrypt/decrypt triple through
//! this trait. [`NaiveBackend`] is the bundled reference implementation;
//! a production deployment supplies its own.

pub mod naive;

pub use naive::{NaiveBackend, NaiveCiphertext, NaivePlaintext};

use thiserror::Error;

/// A failure inside the backend. The code identifies the failing primitive
/// condition; the message is free-form. Backend errors are fatal to the
/// current circuit and propagate unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("backend error [{code}]: {message}")]
pub struct BackendError {
    pub code: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        BackendError {
            code,
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Contract between the toolkit and a CKKS implementation.
///
/// All mutating primitives work in place on a raw ciphertext. Rotation
/// steps are signed: positive rotates slots left, negative right. The
/// backend keeps its own view of a ciphertext's level and scale, which the
/// homomorphic evaluator mirrors into the toolkit-level metadata after
/// every call.
pub trait Backend: Send + Sync {
    type Plaintext: Clone + Send + Sync;
    type RawCt: Clone + Send + Sync;

    fn num_slots(&self) -> usize;
    fn max_level(&self) -> usize;

    fn encode(&self, values: &[f64], level: usize, scale: f64) -> BackendResult<Self::Plaintext>;
    fn encrypt(&self, plaintext: &Self::Plaintext) -> BackendResult<Self::RawCt>;
    fn decrypt(&self, ct: &Self::RawCt) -> BackendResult<Vec<f64>>;

    fn add_ct(&self, ct: &mut Self::RawCt, other: &Self::RawCt) -> BackendResult<()>;
    fn add_plain(&self, ct: &mut Self::RawCt, plain: &Self::Plaintext) -> BackendResult<()>;
    fn sub_ct(&self, ct: &mut Self::RawCt, other: &Self::RawCt) -> BackendResult<()>;
    fn sub_plain(&self, ct: &mut Self::RawCt, plain: &Self::Plaintext) -> BackendResult<()>;
    fn negate(&self, ct: &mut Self::RawCt) -> BackendResult<()>;
    fn mul_ct(&self, ct: &mut Self::RawCt, other: &Self::RawCt) -> BackendResult<()>;
    fn mul_plain(&self, ct: &mut Self::RawCt, plain: &Self::Plaintext) -> BackendResult<()>;
    fn square(&self, ct: &mut Self::RawCt) -> BackendResult<()>;
    fn relinearize(&self, ct: &mut Self::RawCt) -> BackendResult<()>;
    fn rescale_to_next(&self, ct: &mut Self::RawCt) -> BackendResult<()>;
    fn mod_switch_to_level(&self, ct: &mut Self::RawCt, level: usize) -> BackendResult<()>;
    fn rotate(&self, ct: &mut Self::RawCt, steps: isize) -> BackendResult<()>;

    /// The backend's view of the ciphertext's level.
    fn ct_level(&self, ct: &Self::RawCt) -> usize;
    /// The backend's view of the ciphertext's scale.
    fn ct_scale(&self, ct: &Self::RawCt) -> f64;
}
