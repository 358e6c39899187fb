//! A high-level toolkit for writing CKKS computations once and running
//! them in several modes: depth discovery, exact plaintext tracking, scale
//! estimation, operation counting, real homomorphic evaluation, and a
//! debug mode that runs several of these in lockstep and cross-checks them
//! after every operation. On top of the evaluator layer sits a linear
//! algebra layer that packs matrices and vectors into ciphertext tiles.
//!
//! The CKKS primitives themselves live behind the [`backend::Backend`]
//! trait; [`backend::NaiveBackend`] is the bundled cleartext reference
//! implementation.

pub mod backend;
pub mod ciphertext;
pub mod common;
pub mod errors;
pub mod evaluator;
pub mod linalg;
pub mod math;
pub mod params;

pub use backend::{Backend, BackendError, NaiveBackend};
pub use ciphertext::{CkksCiphertext, Encoding};
pub use common::{MAX_NORM, l_inf_norm, random_vector, relative_diff_2norm};
pub use errors::{HeError, Result};
pub use evaluator::{
    DebugEval, DepthFinder, Evaluate, HomomorphicEval, OpCount, OpCounts, PlaintextEval,
    ScaleEstimator,
};
pub use linalg::{
    CtContainer, EncodingUnit, EncryptedColVector, EncryptedMatrix, EncryptedRowVector,
    LinearAlgebra, Matrix,
};
pub use params::CkksParams;
