//! The ciphertext record shared by every evaluator variant.

use crate::backend::Backend;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the slot vector of a ciphertext is to be interpreted.
///
/// `RowVec`/`ColVec` mark broadcast vector tiles. `RowMat` marks matrix
/// tiles produced by the vector×matrix hadamard products (read row-major,
/// like `Matrix`); `ColMat` marks tiles of a transposed matrix view, read
/// column-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Matrix,
    RowVec,
    ColVec,
    RowMat,
    ColMat,
}

/// A CKKS ciphertext as the toolkit sees it.
///
/// Depending on which evaluator produced it, the record carries a raw
/// backend ciphertext, an unscaled plaintext slot vector, or neither (pure
/// metadata). The level/scale fields evolve identically across all
/// evaluator variants; the homomorphic evaluator additionally keeps them in
/// sync with the backend's own view.
#[derive(Serialize, Deserialize)]
#[serde(bound(
    serialize = "B::RawCt: Serialize",
    deserialize = "B::RawCt: Deserialize<'de>"
))]
pub struct CkksCiphertext<B: Backend> {
    pub(crate) raw_ct: Option<B::RawCt>,
    /// The plaintext tracked alongside the ciphertext by the plaintext and
    /// debug evaluators. Not CKKS-encoded and not scaled.
    pub(crate) raw_pt: Option<Vec<f64>>,
    pub(crate) level: usize,
    pub(crate) scale: f64,
    pub(crate) num_slots: usize,
    pub(crate) initialized: bool,
    pub(crate) height: usize,
    pub(crate) width: usize,
    pub(crate) encoded_height: usize,
    pub(crate) encoded_width: usize,
    pub(crate) encoding: Encoding,
}

impl<B: Backend> CkksCiphertext<B> {
    /// An uninitialized ciphertext; any evaluator operation on it fails
    /// until it has been produced by encryption.
    pub fn uninitialized() -> Self {
        CkksCiphertext {
            raw_ct: None,
            raw_pt: None,
            level: 0,
            scale: 0.0,
            num_slots: 0,
            initialized: false,
            height: 0,
            width: 0,
            encoded_height: 0,
            encoded_width: 0,
            encoding: Encoding::Matrix,
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Position in the modulus chain; smaller means more rescaling has
    /// happened.
    pub fn he_level(&self) -> usize {
        self.level
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encoded_height(&self) -> usize {
        self.encoded_height
    }

    pub fn encoded_width(&self) -> usize {
        self.encoded_width
    }

    /// The tracked plaintext, when this ciphertext came from a plaintext or
    /// debug evaluator.
    pub fn plaintext(&self) -> Option<&[f64]> {
        self.raw_pt.as_deref()
    }

    pub fn raw_ct(&self) -> Option<&B::RawCt> {
        self.raw_ct.as_ref()
    }

    pub(crate) fn set_shape(
        &mut self,
        encoding: Encoding,
        height: usize,
        width: usize,
        encoded_height: usize,
        encoded_width: usize,
    ) {
        self.encoding = encoding;
        self.height = height;
        self.width = width;
        self.encoded_height = encoded_height;
        self.encoded_width = encoded_width;
    }
}

impl<B: Backend> Clone for CkksCiphertext<B> {
    fn clone(&self) -> Self {
        CkksCiphertext {
            raw_ct: self.raw_ct.clone(),
            raw_pt: self.raw_pt.clone(),
            level: self.level,
            scale: self.scale,
            num_slots: self.num_slots,
            initialized: self.initialized,
            height: self.height,
            width: self.width,
            encoded_height: self.encoded_height,
            encoded_width: self.encoded_width,
            encoding: self.encoding,
        }
    }
}

impl<B: Backend> fmt::Debug for CkksCiphertext<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CkksCiphertext")
            .field("level", &self.level)
            .field("scale", &self.scale)
            .field("num_slots", &self.num_slots)
            .field("initialized", &self.initialized)
            .field("encoding", &self.encoding)
            .field("shape", &(self.height, self.width))
            .field("has_raw_ct", &self.raw_ct.is_some())
            .field("has_raw_pt", &self.raw_pt.is_some())
            .finish()
    }
}
