//! Encrypted matrix: a rectangular grid of unit tiles.

use super::{CtContainer, EncodingUnit};
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::{HeError, Result};
use serde::{Deserialize, Serialize};

/// A `height × width` matrix tiled into a row-major grid of
/// `⌈height/unit.h⌉ × ⌈width/unit.w⌉` ciphertexts. Cells outside the
/// logical shape are zero-padded at encoding time; all ciphertexts share
/// the same level and scale.
#[derive(Serialize, Deserialize)]
#[serde(bound(
    serialize = "B::RawCt: Serialize",
    deserialize = "B::RawCt: serde::Deserialize<'de>"
))]
pub struct EncryptedMatrix<B: Backend> {
    height: usize,
    width: usize,
    unit: EncodingUnit,
    cts: Vec<Vec<CkksCiphertext<B>>>,
}

impl<B: Backend> EncryptedMatrix<B> {
    pub fn new(
        height: usize,
        width: usize,
        unit: EncodingUnit,
        cts: Vec<Vec<CkksCiphertext<B>>>,
    ) -> Result<Self> {
        let mat = EncryptedMatrix {
            height,
            width,
            unit,
            cts,
        };
        mat.validate_init()?;
        Ok(mat)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encoding_unit(&self) -> EncodingUnit {
        self.unit
    }

    pub fn num_vertical_units(&self) -> usize {
        self.height.div_ceil(self.unit.encoding_height())
    }

    pub fn num_horizontal_units(&self) -> usize {
        self.width.div_ceil(self.unit.encoding_width())
    }

    pub fn cell(&self, i: usize, j: usize) -> &CkksCiphertext<B> {
        &self.cts[i][j]
    }

    pub fn grid(&self) -> &[Vec<CkksCiphertext<B>>] {
        &self.cts
    }

    fn validate_init(&self) -> Result<()> {
        if !CtContainer::initialized(self) {
            return Err(HeError::shape(
                "EncryptedMatrix",
                format!(
                    "invalid ciphertext grid for a {}x{} matrix on a {} unit",
                    self.height, self.width, self.unit
                ),
            ));
        }
        Ok(())
    }
}

impl<B: Backend> Clone for EncryptedMatrix<B> {
    fn clone(&self) -> Self {
        EncryptedMatrix {
            height: self.height,
            width: self.width,
            unit: self.unit,
            cts: self.cts.clone(),
        }
    }
}

impl<B: Backend> CtContainer<B> for EncryptedMatrix<B> {
    fn unit(&self) -> EncodingUnit {
        self.unit
    }

    fn cells(&self) -> Vec<&CkksCiphertext<B>> {
        self.cts.iter().flatten().collect()
    }

    fn cells_mut(&mut self) -> Vec<&mut CkksCiphertext<B>> {
        self.cts.iter_mut().flatten().collect()
    }

    fn initialized(&self) -> bool {
        if self.cts.is_empty() || self.cts[0].is_empty() || self.height == 0 || self.width == 0 {
            return false;
        }
        if self.cts.len() != self.num_vertical_units() {
            return false;
        }
        let row_len = self.cts[0].len();
        if row_len != self.num_horizontal_units() {
            return false;
        }
        let first = &self.cts[0][0];
        self.cts.iter().all(|row| {
            row.len() == row_len
                && row.iter().all(|ct| {
                    ct.initialized()
                        && ct.he_level() == first.he_level()
                        && ct.scale() == first.scale()
                })
        })
    }

    fn same_size(&self, other: &Self) -> bool {
        self.height == other.height && self.width == other.width && self.unit == other.unit
    }

    fn dims(&self) -> String {
        format!("{}x{} matrix on unit {}", self.height, self.width, self.unit)
    }
}
