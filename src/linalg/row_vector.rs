//! Encrypted row vector: a list of broadcast tiles.

use super::{CtContainer, EncodingUnit};
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::{HeError, Result};
use serde::{Deserialize, Serialize};

/// A length-`width` vector chunked along the unit width, one ciphertext per
/// chunk, each chunk broadcast down its tile's rows. All ciphertexts share
/// the same level and scale.
#[derive(Serialize, Deserialize)]
#[serde(bound(
    serialize = "B::RawCt: Serialize",
    deserialize = "B::RawCt: serde::Deserialize<'de>"
))]
pub struct EncryptedRowVector<B: Backend> {
    width: usize,
    unit: EncodingUnit,
    cts: Vec<CkksCiphertext<B>>,
}

impl<B: Backend> EncryptedRowVector<B> {
    pub fn new(width: usize, unit: EncodingUnit, cts: Vec<CkksCiphertext<B>>) -> Result<Self> {
        let vec = EncryptedRowVector { width, unit, cts };
        vec.validate_init()?;
        Ok(vec)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encoding_unit(&self) -> EncodingUnit {
        self.unit
    }

    pub fn num_units(&self) -> usize {
        self.width.div_ceil(self.unit.encoding_width())
    }

    pub fn cts(&self) -> &[CkksCiphertext<B>] {
        &self.cts
    }

    fn validate_init(&self) -> Result<()> {
        if !CtContainer::initialized(self) {
            return Err(HeError::shape(
                "EncryptedRowVector",
                format!(
                    "invalid ciphertext list for a {}-wide vector on a {} unit",
                    self.width, self.unit
                ),
            ));
        }
        Ok(())
    }
}

impl<B: Backend> Clone for EncryptedRowVector<B> {
    fn clone(&self) -> Self {
        EncryptedRowVector {
            width: self.width,
            unit: self.unit,
            cts: self.cts.clone(),
        }
    }
}

impl<B: Backend> CtContainer<B> for EncryptedRowVector<B> {
    fn unit(&self) -> EncodingUnit {
        self.unit
    }

    fn cells(&self) -> Vec<&CkksCiphertext<B>> {
        self.cts.iter().collect()
    }

    fn cells_mut(&mut self) -> Vec<&mut CkksCiphertext<B>> {
        self.cts.iter_mut().collect()
    }

    fn initialized(&self) -> bool {
        !self.cts.is_empty()
            && self.width > 0
            && self.cts.len() == self.num_units()
            && self
                .cts
                .iter()
                .all(|ct| {
                    ct.initialized()
                        && ct.he_level() == self.cts[0].he_level()
                        && ct.scale() == self.cts[0].scale()
                })
    }

    fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.unit == other.unit
    }

    fn dims(&self) -> String {
        format!("row vector of length {} on unit {}", self.width, self.unit)
    }
}
