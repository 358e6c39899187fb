//! Encrypted column vector: the dual of the row vector layout.

use super::{CtContainer, EncodingUnit};
use crate::backend::Backend;
use crate::ciphertext::CkksCiphertext;
use crate::errors::{HeError, Result};
use serde::{Deserialize, Serialize};

/// A length-`height` vector chunked along the unit height, one ciphertext
/// per chunk, each chunk broadcast across its tile's columns.
#[derive(Serialize, Deserialize)]
#[serde(bound(
    serialize = "B::RawCt: Serialize",
    deserialize = "B::RawCt: serde::Deserialize<'de>"
))]
pub struct EncryptedColVector<B: Backend> {
    height: usize,
    unit: EncodingUnit,
    cts: Vec<CkksCiphertext<B>>,
}

impl<B: Backend> EncryptedColVector<B> {
    pub fn new(height: usize, unit: EncodingUnit, cts: Vec<CkksCiphertext<B>>) -> Result<Self> {
        let vec = EncryptedColVector { height, unit, cts };
        vec.validate_init()?;
        Ok(vec)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn encoding_unit(&self) -> EncodingUnit {
        self.unit
    }

    pub fn num_units(&self) -> usize {
        self.height.div_ceil(self.unit.encoding_height())
    }

    pub fn cts(&self) -> &[CkksCiphertext<B>] {
        &self.cts
    }

    fn validate_init(&self) -> Result<()> {
        if !CtContainer::initialized(self) {
            return Err(HeError::shape(
                "EncryptedColVector",
                format!(
                    "invalid ciphertext list for a {}-tall vector on a {} unit",
                    self.height, self.unit
                ),
            ));
        }
        Ok(())
    }
}

impl<B: Backend> Clone for EncryptedColVector<B> {
    fn clone(&self) -> Self {
        EncryptedColVector {
            height: self.height,
            unit: self.unit,
            cts: self.cts.clone(),
        }
    }
}

impl<B: Backend> CtContainer<B> for EncryptedColVector<B> {
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
            && self.height > 0
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
        self.height == other.height && self.unit == other.unit
    }

    fn dims(&self) -> String {
        format!("column vector of length {} on unit {}", self.height, self.unit)
    }
}
