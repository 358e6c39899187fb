//! The fixed tile used to pack linear algebra objects into ciphertexts.

use crate::errors::{HeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `height × width` tile with both dimensions powers of two and
/// `height · width` equal to the ciphertext slot count. Two units are equal
/// iff both dimensions match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingUnit {
    height: usize,
    width: usize,
}

impl EncodingUnit {
    pub fn new(height: usize, width: usize, num_slots: usize) -> Result<Self> {
        if !height.is_power_of_two() || !width.is_power_of_two() {
            return Err(HeError::parameter(format!(
                "encoding unit dimensions must be powers of two, got {height}x{width}"
            )));
        }
        if height * width != num_slots {
            return Err(HeError::parameter(format!(
                "encoding unit {height}x{width} does not hold exactly {num_slots} slots"
            )));
        }
        Ok(EncodingUnit { height, width })
    }

    pub fn encoding_height(&self) -> usize {
        self.height
    }

    pub fn encoding_width(&self) -> usize {
        self.width
    }

    pub fn num_slots(&self) -> usize {
        self.height * self.width
    }

    /// The same slots viewed as a `width × height` tile.
    pub fn transposed(&self) -> EncodingUnit {
        EncodingUnit {
            height: self.width,
            width: self.height,
        }
    }
}

impl fmt::Display for EncodingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}
