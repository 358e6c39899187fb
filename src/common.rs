//! Shared helpers: norm comparison, parameter tables, test-vector utilities.

use crate::ciphertext::Encoding;
use crate::errors::{HeError, Result};
use rand::Rng;

/// Relative 2-norm threshold below which a decrypted ciphertext is
/// considered to agree with its plaintext oracle.
pub const MAX_NORM: f64 = 0.02;

/// Base-2 log of the 2-norm below which a vector is treated as zero for
/// norm comparison. Decoding noise for an all-zero plaintext produces
/// coefficients far smaller than decryption noise, so relative norms are
/// meaningless below this magnitude.
pub const LOG_NORM_LIMIT: i32 = 11;

fn norm_2(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// `max_i |x[i]|`
pub fn l_inf_norm(x: &[f64]) -> f64 {
    x.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

/// Computes `|expected - actual| / |expected|` under the 2-norm.
///
/// Returns `None` when both inputs have 2-norm at most `2^-LOG_NORM_LIMIT`:
/// the vectors both represent zero and their relative distance carries no
/// information. When only the expected side is below the limit the
/// comparison still runs, with a warning, since that usually indicates a
/// genuinely divergent result.
pub fn relative_diff_2norm(expected: &[f64], actual: &[f64]) -> Result<Option<f64>> {
    if expected.len() != actual.len() {
        return Err(HeError::shape(
            "relative_diff_2norm",
            format!(
                "inputs do not have the same size: {} != {}",
                expected.len(),
                actual.len()
            ),
        ));
    }

    let expected_norm = norm_2(expected);
    let actual_norm = norm_2(actual);
    let limit = 2f64.powi(-LOG_NORM_LIMIT);
    if expected_norm <= limit && actual_norm <= limit {
        return Ok(None);
    }
    if expected_norm <= limit {
        tracing::warn!(expected_norm, actual_norm, "one-sided zero-norm comparison");
    }

    let diff: Vec<f64> = expected
        .iter()
        .zip(actual)
        .map(|(e, a)| e - a)
        .collect();
    Ok(Some(norm_2(&diff) / expected_norm))
}

/// Maximum total modulus bit budget for a given polynomial ring dimension.
pub fn poly_degree_to_max_mod_bits(poly_modulus_degree: usize) -> Result<u32> {
    match poly_modulus_degree {
        1024 => Ok(27),
        2048 => Ok(54),
        4096 => Ok(109),
        8192 => Ok(218),
        16384 => Ok(438),
        32768 => Ok(881),
        65536 => Ok(1761),
        _ => Err(HeError::parameter(format!(
            "poly_modulus_degree={poly_modulus_degree} not supported"
        ))),
    }
}

/// Smallest supported ring dimension whose modulus budget covers `mod_bits`.
pub fn modulus_to_poly_degree(mod_bits: u32) -> Result<usize> {
    for degree in [1024usize, 2048, 4096, 8192, 16384, 32768, 65536] {
        if mod_bits <= poly_degree_to_max_mod_bits(degree)? {
            return Ok(degree);
        }
    }
    Err(HeError::parameter(format!(
        "cannot determine a ring size for a {mod_bits}-bit modulus"
    )))
}

/// Extract the logically meaningful values from a full slot vector, given
/// the ciphertext's encoding shape.
///
/// Matrix-style encodings are a row-major prefix; a row vector lives in the
/// first row of its tile; a column vector in the first column.
pub fn decode_plaintext(
    slots: &[f64],
    encoding: Encoding,
    height: usize,
    width: usize,
    encoded_height: usize,
    encoded_width: usize,
) -> Result<Vec<f64>> {
    match encoding {
        Encoding::RowVec => {
            if height != 1 {
                return Err(HeError::shape(
                    "decode_plaintext",
                    format!("invalid row vector encoding: size {height}x{width}"),
                ));
            }
            Ok(slots[..width.min(encoded_width)].to_vec())
        }
        Encoding::ColVec => {
            if width != 1 {
                return Err(HeError::shape(
                    "decode_plaintext",
                    format!("invalid column vector encoding: size {height}x{width}"),
                ));
            }
            Ok((0..height.min(encoded_height))
                .map(|k| slots[k * encoded_width])
                .collect())
        }
        Encoding::Matrix | Encoding::RowMat => Ok(slots[..height * width].to_vec()),
        Encoding::ColMat => {
            // transposed view: the tile is read column-major
            let mut out = Vec::with_capacity(height * width);
            for r in 0..height {
                for c in 0..width {
                    out.push(slots[c * encoded_height + r]);
                }
            }
            Ok(out)
        }
    }
}

/// Random vector of `dim` values drawn uniformly from `[-max_norm, max_norm]`.
pub fn random_vector<R: Rng + ?Sized>(rng: &mut R, dim: usize, max_norm: f64) -> Vec<f64> {
    (0..dim)
        .map(|_| rng.random_range(-max_norm..=max_norm))
        .collect()
}
