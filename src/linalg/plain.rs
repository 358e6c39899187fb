//! Plaintext-side matrix type and the tiling codecs.
//!
//! A matrix is tiled into encoding units row-major; cells outside the
//! logical shape are padded with zeros. A row vector is chunked along the
//! unit width with each chunk broadcast down the tile's rows; a column
//! vector is chunked along the unit height with each chunk broadcast across
//! the tile's columns.

use super::EncodingUnit;
use crate::errors::{HeError, Result};

/// A dense row-major matrix of reals.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    height: usize,
    width: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(height: usize, width: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != height * width {
            return Err(HeError::shape(
                "Matrix::new",
                format!(
                    "{height}x{width} matrix needs {} entries, got {}",
                    height * width,
                    data.len()
                ),
            ));
        }
        Ok(Matrix {
            height,
            width,
            data,
        })
    }

    pub fn zero(height: usize, width: usize) -> Self {
        Matrix {
            height,
            width,
            data: vec![0.0; height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    pub fn transposed(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.width {
            for r in 0..self.height {
                data.push(self.get(r, c));
            }
        }
        Matrix {
            height: self.width,
            width: self.height,
            data,
        }
    }
}

/// Tile a matrix into unit-sized slot vectors, row-major over the grid and
/// within each tile, zero-padding the edges.
pub fn encode_matrix(mat: &Matrix, unit: &EncodingUnit) -> Vec<Vec<Vec<f64>>> {
    let h = unit.encoding_height();
    let w = unit.encoding_width();
    let vertical_units = mat.height().div_ceil(h);
    let horizontal_units = mat.width().div_ceil(w);

    let mut grid = Vec::with_capacity(vertical_units);
    for i in 0..vertical_units {
        let mut row_units = Vec::with_capacity(horizontal_units);
        for j in 0..horizontal_units {
            let mut tile = Vec::with_capacity(h * w);
            for k in 0..h {
                for l in 0..w {
                    let row = i * h + k;
                    let col = j * w + l;
                    if row < mat.height() && col < mat.width() {
                        tile.push(mat.get(row, col));
                    } else {
                        tile.push(0.0);
                    }
                }
            }
            row_units.push(tile);
        }
        grid.push(row_units);
    }
    grid
}

/// Reassemble a matrix from its tiles, trimming to the declared shape.
/// `transposed_tiles` reads each tile column-major, for grids produced by
/// metadata-level transposition.
pub fn decode_matrix(
    tiles: &[Vec<Vec<f64>>],
    height: usize,
    width: usize,
    unit: &EncodingUnit,
    transposed_tiles: bool,
) -> Result<Matrix> {
    if tiles.is_empty() || tiles[0].is_empty() {
        return Err(HeError::shape("decode_matrix", "input cannot be empty"));
    }
    let h = unit.encoding_height();
    let w = unit.encoding_width();

    let mut data = Vec::with_capacity(height * width);
    for r in 0..height {
        let (i, k) = (r / h, r % h);
        for c in 0..width {
            let (j, l) = (c / w, c % w);
            let tile = &tiles[i][j];
            let idx = if transposed_tiles { l * h + k } else { k * w + l };
            data.push(tile[idx]);
        }
    }
    Matrix::new(height, width, data)
}

/// Chunk a row vector along the unit width, broadcasting each chunk down
/// the tile's rows.
pub fn encode_row_vector(vec: &[f64], unit: &EncodingUnit) -> Vec<Vec<f64>> {
    let h = unit.encoding_height();
    let w = unit.encoding_width();
    let units = vec.len().div_ceil(w);

    let mut tiles = Vec::with_capacity(units);
    for j in 0..units {
        let mut tile = Vec::with_capacity(h * w);
        for _k in 0..h {
            for l in 0..w {
                let idx = j * w + l;
                tile.push(if idx < vec.len() { vec[idx] } else { 0.0 });
            }
        }
        tiles.push(tile);
    }
    tiles
}

pub fn decode_row_vector(tiles: &[Vec<f64>], width: usize, unit: &EncodingUnit) -> Vec<f64> {
    let w = unit.encoding_width();
    let mut out = Vec::with_capacity(width);
    for c in 0..width {
        out.push(tiles[c / w][c % w]);
    }
    out
}

/// Chunk a column vector along the unit height, broadcasting each chunk
/// across the tile's columns.
pub fn encode_col_vector(vec: &[f64], unit: &EncodingUnit) -> Vec<Vec<f64>> {
    let h = unit.encoding_height();
    let w = unit.encoding_width();
    let units = vec.len().div_ceil(h);

    let mut tiles = Vec::with_capacity(units);
    for i in 0..units {
        let mut tile = Vec::with_capacity(h * w);
        for k in 0..h {
            let idx = i * h + k;
            let v = if idx < vec.len() { vec[idx] } else { 0.0 };
            for _l in 0..w {
                tile.push(v);
            }
        }
        tiles.push(tile);
    }
    tiles
}

pub fn decode_col_vector(tiles: &[Vec<f64>], height: usize, unit: &EncodingUnit) -> Vec<f64> {
    let h = unit.encoding_height();
    let w = unit.encoding_width();
    let mut out = Vec::with_capacity(height);
    for r in 0..height {
        out.push(tiles[r / h][(r % h) * w]);
    }
    out
}

/// Slot mask selecting a single tile column, with `value` in that column
/// and zero elsewhere.
pub(crate) fn col_mask(unit: &EncodingUnit, col: usize, value: f64) -> Vec<f64> {
    let h = unit.encoding_height();
    let w = unit.encoding_width();
    let mut mask = vec![0.0; h * w];
    for k in 0..h {
        mask[k * w + col] = value;
    }
    mask
}

/// Slot mask selecting a single tile row.
pub(crate) fn row_mask(unit: &EncodingUnit, row: usize, value: f64) -> Vec<f64> {
    let h = unit.encoding_height();
    let w = unit.encoding_width();
    let mut mask = vec![0.0; h * w];
    for l in 0..w {
        mask[row * w + l] = value;
    }
    mask
}
