//! Linear algebra over encrypted tiles.
//!
//! Lifts the evaluator API to row vectors, column vectors, and matrices
//! packed into [`EncodingUnit`] tiles. Every operation here is built from
//! evaluator primitives only, and applies the identical primitive sequence
//! to each ciphertext in a container, which is what keeps the grid-level
//! level/scale invariants intact. Grid loops run in parallel across cells;
//! the evaluator accumulators are lock-protected, so parallelism does not
//! change observable results.
//!
//! The vector×matrix products follow the rotate-and-sum reductions of
//! Halevi–Shoup-style packed linear algebra: summing a matrix's rows needs
//! rotations only, while summing its columns masks out one tile column and
//! rebroadcasts it, consuming a multiplication.

pub mod col_vector;
pub mod encoding_unit;
pub mod matrix;
pub mod plain;
pub mod row_vector;

pub use col_vector::EncryptedColVector;
pub use encoding_unit::EncodingUnit;
pub use matrix::EncryptedMatrix;
pub use plain::Matrix;
pub use row_vector::EncryptedRowVector;

use crate::backend::Backend;
use crate::ciphertext::{CkksCiphertext, Encoding};
use crate::errors::{HeError, Result};
use crate::evaluator::Evaluate;
use crate::params::CkksParams;
use rayon::prelude::*;
use std::marker::PhantomData;
use std::sync::Arc;

/// Uniform access to the ciphertext cells of an encrypted container.
pub trait CtContainer<B: Backend>: Clone + Send + Sync {
    fn unit(&self) -> EncodingUnit;
    fn cells(&self) -> Vec<&CkksCiphertext<B>>;
    fn cells_mut(&mut self) -> Vec<&mut CkksCiphertext<B>>;
    fn initialized(&self) -> bool;
    fn same_size(&self, other: &Self) -> bool;
    fn dims(&self) -> String;

    fn num_cts(&self) -> usize {
        self.cells().len()
    }

    /// Common level of all cells. Containers are validated at construction
    /// to be non-empty and level-uniform.
    fn he_level(&self) -> usize {
        self.cells()[0].he_level()
    }

    /// Common scale of all cells.
    fn scale(&self) -> f64 {
        self.cells()[0].scale()
    }
}

/// Encryption, decryption, and linear algebra over encrypted containers,
/// on top of any evaluator.
pub struct LinearAlgebra<'a, B: Backend, E: Evaluate<B>> {
    eval: &'a E,
    _backend: PhantomData<fn() -> B>,
}

impl<'a, B, E> LinearAlgebra<'a, B, E>
where
    B: Backend,
    E: Evaluate<B> + Sync,
{
    pub fn new(eval: &'a E) -> Self {
        LinearAlgebra {
            eval,
            _backend: PhantomData,
        }
    }

    pub fn evaluator(&self) -> &E {
        self.eval
    }

    fn params(&self) -> &Arc<CkksParams> {
        self.eval.params()
    }

    /// A unit with the given height covering all plaintext slots.
    pub fn make_unit(&self, height: usize) -> Result<EncodingUnit> {
        let num_slots = self.params().num_slots();
        if height == 0 || num_slots % height != 0 {
            return Err(HeError::parameter(format!(
                "unit height {height} does not divide the slot count {num_slots}"
            )));
        }
        EncodingUnit::new(height, num_slots / height, num_slots)
    }

    // ---- encryption and decryption ----

    pub fn encrypt_matrix(
        &self,
        mat: &Matrix,
        unit: EncodingUnit,
        level: Option<usize>,
    ) -> Result<EncryptedMatrix<B>> {
        if mat.height() == 0 || mat.width() == 0 {
            return Err(HeError::shape("encrypt_matrix", "matrix cannot be empty"));
        }
        let tiles = plain::encode_matrix(mat, &unit);
        let grid = tiles
            .par_iter()
            .map(|row| {
                row.iter()
                    .map(|tile| {
                        let mut ct = self.eval.encrypt(tile, level)?;
                        ct.set_shape(
                            Encoding::Matrix,
                            unit.encoding_height(),
                            unit.encoding_width(),
                            unit.encoding_height(),
                            unit.encoding_width(),
                        );
                        Ok(ct)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedMatrix::new(mat.height(), mat.width(), unit, grid)
    }

    pub fn decrypt_matrix(&self, enc: &EncryptedMatrix<B>) -> Result<Matrix> {
        check_container_init("decrypt_matrix", enc)?;
        let transposed = enc.cell(0, 0).encoding() == Encoding::ColMat;
        let mut tiles = Vec::with_capacity(enc.num_vertical_units());
        for row in enc.grid() {
            let mut tile_row = Vec::with_capacity(row.len());
            for cell in row {
                tile_row.push(self.eval.decrypt(cell)?);
            }
            tiles.push(tile_row);
        }
        plain::decode_matrix(
            &tiles,
            enc.height(),
            enc.width(),
            &enc.encoding_unit(),
            transposed,
        )
    }

    pub fn encrypt_row_vector(
        &self,
        vec: &[f64],
        unit: EncodingUnit,
        level: Option<usize>,
    ) -> Result<EncryptedRowVector<B>> {
        if vec.is_empty() {
            return Err(HeError::shape("encrypt_row_vector", "vector cannot be empty"));
        }
        let tiles = plain::encode_row_vector(vec, &unit);
        let cts = tiles
            .par_iter()
            .map(|tile| {
                let mut ct = self.eval.encrypt(tile, level)?;
                ct.set_shape(
                    Encoding::RowVec,
                    1,
                    unit.encoding_width(),
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                Ok(ct)
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedRowVector::new(vec.len(), unit, cts)
    }

    pub fn decrypt_row_vector(&self, enc: &EncryptedRowVector<B>) -> Result<Vec<f64>> {
        check_container_init("decrypt_row_vector", enc)?;
        let mut tiles = Vec::with_capacity(enc.num_units());
        for ct in enc.cts() {
            tiles.push(self.eval.decrypt(ct)?);
        }
        Ok(plain::decode_row_vector(&tiles, enc.width(), &enc.encoding_unit()))
    }

    pub fn encrypt_col_vector(
        &self,
        vec: &[f64],
        unit: EncodingUnit,
        level: Option<usize>,
    ) -> Result<EncryptedColVector<B>> {
        if vec.is_empty() {
            return Err(HeError::shape("encrypt_col_vector", "vector cannot be empty"));
        }
        let tiles = plain::encode_col_vector(vec, &unit);
        let cts = tiles
            .par_iter()
            .map(|tile| {
                let mut ct = self.eval.encrypt(tile, level)?;
                ct.set_shape(
                    Encoding::ColVec,
                    unit.encoding_height(),
                    1,
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                Ok(ct)
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedColVector::new(vec.len(), unit, cts)
    }

    pub fn decrypt_col_vector(&self, enc: &EncryptedColVector<B>) -> Result<Vec<f64>> {
        check_container_init("decrypt_col_vector", enc)?;
        let mut tiles = Vec::with_capacity(enc.num_units());
        for ct in enc.cts() {
            tiles.push(self.eval.decrypt(ct)?);
        }
        Ok(plain::decode_col_vector(&tiles, enc.height(), &enc.encoding_unit()))
    }

    // ---- component-wise operations ----

    pub fn add_inplace<T: CtContainer<B>>(&self, arg1: &mut T, arg2: &T) -> Result<()> {
        check_binary_containers("add", arg1, arg2)?;
        arg1.cells_mut()
            .into_par_iter()
            .zip(arg2.cells())
            .try_for_each(|(a, b)| self.eval.add_inplace(a, b))
    }

    pub fn add<T: CtContainer<B>>(&self, arg1: &T, arg2: &T) -> Result<T> {
        let mut out = arg1.clone();
        self.add_inplace(&mut out, arg2)?;
        Ok(out)
    }

    /// Component-wise sum of a non-empty list.
    pub fn add_many<T: CtContainer<B>>(&self, args: &[T]) -> Result<T> {
        let (first, rest) = args.split_first().ok_or_else(|| {
            HeError::parameter("add_many: the list of summands cannot be empty")
        })?;
        let mut acc = first.clone();
        for arg in rest {
            self.add_inplace(&mut acc, arg)?;
        }
        Ok(acc)
    }

    pub fn sub_inplace<T: CtContainer<B>>(&self, arg1: &mut T, arg2: &T) -> Result<()> {
        check_binary_containers("sub", arg1, arg2)?;
        arg1.cells_mut()
            .into_par_iter()
            .zip(arg2.cells())
            .try_for_each(|(a, b)| self.eval.sub_inplace(a, b))
    }

    pub fn sub<T: CtContainer<B>>(&self, arg1: &T, arg2: &T) -> Result<T> {
        let mut out = arg1.clone();
        self.sub_inplace(&mut out, arg2)?;
        Ok(out)
    }

    /// Add a scalar to every coefficient.
    pub fn add_plain_scalar_inplace<T: CtContainer<B>>(&self, arg: &mut T, scalar: f64) -> Result<()> {
        check_container_init("add_plain", arg)?;
        arg.cells_mut()
            .into_par_iter()
            .try_for_each(|ct| self.eval.add_plain_inplace(ct, scalar))
    }

    /// Scale every coefficient by a constant; the zero constant produces a
    /// valid all-zero container.
    pub fn multiply_plain_inplace<T: CtContainer<B>>(&self, arg: &mut T, scalar: f64) -> Result<()> {
        check_container_init("multiply_plain", arg)?;
        arg.cells_mut()
            .into_par_iter()
            .try_for_each(|ct| self.eval.multiply_plain_inplace(ct, scalar))
    }

    pub fn multiply_plain<T: CtContainer<B>>(&self, arg: &T, scalar: f64) -> Result<T> {
        let mut out = arg.clone();
        self.multiply_plain_inplace(&mut out, scalar)?;
        Ok(out)
    }

    /// Component-wise addition of a public matrix.
    pub fn add_plain_matrix_inplace(&self, enc: &mut EncryptedMatrix<B>, mat: &Matrix) -> Result<()> {
        check_container_init("add_plain", enc)?;
        if enc.height() != mat.height() || enc.width() != mat.width() {
            return Err(HeError::shape(
                "add_plain",
                format!(
                    "{} does not match a {}x{} plaintext",
                    enc.dims(),
                    mat.height(),
                    mat.width()
                ),
            ));
        }
        let tiles = plain::encode_matrix(mat, &enc.encoding_unit());
        let flat: Vec<&Vec<f64>> = tiles.iter().flatten().collect();
        enc.cells_mut()
            .into_par_iter()
            .zip(flat)
            .try_for_each(|(ct, tile)| self.eval.add_plain_vec_inplace(ct, tile))
    }

    /// Component-wise addition of a public row vector.
    pub fn add_plain_row_vector_inplace(
        &self,
        enc: &mut EncryptedRowVector<B>,
        vec: &[f64],
    ) -> Result<()> {
        check_container_init("add_plain", enc)?;
        if enc.width() != vec.len() {
            return Err(HeError::shape(
                "add_plain",
                format!("{} does not match a length-{} plaintext", enc.dims(), vec.len()),
            ));
        }
        let tiles = plain::encode_row_vector(vec, &enc.encoding_unit());
        enc.cells_mut()
            .into_par_iter()
            .zip(&tiles)
            .try_for_each(|(ct, tile)| self.eval.add_plain_vec_inplace(ct, tile))
    }

    /// Component-wise addition of a public column vector.
    pub fn add_plain_col_vector_inplace(
        &self,
        enc: &mut EncryptedColVector<B>,
        vec: &[f64],
    ) -> Result<()> {
        check_container_init("add_plain", enc)?;
        if enc.height() != vec.len() {
            return Err(HeError::shape(
                "add_plain",
                format!("{} does not match a length-{} plaintext", enc.dims(), vec.len()),
            ));
        }
        let tiles = plain::encode_col_vector(vec, &enc.encoding_unit());
        enc.cells_mut()
            .into_par_iter()
            .zip(&tiles)
            .try_for_each(|(ct, tile)| self.eval.add_plain_vec_inplace(ct, tile))
    }

    /// Coefficient-wise product of same-shape containers. The result is
    /// quadratic with squared scale; relinearize (and usually rescale)
    /// before further multiplications.
    pub fn hadamard_multiply_inplace<T: CtContainer<B>>(&self, arg1: &mut T, arg2: &T) -> Result<()> {
        check_binary_containers("hadamard_multiply", arg1, arg2)?;
        arg1.cells_mut()
            .into_par_iter()
            .zip(arg2.cells())
            .try_for_each(|(a, b)| self.eval.multiply_inplace(a, b))
    }

    pub fn hadamard_multiply<T: CtContainer<B>>(&self, arg1: &T, arg2: &T) -> Result<T> {
        let mut out = arg1.clone();
        self.hadamard_multiply_inplace(&mut out, arg2)?;
        Ok(out)
    }

    pub fn hadamard_square_inplace<T: CtContainer<B>>(&self, arg: &mut T) -> Result<()> {
        check_container_init("hadamard_square", arg)?;
        arg.cells_mut()
            .into_par_iter()
            .try_for_each(|ct| self.eval.square_inplace(ct))
    }

    pub fn hadamard_square<T: CtContainer<B>>(&self, arg: &T) -> Result<T> {
        let mut out = arg.clone();
        self.hadamard_square_inplace(&mut out)?;
        Ok(out)
    }

    /// Hadamard product of a row vector with every row of a matrix: tile
    /// `j` of the vector multiplies every cell in grid column `j`. Vector
    /// length must equal the matrix width.
    pub fn hadamard_multiply_matrix_row(
        &self,
        mat: &EncryptedMatrix<B>,
        row: &EncryptedRowVector<B>,
    ) -> Result<EncryptedMatrix<B>> {
        check_container_init("hadamard_multiply", mat)?;
        check_container_init("hadamard_multiply", row)?;
        check_unit_match("hadamard_multiply", mat.encoding_unit(), row.encoding_unit())?;
        if mat.width() != row.width() {
            return Err(HeError::shape(
                "hadamard_multiply",
                format!("{} is incompatible with {}", mat.dims(), row.dims()),
            ));
        }
        let unit = mat.encoding_unit();
        let grid = mat
            .grid()
            .par_iter()
            .map(|mat_row| {
                mat_row
                    .iter()
                    .zip(row.cts())
                    .map(|(cell, vec_tile)| {
                        let mut ct = self.eval.multiply(cell, vec_tile)?;
                        ct.set_shape(
                            Encoding::RowMat,
                            unit.encoding_height(),
                            unit.encoding_width(),
                            unit.encoding_height(),
                            unit.encoding_width(),
                        );
                        Ok(ct)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedMatrix::new(mat.height(), mat.width(), unit, grid)
    }

    /// Hadamard product of a column vector with every column of a matrix:
    /// tile `i` of the vector multiplies every cell in grid row `i`. Vector
    /// length must equal the matrix height.
    pub fn hadamard_multiply_col_matrix(
        &self,
        col: &EncryptedColVector<B>,
        mat: &EncryptedMatrix<B>,
    ) -> Result<EncryptedMatrix<B>> {
        check_container_init("hadamard_multiply", mat)?;
        check_container_init("hadamard_multiply", col)?;
        check_unit_match("hadamard_multiply", mat.encoding_unit(), col.encoding_unit())?;
        if mat.height() != col.height() {
            return Err(HeError::shape(
                "hadamard_multiply",
                format!("{} is incompatible with {}", mat.dims(), col.dims()),
            ));
        }
        let unit = mat.encoding_unit();
        let grid = mat
            .grid()
            .par_iter()
            .zip(col.cts())
            .map(|(mat_row, vec_tile)| {
                mat_row
                    .iter()
                    .map(|cell| {
                        let mut ct = self.eval.multiply(cell, vec_tile)?;
                        ct.set_shape(
                            Encoding::RowMat,
                            unit.encoding_height(),
                            unit.encoding_width(),
                            unit.encoding_height(),
                            unit.encoding_width(),
                        );
                        Ok(ct)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedMatrix::new(mat.height(), mat.width(), unit, grid)
    }

    // ---- rotation reductions ----

    /// Repeatedly shift by doubling strides and add: after the loop every
    /// slot holds the sum of `max/stride` neighbors spaced `stride` apart.
    fn rot_accumulate(
        &self,
        ct: &mut CkksCiphertext<B>,
        max: usize,
        stride: usize,
        rotate_left: bool,
    ) -> Result<()> {
        let mut shift = stride;
        while shift < max {
            let rotated = if rotate_left {
                self.eval.rotate_left(ct, shift)?
            } else {
                self.eval.rotate_right(ct, shift)?
            };
            self.eval.add_inplace(ct, &rotated)?;
            shift *= 2;
        }
        Ok(())
    }

    /// Sum the rows of a matrix: `out[c] = Σ_r mat[r][c]`, returned as a
    /// row vector. Rotations only; level and scale are unchanged.
    pub fn sum_rows(&self, mat: &EncryptedMatrix<B>) -> Result<EncryptedRowVector<B>> {
        check_container_init("sum_rows", mat)?;
        let unit = mat.encoding_unit();
        let cts = (0..mat.num_horizontal_units())
            .into_par_iter()
            .map(|j| {
                let mut acc = mat.cell(0, j).clone();
                for i in 1..mat.num_vertical_units() {
                    self.eval.add_inplace(&mut acc, mat.cell(i, j))?;
                }
                self.rot_accumulate(&mut acc, unit.num_slots(), unit.encoding_width(), true)?;
                acc.set_shape(
                    Encoding::RowVec,
                    1,
                    unit.encoding_width(),
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                Ok(acc)
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedRowVector::new(mat.width(), unit, cts)
    }

    /// Sum the columns of a matrix, scaled by a constant:
    /// `out[r] = scalar · Σ_c mat[r][c]`, returned as a column vector.
    /// Costs one plaintext multiplication; the result has squared scale.
    pub fn sum_cols(&self, mat: &EncryptedMatrix<B>, scalar: f64) -> Result<EncryptedColVector<B>> {
        check_container_init("sum_cols", mat)?;
        let unit = mat.encoding_unit();
        let w = unit.encoding_width();
        let mask = plain::col_mask(&unit, 0, scalar);
        let cts = (0..mat.num_vertical_units())
            .into_par_iter()
            .map(|i| {
                let mut acc = mat.cell(i, 0).clone();
                for j in 1..mat.num_horizontal_units() {
                    self.eval.add_inplace(&mut acc, mat.cell(i, j))?;
                }
                // partial sums: tile column 0 now holds exact row sums
                self.rot_accumulate(&mut acc, w, 1, true)?;
                self.eval.multiply_plain_vec_inplace(&mut acc, &mask)?;
                // rebroadcast column 0 across the tile
                self.rot_accumulate(&mut acc, w, 1, false)?;
                acc.set_shape(
                    Encoding::ColVec,
                    unit.encoding_height(),
                    1,
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                Ok(acc)
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedColVector::new(mat.height(), unit, cts)
    }

    /// `Σ_i sum_rows(mats[i])` without invoking `sum_rows` per matrix.
    /// All matrices must share the unit and width.
    pub fn sum_rows_many(&self, mats: &[EncryptedMatrix<B>]) -> Result<EncryptedRowVector<B>> {
        let (first, rest) = mats.split_first().ok_or_else(|| {
            HeError::parameter("sum_rows_many: the list of matrices cannot be empty")
        })?;
        check_container_init("sum_rows_many", first)?;
        for mat in rest {
            check_container_init("sum_rows_many", mat)?;
            check_unit_match("sum_rows_many", first.encoding_unit(), mat.encoding_unit())?;
            if mat.width() != first.width() {
                return Err(HeError::shape(
                    "sum_rows_many",
                    format!("widths differ: {} vs {}", first.dims(), mat.dims()),
                ));
            }
        }
        let unit = first.encoding_unit();
        let cts = (0..first.num_horizontal_units())
            .into_par_iter()
            .map(|j| {
                let mut acc: Option<CkksCiphertext<B>> = None;
                for mat in mats {
                    for i in 0..mat.num_vertical_units() {
                        match acc.as_mut() {
                            None => acc = Some(mat.cell(i, j).clone()),
                            Some(a) => self.eval.add_inplace(a, mat.cell(i, j))?,
                        }
                    }
                }
                let mut acc = acc.expect("at least one matrix");
                self.rot_accumulate(&mut acc, unit.num_slots(), unit.encoding_width(), true)?;
                acc.set_shape(
                    Encoding::RowVec,
                    1,
                    unit.encoding_width(),
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                Ok(acc)
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedRowVector::new(first.width(), unit, cts)
    }

    /// `Σ_i sum_cols(mats[i], scalar)` with a single reduction. All
    /// matrices must share the unit and height.
    pub fn sum_cols_many(
        &self,
        mats: &[EncryptedMatrix<B>],
        scalar: f64,
    ) -> Result<EncryptedColVector<B>> {
        let (first, rest) = mats.split_first().ok_or_else(|| {
            HeError::parameter("sum_cols_many: the list of matrices cannot be empty")
        })?;
        check_container_init("sum_cols_many", first)?;
        for mat in rest {
            check_container_init("sum_cols_many", mat)?;
            check_unit_match("sum_cols_many", first.encoding_unit(), mat.encoding_unit())?;
            if mat.height() != first.height() {
                return Err(HeError::shape(
                    "sum_cols_many",
                    format!("heights differ: {} vs {}", first.dims(), mat.dims()),
                ));
            }
        }
        let unit = first.encoding_unit();
        let w = unit.encoding_width();
        let mask = plain::col_mask(&unit, 0, scalar);
        let cts = (0..first.num_vertical_units())
            .into_par_iter()
            .map(|i| {
                let mut acc: Option<CkksCiphertext<B>> = None;
                for mat in mats {
                    for j in 0..mat.num_horizontal_units() {
                        match acc.as_mut() {
                            None => acc = Some(mat.cell(i, j).clone()),
                            Some(a) => self.eval.add_inplace(a, mat.cell(i, j))?,
                        }
                    }
                }
                let mut acc = acc.expect("at least one matrix");
                self.rot_accumulate(&mut acc, w, 1, true)?;
                self.eval.multiply_plain_vec_inplace(&mut acc, &mask)?;
                self.rot_accumulate(&mut acc, w, 1, false)?;
                acc.set_shape(
                    Encoding::ColVec,
                    unit.encoding_height(),
                    1,
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                Ok(acc)
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedColVector::new(first.height(), unit, cts)
    }

    /// Collapse a row vector to the broadcast sum of its entries. Because
    /// every tile row holds the same slice, the plain rotate-and-add stages
    /// are exact; no mask is needed and scale is unchanged.
    pub fn sum_row_vector(&self, row: &EncryptedRowVector<B>) -> Result<CkksCiphertext<B>> {
        check_container_init("sum_row_vector", row)?;
        let unit = row.encoding_unit();
        let mut acc = row.cts()[0].clone();
        for ct in &row.cts()[1..] {
            self.eval.add_inplace(&mut acc, ct)?;
        }
        self.rot_accumulate(&mut acc, unit.encoding_width(), 1, true)?;
        acc.set_shape(
            Encoding::RowVec,
            1,
            1,
            unit.encoding_height(),
            unit.encoding_width(),
        );
        Ok(acc)
    }

    /// Collapse a column vector to the broadcast sum of its entries.
    pub fn sum_col_vector(&self, col: &EncryptedColVector<B>) -> Result<CkksCiphertext<B>> {
        check_container_init("sum_col_vector", col)?;
        let unit = col.encoding_unit();
        let mut acc = col.cts()[0].clone();
        for ct in &col.cts()[1..] {
            self.eval.add_inplace(&mut acc, ct)?;
        }
        self.rot_accumulate(&mut acc, unit.num_slots(), unit.encoding_width(), true)?;
        acc.set_shape(
            Encoding::ColVec,
            1,
            1,
            unit.encoding_height(),
            unit.encoding_width(),
        );
        Ok(acc)
    }

    /// Inner product of two row vectors, returned as a broadcast scalar
    /// with squared scale at the input level.
    pub fn dot_product(
        &self,
        u: &EncryptedRowVector<B>,
        v: &EncryptedRowVector<B>,
    ) -> Result<CkksCiphertext<B>> {
        check_binary_containers("dot_product", u, v)?;
        let unit = u.encoding_unit();
        let mut acc: Option<CkksCiphertext<B>> = None;
        for (a, b) in u.cts().iter().zip(v.cts()) {
            let prod = self.eval.multiply(a, b)?;
            match acc.as_mut() {
                None => acc = Some(prod),
                Some(sum) => self.eval.add_inplace(sum, &prod)?,
            }
        }
        let mut acc = acc.expect("validated non-empty");
        self.eval.relinearize_inplace(&mut acc)?;
        self.rot_accumulate(&mut acc, unit.encoding_width(), 1, true)?;
        acc.set_shape(
            Encoding::RowVec,
            1,
            1,
            unit.encoding_height(),
            unit.encoding_width(),
        );
        Ok(acc)
    }

    // ---- matrix products ----

    /// `A · v`, with `v` supplied as a row-vector encoding of length
    /// `A.width()`. Inputs must be linear, at the same level `L ≥ 1`, with
    /// equal scales; the result is a column vector with squared scale at
    /// level `L − 1`.
    pub fn multiply_matrix_vector(
        &self,
        a: &EncryptedMatrix<B>,
        v: &EncryptedRowVector<B>,
    ) -> Result<EncryptedColVector<B>> {
        let mut prod = self.hadamard_multiply_matrix_row(a, v)?;
        self.relinearize_inplace(&mut prod)?;
        self.rescale_to_next_inplace(&mut prod)?;
        self.sum_cols(&prod, 1.0)
    }

    /// `vᵀ · A`, with `v` supplied as a column-vector encoding of length
    /// `A.height()`. Inputs must be linear at the same level with equal
    /// scales; the result is a row vector with squared scale at the same
    /// level.
    pub fn multiply_vector_matrix(
        &self,
        v: &EncryptedColVector<B>,
        a: &EncryptedMatrix<B>,
    ) -> Result<EncryptedRowVector<B>> {
        let mut prod = self.hadamard_multiply_col_matrix(v, a)?;
        self.relinearize_inplace(&mut prod)?;
        self.sum_rows(&prod)
    }

    /// `scalar · A · B`, with the right-hand matrix supplied transposed.
    ///
    /// One matrix×vector product per column of `B`: column `j` of `B` is
    /// row `j` of `b_transpose`, masked out and rebroadcast as a row
    /// vector, multiplied through `A`, then masked into its column of the
    /// output. Constant multiplicative depth regardless of dimensions.
    ///
    /// `b_transpose` must be at level `L ≥ 3` and `A` at `L − 1`, both
    /// linear with nominal scales; the output has squared scale at level
    /// `L − 3`. The transpose must be genuinely encoded (encrypt `Bᵀ`),
    /// not the metadata view produced by [`Self::transpose`].
    pub fn multiply_matrix(
        &self,
        a: &EncryptedMatrix<B>,
        b_transpose: &EncryptedMatrix<B>,
        scalar: f64,
    ) -> Result<EncryptedMatrix<B>> {
        check_container_init("multiply_matrix", a)?;
        check_container_init("multiply_matrix", b_transpose)?;
        check_unit_match(
            "multiply_matrix",
            a.encoding_unit(),
            b_transpose.encoding_unit(),
        )?;
        // the inner dimension of A·B: A's column count must equal B's row
        // count, and B's rows are b_transpose's columns
        if a.width() != b_transpose.width() {
            return Err(HeError::shape(
                "multiply_matrix",
                format!(
                    "inner dimensions differ: {} has {} columns but the \
                     transposed right operand ({}) stands for a matrix with \
                     {} rows",
                    a.dims(),
                    a.width(),
                    b_transpose.dims(),
                    b_transpose.width()
                ),
            ));
        }
        if b_transpose.he_level() < 3 {
            return Err(HeError::level(
                "multiply_matrix",
                format!(
                    "right-hand matrix must be at level 3 or above, got {}",
                    b_transpose.he_level()
                ),
            ));
        }
        if a.he_level() + 1 != b_transpose.he_level() {
            return Err(HeError::level(
                "multiply_matrix",
                format!(
                    "left-hand matrix must sit one level below the right-hand one \
                     ({} vs {})",
                    a.he_level(),
                    b_transpose.he_level()
                ),
            ));
        }

        let unit = a.encoding_unit();
        let w = unit.encoding_width();
        let out_height = a.height();
        // B's column count. `b_transpose` is the only witness of B this
        // function sees, so its height cannot be cross-checked against the
        // caller's original matrix; the container validation above
        // guarantees it is positive and consistent with the ciphertext
        // grid, and a wrong declared height surfaces as a shape mismatch
        // the moment the result meets a correctly-shaped operand.
        let out_width = b_transpose.height();

        // one column of the result per row of b_transpose
        let columns = (0..out_width)
            .into_par_iter()
            .map(|j| {
                let extracted = self.extract_row_from_transpose(b_transpose, j)?;
                let col = self.multiply_matrix_vector(a, &extracted)?;
                let col = self.rescale_to_next(&col)?;
                let mask = plain::col_mask(&unit, j % w, scalar);
                col.cts()
                    .iter()
                    .map(|tile| {
                        let mut t = tile.clone();
                        self.eval.multiply_plain_vec_inplace(&mut t, &mask)?;
                        t.set_shape(
                            Encoding::Matrix,
                            unit.encoding_height(),
                            unit.encoding_width(),
                            unit.encoding_height(),
                            unit.encoding_width(),
                        );
                        Ok(t)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let vertical_units = out_height.div_ceil(unit.encoding_height());
        let horizontal_units = out_width.div_ceil(w);
        let mut grid: Vec<Vec<Option<CkksCiphertext<B>>>> =
            vec![vec![None; horizontal_units]; vertical_units];
        for (j, column) in columns.into_iter().enumerate() {
            let gj = j / w;
            for (i, tile) in column.into_iter().enumerate() {
                match grid[i][gj].as_mut() {
                    None => grid[i][gj] = Some(tile),
                    Some(acc) => self.eval.add_inplace(acc, &tile)?,
                }
            }
        }
        let grid = grid
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.expect("every output tile receives at least one column"))
                    .collect()
            })
            .collect();
        EncryptedMatrix::new(out_height, out_width, unit, grid)
    }

    /// Row `j` of a packed matrix, masked out of its tile row and
    /// rebroadcast down, as a row vector one level below the input.
    fn extract_row_from_transpose(
        &self,
        mat: &EncryptedMatrix<B>,
        j: usize,
    ) -> Result<EncryptedRowVector<B>> {
        let unit = mat.encoding_unit();
        let h = unit.encoding_height();
        let gi = j / h;
        let mask = plain::row_mask(&unit, j % h, 1.0);
        let cts = (0..mat.num_horizontal_units())
            .map(|jj| {
                let mut t = mat.cell(gi, jj).clone();
                self.eval.multiply_plain_vec_inplace(&mut t, &mask)?;
                self.rot_accumulate(&mut t, unit.num_slots(), unit.encoding_width(), true)?;
                self.eval.rescale_to_next_inplace(&mut t)?;
                t.set_shape(
                    Encoding::RowVec,
                    1,
                    unit.encoding_width(),
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                Ok(t)
            })
            .collect::<Result<Vec<_>>>()?;
        EncryptedRowVector::new(mat.width(), unit, cts)
    }

    // ---- ciphertext maintenance ----

    pub fn reduce_level_to_inplace<T: CtContainer<B>>(&self, arg: &mut T, level: usize) -> Result<()> {
        check_container_init("reduce_level_to", arg)?;
        arg.cells_mut()
            .into_par_iter()
            .try_for_each(|ct| self.eval.mod_down_to_level_inplace(ct, level))
    }

    pub fn reduce_level_to<T: CtContainer<B>>(&self, arg: &T, level: usize) -> Result<T> {
        let mut out = arg.clone();
        self.reduce_level_to_inplace(&mut out, level)?;
        Ok(out)
    }

    /// Bring two containers (of possibly different types) to the lower of
    /// their levels; at most one is modified.
    pub fn reduce_level_to_min_inplace<T1, T2>(&self, arg1: &mut T1, arg2: &mut T2) -> Result<()>
    where
        T1: CtContainer<B>,
        T2: CtContainer<B>,
    {
        check_container_init("reduce_level_to_min", arg1)?;
        check_container_init("reduce_level_to_min", arg2)?;
        let (l1, l2) = (arg1.he_level(), arg2.he_level());
        if l1 > l2 {
            self.reduce_level_to_inplace(arg1, l2)
        } else if l2 > l1 {
            self.reduce_level_to_inplace(arg2, l1)
        } else {
            Ok(())
        }
    }

    pub fn rescale_to_next_inplace<T: CtContainer<B>>(&self, arg: &mut T) -> Result<()> {
        check_container_init("rescale_to_next", arg)?;
        arg.cells_mut()
            .into_par_iter()
            .try_for_each(|ct| self.eval.rescale_to_next_inplace(ct))
    }

    pub fn rescale_to_next<T: CtContainer<B>>(&self, arg: &T) -> Result<T> {
        let mut out = arg.clone();
        self.rescale_to_next_inplace(&mut out)?;
        Ok(out)
    }

    pub fn relinearize_inplace<T: CtContainer<B>>(&self, arg: &mut T) -> Result<()> {
        check_container_init("relinearize", arg)?;
        arg.cells_mut()
            .into_par_iter()
            .try_for_each(|ct| self.eval.relinearize_inplace(ct))
    }

    pub fn relinearize<T: CtContainer<B>>(&self, arg: &T) -> Result<T> {
        let mut out = arg.clone();
        self.relinearize_inplace(&mut out)?;
        Ok(out)
    }

    // ---- structural operations ----

    /// Metadata-level transpose: the grid and the unit are transposed and
    /// each tile is retagged to be read column-major. No primitive calls.
    ///
    /// The result decrypts and serializes as the transposed matrix, but it
    /// is a view: it cannot stand in for a genuinely re-encoded transpose
    /// in [`Self::multiply_matrix`].
    pub fn transpose(&self, mat: &EncryptedMatrix<B>) -> Result<EncryptedMatrix<B>> {
        check_container_init("transpose", mat)?;
        let tag = match mat.cell(0, 0).encoding() {
            Encoding::Matrix => Encoding::ColMat,
            Encoding::ColMat => Encoding::Matrix,
            other => {
                return Err(HeError::shape(
                    "transpose",
                    format!("cannot transpose tiles with encoding {other:?}"),
                ));
            }
        };
        let unit = mat.encoding_unit().transposed();
        let mut grid =
            vec![Vec::with_capacity(mat.num_vertical_units()); mat.num_horizontal_units()];
        for row in mat.grid() {
            for (j, cell) in row.iter().enumerate() {
                let mut ct = cell.clone();
                ct.set_shape(
                    tag,
                    unit.encoding_height(),
                    unit.encoding_width(),
                    unit.encoding_height(),
                    unit.encoding_width(),
                );
                grid[j].push(ct);
            }
        }
        EncryptedMatrix::new(mat.width(), mat.height(), unit, grid)
    }

    /// Concatenate matrices side by side. Every matrix except the last
    /// must fill its tiles exactly (width divisible by the unit width).
    pub fn horizontal_concat(&self, mats: &[EncryptedMatrix<B>]) -> Result<EncryptedMatrix<B>> {
        let (first, rest) = mats.split_first().ok_or_else(|| {
            HeError::parameter("horizontal_concat: the list of matrices cannot be empty")
        })?;
        check_container_init("horizontal_concat", first)?;
        for mat in rest {
            check_container_init("horizontal_concat", mat)?;
            check_unit_match("horizontal_concat", first.encoding_unit(), mat.encoding_unit())?;
            if mat.height() != first.height() {
                return Err(HeError::shape(
                    "horizontal_concat",
                    format!("heights differ: {} vs {}", first.dims(), mat.dims()),
                ));
            }
        }
        let w = first.encoding_unit().encoding_width();
        for mat in &mats[..mats.len() - 1] {
            if mat.width() % w != 0 {
                return Err(HeError::shape(
                    "horizontal_concat",
                    format!("{} does not fill its tiles exactly", mat.dims()),
                ));
            }
        }
        let mut grid = Vec::with_capacity(first.num_vertical_units());
        for i in 0..first.num_vertical_units() {
            let mut row = Vec::new();
            for mat in mats {
                row.extend(mat.grid()[i].iter().cloned());
            }
            grid.push(row);
        }
        let width = mats.iter().map(EncryptedMatrix::width).sum();
        EncryptedMatrix::new(first.height(), width, first.encoding_unit(), grid)
    }

    /// Concatenate matrices top to bottom. Every matrix except the last
    /// must fill its tiles exactly (height divisible by the unit height).
    pub fn vertical_concat(&self, mats: &[EncryptedMatrix<B>]) -> Result<EncryptedMatrix<B>> {
        let (first, rest) = mats.split_first().ok_or_else(|| {
            HeError::parameter("vertical_concat: the list of matrices cannot be empty")
        })?;
        check_container_init("vertical_concat", first)?;
        for mat in rest {
            check_container_init("vertical_concat", mat)?;
            check_unit_match("vertical_concat", first.encoding_unit(), mat.encoding_unit())?;
            if mat.width() != first.width() {
                return Err(HeError::shape(
                    "vertical_concat",
                    format!("widths differ: {} vs {}", first.dims(), mat.dims()),
                ));
            }
        }
        let h = first.encoding_unit().encoding_height();
        for mat in &mats[..mats.len() - 1] {
            if mat.height() % h != 0 {
                return Err(HeError::shape(
                    "vertical_concat",
                    format!("{} does not fill its tiles exactly", mat.dims()),
                ));
            }
        }
        let mut grid = Vec::new();
        for mat in mats {
            grid.extend(mat.grid().iter().cloned());
        }
        let height = mats.iter().map(EncryptedMatrix::height).sum();
        EncryptedMatrix::new(height, first.width(), first.encoding_unit(), grid)
    }
}

fn check_container_init<B: Backend, T: CtContainer<B>>(op: &'static str, arg: &T) -> Result<()> {
    if !arg.initialized() {
        return Err(HeError::Uninitialized { op });
    }
    Ok(())
}

fn check_unit_match(op: &'static str, lhs: EncodingUnit, rhs: EncodingUnit) -> Result<()> {
    if lhs != rhs {
        return Err(HeError::shape(
            op,
            format!("encoding units differ: {lhs} vs {rhs}"),
        ));
    }
    Ok(())
}

fn check_binary_containers<B: Backend, T: CtContainer<B>>(
    op: &'static str,
    arg1: &T,
    arg2: &T,
) -> Result<()> {
    check_container_init(op, arg1)?;
    check_container_init(op, arg2)?;
    if !arg1.same_size(arg2) {
        return Err(HeError::shape(
            op,
            format!("operands do not match: {} vs {}", arg1.dims(), arg2.dims()),
        ));
    }
    if arg1.he_level() != arg2.he_level() {
        return Err(HeError::level(
            op,
            format!(
                "operand levels differ ({} vs {})",
                arg1.he_level(),
                arg2.he_level()
            ),
        ));
    }
    if arg1.scale() != arg2.scale() {
        return Err(HeError::ScaleMismatch {
            op,
            lhs: arg1.scale(),
            rhs: arg2.scale(),
        });
    }
    Ok(())
}
