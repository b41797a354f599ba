//! Dense matrix algebra.
//!
//! `Matrix` is a row-major `f64` container with named arithmetic methods.
//! Shape mismatches surface as [`Error::DimensionMismatch`] at the call site
//! instead of panicking.
//!
//! # Memoization
//!
//! The transpose and determinant are computed lazily and cached behind
//! interior mutability. Every mutating method takes `&mut self` and clears
//! both caches before writing, so a cached value is never observable after
//! the contents changed. When a transpose is first computed, its own
//! transpose cell is pre-filled with a copy of the original contents, so
//! transposing twice never recomputes in either direction.

use std::cell::OnceCell;

use rand::Rng;

use crate::{Error, Result};

/// Absolute per-element tolerance used for `Matrix`/`Vector` equality.
pub const EPSILON: f64 = 1e-6;

/// Scale applied to freshly drawn uniform weights.
pub(crate) const INIT_SCALE: f64 = 0.1;

#[derive(Debug)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    transpose: OnceCell<Box<Matrix>>,
    det: OnceCell<f64>,
}

impl Matrix {
    /// Zero-filled matrix of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::wrap(vec![0.0; rows * cols], rows, cols)
    }

    /// Wrap a flat row-major buffer with shape `(rows, cols)`.
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::DimensionMismatch(format!(
                "buffer of length {} cannot back a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self::wrap(data, rows, cols))
    }

    /// Build a matrix from per-row slices. All rows must share one length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::InvalidData("matrix must have at least one row".to_owned()));
        }
        let cols = rows[0].len();
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::DimensionMismatch(format!(
                    "row {i} has length {}, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self::wrap(data, rows.len(), cols))
    }

    /// Build a batch matrix from raw byte samples, one sample per row.
    ///
    /// Values are widened to `f64` unchanged (intensities stay in `0..=255`).
    pub fn from_byte_rows(rows: &[&[u8]]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::InvalidData("batch must not be empty".to_owned()));
        }
        let cols = rows[0].len();
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::DimensionMismatch(format!(
                    "sample {i} has {} features, expected {cols}",
                    row.len()
                )));
            }
            data.extend(row.iter().map(|&b| f64::from(b)));
        }
        Ok(Self::wrap(data, rows.len(), cols))
    }

    /// Matrix with every element drawn uniformly from `[0, 1)` and scaled by
    /// a small constant, used for initial weights.
    pub fn random_with_rng<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols)
            .map(|_| rng.random::<f64>() * INIT_SCALE)
            .collect();
        Self::wrap(data, rows, cols)
    }

    fn wrap(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            rows,
            cols,
            data,
            transpose: OnceCell::new(),
            det: OnceCell::new(),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the `r`-th row as a slice.
    ///
    /// Panics if `r >= rows`; use [`Matrix::get`] for checked access.
    #[inline]
    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[row * self.cols + col])
    }

    /// Writes one element in place, discarding the memoized transpose and
    /// determinant first.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        self.invalidate();
        let idx = row * self.cols + col;
        self.data[idx] = value;
        Ok(())
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows {
            return Err(Error::IndexOutOfBounds {
                index: row,
                bound: self.rows,
            });
        }
        if col >= self.cols {
            return Err(Error::IndexOutOfBounds {
                index: col,
                bound: self.cols,
            });
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.transpose.take();
        self.det.take();
    }

    fn check_same_shape(&self, other: &Matrix, op: &str) -> Result<()> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(Error::DimensionMismatch(format!(
                "cannot {op} matrices of sizes {}x{} and {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        Ok(())
    }

    /// Elementwise sum. Shapes must match.
    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_shape(other, "add")?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a + b)
            .collect();
        Ok(Self::wrap(data, self.rows, self.cols))
    }

    /// Elementwise difference. Shapes must match.
    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_shape(other, "subtract")?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();
        Ok(Self::wrap(data, self.rows, self.cols))
    }

    /// In-place elementwise sum, used for weight updates during training.
    pub fn add_assign(&mut self, other: &Matrix) -> Result<()> {
        self.check_same_shape(other, "add")?;
        self.invalidate();
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// Classic triple-loop matrix product. Requires `self.cols == other.rows`.
    pub fn mul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(Error::DimensionMismatch(format!(
                "cannot multiply matrices of sizes {}x{} and {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut data = vec![0.0; self.rows * other.cols];
        for row in 0..self.rows {
            for col in 0..other.cols {
                let mut acc = 0.0;
                for k in 0..self.cols {
                    acc += self.data[row * self.cols + k] * other.data[k * other.cols + col];
                }
                data[row * other.cols + col] = acc;
            }
        }
        Ok(Self::wrap(data, self.rows, other.cols))
    }

    /// Broadcast scalar product.
    pub fn scale(&self, alpha: f64) -> Matrix {
        let data = self.data.iter().map(|a| a * alpha).collect();
        Self::wrap(data, self.rows, self.cols)
    }

    /// Broadcast scalar division. Dividing by zero yields `inf`/`nan` per
    /// floating-point semantics rather than an error.
    pub fn div_scalar(&self, alpha: f64) -> Matrix {
        self.scale(1.0 / alpha)
    }

    /// Elementwise (Hadamard) product. Shapes must match.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_shape(other, "hadamard-multiply")?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .collect();
        Ok(Self::wrap(data, self.rows, self.cols))
    }

    /// Applies `f` to every element in place and returns the container.
    pub fn map<F: Fn(f64) -> f64>(mut self, f: F) -> Matrix {
        self.invalidate();
        for v in &mut self.data {
            *v = f(*v);
        }
        self
    }

    /// Memoized transpose.
    ///
    /// The first call computes the column-major swap and caches it; the
    /// cached matrix carries a copy of the original in its own transpose
    /// cell, so `a.transpose().transpose()` compares equal to `a` without
    /// recomputation. Any mutation of `self` discards the cache.
    pub fn transpose(&self) -> &Matrix {
        self.transpose.get_or_init(|| {
            let mut data = vec![0.0; self.data.len()];
            for row in 0..self.rows {
                for col in 0..self.cols {
                    data[col * self.rows + row] = self.data[row * self.cols + col];
                }
            }
            let transposed = Self::wrap(data, self.cols, self.rows);
            let back = Self::wrap(self.data.clone(), self.rows, self.cols);
            let _ = transposed.transpose.set(Box::new(back));
            Box::new(transposed)
        })
    }

    /// Memoized determinant.
    ///
    /// 1x1 and 2x2 use the closed forms, 3x3 uses Sarrus' rule and larger
    /// matrices use Laplace cofactor expansion along the first row. The
    /// expansion is exponential; it is never invoked on weight matrices in
    /// the training path.
    pub fn determinant(&self) -> Result<f64> {
        if self.rows != self.cols {
            return Err(Error::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.rows == 0 {
            return Err(Error::InvalidData(
                "cannot compute the determinant of an empty matrix".to_owned(),
            ));
        }
        if let Some(d) = self.det.get() {
            return Ok(*d);
        }
        let d = self.det_value();
        let _ = self.det.set(d);
        Ok(d)
    }

    fn det_value(&self) -> f64 {
        let a = &self.data;
        match self.rows {
            1 => a[0],
            2 => a[0] * a[3] - a[1] * a[2],
            3 => {
                // Sarrus' rule.
                a[0] * a[4] * a[8] + a[3] * a[7] * a[2] + a[6] * a[1] * a[5]
                    - a[6] * a[4] * a[2]
                    - a[7] * a[5] * a[0]
                    - a[8] * a[3] * a[1]
            }
            n => {
                let mut acc = 0.0;
                for j in 0..n {
                    let pivot = a[j];
                    if pivot == 0.0 {
                        continue;
                    }
                    let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
                    acc += sign * pivot * self.minor(0, j).det_value();
                }
                acc
            }
        }
    }

    /// Submatrix with row `skip_row` and column `skip_col` deleted.
    fn minor(&self, skip_row: usize, skip_col: usize) -> Matrix {
        let mut data = Vec::with_capacity((self.rows - 1) * (self.cols - 1));
        for row in 0..self.rows {
            if row == skip_row {
                continue;
            }
            for col in 0..self.cols {
                if col == skip_col {
                    continue;
                }
                data.push(self.data[row * self.cols + col]);
            }
        }
        Self::wrap(data, self.rows - 1, self.cols - 1)
    }

    /// Exchanges rows `a` and `b` in place.
    pub fn pivot_rows(&mut self, a: usize, b: usize) -> Result<()> {
        for index in [a, b] {
            if index >= self.rows {
                return Err(Error::IndexOutOfBounds {
                    index,
                    bound: self.rows,
                });
            }
        }
        if a == b {
            return Ok(());
        }
        self.invalidate();
        let cols = self.cols;
        for col in 0..cols {
            self.data.swap(a * cols + col, b * cols + col);
        }
        Ok(())
    }
}

impl Clone for Matrix {
    /// Clones the contents only; memoized values are not carried over.
    fn clone(&self) -> Self {
        Self::wrap(self.data.clone(), self.rows, self.cols)
    }
}

impl PartialEq for Matrix {
    /// Same shape and every element within [`EPSILON`] absolute tolerance.
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: &[&[f64]]) -> Matrix {
        Matrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn constructor_creates_correct_shape() {
        let a = Matrix::new(2, 3);
        assert_eq!(a.rows(), 2);
        assert_eq!(a.cols(), 3);
        assert_eq!(a.get(1, 2).unwrap(), 0.0);
    }

    #[test]
    fn from_vec_rejects_bad_length() {
        assert!(Matrix::from_vec(vec![1.0, 2.0, 3.0], 2, 2).is_err());
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut a = Matrix::new(2, 2);
        a.set(0, 1, 5.0).unwrap();
        assert_eq!(a.get(0, 1).unwrap(), 5.0);
    }

    #[test]
    fn out_of_range_access_names_index_and_bound() {
        let a = Matrix::new(2, 2);
        assert_eq!(
            a.get(2, 0).unwrap_err(),
            Error::IndexOutOfBounds { index: 2, bound: 2 }
        );
        let mut b = Matrix::new(2, 2);
        assert!(b.set(0, 7, 1.0).is_err());
    }

    #[test]
    fn add_and_sub_are_elementwise() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = m(&[&[5.0, 6.0], &[7.0, 8.0]]);
        assert_eq!(a.add(&b).unwrap(), m(&[&[6.0, 8.0], &[10.0, 12.0]]));
        assert_eq!(b.sub(&a).unwrap(), m(&[&[4.0, 4.0], &[4.0, 4.0]]));
    }

    #[test]
    fn add_is_associative_within_tolerance() {
        let a = m(&[&[0.1, 0.2], &[0.3, 0.4]]);
        let b = m(&[&[1.5, -2.5], &[0.25, 1.75]]);
        let c = m(&[&[-0.7, 3.3], &[2.2, -1.1]]);
        let left = a.add(&b).unwrap().add(&c).unwrap();
        let right = a.add(&b.add(&c).unwrap()).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn add_rejects_shape_mismatch() {
        let a = Matrix::new(2, 3);
        let b = Matrix::new(3, 2);
        assert!(matches!(
            a.add(&b).unwrap_err(),
            Error::DimensionMismatch(_)
        ));
    }

    #[test]
    fn mul_matches_hand_computed_product() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = m(&[&[2.0, 0.0], &[1.0, 2.0]]);
        assert_eq!(a.mul(&b).unwrap(), m(&[&[4.0, 4.0], &[10.0, 8.0]]));
    }

    #[test]
    fn mul_requires_compatible_inner_dimension() {
        let a = Matrix::new(2, 3);
        let b = Matrix::new(2, 3);
        assert!(matches!(
            a.mul(&b).unwrap_err(),
            Error::DimensionMismatch(_)
        ));
    }

    #[test]
    fn scale_and_div_scalar_broadcast() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert_eq!(a.scale(2.0), m(&[&[2.0, 4.0], &[6.0, 8.0]]));
        assert_eq!(a.div_scalar(2.0), m(&[&[0.5, 1.0], &[1.5, 2.0]]));
    }

    #[test]
    fn div_by_zero_scalar_is_not_an_error() {
        let a = m(&[&[1.0, -1.0]]);
        let d = a.div_scalar(0.0);
        assert_eq!(d.get(0, 0).unwrap(), f64::INFINITY);
        assert_eq!(d.get(0, 1).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn hadamard_is_elementwise() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = m(&[&[2.0, 3.0], &[4.0, 5.0]]);
        assert_eq!(a.hadamard(&b).unwrap(), m(&[&[2.0, 6.0], &[12.0, 20.0]]));
        assert!(a.hadamard(&Matrix::new(1, 4)).is_err());
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let a = m(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let t = a.transpose();
        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 2);
        assert_eq!(t.get(0, 1).unwrap(), 4.0);
        assert_eq!(t.get(2, 0).unwrap(), 3.0);
    }

    #[test]
    fn double_transpose_is_identity_and_does_not_mutate() {
        let a = m(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let copy = a.clone();
        assert_eq!(a.transpose().transpose(), &copy);
        assert_eq!(a, copy);
    }

    #[test]
    fn mutation_discards_cached_transpose() {
        let mut a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert_eq!(a.transpose().get(0, 1).unwrap(), 3.0);
        a.set(1, 0, 9.0).unwrap();
        assert_eq!(a.transpose().get(0, 1).unwrap(), 9.0);
    }

    #[test]
    fn determinant_closed_forms() {
        let two = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert!((two.determinant().unwrap() - (-2.0)).abs() < 1e-12);

        let identity = m(&[
            &[1.0, 0.0, 0.0],
            &[0.0, 1.0, 0.0],
            &[0.0, 0.0, 1.0],
        ]);
        assert!((identity.determinant().unwrap() - 1.0).abs() < 1e-12);

        let single = m(&[&[7.5]]);
        assert_eq!(single.determinant().unwrap(), 7.5);
    }

    #[test]
    fn determinant_uses_laplace_beyond_three() {
        let diag = m(&[
            &[1.0, 0.0, 0.0, 0.0],
            &[0.0, 2.0, 0.0, 0.0],
            &[0.0, 0.0, 3.0, 0.0],
            &[0.0, 0.0, 0.0, 4.0],
        ]);
        assert!((diag.determinant().unwrap() - 24.0).abs() < 1e-12);

        let block = m(&[
            &[2.0, 0.0, 0.0, 1.0],
            &[0.0, 1.0, 0.0, 0.0],
            &[0.0, 0.0, 1.0, 0.0],
            &[1.0, 0.0, 0.0, 2.0],
        ]);
        assert!((block.determinant().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn determinant_rejects_non_square() {
        let a = Matrix::new(2, 3);
        assert_eq!(
            a.determinant().unwrap_err(),
            Error::NotSquare { rows: 2, cols: 3 }
        );
    }

    #[test]
    fn determinant_is_invalidated_by_mutation() {
        let mut a = m(&[&[1.0, 0.0], &[0.0, 1.0]]);
        assert_eq!(a.determinant().unwrap(), 1.0);
        a.set(0, 0, 3.0).unwrap();
        assert_eq!(a.determinant().unwrap(), 3.0);
    }

    #[test]
    fn pivot_rows_swaps_in_place() {
        let mut a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        a.pivot_rows(0, 1).unwrap();
        assert_eq!(a, m(&[&[3.0, 4.0], &[1.0, 2.0]]));
    }

    #[test]
    fn pivot_rows_names_the_offending_row() {
        let mut a = Matrix::new(2, 2);
        assert_eq!(
            a.pivot_rows(0, 5).unwrap_err(),
            Error::IndexOutOfBounds { index: 5, bound: 2 }
        );
    }

    #[test]
    fn equality_uses_absolute_tolerance() {
        let a = m(&[&[1.0, 2.0]]);
        let close = m(&[&[1.0 + 5e-7, 2.0 - 5e-7]]);
        let far = m(&[&[1.0 + 2e-6, 2.0]]);
        assert_eq!(a, close);
        assert_ne!(a, far);
    }

    #[test]
    fn map_transforms_every_element() {
        let a = m(&[&[-1.0, 2.0], &[-3.0, 4.0]]);
        let masked = a.map(|x| if x > 0.0 { 1.0 } else { 0.0 });
        assert_eq!(masked, m(&[&[0.0, 1.0], &[0.0, 1.0]]));
    }
}
