//! Dense vector algebra.
//!
//! `Vector` follows the same rules as [`Matrix`](crate::Matrix): named
//! arithmetic methods, tolerance-based equality and a memoized row-matrix
//! transpose that is discarded on every in-place write.

use std::cell::OnceCell;

use crate::matrix::EPSILON;
use crate::{Error, Matrix, Result};

#[derive(Debug)]
pub struct Vector {
    data: Vec<f64>,
    transpose: OnceCell<Box<Matrix>>,
}

/// Index of the largest value, `None` for an empty slice.
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

impl Vector {
    /// Zero-filled vector of length `n`.
    pub fn new(n: usize) -> Self {
        Self::wrap(vec![0.0; n])
    }

    /// Wrap an existing buffer.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self::wrap(data)
    }

    /// Widen raw byte intensities to `f64` unchanged.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::wrap(bytes.iter().map(|&b| f64::from(b)).collect())
    }

    fn wrap(data: Vec<f64>) -> Self {
        Self {
            data,
            transpose: OnceCell::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, i: usize) -> Result<f64> {
        self.check_index(i)?;
        Ok(self.data[i])
    }

    /// Writes one element in place, discarding the memoized transpose first.
    pub fn set(&mut self, i: usize, value: f64) -> Result<()> {
        self.check_index(i)?;
        self.transpose.take();
        self.data[i] = value;
        Ok(())
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.data.len() {
            return Err(Error::IndexOutOfBounds {
                index: i,
                bound: self.data.len(),
            });
        }
        Ok(())
    }

    fn check_same_len(&self, other: &Vector, op: &str) -> Result<()> {
        if self.data.len() != other.data.len() {
            return Err(Error::DimensionMismatch(format!(
                "cannot {op} vectors of lengths {} and {}",
                self.data.len(),
                other.data.len()
            )));
        }
        Ok(())
    }

    /// Elementwise sum. Lengths must match.
    pub fn add(&self, other: &Vector) -> Result<Vector> {
        self.check_same_len(other, "add")?;
        Ok(Self::wrap(
            self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect(),
        ))
    }

    /// Elementwise difference. Lengths must match.
    pub fn sub(&self, other: &Vector) -> Result<Vector> {
        self.check_same_len(other, "subtract")?;
        Ok(Self::wrap(
            self.data.iter().zip(&other.data).map(|(a, b)| a - b).collect(),
        ))
    }

    /// Broadcast scalar product.
    pub fn scale(&self, alpha: f64) -> Vector {
        Self::wrap(self.data.iter().map(|a| a * alpha).collect())
    }

    /// Broadcast scalar division; dividing by zero yields `inf`/`nan`.
    pub fn div_scalar(&self, alpha: f64) -> Vector {
        self.scale(1.0 / alpha)
    }

    /// Elementwise (Hadamard) product. Lengths must match.
    pub fn hadamard(&self, other: &Vector) -> Result<Vector> {
        self.check_same_len(other, "hadamard-multiply")?;
        Ok(Self::wrap(
            self.data.iter().zip(&other.data).map(|(a, b)| a * b).collect(),
        ))
    }

    /// Inner product. Lengths must match.
    pub fn dot(&self, other: &Vector) -> Result<f64> {
        self.check_same_len(other, "dot-multiply")?;
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum())
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|a| a * a).sum::<f64>().sqrt()
    }

    /// Unit-length copy. A zero vector yields `nan` elements, not an error.
    pub fn normalize(&self) -> Vector {
        self.div_scalar(self.norm())
    }

    /// Index of the maximum element, `None` when empty.
    pub fn argmax(&self) -> Option<usize> {
        argmax(&self.data)
    }

    /// Applies `f` to every element in place and returns the container.
    pub fn map<F: Fn(f64) -> f64>(mut self, f: F) -> Vector {
        self.transpose.take();
        for v in &mut self.data {
            *v = f(*v);
        }
        self
    }

    /// Memoized 1xN row-matrix view of this vector.
    pub fn as_row(&self) -> &Matrix {
        self.transpose.get_or_init(|| {
            Box::new(
                Matrix::from_vec(self.data.clone(), 1, self.data.len())
                    .expect("length-1 row shape always matches the backing buffer"),
            )
        })
    }

    /// Consumes the vector into a 1xN row matrix.
    pub fn into_row(self) -> Matrix {
        let len = self.data.len();
        Matrix::from_vec(self.data, 1, len)
            .expect("length-1 row shape always matches the backing buffer")
    }
}

impl Clone for Vector {
    /// Clones the contents only; the memoized transpose is not carried over.
    fn clone(&self) -> Self {
        Self::wrap(self.data.clone())
    }
}

impl PartialEq for Vector {
    /// Same length and every element within [`EPSILON`] absolute tolerance.
    fn eq(&self, other: &Self) -> bool {
        self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= EPSILON)
    }
}
