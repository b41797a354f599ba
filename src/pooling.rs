//! Pooling strategies.
//!
//! Pooling deterministically reduces a feature vector's length before it
//! enters the network. Every strategy is pure; batches are pooled row by
//! row. Edge handling never averages across a boundary that does not exist:
//! trailing remainders are averaged over however many elements remain or
//! copied through raw, depending on the strategy.

use std::str::FromStr;

use crate::{Error, Matrix, Result, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerated pooling choice carried by the configuration.
pub enum PoolingKind {
    Identity,
    LinearMean,
    Linear2dMean,
    ParabolicFit,
}

impl FromStr for PoolingKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "identity" | "none" => Ok(PoolingKind::Identity),
            "linear" | "linear-mean" => Ok(PoolingKind::LinearMean),
            "linear2d" | "linear-2d-mean" => Ok(PoolingKind::Linear2dMean),
            "parabolic" | "parabolic-fit" => Ok(PoolingKind::ParabolicFit),
            other => Err(Error::UnsupportedPooling(other.to_owned())),
        }
    }
}

/// Selects the strategy implementation for an enumerated kind.
///
/// `input_width` is the grid width used by 2D pooling; the other strategies
/// ignore it.
pub fn pooling_for(kind: PoolingKind, input_width: usize) -> Box<dyn Pooling> {
    match kind {
        PoolingKind::Identity => Box::new(Identity),
        PoolingKind::LinearMean => Box::new(LinearMean),
        PoolingKind::Linear2dMean => Box::new(Linear2dMean { width: input_width }),
        PoolingKind::ParabolicFit => Box::new(ParabolicFit),
    }
}

pub trait Pooling {
    /// Reduces one feature vector. Pure; the input is left untouched.
    fn pool(&self, input: &Vector) -> Vector;

    /// Pools a batch matrix row by row.
    fn pool_batch(&self, batch: &Matrix) -> Matrix {
        let rows: Vec<Vec<f64>> = (0..batch.rows())
            .map(|r| {
                self.pool(&Vector::from_vec(batch.row(r).to_vec()))
                    .as_slice()
                    .to_vec()
            })
            .collect();
        Matrix::from_rows(&rows).expect("pooling equal-width rows yields equal-width rows")
    }
}

/// Passthrough.
pub struct Identity;

impl Pooling for Identity {
    fn pool(&self, input: &Vector) -> Vector {
        input.clone()
    }
}

/// Averages every consecutive run of 4 elements into one. A trailing
/// remainder of 1 to 3 elements is averaged over however many remain.
pub struct LinearMean;

impl Pooling for LinearMean {
    fn pool(&self, input: &Vector) -> Vector {
        let pooled = input
            .as_slice()
            .chunks(4)
            .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
            .collect();
        Vector::from_vec(pooled)
    }
}

/// 2x2 average pooling over a `height x width` grid.
///
/// An odd trailing column contributes its two raw elements un-paired; an odd
/// trailing row is copied through whole. The output length is whatever was
/// actually written, never a fixed formula.
pub struct Linear2dMean {
    pub width: usize,
}

impl Pooling for Linear2dMean {
    fn pool(&self, input: &Vector) -> Vector {
        let width = self.width;
        let cells = input.as_slice();
        let height = cells.len() / width;
        let mut pooled = Vec::new();

        let mut row = 0;
        while row + 1 < height {
            let mut col = 0;
            while col + 1 < width {
                let sum = cells[row * width + col]
                    + cells[row * width + col + 1]
                    + cells[(row + 1) * width + col]
                    + cells[(row + 1) * width + col + 1];
                pooled.push(sum / 4.0);
                col += 2;
            }
            if col < width {
                pooled.push(cells[row * width + col]);
                pooled.push(cells[(row + 1) * width + col]);
            }
            row += 2;
        }
        if row < height {
            pooled.extend_from_slice(&cells[row * width..(row + 1) * width]);
        }

        Vector::from_vec(pooled)
    }
}

/// Fits the parabola through `(0,y0), (1,y1), (2,y2)` for every run of 3 and
/// keeps only the curvature coefficient `a = (y2 - 2*y1 + y0) / 2`. A
/// remainder of 1 or 2 elements is copied through unpooled.
pub struct ParabolicFit;

impl Pooling for ParabolicFit {
    fn pool(&self, input: &Vector) -> Vector {
        let mut pooled = Vec::with_capacity(input.len().div_ceil(3));
        for chunk in input.as_slice().chunks(3) {
            match chunk {
                [y0, y1, y2] => pooled.push((y2 - 2.0 * y1 + y0) / 2.0),
                rest => pooled.extend_from_slice(rest),
            }
        }
        Vector::from_vec(pooled)
    }
}
