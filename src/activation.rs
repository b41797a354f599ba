//! Activation strategies.
//!
//! Each strategy applies its scalar nonlinearity elementwise over a batch of
//! row-vectors packed in a [`Matrix`], and computes the weight-gradient
//! contribution for one layer during backpropagation. Derivatives are
//! expressed in terms of the cached post-activation output, so no separate
//! pre-activation buffer is needed.

use std::str::FromStr;

use crate::{Error, Matrix, Result};

const LEAKY_SLOPE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerated activation choice carried by the configuration.
pub enum ActivationKind {
    Sigmoid,
    ReLU,
    LeakyReLU,
    Tanh,
}

impl FromStr for ActivationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(ActivationKind::Sigmoid),
            "relu" => Ok(ActivationKind::ReLU),
            "leakyrelu" | "leaky-relu" => Ok(ActivationKind::LeakyReLU),
            "tanh" => Ok(ActivationKind::Tanh),
            other => Err(Error::UnsupportedActivation(other.to_owned())),
        }
    }
}

/// Selects the strategy implementation for an enumerated kind.
pub fn activator_for(kind: ActivationKind) -> Box<dyn Activator> {
    match kind {
        ActivationKind::Sigmoid => Box::new(Sigmoid),
        ActivationKind::ReLU => Box::new(ReLU),
        ActivationKind::LeakyReLU => Box::new(LeakyReLU),
        ActivationKind::Tanh => Box::new(Tanh),
    }
}

pub trait Activator {
    /// Applies the nonlinearity to every element of the batch in place and
    /// returns the same container.
    fn activate(&self, z: Matrix) -> Matrix;

    /// Weight-gradient contribution for one layer.
    ///
    /// Computes `hadamard(error, f'(activated))ᵀ × input`, where `f'` is
    /// expressed through the activated output. The result has shape
    /// `[out_width x in_width]`, matching the weight matrix it updates.
    fn derivative(&self, input: &Matrix, activated: &Matrix, error: &Matrix) -> Result<Matrix> {
        let mask = activated.clone().map(|y| self.grad_from_output(y));
        let masked = error.hadamard(&mask)?;
        masked.transpose().mul(input)
    }

    /// Derivative of the nonlinearity in terms of its output `y`.
    fn grad_from_output(&self, y: f64) -> f64;
}

pub struct Sigmoid;

impl Activator for Sigmoid {
    fn activate(&self, z: Matrix) -> Matrix {
        z.map(|x| 1.0 / (1.0 + (-x).exp()))
    }

    fn grad_from_output(&self, y: f64) -> f64 {
        y * (1.0 - y)
    }
}

pub struct ReLU;

impl Activator for ReLU {
    fn activate(&self, z: Matrix) -> Matrix {
        z.map(|x| if x > 0.0 { x } else { 0.0 })
    }

    fn grad_from_output(&self, y: f64) -> f64 {
        if y > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

pub struct LeakyReLU;

impl Activator for LeakyReLU {
    fn activate(&self, z: Matrix) -> Matrix {
        z.map(|x| if x > 0.0 { x } else { x * LEAKY_SLOPE })
    }

    fn grad_from_output(&self, y: f64) -> f64 {
        if y > 0.0 {
            1.0
        } else {
            LEAKY_SLOPE
        }
    }
}

pub struct Tanh;

impl Activator for Tanh {
    fn activate(&self, z: Matrix) -> Matrix {
        z.map(|x| (x.exp() - (-x).exp()) / (x.exp() + (-x).exp()))
    }

    fn grad_from_output(&self, y: f64) -> f64 {
        1.0 - y * y
    }
}
