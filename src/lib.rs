//! Hand-rolled dense linear algebra plus a feed-forward digit classifier.
//!
//! `digitnet` is a small, from-scratch implementation of the classic MNIST
//! setup: a [`Matrix`]/[`Vector`] pair with memoized transposes and
//! determinants, pluggable [`activation`] and [`pooling`] strategies, and a
//! [`Network`] engine that trains by plain backpropagation of a signed
//! one-hot error.
//!
//! # Design notes
//!
//! - Scalars are `f64`; matrices are row-major with weights shaped
//!   `(out_width, in_width)`.
//! - Derived values (transpose, determinant) are computed once per container
//!   and discarded by any in-place write, so repeated reads are free.
//! - The engine performs no I/O. Datasets and progress display live behind
//!   the [`DataProvider`] and [`ProgressSink`] seams; [`MemoryProvider`] and
//!   [`LogSink`] are the bundled implementations.
//! - Fallible operations return [`Result`]; shape mismatches and unknown
//!   strategy names are reported through [`Error`], never panics.
//!
//! # Quick start
//!
//! ```rust
//! use digitnet::{
//!     ActivationKind, LabeledSample, MemoryProvider, ModelConfig, Network, NullSink,
//!     PoolingKind,
//! };
//!
//! # fn main() -> digitnet::Result<()> {
//! let samples: Vec<LabeledSample> = (0..8)
//!     .map(|i| LabeledSample::new(vec![i * 30, 255 - i * 30, 10, 200], (i % 2) as usize))
//!     .collect();
//! let mut provider = MemoryProvider::new(samples.clone(), samples, 0)?;
//!
//! let config = ModelConfig {
//!     epochs: 1,
//!     epoch_size: 8,
//!     batch_size: 1,
//!     hidden_layers: vec![4],
//!     activation: ActivationKind::Sigmoid,
//!     pooling: PoolingKind::Identity,
//!     input_width: 4,
//!     input_features: 4,
//!     output_features: 2,
//!     ..ModelConfig::default()
//! };
//! let mut network = Network::new_with_seed(config, 0)?;
//! network.train(&mut provider, &mut NullSink)?;
//!
//! let class = network.predict(&[200, 30, 10, 200])?;
//! assert!(class < 2);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod config;
pub mod data;
pub mod error;
pub mod matrix;
pub mod network;
pub mod pooling;
pub mod vector;

pub use activation::{activator_for, ActivationKind, Activator};
pub use config::{LrSchedule, ModelConfig};
pub use data::{DataProvider, LabeledSample, LogSink, MemoryProvider, NullSink, ProgressSink};
pub use error::{Error, Result};
pub use matrix::Matrix;
pub use network::{Layer, Network};
pub use pooling::{pooling_for, Pooling, PoolingKind};
pub use vector::Vector;
