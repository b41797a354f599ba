//! The feed-forward network engine.
//!
//! A network owns an ordered list of layers, each a batch-activation buffer
//! plus the weight matrix connecting it to the previous layer (the input
//! layer has none). Training repeats forward pass, one-hot error,
//! backpropagation and in-place weight update per batch, then decays the
//! learning rate once per epoch. All collaborator I/O goes through the
//! [`DataProvider`] and [`ProgressSink`] seams; the engine itself is
//! single-threaded and synchronous.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::activation::{activator_for, Activator};
use crate::data::{DataProvider, ProgressSink};
use crate::pooling::{pooling_for, Pooling};
use crate::vector::argmax;
use crate::{Error, Matrix, ModelConfig, Result, Vector};

/// Raw intensities are scaled into `[0, 1)` by this divisor.
const BYTE_RANGE: f64 = 256.0;

/// Samples drawn for the per-epoch assessment pass.
const ASSESS_ITERATIONS: usize = 1000;

/// One network layer: its activation buffer and the incoming weights.
pub struct Layer {
    /// `[batch x width]` activations of the most recent forward pass.
    activations: Matrix,
    /// `[width x previous_width]` incoming weights; `None` for the input
    /// layer only.
    weights: Option<Matrix>,
}

impl Layer {
    pub fn new(activations: Matrix, weights: Option<Matrix>) -> Self {
        Self {
            activations,
            weights,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.activations.cols()
    }

    #[inline]
    pub fn weights(&self) -> Option<&Matrix> {
        self.weights.as_ref()
    }
}

pub struct Network {
    config: ModelConfig,
    activator: Box<dyn Activator>,
    pooling: Box<dyn Pooling>,
    layers: Vec<Layer>,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Network {
    /// Configured network with randomized weights, deterministic per seed.
    pub fn new_with_seed(config: ModelConfig, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(config, &mut rng)
    }

    /// Configured network with weights drawn from the provided RNG.
    ///
    /// Allocates hidden-layer count + 2 layers. The input width is whatever
    /// the configured pooling leaves of a raw feature vector.
    pub fn new_with_rng<R: Rng + ?Sized>(config: ModelConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let pooling = pooling_for(config.pooling, config.input_width);
        let input_width = pooling.pool(&Vector::new(config.input_features)).len();

        let mut layers = Vec::with_capacity(config.hidden_layers.len() + 2);
        layers.push(Layer::new(Matrix::new(config.batch_size, input_width), None));
        let mut previous_width = input_width;
        for width in config.hidden_layers.iter().chain([config.output_features].iter()) {
            layers.push(Layer::new(
                Matrix::new(config.batch_size, *width),
                Some(Matrix::random_with_rng(*width, previous_width, rng)),
            ));
            previous_width = *width;
        }

        Ok(Self {
            activator: activator_for(config.activation),
            pooling,
            config,
            layers,
        })
    }

    /// Configured network over caller-supplied layers, e.g. fixed weights.
    ///
    /// The first layer must carry no weight matrix; every other layer must
    /// carry one whose shape chains to the previous layer's width.
    pub fn from_layers(config: ModelConfig, layers: Vec<Layer>) -> Result<Self> {
        config.validate()?;
        if layers.len() < 2 {
            return Err(Error::InvalidConfig(
                "network needs at least an input and an output layer".to_owned(),
            ));
        }
        if layers[0].weights.is_some() {
            return Err(Error::InvalidConfig(
                "the input layer must not carry a weight matrix".to_owned(),
            ));
        }
        let mut previous_width = layers[0].width();
        for (i, layer) in layers.iter().enumerate().skip(1) {
            let weights = layer.weights.as_ref().ok_or_else(|| {
                Error::InvalidConfig(format!("layer {i} is missing its weight matrix"))
            })?;
            if weights.rows() != layer.width() || weights.cols() != previous_width {
                return Err(Error::InvalidConfig(format!(
                    "layer {i} weights are {}x{}, expected {}x{previous_width}",
                    weights.rows(),
                    weights.cols(),
                    layer.width()
                )));
            }
            previous_width = layer.width();
        }

        Ok(Self {
            activator: activator_for(config.activation),
            pooling: pooling_for(config.pooling, config.input_width),
            config,
            layers,
        })
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn learning_rate(&self) -> f64 {
        self.config.learning_rate
    }

    /// Incoming weights of layer `i`, `None` for the input layer.
    pub fn weights(&self, i: usize) -> Option<&Matrix> {
        self.layers.get(i).and_then(|l| l.weights.as_ref())
    }

    /// Output-layer activations of the most recent forward pass.
    pub fn output(&self) -> &Matrix {
        &self
            .layers
            .last()
            .expect("network has at least two layers")
            .activations
    }

    /// Forward pass over one batch of pooled raw features.
    ///
    /// Scales every element by `1/256` into `[0, 1)`, stores the result as
    /// the input layer's activations, then activates each layer from its
    /// predecessor through the connecting weights. Any row count >= 1 works;
    /// assessment and prediction use single-row batches.
    pub fn forward(&mut self, batch: Matrix) -> Result<&Matrix> {
        let input_width = self.layers[0].width();
        if batch.cols() != input_width {
            return Err(Error::DimensionMismatch(format!(
                "input batch is {} wide, the input layer expects {input_width}",
                batch.cols()
            )));
        }

        self.layers[0].activations = batch.map(|x| x / BYTE_RANGE);
        for i in 1..self.layers.len() {
            let (previous, rest) = self.layers.split_at_mut(i);
            let input = &previous[i - 1].activations;
            let layer = &mut rest[0];
            let weights = layer
                .weights
                .as_ref()
                .expect("non-input layers carry a weight matrix");
            let pre_activation = input.mul(weights.transpose())?;
            layer.activations = self.activator.activate(pre_activation);
        }
        Ok(self.output())
    }

    /// Signed one-hot error: `target - output`, per sample, per class.
    ///
    /// The gradient consumes the signed difference directly; nothing is
    /// squared here.
    pub fn error_batch(labels: &[usize], output: &Matrix) -> Result<Matrix> {
        if labels.len() != output.rows() {
            return Err(Error::DimensionMismatch(format!(
                "{} labels for an output batch of {} rows",
                labels.len(),
                output.rows()
            )));
        }
        let classes = output.cols();
        let mut data = Vec::with_capacity(labels.len() * classes);
        for (row, &label) in labels.iter().enumerate() {
            if label >= classes {
                return Err(Error::IndexOutOfBounds {
                    index: label,
                    bound: classes,
                });
            }
            for (class, &out) in output.row(row).iter().enumerate() {
                let target = if class == label { 1.0 } else { 0.0 };
                data.push(target - out);
            }
        }
        Matrix::from_vec(data, labels.len(), classes)
    }

    /// Propagates the output error backward and updates weights in place.
    ///
    /// The error for layer `i` is `error[i+1] x weights[i+1]`; each
    /// non-input layer then adds `learning_rate x derivative(previous
    /// activations, own activations, own error)` onto its weight matrix.
    /// All propagated errors are derived before the first weight changes.
    pub fn backpropagate(&mut self, error: Matrix, learning_rate: f64) -> Result<()> {
        let count = self.layers.len();
        let output = self.output();
        if error.rows() != output.rows() || error.cols() != output.cols() {
            return Err(Error::DimensionMismatch(format!(
                "error batch is {}x{}, the output layer is {}x{}",
                error.rows(),
                error.cols(),
                output.rows(),
                output.cols()
            )));
        }

        let mut errors = Vec::with_capacity(count - 1);
        errors.push(error);
        for i in (1..count - 1).rev() {
            let weights = self.layers[i + 1]
                .weights
                .as_ref()
                .expect("non-input layers carry a weight matrix");
            let propagated = errors
                .last()
                .expect("the output error seeds the propagation")
                .mul(weights)?;
            errors.push(propagated);
        }
        errors.reverse();

        for i in (1..count).rev() {
            let (previous, rest) = self.layers.split_at_mut(i);
            let input = &previous[i - 1].activations;
            let layer = &mut rest[0];
            let delta = self
                .activator
                .derivative(input, &layer.activations, &errors[i - 1])?
                .scale(learning_rate);
            layer
                .weights
                .as_mut()
                .expect("non-input layers carry a weight matrix")
                .add_assign(&delta)?;
        }
        Ok(())
    }

    /// Runs the configured number of epochs against the provider.
    ///
    /// Per step: fetch a batch, pool its raw features, forward, compute the
    /// one-hot error, backpropagate with the current rate, report progress.
    /// Per epoch: assessment pass, provider shuffle, then the learning-rate
    /// schedule is applied once. The engine can be re-entered into training
    /// at any time.
    pub fn train(
        &mut self,
        provider: &mut dyn DataProvider,
        sink: &mut dyn ProgressSink,
    ) -> Result<()> {
        let steps = self.config.epoch_size / self.config.batch_size;
        for epoch in 0..self.config.epochs {
            let started = Instant::now();
            for step in 0..steps {
                let batch = provider.training_batch(step, self.config.batch_size)?;
                let rows: Vec<&[u8]> = batch.iter().map(|s| s.features.as_slice()).collect();
                let raw = Matrix::from_byte_rows(&rows)?;
                if raw.cols() != self.config.input_features {
                    return Err(Error::DimensionMismatch(format!(
                        "provider served {}-feature samples, configured for {}",
                        raw.cols(),
                        self.config.input_features
                    )));
                }
                let pooled = self.pooling.pool_batch(&raw);
                self.forward(pooled)?;

                let labels: Vec<usize> = batch.iter().map(|s| s.label).collect();
                let error = Self::error_batch(&labels, self.output())?;
                let rate = self.config.learning_rate;
                self.backpropagate(error, rate)?;
                sink.report(step + 1, steps, started.elapsed(), None);
            }

            let hit_rate = self.assess(ASSESS_ITERATIONS, provider, sink)?;
            provider.shuffle();
            self.config.learning_rate =
                self.config
                    .schedule
                    .next_rate(self.config.learning_rate, epoch, self.config.epochs);
            log::debug!(
                "epoch {}/{}: hit rate {hit_rate:.3}, next learning rate {}",
                epoch + 1,
                self.config.epochs,
                self.config.learning_rate
            );
        }
        Ok(())
    }

    /// Draws single random samples and counts argmax hits. Returns the hit
    /// rate. Weights are never written.
    pub fn assess(
        &mut self,
        iterations: usize,
        provider: &mut dyn DataProvider,
        sink: &mut dyn ProgressSink,
    ) -> Result<f64> {
        if iterations == 0 {
            return Err(Error::InvalidConfig(
                "assessment needs at least one iteration".to_owned(),
            ));
        }
        let started = Instant::now();
        let mut hits = 0;
        for i in 0..iterations {
            let sample = provider.assessment_sample()?;
            if self.predict(&sample.features)? == sample.label {
                hits += 1;
            }
            sink.report(i + 1, iterations, started.elapsed(), Some(hits));
        }
        Ok(hits as f64 / iterations as f64)
    }

    /// Pools and forward-passes one unlabeled sample; returns the index of
    /// the maximum output activation. No error computation, no weight
    /// mutation.
    pub fn predict(&mut self, features: &[u8]) -> Result<usize> {
        if features.len() != self.config.input_features {
            return Err(Error::DimensionMismatch(format!(
                "sample has {} features, configured for {}",
                features.len(),
                self.config.input_features
            )));
        }
        let pooled = self.pooling.pool(&Vector::from_bytes(features));
        let output = self.forward(pooled.into_row())?;
        argmax(output.row(0)).ok_or_else(|| {
            Error::InvalidConfig("network has no output units".to_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LabeledSample, MemoryProvider, NullSink};
    use crate::{ActivationKind, LrSchedule, PoolingKind};

    fn small_config() -> ModelConfig {
        ModelConfig {
            epochs: 1,
            epoch_size: 4,
            batch_size: 1,
            learning_rate: 0.5,
            schedule: LrSchedule::Constant,
            hidden_layers: vec![3],
            activation: ActivationKind::Sigmoid,
            pooling: PoolingKind::Identity,
            input_width: 4,
            input_features: 4,
            output_features: 2,
        }
    }

    fn fixed_network() -> (Network, Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let w1 = vec![
            vec![0.10, -0.20, 0.30, 0.05],
            vec![-0.15, 0.25, 0.10, -0.05],
            vec![0.20, 0.05, -0.10, 0.15],
        ];
        let w2 = vec![vec![0.30, -0.20, 0.10], vec![-0.10, 0.20, 0.30]];
        let layers = vec![
            Layer::new(Matrix::new(1, 4), None),
            Layer::new(Matrix::new(1, 3), Some(Matrix::from_rows(&w1).unwrap())),
            Layer::new(Matrix::new(1, 2), Some(Matrix::from_rows(&w2).unwrap())),
        ];
        let network = Network::from_layers(small_config(), layers).unwrap();
        (network, w1, w2)
    }

    #[test]
    fn construction_allocates_hidden_plus_two_layers() {
        let config = ModelConfig {
            hidden_layers: vec![6, 5],
            input_features: 8,
            pooling: PoolingKind::LinearMean,
            input_width: 8,
            output_features: 3,
            ..small_config()
        };
        let network = Network::new_with_seed(config, 0).unwrap();
        assert_eq!(network.num_layers(), 4);
        // LinearMean reduces 8 raw features to 2.
        assert!(network.weights(0).is_none());
        let w1 = network.weights(1).unwrap();
        assert_eq!((w1.rows(), w1.cols()), (6, 2));
        let w3 = network.weights(3).unwrap();
        assert_eq!((w3.rows(), w3.cols()), (3, 5));
    }

    #[test]
    fn from_layers_rejects_broken_chains() {
        let layers = vec![
            Layer::new(Matrix::new(1, 4), None),
            Layer::new(Matrix::new(1, 3), Some(Matrix::new(3, 5))),
        ];
        assert!(matches!(
            Network::from_layers(small_config(), layers).unwrap_err(),
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn forward_rejects_mismatched_input_width() {
        let (mut network, _, _) = fixed_network();
        assert!(network.forward(Matrix::new(1, 5)).is_err());
    }

    #[test]
    fn error_batch_is_signed_one_hot_difference() {
        let output = Matrix::from_rows(&[vec![0.2, 0.7], vec![0.9, 0.1]]).unwrap();
        let error = Network::error_batch(&[1, 0], &output).unwrap();
        assert!((error.get(0, 0).unwrap() - (-0.2)).abs() < 1e-12);
        assert!((error.get(0, 1).unwrap() - 0.3).abs() < 1e-12);
        assert!((error.get(1, 0).unwrap() - 0.1).abs() < 1e-12);
        assert!((error.get(1, 1).unwrap() - (-0.1)).abs() < 1e-12);
    }

    #[test]
    fn error_batch_rejects_out_of_range_labels() {
        let output = Matrix::new(1, 2);
        assert_eq!(
            Network::error_batch(&[2], &output).unwrap_err(),
            Error::IndexOutOfBounds { index: 2, bound: 2 }
        );
    }

    /// One full forward/error/backpropagate cycle against an independent
    /// scalar-loop computation of the same update rule.
    #[test]
    fn one_training_cycle_matches_hand_computed_update() {
        let (mut network, w1, w2) = fixed_network();
        let raw = [64.0, 128.0, 192.0, 32.0];
        let label = 1usize;
        let rate = 0.5;

        network
            .forward(Matrix::from_vec(raw.to_vec(), 1, 4).unwrap())
            .unwrap();
        let error = Network::error_batch(&[label], network.output()).unwrap();
        network.backpropagate(error, rate).unwrap();

        // Independent computation with plain loops.
        let sigmoid = |x: f64| 1.0 / (1.0 + (-x).exp());
        let x: Vec<f64> = raw.iter().map(|v| v / 256.0).collect();
        let y1: Vec<f64> = (0..3)
            .map(|i| sigmoid((0..4).map(|j| x[j] * w1[i][j]).sum()))
            .collect();
        let y2: Vec<f64> = (0..2)
            .map(|k| sigmoid((0..3).map(|i| y1[i] * w2[k][i]).sum()))
            .collect();
        let e2: Vec<f64> = (0..2)
            .map(|k| if k == label { 1.0 - y2[k] } else { -y2[k] })
            .collect();
        // Error propagated through the untouched output weights.
        let e1: Vec<f64> = (0..3).map(|i| (0..2).map(|k| e2[k] * w2[k][i]).sum()).collect();

        for k in 0..2 {
            for i in 0..3 {
                let expected = w2[k][i] + rate * e2[k] * y2[k] * (1.0 - y2[k]) * y1[i];
                let got = network.weights(2).unwrap().get(k, i).unwrap();
                assert!(
                    (got - expected).abs() < 1e-9,
                    "w2[{k}][{i}]: got {got}, expected {expected}"
                );
            }
        }
        for i in 0..3 {
            for j in 0..4 {
                let expected = w1[i][j] + rate * e1[i] * y1[i] * (1.0 - y1[i]) * x[j];
                let got = network.weights(1).unwrap().get(i, j).unwrap();
                assert!(
                    (got - expected).abs() < 1e-9,
                    "w1[{i}][{j}]: got {got}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn assess_never_mutates_weights() {
        let (mut network, _, _) = fixed_network();
        let samples: Vec<LabeledSample> = (0..8)
            .map(|i| LabeledSample::new(vec![i * 16, 255 - i * 16, 7, 90], (i % 2) as usize))
            .collect();
        let mut provider = MemoryProvider::new(samples.clone(), samples, 3).unwrap();
        let mut sink = NullSink;

        let before: Vec<Matrix> = (1..network.num_layers())
            .map(|i| network.weights(i).unwrap().clone())
            .collect();
        network.assess(50, &mut provider, &mut sink).unwrap();
        network.assess(50, &mut provider, &mut sink).unwrap();
        for (i, snapshot) in before.iter().enumerate() {
            assert_eq!(network.weights(i + 1).unwrap(), snapshot);
        }
    }

    #[test]
    fn predict_returns_the_argmax_class() {
        let (mut network, _, _) = fixed_network();
        let class = network.predict(&[10, 20, 30, 40]).unwrap();
        assert!(class < 2);
        let out = network.output();
        let other = 1 - class;
        assert!(out.get(0, class).unwrap() >= out.get(0, other).unwrap());
    }

    #[test]
    fn schedules_are_applied_once_per_epoch() {
        let samples: Vec<LabeledSample> = (0..4)
            .map(|i| LabeledSample::new(vec![i * 8, 1, 2, 3], (i % 2) as usize))
            .collect();
        let mut provider = MemoryProvider::new(samples.clone(), samples, 0).unwrap();
        let mut sink = NullSink;

        let config = ModelConfig {
            epochs: 2,
            schedule: LrSchedule::Logarithmic,
            ..small_config()
        };
        let mut network = Network::new_with_seed(config, 1).unwrap();
        network.train(&mut provider, &mut sink).unwrap();
        // Epoch 0 divides by 1, epoch 1 divides by 2.
        assert!((network.learning_rate() - 0.25).abs() < 1e-12);
    }
}
