//! Data-provider and progress-sink collaborator seams.
//!
//! The network engine never performs I/O itself. Dataset loading, shuffling
//! and progress display are collaborator responsibilities behind the
//! [`DataProvider`] and [`ProgressSink`] traits, invoked synchronously
//! between training steps. [`MemoryProvider`] is the bundled implementation:
//! an owned, shuffle-in-place pair of labeled sets with a seeded RNG.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
/// One raw sample: pixel intensities `0..=255` plus its class index.
pub struct LabeledSample {
    pub features: Vec<u8>,
    pub label: usize,
}

impl LabeledSample {
    pub fn new(features: Vec<u8>, label: usize) -> Self {
        Self { features, label }
    }
}

pub trait DataProvider {
    /// The `batch_index`-th training batch of `batch_size` samples.
    fn training_batch(&mut self, batch_index: usize, batch_size: usize)
        -> Result<Vec<LabeledSample>>;

    /// One random sample from the assessment set.
    fn assessment_sample(&mut self) -> Result<LabeledSample>;

    /// Reorders the underlying sets. Idempotent in effect on later draws.
    fn shuffle(&mut self);
}

/// Receiver for per-step training/assessment notifications.
///
/// Reports carry the step index, the total step count, the elapsed wall time
/// and, during assessment, the running hit count. Reporting never fails.
pub trait ProgressSink {
    fn report(&mut self, step: usize, total: usize, elapsed: Duration, hits: Option<usize>);
}

/// Forwards every report through the `log` facade.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&mut self, step: usize, total: usize, elapsed: Duration, hits: Option<usize>) {
        match hits {
            Some(hits) => log::info!(
                "assessing {step:04}/{total} hit rate {:.1}% elapsed {elapsed:?}",
                hits as f64 * 100.0 / step as f64
            ),
            None => log::info!("training {step:04}/{total} elapsed {elapsed:?}"),
        }
    }
}

/// Discards every report.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&mut self, _step: usize, _total: usize, _elapsed: Duration, _hits: Option<usize>) {}
}

/// In-memory labeled dataset pair with deterministic shuffling.
pub struct MemoryProvider {
    training: Vec<LabeledSample>,
    assessment: Vec<LabeledSample>,
    rng: StdRng,
}

impl MemoryProvider {
    /// Owns the two sets. Every sample must carry the same feature count;
    /// the assessment set may be empty only if never drawn from.
    pub fn new(
        training: Vec<LabeledSample>,
        assessment: Vec<LabeledSample>,
        seed: u64,
    ) -> Result<Self> {
        if training.is_empty() {
            return Err(Error::InvalidData(
                "training set must not be empty".to_owned(),
            ));
        }
        let width = training[0].features.len();
        for (i, sample) in training.iter().chain(assessment.iter()).enumerate() {
            if sample.features.len() != width {
                return Err(Error::InvalidData(format!(
                    "sample {i} has {} features, expected {width}",
                    sample.features.len()
                )));
            }
        }
        Ok(Self {
            training,
            assessment,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn training_len(&self) -> usize {
        self.training.len()
    }
}

impl DataProvider for MemoryProvider {
    /// Serves contiguous slices, wrapping around the end of the set so an
    /// epoch larger than the backing data keeps drawing.
    fn training_batch(
        &mut self,
        batch_index: usize,
        batch_size: usize,
    ) -> Result<Vec<LabeledSample>> {
        if batch_size == 0 {
            return Err(Error::InvalidData("batch_size must be > 0".to_owned()));
        }
        let len = self.training.len();
        let start = (batch_index * batch_size) % len;
        Ok((0..batch_size)
            .map(|offset| self.training[(start + offset) % len].clone())
            .collect())
    }

    fn assessment_sample(&mut self) -> Result<LabeledSample> {
        if self.assessment.is_empty() {
            return Err(Error::InvalidData(
                "assessment set must not be empty".to_owned(),
            ));
        }
        let idx = self.rng.random_range(0..self.assessment.len());
        Ok(self.assessment[idx].clone())
    }

    fn shuffle(&mut self) {
        fisher_yates(&mut self.training, &mut self.rng);
        fisher_yates(&mut self.assessment, &mut self.rng);
    }
}

fn fisher_yates<R: Rng + ?Sized>(samples: &mut [LabeledSample], rng: &mut R) {
    for i in (1..samples.len()).rev() {
        let j = rng.random_range(0..=i);
        samples.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n: usize, width: usize) -> Vec<LabeledSample> {
        (0..n)
            .map(|i| LabeledSample::new(vec![i as u8; width], i % 10))
            .collect()
    }

    #[test]
    fn provider_rejects_empty_or_ragged_sets() {
        assert!(MemoryProvider::new(vec![], vec![], 0).is_err());

        let mut ragged = samples(2, 4);
        ragged[1].features.pop();
        assert!(MemoryProvider::new(ragged, vec![], 0).is_err());
    }

    #[test]
    fn training_batches_are_contiguous_and_wrap() {
        let mut provider = MemoryProvider::new(samples(5, 2), vec![], 0).unwrap();

        let batch = provider.training_batch(1, 2).unwrap();
        assert_eq!(batch[0].label, 2);
        assert_eq!(batch[1].label, 3);

        let wrapped = provider.training_batch(2, 2).unwrap();
        assert_eq!(wrapped[0].label, 4);
        assert_eq!(wrapped[1].label, 0);
    }

    #[test]
    fn assessment_draws_come_from_the_assessment_set() {
        let mut provider = MemoryProvider::new(samples(3, 2), samples(4, 2), 7).unwrap();
        for _ in 0..16 {
            let sample = provider.assessment_sample().unwrap();
            assert!(sample.label < 4);
        }
    }

    #[test]
    fn shuffle_preserves_the_sample_population() {
        let mut provider = MemoryProvider::new(samples(8, 2), vec![], 42).unwrap();
        provider.shuffle();
        let mut labels: Vec<usize> = (0..4)
            .flat_map(|b| provider.training_batch(b, 2).unwrap())
            .map(|s| s.label)
            .collect();
        labels.sort_unstable();
        assert_eq!(labels, (0..8).collect::<Vec<_>>());
    }
}
