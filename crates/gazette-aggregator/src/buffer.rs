//! Bounded per-key history

use gazette_core::{Sample, Timestamp};
use std::collections::VecDeque;

/// Time-ordered numeric samples for one sensor key
///
/// Append-only with FIFO eviction: the front is always the oldest sample.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<Sample>,
    max_samples: usize,
}

impl HistoryBuffer {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: max_samples.max(1),
        }
    }

    /// Build from previously saved samples, keeping only those at or after
    /// `cutoff` and at most the newest `max_samples`.
    pub fn restore<I>(samples: I, cutoff: Timestamp, max_samples: usize) -> Self
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut buffer = Self::new(max_samples);
        for sample in samples {
            if sample.0 >= cutoff && sample.1.is_finite() {
                buffer.push(sample.0, sample.1);
            }
        }
        buffer
    }

    /// Append a sample, evicting from the front past the cap.
    ///
    /// Returns the number of samples evicted.
    pub fn push(&mut self, timestamp: Timestamp, value: f64) -> usize {
        self.samples.push_back((timestamp, value));
        let mut evicted = 0;
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Drop every sample older than `cutoff`. Returns the number dropped.
    pub fn prune_before(&mut self, cutoff: Timestamp) -> usize {
        let mut dropped = 0;
        while let Some((ts, _)) = self.samples.front() {
            if *ts >= cutoff {
                break;
            }
            self.samples.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }
}
