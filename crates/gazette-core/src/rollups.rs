//! Min/max rollups over the trailing window

use std::collections::BTreeMap;

/// Aggregation type for rollups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateType {
    Min,
    Max,
}

/// Running accumulator for one aggregate over a series
#[derive(Debug, Clone)]
pub struct Accumulator {
    value: Option<f64>,
    count: usize,
    aggregate_type: AggregateType,
}

impl Accumulator {
    pub fn new(aggregate_type: AggregateType) -> Self {
        Self {
            value: None,
            count: 0,
            aggregate_type,
        }
    }

    /// Fold a value in. Non-finite values are skipped.
    pub fn add(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        self.value = Some(match (self.value, self.aggregate_type) {
            (None, _) => value,
            (Some(cur), AggregateType::Min) => cur.min(value),
            (Some(cur), AggregateType::Max) => cur.max(value),
        });
    }

    pub fn result(&self) -> Option<f64> {
        self.value
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Compute `{key}_min` / `{key}_max` for every series.
///
/// Series with no usable values contribute nothing.
pub fn min_max_metrics<'a, I, V>(series: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: IntoIterator<Item = f64>,
{
    let mut metrics = BTreeMap::new();

    for (key, values) in series {
        let mut low = Accumulator::new(AggregateType::Min);
        let mut high = Accumulator::new(AggregateType::Max);
        for v in values {
            low.add(v);
            high.add(v);
        }

        if let (Some(min), Some(max)) = (low.result(), high.result()) {
            metrics.insert(format!("{}_min", key), min);
            metrics.insert(format!("{}_max", key), max);
        }
    }

    metrics
}
