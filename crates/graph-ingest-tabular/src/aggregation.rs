use graph_ingest_types::{Entity, PropertyMap, PropertyValue};

/// Above this many observations, the exact sample kept for the median falls
/// back to a capped reservoir rather than growing without bound (§9
/// "Aggregation over streams"). A reservoir (rather than a P² estimator) is
/// used because it is exact on the sample it keeps and simple to reason about
/// for the accuracy this crate promises.
pub const EXACT_SAMPLE_THRESHOLD: usize = 10_000;

/// A statistic an [`AggregationAccumulator`] can be asked to emit onto the
/// summary entity (§4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationFunction {
    Mean,
    Std,
    Min,
    Max,
    Count,
    Median,
    Sum,
}

/// One declared aggregation: which function, over which column, written to
/// which property of the `<Type>_summary` entity (§3 `SchemaMapping`, §4.12).
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub entity_type: String,
    pub column: String,
    pub function: AggregationFunction,
    pub target_property: String,
}

/// Single-pass numeric accumulator using Welford's online algorithm for mean
/// and variance, plus a capped sample for order statistics (§4.12).
#[derive(Debug, Clone)]
pub struct AggregationAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    sum: f64,
    min: f64,
    max: f64,
    sample: Vec<f64>,
    sample_cap: usize,
    seen: u64,
}

impl Default for AggregationAccumulator {
    fn default() -> Self {
        Self::new(EXACT_SAMPLE_THRESHOLD)
    }
}

impl AggregationAccumulator {
    #[must_use]
    pub fn new(sample_cap: usize) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sample: Vec::new(),
            sample_cap,
            seen: 0,
        }
    }

    /// Fold one observation in. Welford's algorithm keeps mean/variance exact
    /// in one pass without re-reading prior values.
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        self.seen += 1;
        if self.sample.len() < self.sample_cap {
            self.sample.push(value);
        } else {
            // Algorithm R: draw a uniform index over every observation seen so
            // far (including this one) and replace only if it lands inside the
            // reservoir — replacement probability is k/i, not 1, so later
            // observations don't systematically crowd out earlier ones.
            let position = pseudo_random_index(self.seen, self.seen);
            if (position as usize) < self.sample.len() {
                self.sample[position as usize] = value;
            }
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    #[must_use]
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    #[must_use]
    pub fn sample_std(&self) -> f64 {
        self.sample_variance().sqrt()
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max
        }
    }

    #[must_use]
    pub fn median(&self) -> f64 {
        if self.sample.is_empty() {
            return 0.0;
        }
        let mut sorted = self.sample.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    #[must_use]
    pub fn value_for(&self, function: AggregationFunction) -> f64 {
        match function {
            AggregationFunction::Mean => self.mean(),
            AggregationFunction::Std => self.sample_std(),
            AggregationFunction::Min => self.min(),
            AggregationFunction::Max => self.max(),
            AggregationFunction::Count => self.count as f64,
            AggregationFunction::Median => self.median(),
            AggregationFunction::Sum => self.sum(),
        }
    }
}

/// A cheap deterministic substitute for `rand`'s uniform distribution: the
/// accumulator only needs *a* stable, roughly uniform draw from `0..modulus`,
/// not cryptographic randomness, and the workspace otherwise has no
/// dependency on a random-number crate. Correctness of Algorithm R depends on
/// the caller passing `modulus = seen` (the draw must be uniform over every
/// observation made so far), not a fixed cap.
fn pseudo_random_index(seen: u64, modulus: u64) -> u64 {
    seen.wrapping_mul(2_862_933_555_777_941_757).wrapping_add(3_037_000_493) % modulus
}

/// Applies every configured [`AggregationConfig`] for `entity_type`, producing
/// the deterministic `<Type>_summary` entity (§3 `SchemaMapping`, I5).
#[must_use]
pub fn build_summary_entity(
    entity_type: &str,
    accumulators: &[(AggregationConfig, AggregationAccumulator)],
) -> Entity {
    let mut properties = PropertyMap::new();
    for (config, accumulator) in accumulators {
        if config.entity_type != entity_type {
            continue;
        }
        properties.insert(
            config.target_property.clone(),
            PropertyValue::Float(accumulator.value_for(config.function)),
        );
    }
    Entity::new(format!("{entity_type}_summary"), format!("{entity_type}Summary"))
        .with_properties(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_match_known_sample() {
        let mut acc = AggregationAccumulator::default();
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.add(value);
        }
        assert!((acc.mean() - 5.0).abs() < 1e-9);
        assert!((acc.sample_std() - 2.138_089_935_299_395).abs() < 1e-6);
    }

    #[test]
    fn min_max_count_sum_are_tracked() {
        let mut acc = AggregationAccumulator::default();
        for value in [3.0, 1.0, 2.0] {
            acc.add(value);
        }
        assert_eq!(acc.count(), 3);
        assert_eq!(acc.min(), 1.0);
        assert_eq!(acc.max(), 3.0);
        assert_eq!(acc.sum(), 6.0);
    }

    #[test]
    fn median_of_odd_sample_is_middle_value() {
        let mut acc = AggregationAccumulator::default();
        for value in [5.0, 1.0, 3.0] {
            acc.add(value);
        }
        assert_eq!(acc.median(), 3.0);
    }

    #[test]
    fn empty_accumulator_reports_zeroes_not_nan() {
        let acc = AggregationAccumulator::default();
        assert_eq!(acc.mean(), 0.0);
        assert_eq!(acc.sample_std(), 0.0);
        assert_eq!(acc.min(), 0.0);
        assert_eq!(acc.max(), 0.0);
    }

    #[test]
    fn reservoir_sample_is_not_recency_biased() {
        let sample_cap = 200;
        let mut acc = AggregationAccumulator::new(sample_cap);
        let stream_len = 50_000;
        for i in 0..stream_len {
            acc.add(i as f64);
        }
        let true_mean = (stream_len - 1) as f64 / 2.0;
        let sample_mean: f64 = acc.sample.iter().sum::<f64>() / acc.sample.len() as f64;
        // A recency-biased reservoir (replacement probability 1 past the cap,
        // as in the original bug) converges to the mean of only the last
        // `sample_cap` values — close to `stream_len`, not `stream_len / 2`.
        // Algorithm R's k/i replacement probability keeps the sample spread
        // across the whole stream, so its mean should land near the middle.
        assert!(
            (sample_mean - true_mean).abs() < true_mean * 0.5,
            "sample mean {sample_mean} should be near the stream's true mean {true_mean}, not skewed toward the tail"
        );
    }

    #[test]
    fn summary_entity_has_deterministic_id() {
        let config = AggregationConfig {
            entity_type: "Sample".to_owned(),
            column: "value".to_owned(),
            function: AggregationFunction::Mean,
            target_property: "mean_value".to_owned(),
        };
        let mut acc = AggregationAccumulator::default();
        acc.add(10.0);
        let summary = build_summary_entity("Sample", &[(config, acc)]);
        assert_eq!(summary.id, "Sample_summary");
        assert_eq!(summary.properties["mean_value"], PropertyValue::Float(10.0));
    }
}
