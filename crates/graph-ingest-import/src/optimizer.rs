use std::time::Duration;

use time::OffsetDateTime;

/// Adaptive batching and performance accounting (§4.16). Every piece here is
/// observation-only: it paces the pipeline (batch size, progress reporting)
/// but never changes what gets written or in what order.
///
/// Lower bound a batch is allowed to shrink to; below this the per-batch
/// fusion/write overhead dominates.
pub const MIN_BATCH: usize = 50;
/// Upper bound a batch is allowed to grow to, keeping peak memory bounded
/// per I6 even under auto-tuning.
pub const MAX_BATCH: usize = 10_000;

/// Below this per-row transform time, `BatchSizeOptimizer::adjust_batch_size`
/// grows the batch on the next round.
const FAST_PER_ROW: Duration = Duration::from_micros(200);
/// Above this per-row transform time, the batch shrinks on the next round.
const SLOW_PER_ROW: Duration = Duration::from_millis(2);

/// Start/end timestamps, row/batch counts, per-phase timing, and a derived
/// rows-per-second figure for one import (§3 `PerformanceMetrics`).
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub started_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
    pub total_rows: usize,
    pub batch_count: usize,
    pub read_seconds: f64,
    pub transform_seconds: f64,
    pub write_seconds: f64,
    pub peak_memory_mb: f64,
}

impl PerformanceMetrics {
    #[must_use]
    pub fn start(started_at: OffsetDateTime) -> Self {
        Self {
            started_at,
            ended_at: None,
            total_rows: 0,
            batch_count: 0,
            read_seconds: 0.0,
            transform_seconds: 0.0,
            write_seconds: 0.0,
            peak_memory_mb: 0.0,
        }
    }

    pub fn finish(&mut self, ended_at: OffsetDateTime) {
        self.ended_at = Some(ended_at);
    }

    #[must_use]
    pub fn rows_per_second(&self) -> f64 {
        let elapsed = self
            .ended_at
            .map_or(0.0, |end| (end - self.started_at).as_seconds_f64());
        if elapsed <= 0.0 {
            0.0
        } else {
            self.total_rows as f64 / elapsed
        }
    }
}

/// Estimates and adaptively tunes the row-batch size the pipeline flushes at
/// (§4.15 "Auto-tune batch size", §4.16).
#[derive(Debug, Clone)]
pub struct BatchSizeOptimizer {
    last_per_row: Option<Duration>,
}

impl Default for BatchSizeOptimizer {
    fn default() -> Self {
        Self { last_per_row: None }
    }
}

impl BatchSizeOptimizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A heuristic starting batch size targeting `target_memory_pct` of a
    /// fixed per-row-width memory budget: wider rows get smaller batches.
    #[must_use]
    pub fn estimate_batch_size(column_count: usize, target_memory_pct: f64) -> usize {
        const ASSUMED_BUDGET_BYTES: f64 = 256.0 * 1024.0 * 1024.0;
        const ASSUMED_BYTES_PER_CELL: f64 = 64.0;

        let column_count = column_count.max(1) as f64;
        let budget = ASSUMED_BUDGET_BYTES * target_memory_pct.clamp(0.01, 1.0);
        let estimate = (budget / (column_count * ASSUMED_BYTES_PER_CELL)) as usize;
        estimate.clamp(MIN_BATCH, MAX_BATCH)
    }

    /// Records how long the most recent batch took to transform, per row.
    pub fn record_batch_time(&mut self, elapsed: Duration, row_count: usize) {
        if row_count == 0 {
            return;
        }
        self.last_per_row = Some(elapsed / row_count as u32);
    }

    /// Grows the batch if the last batch ran fast with memory headroom,
    /// shrinks it if it ran slow or memory is under pressure, otherwise
    /// leaves it unchanged. Always clamped to `[MIN_BATCH, MAX_BATCH]`.
    #[must_use]
    pub fn adjust_batch_size(&self, current: usize, memory_pressure: bool) -> usize {
        let Some(per_row) = self.last_per_row else {
            return current.clamp(MIN_BATCH, MAX_BATCH);
        };
        let adjusted = if memory_pressure || per_row > SLOW_PER_ROW {
            current / 2
        } else if per_row < FAST_PER_ROW {
            current + current / 2
        } else {
            current
        };
        adjusted.clamp(MIN_BATCH, MAX_BATCH)
    }
}

/// Reads this process's resident set size from `/proc/self/status` (§4.16.1).
/// Memory accounting is explicitly observation-only: when the file cannot be
/// read (a non-Linux host, or a sandboxed process without `/proc`), this
/// reports `0.0` rather than surfacing an error, so auto-tuning degrades to
/// ignoring memory pressure instead of failing the import.
#[derive(Debug, Clone, Default)]
pub struct MemoryTracker {
    initial_mb: f64,
    peak_mb: f64,
}

impl MemoryTracker {
    #[must_use]
    pub fn start() -> Self {
        let initial_mb = read_rss_mb();
        Self {
            initial_mb,
            peak_mb: initial_mb,
        }
    }

    /// Samples current RSS and folds it into the running peak; returns the
    /// updated peak.
    pub fn sample(&mut self) -> f64 {
        let current = read_rss_mb();
        if current > self.peak_mb {
            self.peak_mb = current;
        }
        self.peak_mb
    }

    #[must_use]
    pub fn initial_mb(&self) -> f64 {
        self.initial_mb
    }

    #[must_use]
    pub fn peak_mb(&self) -> f64 {
        self.peak_mb
    }

    /// Whether the most recent sample exceeded `budget_mb` — a coarse
    /// "memory pressure" signal for `BatchSizeOptimizer::adjust_batch_size`.
    #[must_use]
    pub fn under_pressure(&self, budget_mb: f64) -> bool {
        self.peak_mb > budget_mb
    }
}

fn read_rss_mb() -> f64 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0.0;
    };
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
            if let Ok(kb) = digits.parse::<f64>() {
                return kb / 1024.0;
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_batch_size_is_clamped() {
        assert!(BatchSizeOptimizer::estimate_batch_size(1000, 0.25) >= MIN_BATCH);
        assert!(BatchSizeOptimizer::estimate_batch_size(1, 1.0) <= MAX_BATCH);
    }

    #[test]
    fn fast_batches_grow_and_slow_batches_shrink() {
        let mut optimizer = BatchSizeOptimizer::new();
        optimizer.record_batch_time(Duration::from_micros(50), 100);
        assert!(optimizer.adjust_batch_size(1000, false) > 1000);

        optimizer.record_batch_time(Duration::from_millis(500), 100);
        assert!(optimizer.adjust_batch_size(1000, false) < 1000);
    }

    #[test]
    fn memory_pressure_forces_shrink_regardless_of_speed() {
        let mut optimizer = BatchSizeOptimizer::new();
        optimizer.record_batch_time(Duration::from_micros(10), 100);
        assert!(optimizer.adjust_batch_size(1000, true) < 1000);
    }

    #[test]
    fn rows_per_second_is_zero_before_finish() {
        let metrics = PerformanceMetrics::start(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(metrics.rows_per_second(), 0.0);
    }
}
