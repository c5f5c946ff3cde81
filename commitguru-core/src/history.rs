//! Downsampled quality history.
//!
//! Quality scores are buffered per commit and averaged into one point every
//! `interval` commits. The interval is fixed at construction from the number
//! of commits the caller expects to feed, so large repositories still yield a
//! chart-sized series.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Target number of points in a history series.
pub const HISTORY_POINTS: usize = 15;

const LEGACY_INTERVAL_MODULUS: usize = 10;

/// How the sampling interval is derived from the expected commit count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntervalRule {
    /// Adds one to the raw interval when the count is a multiple of 10.
    #[default]
    Legacy,
    /// Adds one to the raw interval when the count is a multiple of the
    /// target point count.
    Corrected,
}

/// Order in which averaged scores are stored in [`HistoryValues::quality`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityOrder {
    /// Each score is appended, so `quality[i]` belongs to `ids[i]`.
    #[default]
    Chronological,
    /// Each score is inserted at the front while ids grow forward.
    Reversed,
}

/// Tuning for the history sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerOptions {
    /// Target number of points.
    pub history_points: usize,
    /// Interval derivation rule.
    pub interval_rule: IntervalRule,
    /// Storage order of quality values.
    pub quality_order: QualityOrder,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            history_points: HISTORY_POINTS,
            interval_rule: IntervalRule::default(),
            quality_order: QualityOrder::default(),
        }
    }
}

/// Number of commits per history point for a stream of `expected` commits.
///
/// Always at least 1.
pub fn sampling_interval(expected: usize, options: &SamplerOptions) -> usize {
    let points = options.history_points.max(1);
    if expected <= points {
        return 1;
    }

    let raw = expected / points;
    let modulus = match options.interval_rule {
        IntervalRule::Legacy => LEGACY_INTERVAL_MODULUS,
        IntervalRule::Corrected => points,
    };
    if expected % modulus != 0 { raw } else { raw + 1 }
}

/// Value series of a [`HistorySeries`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryValues {
    /// Averaged quality score per point, 0-100.
    pub quality: Vec<f64>,
}

/// The exposed history: commit-index labels and averaged quality values.
///
/// `ids` and `values.quality` always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistorySeries {
    ids: Vec<u64>,
    values: HistoryValues,
    #[serde(default)]
    order: QualityOrder,
}

impl HistorySeries {
    fn with_order(order: QualityOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    fn push(&mut self, id: u64, quality: f64) {
        self.ids.push(id);
        match self.order {
            QualityOrder::Chronological => self.values.quality.push(quality),
            QualityOrder::Reversed => self.values.quality.insert(0, quality),
        }
    }

    /// Commit-index labels in increasing order.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Quality values in their stored order.
    pub fn quality(&self) -> &[f64] {
        &self.values.quality
    }

    /// Storage order of the quality values.
    pub fn order(&self) -> QualityOrder {
        self.order
    }

    /// Quality values ordered to match [`HistorySeries::ids`].
    pub fn chronological_quality(&self) -> Vec<f64> {
        match self.order {
            QualityOrder::Chronological => self.values.quality.clone(),
            QualityOrder::Reversed => self.values.quality.iter().rev().copied().collect(),
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Buffers per-commit quality scores and flushes averaged points.
#[derive(Debug, Clone)]
pub struct HistorySampler {
    interval: usize,
    expected: usize,
    processed: usize,
    buffer: Vec<u8>,
    series: HistorySeries,
}

impl HistorySampler {
    /// Create a sampler for a stream of `expected` commits.
    pub fn new(expected: usize, options: &SamplerOptions) -> Self {
        Self {
            interval: sampling_interval(expected, options),
            expected,
            processed: 0,
            buffer: Vec::new(),
            series: HistorySeries::with_order(options.quality_order),
        }
    }

    /// Record one commit's quality score.
    ///
    /// The flush check uses the commit's zero-based index, so the first
    /// commit always produces a point. Returns the flushed average, if any.
    pub fn record(&mut self, score: u8) -> Option<f64> {
        self.buffer.push(score);
        let index = self.processed;
        let flushed = if index % self.interval == 0 || index == self.expected {
            self.flush(index)
        } else {
            None
        };
        self.processed += 1;
        flushed
    }

    /// Advance past a commit that has no score.
    ///
    /// The commit keeps its index, so later points stay aligned with the
    /// caller's commit order. Scores already buffered are flushed if this
    /// index is a flush point.
    pub fn skip(&mut self) -> Option<f64> {
        let index = self.processed;
        let flushed = if index % self.interval == 0 || index == self.expected {
            self.flush(index)
        } else {
            None
        };
        self.processed += 1;
        flushed
    }

    /// Flush any scores buffered since the last point.
    ///
    /// The point is labelled with the index of the last recorded commit.
    /// Nothing is appended when the buffer is empty.
    pub fn finish(&mut self) -> Option<f64> {
        let last = self.processed.checked_sub(1)?;
        self.flush(last)
    }

    fn flush(&mut self, label: usize) -> Option<f64> {
        if self.buffer.is_empty() {
            log::debug!("history flush at commit {label} skipped: no buffered scores");
            return None;
        }
        let sum: f64 = self.buffer.iter().map(|score| f64::from(*score)).sum();
        let average = sum / self.buffer.len() as f64;
        self.series.push(label as u64, average);
        log::debug!(
            "history point {} at commit {label}: {average:.2} over {} commits",
            self.series.len(),
            self.buffer.len()
        );
        self.buffer.clear();
        Some(average)
    }

    /// Commits per history point.
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Commit count declared at construction.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Commits recorded so far.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Scores buffered since the last flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// The series accumulated so far.
    pub fn series(&self) -> &HistorySeries {
        &self.series
    }
}
