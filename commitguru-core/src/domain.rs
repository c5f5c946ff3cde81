//! Domain entities for CommitGuru.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::threshold::{Classification, Position};

/// A commit record: arbitrary named fields, some of which may be metrics.
pub type Commit = Map<String, Value>;

/// Counts of metrics that fell into each bucket.
///
/// Used both for a single commit and for repository-wide running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetricSummary {
    /// Metrics at or above their buggy bound.
    pub above: u64,
    /// Metrics between their bounds.
    pub between: u64,
    /// Metrics at or below their non-buggy bound.
    pub below: u64,
}

impl MetricSummary {
    /// Create a summary from explicit counts.
    pub fn new(above: u64, between: u64, below: u64) -> Self {
        Self {
            above,
            between,
            below,
        }
    }

    /// Total number of classified metrics.
    pub fn total(&self) -> u64 {
        self.above + self.between + self.below
    }

    /// Count one classified metric.
    pub fn record(&mut self, position: Position) {
        match position {
            Position::Above => self.above += 1,
            Position::Between => self.between += 1,
            Position::Below => self.below += 1,
        }
    }

    /// Add another summary element-wise.
    pub fn add(&mut self, other: &MetricSummary) {
        self.above += other.above;
        self.between += other.between;
        self.below += other.below;
    }

    /// Percentage of metrics in non-buggy territory, rounded, 0-100.
    ///
    /// A summary with no metrics scores 0.
    pub fn quality_score(&self) -> u8 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let percent = (self.below as f64 / total as f64) * 100.0;
        percent.round() as u8
    }
}

/// A commit after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedCommit {
    /// Fields that are not recognized metrics, untouched.
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
    /// Classification of each recognized metric field.
    pub metrics: BTreeMap<String, Classification>,
    /// Per-bucket counts for this commit.
    #[serde(rename = "metric_summary")]
    pub metric_summary: MetricSummary,
}

impl ClassifiedCommit {
    /// Quality score for this commit.
    pub fn quality_score(&self) -> u8 {
        self.metric_summary.quality_score()
    }
}

/// Convert a JSON number or numeric string into a finite `f64`.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|value| value.is_finite())
}
