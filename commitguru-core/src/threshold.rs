//! Threshold configuration and metric classification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::domain::parse_numeric;
use crate::error::{MetricsError, Result};

/// Key suffix of the upper bound of non-buggy territory.
pub const NONBUGGY_SUFFIX: &str = "nonbuggy";
/// Key suffix of the lower bound of buggy territory.
pub const BUGGY_SUFFIX: &str = "buggy";

/// A pair of cutoffs for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Bounds {
    /// Values at or below this are non-buggy.
    pub nonbuggy: f64,
    /// Values at or above this are buggy.
    pub buggy: f64,
}

impl Bounds {
    /// Create a bound pair. Ordering is not validated.
    pub fn new(nonbuggy: f64, buggy: f64) -> Self {
        Self { nonbuggy, buggy }
    }
}

/// Where a metric value falls relative to its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// At or below the non-buggy bound.
    Below,
    /// Neither bound crossed.
    Between,
    /// At or above the buggy bound.
    Above,
}

impl Position {
    /// Legacy numeric encoding: `-1` below, `0` between, `1` above.
    pub fn as_threshold(self) -> i8 {
        match self {
            Self::Below => -1,
            Self::Between => 0,
            Self::Above => 1,
        }
    }
}

/// A classified metric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Classification {
    /// The numeric value that was classified.
    pub value: f64,
    /// The verdict against the metric's bounds.
    pub position: Position,
}

/// Classify a value against a bound pair.
///
/// The non-buggy bound is checked first, so with inverted bounds a value that
/// crosses both is reported as [`Position::Below`].
pub fn classify(bounds: Bounds, value: f64) -> Position {
    if value <= bounds.nonbuggy {
        Position::Below
    } else if value >= bounds.buggy {
        Position::Above
    } else {
        Position::Between
    }
}

/// Immutable set of recognized metrics and their bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    metrics: BTreeMap<String, Bounds>,
    individual: Map<String, Value>,
}

impl ThresholdTable {
    /// Create an empty table that recognizes no metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric and its bounds, returning the extended table.
    pub fn with_metric(mut self, name: impl Into<String>, nonbuggy: f64, buggy: f64) -> Self {
        let name = name.into();
        self.individual
            .insert(format!("{name}{NONBUGGY_SUFFIX}"), Value::from(nonbuggy));
        self.individual
            .insert(format!("{name}{BUGGY_SUFFIX}"), Value::from(buggy));
        self.metrics.insert(name, Bounds::new(nonbuggy, buggy));
        self
    }

    /// Build a table from flat `<name>nonbuggy` / `<name>buggy` configuration.
    ///
    /// Keys that do not end in `buggy` define no metric but are kept in the
    /// echoed configuration. Every `<name>nonbuggy` key must have a matching
    /// `<name>buggy` key.
    pub fn from_config(config: &Map<String, Value>) -> Result<Self> {
        let mut cutoffs = BTreeMap::new();
        for (key, value) in config {
            if !key.ends_with(BUGGY_SUFFIX) {
                continue;
            }
            let bound = parse_numeric(value)
                .ok_or_else(|| MetricsError::InvalidBound { key: key.clone() })?;
            cutoffs.insert(key.clone(), bound);
        }

        let mut metrics = BTreeMap::new();
        for (key, nonbuggy) in &cutoffs {
            let Some(name) = key.strip_suffix(NONBUGGY_SUFFIX) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let buggy_key = format!("{name}{BUGGY_SUFFIX}");
            let Some(buggy) = cutoffs.get(&buggy_key) else {
                // `xnonbuggy` is also the buggy bound of a metric named `xnon`.
                let base = &key[..key.len() - BUGGY_SUFFIX.len()];
                if cutoffs.contains_key(&format!("{base}{NONBUGGY_SUFFIX}")) {
                    continue;
                }
                return Err(MetricsError::MissingBound {
                    metric: name.to_string(),
                    key: buggy_key,
                });
            };
            metrics.insert(name.to_string(), Bounds::new(*nonbuggy, *buggy));
        }

        Ok(Self {
            metrics,
            individual: config.clone(),
        })
    }

    /// Whether the given field name is a recognized metric.
    pub fn recognizes(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Bounds for a recognized metric.
    pub fn bounds(&self, name: &str) -> Option<Bounds> {
        self.metrics.get(name).copied()
    }

    /// Recognized metric names in sorted order.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// Number of recognized metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether no metrics are recognized.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// The configuration the table was built from, unparsed.
    pub fn individual(&self) -> &Map<String, Value> {
        &self.individual
    }

    /// Classify a value for a recognized metric.
    pub fn classify(&self, name: &str, value: f64) -> Option<Classification> {
        let bounds = self.bounds(name)?;
        Some(Classification {
            value,
            position: classify(bounds, value),
        })
    }
}
