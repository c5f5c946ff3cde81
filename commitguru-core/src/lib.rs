#![deny(missing_docs)]
//! CommitGuru core library.
//!
//! Classifies per-commit software-quality metrics against configured bounds,
//! keeps repository-wide totals, and downsamples a quality history for
//! charting. Everything here is in-memory; loading commits and serving results
//! belong to the callers.

pub mod aggregator;
pub mod domain;
pub mod error;
pub mod history;
pub mod report;
pub mod threshold;

pub use aggregator::{Analysis, MetricsSnapshot, RejectedCommit, RepositoryMetrics, analyze};
pub use domain::{ClassifiedCommit, Commit, MetricSummary, parse_numeric};
pub use error::{MetricsError, Result};
pub use history::{
    HISTORY_POINTS, HistorySampler, HistorySeries, HistoryValues, IntervalRule, QualityOrder,
    SamplerOptions, sampling_interval,
};
pub use report::{AnalysisStatus, RepoAnalysis, format_history, render_json, render_markdown};
pub use threshold::{Bounds, Classification, Position, ThresholdTable, classify};
