//! Repository-wide commit aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::domain::{ClassifiedCommit, Commit, MetricSummary, parse_numeric};
use crate::error::{MetricsError, Result};
use crate::history::{HistorySampler, HistorySeries, SamplerOptions};
use crate::threshold::{Classification, ThresholdTable, classify};

/// Read-only view of a repository's metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricsSnapshot {
    /// The threshold configuration exactly as it was supplied.
    #[schema(value_type = Object)]
    pub individual: Map<String, Value>,
    /// Running totals across every processed commit.
    pub overall: MetricSummary,
    /// Downsampled quality history.
    pub history: HistorySeries,
}

/// Accumulates classified commits for one repository analysis.
///
/// Commits must be fed one at a time, in the order the history should be
/// charted. The aggregator is single-owner; analyses of different
/// repositories each use their own instance.
#[derive(Debug, Clone)]
pub struct RepositoryMetrics {
    thresholds: ThresholdTable,
    overall: MetricSummary,
    sampler: HistorySampler,
}

impl RepositoryMetrics {
    /// Create an aggregator for a stream of `expected_commits` commits.
    pub fn new(thresholds: ThresholdTable, expected_commits: usize) -> Self {
        Self::with_options(thresholds, expected_commits, SamplerOptions::default())
    }

    /// Create an aggregator with custom history sampling.
    pub fn with_options(
        thresholds: ThresholdTable,
        expected_commits: usize,
        options: SamplerOptions,
    ) -> Self {
        Self {
            thresholds,
            overall: MetricSummary::default(),
            sampler: HistorySampler::new(expected_commits, &options),
        }
    }

    /// Classify every recognized metric on a commit without touching state.
    pub fn classify_commit(&self, commit: Commit) -> Result<ClassifiedCommit> {
        let mut fields = Commit::new();
        let mut metrics = BTreeMap::new();
        let mut summary = MetricSummary::default();

        for (name, value) in commit {
            let Some(bounds) = self.thresholds.bounds(&name) else {
                fields.insert(name, value);
                continue;
            };
            let number = parse_numeric(&value).ok_or_else(|| MetricsError::NotNumeric {
                metric: name.clone(),
                value: value.to_string(),
            })?;
            let position = classify(bounds, number);
            summary.record(position);
            metrics.insert(
                name,
                Classification {
                    value: number,
                    position,
                },
            );
        }

        Ok(ClassifiedCommit {
            fields,
            metrics,
            metric_summary: summary,
        })
    }

    /// Classify a commit and fold it into the repository totals.
    ///
    /// A commit with a non-numeric metric is rejected whole and leaves the
    /// aggregator unchanged.
    pub fn process_commit(&mut self, commit: Commit) -> Result<ClassifiedCommit> {
        let classified = self.classify_commit(commit)?;
        self.fold_summary(&classified.metric_summary);
        Ok(classified)
    }

    /// Add one commit's summary to the totals and record its quality score.
    pub fn fold_summary(&mut self, summary: &MetricSummary) {
        self.overall.add(summary);
        self.sampler.record(summary.quality_score());
    }

    /// Hold the history slot of a commit that was rejected.
    ///
    /// Totals are unchanged; later history labels keep pointing at the
    /// caller's commit indices.
    pub fn skip_commit(&mut self) {
        self.sampler.skip();
    }

    /// Current state, usable mid-stream.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            individual: self.thresholds.individual().clone(),
            overall: self.overall,
            history: self.sampler.series().clone(),
        }
    }

    /// Close the stream: flush the trailing window and return the final state.
    pub fn finalize(mut self) -> MetricsSnapshot {
        let processed = self.sampler.processed();
        let expected = self.sampler.expected();
        if processed != expected {
            log::warn!("processed {processed} commits but {expected} were expected");
        }
        self.sampler.finish();
        self.snapshot()
    }

    /// The threshold table in use.
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Running totals.
    pub fn overall(&self) -> MetricSummary {
        self.overall
    }

    /// Commits folded so far.
    pub fn processed(&self) -> usize {
        self.sampler.processed()
    }

    /// Commit count declared at construction.
    pub fn expected_commits(&self) -> usize {
        self.sampler.expected()
    }

    /// Commits per history point.
    pub fn sampling_interval(&self) -> usize {
        self.sampler.interval()
    }
}

/// A commit that could not be classified.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCommit {
    /// Position of the commit in the input stream.
    pub index: usize,
    /// Why it was rejected.
    pub error: MetricsError,
}

/// Result of folding a whole commit stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Classified commits in input order.
    pub commits: Vec<ClassifiedCommit>,
    /// Commits skipped because they could not be classified.
    pub rejected: Vec<RejectedCommit>,
    /// Commits per history point used for this stream.
    pub sampling_interval: usize,
    /// Final state after [`RepositoryMetrics::finalize`].
    pub snapshot: MetricsSnapshot,
}

/// Fold a complete commit stream through a fresh aggregator.
///
/// `expected_commits` defaults to the stream length. Rejected commits are
/// reported and do not stop the fold.
pub fn analyze(
    thresholds: ThresholdTable,
    commits: Vec<Commit>,
    expected_commits: Option<usize>,
    options: SamplerOptions,
) -> Analysis {
    let expected = expected_commits.unwrap_or(commits.len());
    let mut metrics = RepositoryMetrics::with_options(thresholds, expected, options);
    let mut classified = Vec::with_capacity(commits.len());
    let mut rejected = Vec::new();

    for (index, commit) in commits.into_iter().enumerate() {
        match metrics.process_commit(commit) {
            Ok(commit) => classified.push(commit),
            Err(error) => {
                log::warn!("skipping commit {index}: {error}");
                metrics.skip_commit();
                rejected.push(RejectedCommit { index, error });
            }
        }
    }

    Analysis {
        commits: classified,
        rejected,
        sampling_interval: metrics.sampling_interval(),
        snapshot: metrics.finalize(),
    }
}
