//! Report formatting utilities for CommitGuru outputs.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::aggregator::{Analysis, MetricsSnapshot};
use crate::history::HistorySeries;

/// Outcome of analyzing one repository's commit stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Analysis has not started.
    Pending,
    /// The commit stream was folded.
    Analyzed,
    /// Loading or analysis failed with an error message.
    Failed(String),
}

/// Metrics report for a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoAnalysis {
    /// Where the commit stream came from.
    pub source: String,
    /// Analysis status.
    pub status: AnalysisStatus,
    /// Commits per history point.
    pub sampling_interval: Option<usize>,
    /// Final metrics, when analysis succeeded.
    pub metrics: Option<MetricsSnapshot>,
    /// Commits that were skipped, one message each.
    pub rejected: Vec<String>,
}

impl RepoAnalysis {
    /// Create a pending report.
    pub fn new(source: String) -> Self {
        Self {
            source,
            status: AnalysisStatus::Pending,
            sampling_interval: None,
            metrics: None,
            rejected: Vec::new(),
        }
    }

    /// Create a report for a repository that could not be analyzed.
    pub fn failed(source: String, error: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Failed(error.into()),
            ..Self::new(source)
        }
    }

    /// Create a report from a completed analysis.
    pub fn from_analysis(source: String, analysis: Analysis) -> Self {
        let rejected = analysis
            .rejected
            .iter()
            .map(|commit| format!("commit {}: {}", commit.index, commit.error))
            .collect();
        Self {
            source,
            status: AnalysisStatus::Analyzed,
            sampling_interval: Some(analysis.sampling_interval),
            metrics: Some(analysis.snapshot),
            rejected,
        }
    }
}

/// Render a list of repository reports as Markdown.
pub fn render_markdown(reports: &[RepoAnalysis]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# CommitGuru Metrics Report\n");
    for report in reports {
        let _ = writeln!(output, "## {}\n", report.source);
        append_status(&mut output, &report.status);
        if let Some(metrics) = &report.metrics {
            append_overall(&mut output, metrics);
            append_thresholds(&mut output, metrics);
            append_history(&mut output, &metrics.history, report.sampling_interval);
        }
        append_list(
            &mut output,
            "Rejected commits",
            &report.rejected,
            "No commits rejected.",
        );
        let _ = writeln!(output);
    }
    output
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// Pair each history label with its quality value, oldest first.
pub fn format_history(history: &HistorySeries) -> Vec<(u64, f64)> {
    history
        .ids()
        .iter()
        .copied()
        .zip(history.chronological_quality())
        .collect()
}

fn append_status(output: &mut String, status: &AnalysisStatus) {
    match status {
        AnalysisStatus::Analyzed => {
            let _ = writeln!(output, "- Status: analyzed");
        }
        AnalysisStatus::Pending => {
            let _ = writeln!(output, "- Status: pending");
        }
        AnalysisStatus::Failed(error) => {
            let _ = writeln!(output, "- Status: failed ({error})");
        }
    }
    let _ = writeln!(output);
}

fn append_overall(output: &mut String, metrics: &MetricsSnapshot) {
    let overall = &metrics.overall;
    let _ = writeln!(output, "### Overall");
    let _ = writeln!(output, "- Above: {}", overall.above);
    let _ = writeln!(output, "- Between: {}", overall.between);
    let _ = writeln!(output, "- Below: {}", overall.below);
    let _ = writeln!(output, "- Quality: {}%", overall.quality_score());
    let _ = writeln!(output);
}

fn append_thresholds(output: &mut String, metrics: &MetricsSnapshot) {
    if metrics.individual.is_empty() {
        let _ = writeln!(output, "### Thresholds\nNo thresholds configured.\n");
        return;
    }
    let _ = writeln!(output, "### Thresholds");
    for (key, bound) in &metrics.individual {
        let _ = writeln!(output, "- {key}: {bound}");
    }
    let _ = writeln!(output);
}

fn append_history(output: &mut String, history: &HistorySeries, interval: Option<usize>) {
    let _ = writeln!(output, "### Quality history");
    if let Some(interval) = interval {
        let _ = writeln!(output, "Sampled every {interval} commit(s).\n");
    }
    if history.is_empty() {
        let _ = writeln!(output, "No history recorded.\n");
        return;
    }
    let _ = writeln!(output, "| Commit | Quality |");
    let _ = writeln!(output, "| --- | --- |");
    for (id, quality) in format_history(history) {
        let _ = writeln!(output, "| {id} | {quality:.1}% |");
    }
    let _ = writeln!(output);
}

fn append_list(output: &mut String, title: &str, items: &[String], empty_message: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "### {title}\n{empty_message}\n");
        return;
    }
    let _ = writeln!(output, "### {title}");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
    let _ = writeln!(output);
}
