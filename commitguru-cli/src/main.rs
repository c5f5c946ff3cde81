#![deny(missing_docs)]
//! CommitGuru command-line interface.
//!
//! Folds commit metric streams from JSON files into repository totals and a
//! downsampled quality history.

mod input;

use clap::{Args, Parser, Subcommand, ValueEnum};
use commitguru_core::{
    AnalysisStatus, HISTORY_POINTS, IntervalRule, QualityOrder, RepoAnalysis, SamplerOptions,
    ThresholdTable, analyze, format_history, render_json, render_markdown, sampling_interval,
};
#[cfg(not(test))]
use input::StdInputSource;
use input::{InputSource, load_commits, load_thresholds};
use std::any::Any;
use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "commitguru", version, about = "CommitGuru CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct SamplingArgs {
    /// How the history sampling interval is derived from the commit count.
    #[arg(
        long,
        value_enum,
        env = "COMMITGURU_INTERVAL_RULE",
        default_value_t = RuleArg::Legacy
    )]
    interval_rule: RuleArg,
    /// Storage order of the quality history values.
    #[arg(
        long,
        value_enum,
        env = "COMMITGURU_QUALITY_ORDER",
        default_value_t = OrderArg::Chronological
    )]
    quality_order: OrderArg,
    /// Target number of history points.
    #[arg(long, env = "COMMITGURU_HISTORY_POINTS", default_value_t = HISTORY_POINTS)]
    history_points: usize,
}

impl SamplingArgs {
    fn options(&self) -> SamplerOptions {
        SamplerOptions {
            history_points: self.history_points,
            interval_rule: self.interval_rule.into(),
            quality_order: self.quality_order.into(),
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum RuleArg {
    Legacy,
    Corrected,
}

impl From<RuleArg> for IntervalRule {
    fn from(value: RuleArg) -> Self {
        match value {
            RuleArg::Legacy => IntervalRule::Legacy,
            RuleArg::Corrected => IntervalRule::Corrected,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OrderArg {
    Chronological,
    Reversed,
}

impl From<OrderArg> for QualityOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Chronological => QualityOrder::Chronological,
            OrderArg::Reversed => QualityOrder::Reversed,
        }
    }
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify commit streams and report totals and quality history.
    Analyze {
        /// JSON object of `<metric>nonbuggy` / `<metric>buggy` bounds.
        #[arg(short, long, env = "COMMITGURU_THRESHOLDS")]
        thresholds: PathBuf,
        /// JSON array of commit records, one file per repository.
        #[arg(short, long = "commits", required = true)]
        commits: Vec<PathBuf>,
        /// Declared commit count per stream; defaults to the stream length.
        #[arg(long)]
        expected: Option<usize>,
        /// Maximum number of repositories analyzed at once.
        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: usize,
        #[command(flatten)]
        sampling: SamplingArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Print the history sampling interval for a commit count.
    Interval {
        /// Number of commits in the stream.
        count: usize,
        #[command(flatten)]
        sampling: SamplingArgs,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            thresholds,
            commits,
            expected,
            concurrency,
            sampling,
            report,
        } => {
            let request = AnalyzeRequest {
                thresholds,
                commits,
                expected,
                concurrency,
                options: sampling.options(),
            };
            run_analyze(Arc::new(StdInputSource), request, report).await?
        }
        Commands::Interval { count, sampling } => {
            println!("{}", describe_interval(count, &sampling.options()));
        }
    }

    Ok(())
}

#[cfg(test)]
fn main() {}

struct AnalyzeRequest {
    thresholds: PathBuf,
    commits: Vec<PathBuf>,
    expected: Option<usize>,
    concurrency: usize,
    options: SamplerOptions,
}

async fn run_analyze<S>(
    source: Arc<S>,
    request: AnalyzeRequest,
    report: OutputArgs,
) -> CliResult<()>
where
    S: InputSource + Send + Sync + 'static,
{
    let thresholds = Arc::new(load_thresholds(source.as_ref(), &request.thresholds)?);
    if request.commits.is_empty() {
        println!("No commit streams to analyze.");
        return Ok(());
    }

    let concurrency = if request.concurrency == 0 {
        1
    } else {
        request.concurrency
    };
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();
    let mut outstanding = Vec::with_capacity(request.commits.len());

    for path in request.commits {
        let permit = semaphore.clone().acquire_owned().await?;
        let source = source.clone();
        let thresholds = thresholds.clone();
        let expected = request.expected;
        let options = request.options;
        outstanding.push(path.display().to_string());
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let run = || analyze_stream(source.as_ref(), &path, &thresholds, expected, options);
            panic::catch_unwind(AssertUnwindSafe(run))
                .unwrap_or_else(|payload| report_from_panic(&path, payload))
        });
    }

    let mut reports = Vec::new();
    let mut task_errors = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(report) => {
                if let Some(position) = outstanding.iter().position(|s| *s == report.source) {
                    outstanding.swap_remove(position);
                }
                reports.push(report);
            }
            Err(err) => {
                log::error!("analysis task failed: {err}");
                task_errors.push(err.to_string());
            }
        }
    }
    reports.extend(
        outstanding
            .into_iter()
            .zip(task_errors)
            .map(|(source, error)| RepoAnalysis::failed(source, error)),
    );
    reports.sort_by(|a, b| a.source.cmp(&b.source));

    emit_reports(&reports, &report).await?;

    Ok(())
}

fn analyze_stream<S: InputSource + ?Sized>(
    source: &S,
    path: &Path,
    thresholds: &ThresholdTable,
    expected: Option<usize>,
    options: SamplerOptions,
) -> RepoAnalysis {
    let label = path.display().to_string();
    let commits = match load_commits(source, path) {
        Ok(commits) => commits,
        Err(err) => {
            log::error!("failed to load {label}: {err}");
            return RepoAnalysis::failed(label, err.to_string());
        }
    };

    log::info!("analyzing {} commits from {label}", commits.len());
    let analysis = analyze(thresholds.clone(), commits, expected, options);
    log::info!(
        "{label}: {} classified, {} rejected, {} history points",
        analysis.commits.len(),
        analysis.rejected.len(),
        analysis.snapshot.history.len()
    );
    RepoAnalysis::from_analysis(label, analysis)
}

fn describe_interval(count: usize, options: &SamplerOptions) -> String {
    let interval = sampling_interval(count, options);
    format!("{count} commits: one history point every {interval} commit(s)")
}

fn report_from_panic(path: &Path, payload: Box<dyn Any + Send>) -> RepoAnalysis {
    let label = path.display().to_string();
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    log::error!("analysis of {label} panicked: {message}");
    RepoAnalysis::failed(label, format!("analysis panicked: {message}"))
}

async fn emit_reports(reports: &[RepoAnalysis], output: &OutputArgs) -> CliResult<()> {
    let contents = match output.format {
        OutputFormat::Text => render_text(reports),
        OutputFormat::Markdown => render_markdown(reports),
        OutputFormat::Json => render_json(reports)?,
    };
    emit_output(output, contents).await
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}

fn render_text(reports: &[RepoAnalysis]) -> String {
    let mut output = String::new();
    for report in reports {
        let _ = writeln!(output, "Source: {}", report.source);
        match &report.status {
            AnalysisStatus::Analyzed => {
                let _ = writeln!(output, "Status: analyzed");
            }
            AnalysisStatus::Failed(error) => {
                let _ = writeln!(output, "Status: failed ({error})");
                let _ = writeln!(output);
                continue;
            }
            AnalysisStatus::Pending => {
                let _ = writeln!(output, "Status: pending");
                let _ = writeln!(output);
                continue;
            }
        }

        if let Some(interval) = report.sampling_interval {
            let _ = writeln!(output, "Sampling interval: {interval}");
        }

        match &report.metrics {
            Some(metrics) => {
                let overall = &metrics.overall;
                let _ = writeln!(
                    output,
                    "Overall: {} above, {} between, {} below ({}% quality)",
                    overall.above,
                    overall.between,
                    overall.below,
                    overall.quality_score()
                );
                if metrics.history.is_empty() {
                    let _ = writeln!(output, "History: none");
                } else {
                    let _ = writeln!(output, "History:");
                    for (id, quality) in format_history(&metrics.history) {
                        let _ = writeln!(output, "- commit {id}: {quality:.1}%");
                    }
                }
            }
            None => {
                let _ = writeln!(output, "Metrics: unavailable");
            }
        }

        if !report.rejected.is_empty() {
            let _ = writeln!(output, "Rejected commits:");
            for rejected in &report.rejected {
                let _ = writeln!(output, "- {rejected}");
            }
        }

        let _ = writeln!(output);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{
        AnalyzeRequest, Cli, Commands, OrderArg, OutputArgs, OutputFormat, RuleArg, SamplingArgs,
        analyze_stream, describe_interval, emit_reports, render_text, report_from_panic,
        run_analyze,
    };
    use crate::CliResult;
    use crate::input::{InputSource, MockInputSource};
    use clap::Parser;
    use commitguru_core::{
        AnalysisStatus, IntervalRule, QualityOrder, RepoAnalysis, SamplerOptions, ThresholdTable,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    const THRESHOLDS: &str = r#"{"lanonbuggy": 2, "labuggy": 8}"#;
    const COMMITS: &str = r#"[{"commit_hash": "a", "la": 1}, {"commit_hash": "b", "la": 5}, {"commit_hash": "c", "la": 9}]"#;

    fn sampling(rule: RuleArg, order: OrderArg) -> SamplingArgs {
        SamplingArgs {
            interval_rule: rule,
            quality_order: order,
            history_points: 15,
        }
    }

    fn mock_source() -> MockInputSource {
        let mut source = MockInputSource::new();
        source
            .expect_read_to_string()
            .withf(|path| path == Path::new("thresholds.json"))
            .returning(|_| Ok(THRESHOLDS.to_string()));
        source
            .expect_read_to_string()
            .withf(|path| path == Path::new("repo.json"))
            .returning(|_| Ok(COMMITS.to_string()));
        source
            .expect_read_to_string()
            .withf(|path| path == Path::new("missing.json"))
            .returning(|_| Err("missing.json not found".into()));
        source
    }

    static UNIQUE_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn unique_dir_name() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = UNIQUE_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        PathBuf::from(format!("commitguru_cli_test_{nanos}_{counter}"))
    }

    #[test]
    fn sampling_args_map_to_core_options() {
        let options = sampling(RuleArg::Corrected, OrderArg::Reversed).options();
        assert_eq!(
            options,
            SamplerOptions {
                history_points: 15,
                interval_rule: IntervalRule::Corrected,
                quality_order: QualityOrder::Reversed,
            }
        );
    }

    #[test]
    fn parses_analyze_command() {
        let cli = Cli::try_parse_from([
            "commitguru",
            "analyze",
            "--thresholds",
            "thresholds.json",
            "--commits",
            "a.json",
            "--commits",
            "b.json",
            "--interval-rule",
            "corrected",
            "--format",
            "json",
        ])
        .expect("parse");

        match cli.command {
            Commands::Analyze {
                commits,
                sampling,
                report,
                expected,
                ..
            } => {
                assert_eq!(commits.len(), 2);
                assert_eq!(sampling.interval_rule, RuleArg::Corrected);
                assert_eq!(sampling.quality_order, OrderArg::Chronological);
                assert_eq!(report.format, OutputFormat::Json);
                assert_eq!(expected, None);
            }
            Commands::Interval { .. } => panic!("expected analyze command"),
        }
    }

    #[test]
    fn describes_interval_for_count() {
        let legacy = sampling(RuleArg::Legacy, OrderArg::Chronological).options();
        assert_eq!(
            describe_interval(100, &legacy),
            "100 commits: one history point every 7 commit(s)"
        );
        assert_eq!(
            describe_interval(5, &legacy),
            "5 commits: one history point every 1 commit(s)"
        );
    }

    #[test]
    fn analyze_stream_builds_report() {
        let source = mock_source();
        let thresholds = ThresholdTable::new().with_metric("la", 2.0, 8.0);

        let report = analyze_stream(
            &source,
            Path::new("repo.json"),
            &thresholds,
            None,
            SamplerOptions::default(),
        );

        assert_eq!(report.status, AnalysisStatus::Analyzed);
        assert_eq!(report.sampling_interval, Some(1));
        let metrics = report.metrics.expect("metrics");
        assert_eq!(metrics.overall.above, 1);
        assert_eq!(metrics.overall.between, 1);
        assert_eq!(metrics.overall.below, 1);
        assert_eq!(metrics.history.ids(), &[0, 1, 2]);
    }

    #[test]
    fn analyze_stream_reports_load_failures() {
        let source = mock_source();
        let thresholds = ThresholdTable::new();

        let report = analyze_stream(
            &source,
            Path::new("missing.json"),
            &thresholds,
            None,
            SamplerOptions::default(),
        );

        assert_eq!(
            report.status,
            AnalysisStatus::Failed("missing.json not found".to_string())
        );
        assert!(report.metrics.is_none());
    }

    #[test]
    fn render_text_covers_branches() {
        let source = mock_source();
        let thresholds = ThresholdTable::new().with_metric("la", 2.0, 8.0);
        let analyzed = analyze_stream(
            &source,
            Path::new("repo.json"),
            &thresholds,
            None,
            SamplerOptions::default(),
        );
        let mut rejected = analyzed.clone();
        rejected.source = "rejected.json".to_string();
        rejected.rejected = vec!["commit 4: metric `la` is not numeric: null".to_string()];
        let failed = RepoAnalysis::failed("missing.json".to_string(), "oops");
        let pending = RepoAnalysis::new("pending.json".to_string());

        let output = render_text(&[analyzed, rejected, failed, pending]);

        assert!(output.contains("Source: repo.json"));
        assert!(output.contains("Sampling interval: 1"));
        assert!(output.contains("Overall: 1 above, 1 between, 1 below (33% quality)"));
        assert!(output.contains("- commit 0: 100.0%"));
        assert!(output.contains("- commit 2: 0.0%"));
        assert!(output.contains("Rejected commits:"));
        assert!(output.contains("Status: failed (oops)"));
        assert!(output.contains("Status: pending"));
    }

    #[tokio::test]
    async fn emit_reports_support_formats() {
        let root = std::env::temp_dir().join(unique_dir_name());
        let report = RepoAnalysis::new("repo.json".to_string());

        let markdown_path = root.join("out/report.md");
        let output = OutputArgs {
            format: OutputFormat::Markdown,
            report_output: Some(markdown_path.clone()),
        };
        emit_reports(&[report.clone()], &output)
            .await
            .expect("emit markdown");
        let contents = std::fs::read_to_string(&markdown_path).expect("read markdown");
        assert!(contents.contains("# CommitGuru Metrics Report"));

        let json_path = root.join("out/report.json");
        let output = OutputArgs {
            format: OutputFormat::Json,
            report_output: Some(json_path.clone()),
        };
        emit_reports(&[report.clone()], &output)
            .await
            .expect("emit json");
        let contents = std::fs::read_to_string(&json_path).expect("read json");
        assert!(contents.contains("\"samplingInterval\""));

        let output = OutputArgs {
            format: OutputFormat::Text,
            report_output: None,
        };
        emit_reports(&[report], &output).await.expect("emit text");

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn run_analyze_writes_reports_for_every_stream() {
        let root = std::env::temp_dir().join(unique_dir_name());
        let report_path = root.join("report.json");
        let request = AnalyzeRequest {
            thresholds: PathBuf::from("thresholds.json"),
            commits: vec![PathBuf::from("repo.json"), PathBuf::from("missing.json")],
            expected: None,
            concurrency: 0,
            options: SamplerOptions::default(),
        };
        let output = OutputArgs {
            format: OutputFormat::Json,
            report_output: Some(report_path.clone()),
        };

        run_analyze(Arc::new(mock_source()), request, output)
            .await
            .expect("run analyze");

        let contents = std::fs::read_to_string(&report_path).expect("read report");
        let parsed: serde_json::Value = serde_json::from_str(&contents).expect("parse");
        assert_eq!(parsed[0]["source"], "missing.json");
        assert_eq!(parsed[0]["status"]["status"], "failed");
        assert_eq!(parsed[1]["source"], "repo.json");
        assert_eq!(parsed[1]["metrics"]["overall"]["below"], 1);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    struct PanickingSource;

    impl InputSource for PanickingSource {
        fn read_to_string(&self, path: &Path) -> CliResult<String> {
            if path == Path::new("thresholds.json") {
                return Ok(THRESHOLDS.to_string());
            }
            panic!("corrupt stream");
        }
    }

    #[tokio::test]
    async fn run_analyze_names_the_stream_whose_task_panicked() {
        let root = std::env::temp_dir().join(unique_dir_name());
        let report_path = root.join("report.json");
        let request = AnalyzeRequest {
            thresholds: PathBuf::from("thresholds.json"),
            commits: vec![PathBuf::from("corrupt.json")],
            expected: None,
            concurrency: 1,
            options: SamplerOptions::default(),
        };
        let output = OutputArgs {
            format: OutputFormat::Json,
            report_output: Some(report_path.clone()),
        };

        run_analyze(Arc::new(PanickingSource), request, output)
            .await
            .expect("run analyze");

        let contents = std::fs::read_to_string(&report_path).expect("read report");
        let parsed: serde_json::Value = serde_json::from_str(&contents).expect("parse");
        assert_eq!(parsed[0]["source"], "corrupt.json");
        assert_eq!(parsed[0]["status"]["status"], "failed");
        assert_eq!(
            parsed[0]["status"]["message"],
            "analysis panicked: corrupt stream"
        );

        std::fs::remove_dir_all(&root).expect("cleanup temp dir");
    }

    #[test]
    fn panic_reports_keep_owned_messages() {
        let report = report_from_panic(
            Path::new("repo.json"),
            Box::new(String::from("index out of bounds")),
        );
        assert_eq!(report.source, "repo.json");
        assert_eq!(
            report.status,
            AnalysisStatus::Failed("analysis panicked: index out of bounds".to_string())
        );
    }

    #[tokio::test]
    async fn run_analyze_fails_on_bad_thresholds() {
        let mut source = MockInputSource::new();
        source
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"lanonbuggy": 2}"#.to_string()));
        let request = AnalyzeRequest {
            thresholds: PathBuf::from("thresholds.json"),
            commits: vec![PathBuf::from("repo.json")],
            expected: None,
            concurrency: 1,
            options: SamplerOptions::default(),
        };
        let output = OutputArgs {
            format: OutputFormat::Text,
            report_output: None,
        };

        let error = run_analyze(Arc::new(source), request, output)
            .await
            .expect_err("missing bound");
        assert!(error.to_string().contains("labuggy"));
    }
}
