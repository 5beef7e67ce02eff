//! Batch analysis of a whole document.
//!
//! [`BatchRunner`] selects tables, fans analyzer calls out over a bounded
//! number of in-flight requests, synthesizes one suite per analyzed table and
//! folds everything into a [`BatchReport`]. Results keep `(page, table)` order
//! no matter which call finishes first. A failing table is recorded and the
//! batch carries on.

use crate::analysis::{AnalysisError, RegisterAnalysis};
use crate::analyzer::{RegisterAnalyzer, TableInput};
use crate::document::DatasheetDocument;
use crate::engine::synthesize_suite;
use crate::render::Renderer;
use crate::selection::{select_tables, PageRange, PageScope, PageSelection, SelectionError, TableRef};
use crate::test_models::{LogicalTestCase, SourceRef, TestSuite};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Invalid batch configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type BatchResult<T> = Result<T, BatchError>;

/// Backoff for retryable analyzer failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Extra random delay as a fraction of the computed delay (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 200,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Delay before retry number `attempt` (0-based): exponential, capped, plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_delay = Duration::from_millis(self.base_delay_ms);
        let max_delay = Duration::from_millis(self.max_delay_ms);
        let exponential_delay = 2_u32
            .checked_pow(attempt)
            .and_then(|factor| base_delay.checked_mul(factor))
            .unwrap_or(max_delay);

        let delay = exponential_delay.min(max_delay);

        if self.jitter_factor > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter = rng.gen_range(0.0..=self.jitter_factor);
            let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
            delay + Duration::from_millis(jitter_ms)
        } else {
            delay
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("Jitter factor must be between 0.0 and 1.0".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err("Base delay must not exceed max delay".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Analyzer calls allowed in flight at once
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("Worker count must be at least 1".to_string());
        }
        self.retry.validate()
    }
}

/// Shared flag that stops a running batch from issuing new analyzer calls.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIdentity {
    pub filename: String,
    pub title: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Analysis,
    Rendering,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub page: usize,
    pub table: usize,
    pub analysis: RegisterAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub page: usize,
    pub table: usize,
    pub stage: FailureStage,
    pub reason: String,
    /// Analyzer calls made for this table
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedRecord {
    pub page: usize,
    pub table: usize,
    pub renderer: String,
    pub text: String,
}

/// Everything one batch produced, in `(page, table)` order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub document: DocumentIdentity,
    /// True when the whole document was in scope
    pub full_document: bool,
    pub page_range: Option<PageRange>,
    pub explicit_pages: Vec<usize>,
    pub analyzer: String,
    pub pages_processed: usize,
    pub tables_selected: usize,
    pub tables_analyzed: usize,
    pub tables_failed: usize,
    pub tables_skipped: usize,
    /// Suites the renderer could not render
    pub renders_failed: usize,
    pub tests_generated: usize,
    pub cancelled: bool,
    pub analyses: Vec<AnalysisRecord>,
    pub suites: Vec<TestSuite>,
    pub failures: Vec<FailureRecord>,
    pub rendered: Vec<RenderedRecord>,
}

impl BatchReport {
    /// File name used by [`BatchReport::write_json`].
    pub fn file_name(&self) -> String {
        if self.full_document {
            return "report_all.json".to_string();
        }
        match self.page_range {
            Some(range) => format!("report_p{}-{}.json", range.start, range.end),
            None => {
                let pages = self
                    .explicit_pages
                    .iter()
                    .map(|page| page.to_string())
                    .collect::<Vec<_>>()
                    .join("_");
                format!("report_pages_{}.json", pages)
            }
        }
    }

    /// Write the report as pretty JSON into `dir`, creating it if needed.
    pub fn write_json(&self, dir: impl AsRef<Path>) -> BatchResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| BatchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| BatchError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Report written to {}", path.display());
        Ok(path)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} pages processed, {} tables analyzed, {} failed, {} skipped, {} tests generated{}{}",
            self.pages_processed,
            self.tables_analyzed,
            self.tables_failed,
            self.tables_skipped,
            self.tests_generated,
            if self.renders_failed > 0 {
                format!(", {} renders failed", self.renders_failed)
            } else {
                String::new()
            },
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }

    /// All generated cases, suite by suite.
    pub fn test_cases(&self) -> impl Iterator<Item = &LogicalTestCase> {
        self.suites.iter().flat_map(|suite| suite.test_cases.iter())
    }

    pub fn is_partial(&self) -> bool {
        self.cancelled || !self.failures.is_empty()
    }
}

enum TableOutcome {
    Analyzed(RegisterAnalysis),
    Failed { error: AnalysisError, attempts: u32 },
    Skipped,
}

pub struct BatchRunner {
    analyzer: Box<dyn RegisterAnalyzer>,
    config: BatchConfig,
    renderer: Option<Box<dyn Renderer>>,
    cancel: CancelHandle,
}

impl BatchRunner {
    pub fn new(analyzer: impl RegisterAnalyzer + 'static, config: BatchConfig) -> BatchResult<Self> {
        config
            .validate()
            .map_err(|message| BatchError::InvalidConfig { message })?;

        Ok(Self {
            analyzer: Box::new(analyzer),
            config,
            renderer: None,
            cancel: CancelHandle::new(),
        })
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Share an existing handle, e.g. one already wired to a signal handler.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub async fn run(
        &self,
        document: &dyn DatasheetDocument,
        selection: &PageSelection,
    ) -> BatchResult<BatchReport> {
        let selected = select_tables(document, selection)?;
        let metadata = document.metadata();

        info!(
            "Analyzing {} tables from {} with {} analyzer ({} workers)",
            selected.tables.len(),
            metadata.filename,
            self.analyzer.name(),
            self.config.workers
        );

        let outcomes: Vec<TableOutcome> = stream::iter(selected.tables.iter())
            .map(|table| self.process_table(table))
            .buffered(self.config.workers)
            .collect()
            .await;

        let mut report = BatchReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            document: DocumentIdentity {
                filename: metadata.filename.clone(),
                title: metadata.title.clone(),
                page_count: document.page_count(),
            },
            full_document: selection.scope == PageScope::All,
            page_range: selected.range,
            explicit_pages: selected.explicit_pages.clone(),
            analyzer: self.analyzer.name().to_string(),
            pages_processed: 0,
            tables_selected: selected.tables.len(),
            tables_analyzed: 0,
            tables_failed: 0,
            tables_skipped: 0,
            renders_failed: 0,
            tests_generated: 0,
            cancelled: self.cancel.is_cancelled(),
            analyses: Vec::new(),
            suites: Vec::new(),
            failures: Vec::new(),
            rendered: Vec::new(),
        };

        let mut pages_processed = BTreeSet::new();

        for (table, outcome) in selected.tables.iter().zip(outcomes) {
            match outcome {
                TableOutcome::Analyzed(analysis) => {
                    pages_processed.insert(table.page);
                    let source = SourceRef::new(metadata.filename.clone(), table.page);
                    let suite = synthesize_suite(&analysis, &source);
                    debug!(
                        "Page {} table {}: {} cases for {}",
                        table.page,
                        table.table,
                        suite.len(),
                        analysis.register_name()
                    );

                    self.render_into(&mut report, table, &suite);

                    report.tables_analyzed += 1;
                    report.tests_generated += suite.len();
                    report.analyses.push(AnalysisRecord {
                        page: table.page,
                        table: table.table,
                        analysis,
                    });
                    report.suites.push(suite);
                }
                TableOutcome::Failed { error, attempts } => {
                    pages_processed.insert(table.page);
                    warn!(
                        "Page {} table {}: analysis failed after {} attempt(s): {}",
                        table.page, table.table, attempts, error
                    );
                    report.tables_failed += 1;
                    report.failures.push(FailureRecord {
                        page: table.page,
                        table: table.table,
                        stage: FailureStage::Analysis,
                        reason: error.to_string(),
                        attempts,
                    });
                }
                TableOutcome::Skipped => report.tables_skipped += 1,
            }
        }

        report.pages_processed = pages_processed.len();
        info!("Batch {}: {}", report.run_id, report.summary());
        Ok(report)
    }

    fn render_into(&self, report: &mut BatchReport, table: &TableRef, suite: &TestSuite) {
        let Some(renderer) = &self.renderer else {
            return;
        };

        match renderer.render(suite) {
            Ok(text) => report.rendered.push(RenderedRecord {
                page: table.page,
                table: table.table,
                renderer: renderer.name().to_string(),
                text,
            }),
            Err(e) => {
                warn!(
                    "Page {} table {}: {} renderer failed: {}",
                    table.page,
                    table.table,
                    renderer.name(),
                    e
                );
                report.renders_failed += 1;
                report.failures.push(FailureRecord {
                    page: table.page,
                    table: table.table,
                    stage: FailureStage::Rendering,
                    reason: e.to_string(),
                    attempts: 0,
                });
            }
        }
    }

    async fn process_table(&self, table: &TableRef) -> TableOutcome {
        if self.cancel.is_cancelled() {
            debug!("Page {} table {}: skipped after cancel", table.page, table.table);
            return TableOutcome::Skipped;
        }

        let input = TableInput::from(&table.content);
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            match self.analyzer.analyze(&input).await {
                Ok(analysis) => return TableOutcome::Analyzed(analysis),
                Err(error)
                    if error.is_retryable()
                        && attempt < retry.max_retries
                        && !self.cancel.is_cancelled() =>
                {
                    let delay = retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        "Page {} table {}: {} (retry {}/{} in {:?})",
                        table.page, table.table, error, attempt, retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return TableOutcome::Failed {
                        error,
                        attempts: attempt + 1,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_grows_and_caps() {
        let policy = RetryPolicy::default().with_jitter(0.0).with_delays(100, 1000);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_delay_jitter_bounds() {
        let policy = RetryPolicy::default().with_jitter(0.5).with_delays(100, 1000);
        for _ in 0..20 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(BatchConfig::default().validate().is_ok());
        assert!(BatchConfig::default().with_workers(0).validate().is_err());
        assert!(BatchConfig::default()
            .with_retry(RetryPolicy::default().with_jitter(1.5))
            .validate()
            .is_err());
        assert!(RetryPolicy::default().with_delays(500, 100).validate().is_err());
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    fn empty_report() -> BatchReport {
        BatchReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            document: DocumentIdentity::default(),
            full_document: false,
            page_range: Some(PageRange::new(3, 7)),
            explicit_pages: vec![],
            analyzer: "heuristic".to_string(),
            pages_processed: 0,
            tables_selected: 0,
            tables_analyzed: 0,
            tables_failed: 0,
            tables_skipped: 0,
            renders_failed: 0,
            tests_generated: 0,
            cancelled: false,
            analyses: vec![],
            suites: vec![],
            failures: vec![],
            rendered: vec![],
        }
    }

    #[test]
    fn test_report_file_names() {
        let mut report = empty_report();
        assert_eq!(report.file_name(), "report_p3-7.json");

        report.page_range = None;
        report.explicit_pages = vec![2, 9];
        assert_eq!(report.file_name(), "report_pages_2_9.json");

        report.full_document = true;
        assert_eq!(report.file_name(), "report_all.json");
    }

    #[test]
    fn test_summary_marks_cancelled_runs() {
        let mut report = empty_report();
        assert!(!report.summary().contains("cancelled"));
        assert!(!report.is_partial());

        report.cancelled = true;
        assert!(report.summary().ends_with("(cancelled)"));
        assert!(report.is_partial());
    }

    #[test]
    fn test_render_failures_make_report_partial() {
        let mut report = empty_report();
        report.renders_failed = 1;
        report.failures.push(FailureRecord {
            page: 3,
            table: 0,
            stage: FailureStage::Rendering,
            reason: "unsupported".to_string(),
            attempts: 0,
        });

        assert!(report.is_partial());
        assert!(report.summary().ends_with(", 1 renders failed"));
    }
}
