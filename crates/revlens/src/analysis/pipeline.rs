//! Batch analysis of stored changes.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::analyzer::{AnalysisError, Analyzer};
use super::extract::{CategorySource, categorize_by_keywords};
use crate::change::{AnalysisResult, Change};
use crate::store::{Store, StoreError};

/// Default number of changes analyzed per run.
pub const DEFAULT_ANALYSIS_LIMIT: u64 = 20;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("analysis cancelled")]
    Cancelled,

    /// The model server is unreachable; the rest of the batch was skipped.
    #[error("analysis aborted after {analyzed} change(s): {source}")]
    Unavailable {
        analyzed: usize,
        #[source]
        source: AnalysisError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Changes selected for this run.
    pub selected: usize,
    /// Results written, degraded ones included.
    pub analyzed: usize,
    /// Results whose category came from title keywords.
    pub degraded: usize,
}

/// Analyzes unanalyzed changes one at a time and persists each result.
///
/// Generation failures other than an unreachable server degrade to a
/// keyword-only result, so one bad change cannot stall the queue.
#[derive(Clone)]
pub struct AnalysisPipeline {
    analyzer: Analyzer,
    store: Arc<dyn Store>,
}

impl AnalysisPipeline {
    pub fn new(analyzer: Analyzer, store: Arc<dyn Store>) -> Self {
        Self { analyzer, store }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn run(
        &self,
        limit: u64,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport, PipelineError> {
        let pending = self.store.select_unanalyzed(limit).await?;
        let mut report = PipelineReport {
            selected: pending.len(),
            ..PipelineReport::default()
        };
        if pending.is_empty() {
            tracing::debug!("Nothing to analyze");
            return Ok(report);
        }
        tracing::info!(count = pending.len(), "Analyzing changes");

        for change in &pending {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let (result, degraded) = match self.analyzer.analyze_change(change, cancel).await {
                Ok(analysis) => (
                    analysis.result,
                    analysis.source == CategorySource::Keywords,
                ),
                Err(e) if e.is_cancelled() => return Err(PipelineError::Cancelled),
                Err(e) if e.is_unavailable() => {
                    tracing::warn!(
                        error = %e,
                        analyzed = report.analyzed,
                        "Model server unavailable, aborting analysis run"
                    );
                    return Err(PipelineError::Unavailable {
                        analyzed: report.analyzed,
                        source: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        change_number = change.change_number,
                        error = %e,
                        "Analysis failed, storing keyword category"
                    );
                    (keyword_result(change), true)
                }
            };

            self.store.upsert_analysis(&result).await?;
            report.analyzed += 1;
            if degraded {
                report.degraded += 1;
            }
            tracing::debug!(
                change_number = change.change_number,
                category = %result.category,
                degraded,
                "Stored analysis"
            );
        }

        tracing::info!(
            analyzed = report.analyzed,
            degraded = report.degraded,
            "Analysis run complete"
        );
        Ok(report)
    }
}

fn keyword_result(change: &Change) -> AnalysisResult {
    AnalysisResult::empty_for(
        change,
        categorize_by_keywords(&change.subject),
        Utc::now().max(change.updated),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::analysis::analyzer::AnalyzerOptions;
    use crate::analysis::client::{GenerateError, Generator};
    use crate::analysis::testing::ScriptedGenerator;
    use crate::change::fixtures::change;
    use crate::entity::category::Category;
    use crate::entity::change_status::ChangeStatus;
    use crate::http::HttpError;
    use crate::retry::RetryPolicy;
    use crate::store::MemoryStore;

    const MODEL_JSON: &str = r#"{"category": "testing", "summary": "Adds coverage."}"#;

    async fn seeded_store(changes: Vec<Change>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.upsert_changes(&changes).await.expect("seed");
        store
    }

    fn pipeline(generator: ScriptedGenerator, store: &Arc<MemoryStore>) -> AnalysisPipeline {
        let analyzer = Analyzer::new(
            Arc::new(generator) as Arc<dyn Generator>,
            AnalyzerOptions {
                base_timeout: Duration::from_secs(10),
                retry: RetryPolicy::new(1),
            },
        );
        AnalysisPipeline::new(analyzer, Arc::clone(store) as Arc<dyn Store>)
    }

    #[tokio::test]
    async fn analyzes_pending_changes_and_marks_them_done() {
        let store = seeded_store(vec![
            change(1, "main", ChangeStatus::Merged, 0),
            change(2, "main", ChangeStatus::Open, 1),
        ])
        .await;
        let pipeline = pipeline(ScriptedGenerator::answering(MODEL_JSON), &store);
        let cancel = CancellationToken::new();

        let report = pipeline.run(10, &cancel).await.expect("run");
        assert_eq!(
            report,
            PipelineReport {
                selected: 2,
                analyzed: 2,
                degraded: 0
            }
        );

        let stored = store
            .find_analysis("platform/core", 1)
            .await
            .expect("lookup")
            .expect("stored");
        assert_eq!(stored.category, Category::Testing);

        let again = pipeline.run(10, &cancel).await.expect("second run");
        assert_eq!(again.selected, 0);
    }

    #[tokio::test]
    async fn limit_bounds_the_batch() {
        let changes = (1..=5)
            .map(|n| change(n, "main", ChangeStatus::Open, n as u32))
            .collect();
        let store = seeded_store(changes).await;
        let report = pipeline(ScriptedGenerator::answering(MODEL_JSON), &store)
            .run(2, &CancellationToken::new())
            .await
            .expect("run");
        assert_eq!(report.analyzed, 2);
        assert_eq!(store.select_unanalyzed(10).await.expect("select").len(), 3);
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_keywords() {
        let mut c = change(1, "main", ChangeStatus::Merged, 0);
        c.subject = "Fix race condition in scheduler".to_string();
        let store = seeded_store(vec![c]).await;
        let generator = ScriptedGenerator::failing(|| GenerateError::Api {
            status: 500,
            message: "model crashed".into(),
        });

        let report = pipeline(generator, &store)
            .run(10, &CancellationToken::new())
            .await
            .expect("degraded run still succeeds");
        assert_eq!(report.degraded, 1);

        let stored = store
            .find_analysis("platform/core", 1)
            .await
            .expect("lookup")
            .expect("stored");
        assert_eq!(stored.category, Category::Concurrency);
        assert!(stored.summary.is_empty());
    }

    #[tokio::test]
    async fn unavailable_server_aborts_the_run() {
        let store = seeded_store(vec![
            change(1, "main", ChangeStatus::Merged, 0),
            change(2, "main", ChangeStatus::Merged, 1),
            change(3, "main", ChangeStatus::Merged, 2),
        ])
        .await;
        let generator = ScriptedGenerator::answering(MODEL_JSON)
            .then_ok(MODEL_JSON)
            .then_err(|| GenerateError::Unavailable(HttpError::Connect("refused".into())));

        let err = pipeline(generator, &store)
            .run(10, &CancellationToken::new())
            .await
            .expect_err("aborted");
        match err {
            PipelineError::Unavailable { analyzed, .. } => assert_eq!(analyzed, 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.select_unanalyzed(10).await.expect("select").len(), 2);
    }

    #[tokio::test]
    async fn cancelled_run_writes_nothing() {
        let store = seeded_store(vec![change(1, "main", ChangeStatus::Merged, 0)]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline(ScriptedGenerator::answering(MODEL_JSON), &store)
            .run(10, &cancel)
            .await
            .expect_err("cancelled");
        assert!(err.is_cancelled());
        assert_eq!(store.select_unanalyzed(10).await.expect("select").len(), 1);
    }
}
