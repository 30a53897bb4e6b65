//! Scheduler tasks wrapping the sync engine and the analysis pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::analysis::AnalysisPipeline;
use crate::scheduler::{ScheduledTask, TaskError};
use crate::store::Store;
use crate::sync::SyncEngine;

/// Incremental sync of every configured status into a store.
pub struct SyncJob {
    engine: Arc<SyncEngine>,
    store: Arc<dyn Store>,
}

impl SyncJob {
    pub fn new(engine: Arc<SyncEngine>, store: Arc<dyn Store>) -> Self {
        Self { engine, store }
    }
}

#[async_trait]
impl ScheduledTask for SyncJob {
    fn name(&self) -> &str {
        "sync"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), TaskError> {
        match self
            .engine
            .sync_incremental(self.store.as_ref(), &cancel)
            .await
        {
            Ok(report) => {
                if report.is_partial() {
                    tracing::warn!(
                        failed = report.failed.len(),
                        "Sync finished with failed statuses"
                    );
                }
                Ok(())
            }
            Err(e) if e.is_cancelled() => Err(TaskError::Cancelled),
            Err(e) => Err(TaskError::failed(e)),
        }
    }
}

/// One bounded analysis run.
pub struct AnalysisJob {
    pipeline: AnalysisPipeline,
    limit: u64,
}

impl AnalysisJob {
    pub fn new(pipeline: AnalysisPipeline, limit: u64) -> Self {
        Self { pipeline, limit }
    }
}

#[async_trait]
impl ScheduledTask for AnalysisJob {
    fn name(&self) -> &str {
        "analysis"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), TaskError> {
        match self.pipeline.run(self.limit, &cancel).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_cancelled() => Err(TaskError::Cancelled),
            Err(e) => Err(TaskError::failed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::analysis::testing::ScriptedGenerator;
    use crate::analysis::{Analyzer, AnalyzerOptions, GenerateError, Generator};
    use crate::change::fixtures::change;
    use crate::entity::change_status::ChangeStatus;
    use crate::gerrit::GerritError;
    use crate::http::HttpError;
    use crate::retry::RetryPolicy;
    use crate::store::MemoryStore;
    use crate::sync::SyncOptions;
    use crate::sync::testing::ScriptedSource;

    fn sync_job(source: ScriptedSource, store: &Arc<MemoryStore>) -> SyncJob {
        let options = SyncOptions {
            project: "platform/core".into(),
            statuses: vec![ChangeStatus::Open],
            ..SyncOptions::default()
        };
        let engine = SyncEngine::new(Arc::new(source), None, options);
        SyncJob::new(Arc::new(engine), Arc::clone(store) as Arc<dyn Store>)
    }

    fn analysis_job(generator: ScriptedGenerator, store: &Arc<MemoryStore>) -> AnalysisJob {
        let analyzer = Analyzer::new(
            Arc::new(generator) as Arc<dyn Generator>,
            AnalyzerOptions {
                base_timeout: Duration::from_secs(5),
                retry: RetryPolicy::new(1),
            },
        );
        AnalysisJob::new(
            AnalysisPipeline::new(analyzer, Arc::clone(store) as Arc<dyn Store>),
            10,
        )
    }

    #[tokio::test]
    async fn sync_job_fills_the_store() {
        let store = Arc::new(MemoryStore::new());
        let source = ScriptedSource::new().with_items(
            ChangeStatus::Open,
            vec![change(1, "main", ChangeStatus::Open, 0)],
        );

        sync_job(source, &store)
            .run(CancellationToken::new())
            .await
            .expect("sync");
        assert_eq!(store.change_count(), 1);
    }

    #[tokio::test]
    async fn sync_job_reports_failure_and_cancellation() {
        let store = Arc::new(MemoryStore::new());
        let source = ScriptedSource::new().failing(ChangeStatus::Open, || {
            GerritError::Http(HttpError::Connect("refused".into()))
        });
        let job = sync_job(source, &store);

        let err = job.run(CancellationToken::new()).await.expect_err("down");
        assert!(matches!(err, TaskError::Failed(_)));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = job.run(cancel).await.expect_err("cancelled");
        assert!(matches!(err, TaskError::Cancelled));
    }

    #[tokio::test]
    async fn analysis_job_runs_the_pipeline() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_changes(&[change(1, "main", ChangeStatus::Merged, 0)])
            .await
            .expect("seed");

        analysis_job(
            ScriptedGenerator::answering(r#"{"category": "tooling"}"#),
            &store,
        )
        .run(CancellationToken::new())
        .await
        .expect("analysis");
        assert!(
            store
                .find_analysis("platform/core", 1)
                .await
                .expect("lookup")
                .is_some()
        );
    }

    #[tokio::test]
    async fn analysis_job_fails_when_model_is_unreachable() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_changes(&[change(1, "main", ChangeStatus::Merged, 0)])
            .await
            .expect("seed");

        let err = analysis_job(
            ScriptedGenerator::failing(|| {
                GenerateError::Unavailable(HttpError::Connect("refused".into()))
            }),
            &store,
        )
        .run(CancellationToken::new())
        .await
        .expect_err("unavailable");
        assert!(matches!(err, TaskError::Failed(_)));
    }
}
