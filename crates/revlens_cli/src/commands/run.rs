use std::sync::Arc;

use revlens::jobs::{AnalysisJob, SyncJob};
use revlens::scheduler::{CronScheduler, IntervalScheduler, ScheduledTask};
use revlens::store::Store;
use tokio_util::sync::CancellationToken;

use super::shared::{CommandResult, build_pipeline, build_sync_engine, open_store};
use crate::config::Config;

/// `revlens run`: interval sync plus cron analysis until shutdown.
pub(crate) async fn handle_run(
    config: &Config,
    database_url: &str,
    shutdown: &CancellationToken,
) -> CommandResult {
    let options = config.scheduler_options()?;
    let store: Arc<dyn Store> = open_store(database_url).await?;

    let sync_job: Arc<dyn ScheduledTask> = Arc::new(SyncJob::new(
        Arc::new(build_sync_engine(config)?),
        Arc::clone(&store),
    ));
    let analysis_job: Arc<dyn ScheduledTask> = Arc::new(AnalysisJob::new(
        build_pipeline(config, Arc::clone(&store))?,
        config.schedule.analysis_limit,
    ));

    // Both schedules are validated before anything starts.
    let sync = IntervalScheduler::new(sync_job, options.sync_interval, options.enabled)?;
    let analysis = CronScheduler::new(analysis_job, &options.analysis_cron)?;

    if !options.enabled {
        println!("Scheduling is disabled (schedule.enabled = false); nothing to run.");
        return Ok(());
    }

    sync.start().await;
    analysis.start().await?;
    tracing::info!(
        sync_every_secs = sync.period().as_secs(),
        analysis_cron = analysis.expression(),
        "Running until Ctrl+C"
    );

    shutdown.cancelled().await;

    tracing::info!("Stopping schedulers");
    sync.stop().await;
    analysis.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
