use std::sync::Arc;

use revlens::store::Store;
use tokio_util::sync::CancellationToken;

use super::shared::{CommandResult, build_generative_client, build_pipeline, open_store};
use crate::config::Config;

/// `revlens analyze`: one bounded pipeline run.
pub(crate) async fn handle_analyze(
    limit: Option<u64>,
    config: &Config,
    database_url: &str,
    cancel: &CancellationToken,
) -> CommandResult {
    let store = open_store(database_url).await?;
    let pipeline = build_pipeline(config, store as Arc<dyn Store>)?;
    let limit = limit.unwrap_or(config.schedule.analysis_limit);

    let report = pipeline.run(limit, cancel).await?;
    println!(
        "Analyzed {} of {} selected change(s) ({} by keyword fallback)",
        report.analyzed, report.selected, report.degraded
    );
    Ok(())
}

/// `revlens check-model`: verify the model server and the configured model.
pub(crate) async fn handle_check_model(config: &Config, cancel: &CancellationToken) -> CommandResult {
    let client = build_generative_client(config)?;
    let installed = client.check_model(cancel).await?;
    println!(
        "Model {} is available at {} ({} model(s) installed)",
        client.model(),
        client.base_url(),
        installed.len()
    );
    Ok(())
}
