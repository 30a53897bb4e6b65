//! Construction helpers shared by the command handlers.

use std::sync::Arc;

use revlens::analysis::{AnalysisPipeline, Analyzer, GenerativeClient, Generator};
use revlens::store::{DbStore, Store};
use revlens::sync::SyncEngine;
use revlens::{GerritClient, GitilesClient, connect_and_migrate};

use crate::config::Config;
use crate::progress::LoggingReporter;

pub(crate) type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the database, creating the schema if needed.
pub(crate) async fn open_store(
    database_url: &str,
) -> Result<Arc<DbStore>, Box<dyn std::error::Error>> {
    let db = connect_and_migrate(database_url).await?;
    Ok(Arc::new(DbStore::new(db)))
}

pub(crate) fn build_sync_engine(config: &Config) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let options = config.sync_options()?;
    let client = GerritClient::new(config.gerrit_url()?, config.gerrit_credentials())?;
    tracing::debug!(
        url = client.base_url(),
        authenticated = client.is_authenticated(),
        project = %options.project,
        "Review server client ready"
    );
    Ok(
        SyncEngine::new(Arc::new(client), Some(config.gerrit_rate_limiter()), options)
            .with_progress(LoggingReporter::new().into_callback()),
    )
}

pub(crate) fn build_generative_client(
    config: &Config,
) -> Result<GenerativeClient, Box<dyn std::error::Error>> {
    Ok(GenerativeClient::new(&config.model.url, &config.model.name)?)
}

pub(crate) fn build_analyzer(config: &Config) -> Result<Analyzer, Box<dyn std::error::Error>> {
    let client = build_generative_client(config)?;
    Ok(Analyzer::new(
        Arc::new(client) as Arc<dyn Generator>,
        config.analyzer_options()?,
    ))
}

pub(crate) fn build_pipeline(
    config: &Config,
    store: Arc<dyn Store>,
) -> Result<AnalysisPipeline, Box<dyn std::error::Error>> {
    Ok(AnalysisPipeline::new(build_analyzer(config)?, store))
}

pub(crate) fn build_gitiles_client(
    config: &Config,
) -> Result<GitilesClient, Box<dyn std::error::Error>> {
    Ok(GitilesClient::new(
        config.gitiles_url()?,
        Some(config.gitiles_rate_limiter()),
    )?)
}
