use chrono::{NaiveDate, Utc};
use revlens::store::Store;
use tokio_util::sync::CancellationToken;

use super::shared::{CommandResult, build_sync_engine, open_store};
use crate::config::Config;

/// `revlens sync`: cursor-driven by default, or a one-off window with `--since`.
pub(crate) async fn handle_sync(
    light: bool,
    since: Option<NaiveDate>,
    config: &Config,
    database_url: &str,
    cancel: &CancellationToken,
) -> CommandResult {
    let engine = build_sync_engine(config)?;
    let store = open_store(database_url).await?;

    let Some(since) = since else {
        if light {
            let since = Utc::now() - engine.options().initial_lookback;
            return sync_window(&engine, store.as_ref(), since, true, cancel).await;
        }
        let report = engine.sync_incremental(store.as_ref(), cancel).await?;
        for status in &report.statuses {
            println!(
                "{:<10} fetched {:>5}  saved {:>5}  cursor {}",
                status.status,
                status.fetched,
                status.upserted,
                status.cursor.format("%Y-%m-%d %H:%M:%S")
            );
        }
        for (status, error) in &report.failed {
            println!("{status:<10} FAILED: {error}");
        }
        return Ok(());
    };

    let since = since
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or("invalid --since date")?;
    sync_window(&engine, store.as_ref(), since, light, cancel).await
}

/// Fetch everything updated after `since` and save it; cursors are untouched.
async fn sync_window(
    engine: &revlens::SyncEngine,
    store: &dyn Store,
    since: chrono::DateTime<Utc>,
    light: bool,
    cancel: &CancellationToken,
) -> CommandResult {
    let changes = if light {
        engine.sync_since_light(since, cancel).await?
    } else {
        engine.sync_since(since, cancel).await?
    };
    let saved = store.upsert_changes(&changes).await?;
    println!(
        "Fetched {} change(s) since {}, saved {}",
        changes.len(),
        since.format("%Y-%m-%d"),
        saved
    );
    Ok(())
}
