use revlens::gitiles::GitilesClient;
use revlens::store::Store;
use revlens::{Change, ChangeStatus};
use tokio_util::sync::CancellationToken;

use super::shared::{CommandResult, build_analyzer, build_gitiles_client, open_store};
use crate::config::Config;

/// Commits searched on the target branch when locating a submitted change.
const SUBMITTED_SEARCH_DEPTH: u32 = 100;

/// `revlens explain <number>`: on-demand summaries of one stored change.
pub(crate) async fn handle_explain(
    number: i64,
    with_diff: bool,
    config: &Config,
    database_url: &str,
    cancel: &CancellationToken,
) -> CommandResult {
    let store = open_store(database_url).await?;
    let project = config.gerrit.project.trim();
    let change = store.find_change(project, number).await?.ok_or_else(|| {
        format!("change {number} is not in the local store; run `revlens sync` first")
    })?;
    let analyzer = build_analyzer(config)?;

    println!(
        "{} {} [{}] {}",
        change.change_number, change.branch, change.status, change.subject
    );
    println!();
    println!("What it does:");
    println!("{}", analyzer.summarize_description(&change, cancel).await?);
    println!();
    println!("Review discussion:");
    println!("{}", analyzer.summarize_comments(&change, cancel).await?);

    match change.status {
        ChangeStatus::Merged => {
            println!();
            println!("Why it was merged:");
            println!("{}", analyzer.analyze_merge_reason(&change, cancel).await?);
        }
        ChangeStatus::Abandoned => {
            println!();
            println!("Why it was abandoned:");
            println!("{}", analyzer.analyze_close_reason(&change, cancel).await?);
        }
        ChangeStatus::Open => {}
    }

    if with_diff {
        let gitiles = build_gitiles_client(config)?;
        let diff = fetch_diff(&gitiles, &change, cancel).await?;
        println!();
        println!("Diff:");
        println!(
            "{}",
            analyzer.summarize_diff(&change.subject, &diff, cancel).await?
        );
    }

    if let Some(analysis) = store.find_analysis(project, number).await? {
        println!();
        println!("Category: {}", analysis.category);
    }
    Ok(())
}

/// Unified diff of the change's commit.
///
/// Submitted changes may have been rebased on submit, so their commit is
/// looked up on the target branch by `Change-Id` first.
async fn fetch_diff(
    gitiles: &GitilesClient,
    change: &Change,
    cancel: &CancellationToken,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut sha = change.current_revision.clone();

    if change.status == ChangeStatus::Merged {
        let reference = format!("refs/heads/{}", change.branch);
        let footer = format!("Change-Id: {}", change.change_id);
        let log = gitiles
            .log(&change.project, &reference, SUBMITTED_SEARCH_DEPTH, cancel)
            .await?;
        if let Some(commit) = log.log.iter().find(|c| c.message.contains(&footer)) {
            sha = Some(commit.commit.clone());
        }
    }

    let sha = sha.ok_or("change has no known revision")?;
    let commit = gitiles.commit(&change.project, &sha, cancel).await?;
    tracing::debug!(
        commit = %commit.commit,
        files = commit.tree_diff.len(),
        "Fetching patch"
    );
    Ok(gitiles.patch(&change.project, &commit.commit, cancel).await?)
}

/// `revlens mental-model <owner>`: how an author works, from recent changes.
pub(crate) async fn handle_mental_model(
    owner: &str,
    limit: u64,
    config: &Config,
    database_url: &str,
    cancel: &CancellationToken,
) -> CommandResult {
    let store = open_store(database_url).await?;
    let changes = store.recent_changes(owner, limit).await?;
    if changes.is_empty() {
        return Err(format!("no stored changes owned by {owner}").into());
    }

    let analyzer = build_analyzer(config)?;
    println!("{owner} ({} recent change(s))", changes.len());
    println!();
    println!(
        "{}",
        analyzer.analyze_mental_model(owner, &changes, cancel).await?
    );
    Ok(())
}
