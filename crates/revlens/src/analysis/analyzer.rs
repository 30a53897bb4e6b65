//! Summaries and categorization of changes with a local model.
//!
//! Every free-text input passes through [`sanitize`] before it reaches a
//! prompt. Single-document tasks get the base timeout; the mental-model
//! task reads many changes at once and gets twice that. Each generation
//! goes through the configured [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::client::{GenerateError, Generator};
use super::extract::{CategorySource, parse_categorization};
use super::prompts::{
    CATEGORIZE, CLOSE_REASON, MENTAL_MODEL, MERGE_REASON, SUMMARIZE_COMMENTS,
    SUMMARIZE_DESCRIPTION, SUMMARIZE_DIFF, render,
};
use super::sanitize::sanitize;
use crate::change::{AnalysisResult, Change};
use crate::retry::{RetryError, RetryPolicy};

/// Default per-call timeout for single-document tasks.
pub const DEFAULT_BASE_TIMEOUT: Duration = Duration::from_secs(120);

/// Diffs longer than this are cut before sanitizing.
const MAX_DIFF_CHARS: usize = 16_000;

/// Messages per change included in prompts, newest last.
const MAX_COMMENTS: usize = 40;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Generate(#[from] RetryError<GenerateError>),

    #[error("no changes to analyze for {0}")]
    NoChanges(String),
}

impl AnalysisError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Generate(err) if err.is_cancelled())
    }

    /// The model server is down or lacks the model; later calls will fail too.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AnalysisError::Generate(err) if err.is_unavailable())
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub base_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            base_timeout: DEFAULT_BASE_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Categorized analysis plus where the category came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeAnalysis {
    pub result: AnalysisResult,
    pub source: CategorySource,
}

#[derive(Clone)]
pub struct Analyzer {
    generator: Arc<dyn Generator>,
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn Generator>, options: AnalyzerOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    async fn generate(
        &self,
        prompt: String,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        let text = self
            .options
            .retry
            .run(|| self.generator.generate(&prompt, timeout, cancel), cancel)
            .await?;
        Ok(text.trim().to_string())
    }

    /// What a change does and why, from its title and description.
    #[tracing::instrument(skip(self, change, cancel), fields(change_number = change.change_number))]
    pub async fn summarize_description(
        &self,
        change: &Change,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        let prompt = render(
            SUMMARIZE_DESCRIPTION,
            &[
                ("title", sanitize(&change.subject).as_str()),
                ("description", sanitize(&description_of(change)).as_str()),
            ],
        );
        self.generate(prompt, self.options.base_timeout, cancel)
            .await
    }

    /// Technical substance of a unified diff.
    #[tracing::instrument(skip(self, diff, cancel), fields(diff_len = diff.len()))]
    pub async fn summarize_diff(
        &self,
        title: &str,
        diff: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        let prompt = render(
            SUMMARIZE_DIFF,
            &[
                ("title", sanitize(title).as_str()),
                ("diff", sanitize(truncate_chars(diff, MAX_DIFF_CHARS)).as_str()),
            ],
        );
        self.generate(prompt, self.options.base_timeout, cancel)
            .await
    }

    #[tracing::instrument(skip(self, change, cancel), fields(change_number = change.change_number))]
    pub async fn summarize_comments(
        &self,
        change: &Change,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        let prompt = render(
            SUMMARIZE_COMMENTS,
            &[("comments", sanitize(&comments_of(change)).as_str())],
        );
        self.generate(prompt, self.options.base_timeout, cancel)
            .await
    }

    #[tracing::instrument(skip(self, change, cancel), fields(change_number = change.change_number))]
    pub async fn analyze_merge_reason(
        &self,
        change: &Change,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        self.outcome_reason(MERGE_REASON, change, cancel).await
    }

    #[tracing::instrument(skip(self, change, cancel), fields(change_number = change.change_number))]
    pub async fn analyze_close_reason(
        &self,
        change: &Change,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        self.outcome_reason(CLOSE_REASON, change, cancel).await
    }

    async fn outcome_reason(
        &self,
        template: &str,
        change: &Change,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        let prompt = render(
            template,
            &[
                ("title", sanitize(&change.subject).as_str()),
                ("description", sanitize(&description_of(change)).as_str()),
                ("comments", sanitize(&comments_of(change)).as_str()),
            ],
        );
        self.generate(prompt, self.options.base_timeout, cancel)
            .await
    }

    /// How `owner` approaches their work, from a set of their changes.
    ///
    /// Each change is sanitized as its own fenced block.
    #[tracing::instrument(skip(self, changes, cancel), fields(count = changes.len()))]
    pub async fn analyze_mental_model(
        &self,
        owner: &str,
        changes: &[Change],
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        if changes.is_empty() {
            return Err(AnalysisError::NoChanges(owner.to_string()));
        }

        let blocks: Vec<String> = changes
            .iter()
            .map(|change| {
                sanitize(&format!(
                    "[{}] {}\n{}",
                    change.status,
                    change.subject,
                    description_of(change)
                ))
            })
            .collect();

        let prompt = render(
            MENTAL_MODEL,
            &[
                ("owner", sanitize(owner).as_str()),
                ("changes", blocks.join("\n\n").as_str()),
            ],
        );
        self.generate(prompt, self.options.base_timeout * 2, cancel)
            .await
    }

    /// Category, summary and insights for one change.
    ///
    /// Unusable model output degrades to a keyword category; only
    /// generation failures are errors.
    #[tracing::instrument(skip(self, change, cancel), fields(change_number = change.change_number))]
    pub async fn analyze_change(
        &self,
        change: &Change,
        cancel: &CancellationToken,
    ) -> Result<ChangeAnalysis, AnalysisError> {
        let prompt = render(
            CATEGORIZE,
            &[
                ("title", sanitize(&change.subject).as_str()),
                ("description", sanitize(&description_of(change)).as_str()),
                ("files", sanitize(&files_of(change)).as_str()),
                ("comments", sanitize(&comments_of(change)).as_str()),
            ],
        );
        let response = self
            .generate(prompt, self.options.base_timeout, cancel)
            .await?;

        let parsed = parse_categorization(&response, &change.subject);
        if parsed.source == CategorySource::Keywords {
            tracing::info!(
                category = %parsed.category,
                "Model category unusable, using keyword category"
            );
        }

        Ok(ChangeAnalysis {
            result: AnalysisResult {
                project: change.project.clone(),
                change_number: change.change_number,
                category: parsed.category,
                summary: parsed.summary,
                discussion: parsed.discussion,
                philosophy_notes: parsed.philosophy_notes,
                insights: parsed.insights,
                key_changes: parsed.key_changes,
                updated_at: Utc::now().max(change.updated),
            },
            source: parsed.source,
        })
    }
}

/// The commit message body, or the subject when no detail was fetched.
fn description_of(change: &Change) -> String {
    let message = change.message.trim();
    match message.split_once('\n') {
        Some((first, rest)) if first.trim() == change.subject.trim() => rest.trim().to_string(),
        _ if message.is_empty() => change.subject.clone(),
        _ => message.to_string(),
    }
}

fn comments_of(change: &Change) -> String {
    let skip = change.messages.len().saturating_sub(MAX_COMMENTS);
    let lines: Vec<String> = change
        .messages
        .iter()
        .skip(skip)
        .filter(|m| !m.message.trim().is_empty())
        .map(|m| format!("{}: {}", m.author, m.message.trim()))
        .collect();
    if lines.is_empty() {
        "(no review comments)".to_string()
    } else {
        lines.join("\n")
    }
}

fn files_of(change: &Change) -> String {
    if change.files.is_empty() {
        return "(no file list)".to_string();
    }
    change
        .files
        .iter()
        .map(|f| format!("{} {} (+{} -{})", f.status, f.path, f.lines_inserted, f.lines_deleted))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
