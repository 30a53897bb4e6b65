//! Domain types shared by sync, storage and analysis.
//!
//! These are decoupled from both the review server's wire format and the
//! database entities; conversions live next to each of those.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::entity::category::Category;
pub use crate::entity::change_status::ChangeStatus;

/// A reviewable unit of proposed modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    // ─── Identity ────────────────────────────────────────────────────────────
    /// Server-assigned number, unique per project.
    pub change_number: i64,
    /// Stable opaque `I…` identifier.
    pub change_id: String,

    // ─── Classification ──────────────────────────────────────────────────────
    pub project: String,
    pub branch: String,
    pub status: ChangeStatus,
    pub topic: Option<String>,
    pub work_in_progress: bool,

    // ─── Content ─────────────────────────────────────────────────────────────
    pub subject: String,
    /// Full commit message of the current revision; empty when not requested.
    pub message: String,
    pub current_revision: Option<String>,
    pub insertions: i32,
    pub deletions: i32,

    // ─── Provenance ──────────────────────────────────────────────────────────
    pub owner_name: String,
    pub owner_email: Option<String>,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub submitted: Option<DateTime<Utc>>,
    pub last_synced_at: DateTime<Utc>,

    // ─── Detail ──────────────────────────────────────────────────────────────
    /// Whether the detail fields below were requested when this was fetched.
    ///
    /// Summary-only observations must not wipe previously stored detail.
    pub detailed: bool,
    pub files: Vec<ChangedFile>,
    pub labels: Vec<LabelSummary>,
    pub messages: Vec<ChangeMessage>,
}

impl Change {
    /// `project~number`, the form used in log lines and on the CLI.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}~{}", self.project, self.change_number)
    }

    /// Merge a freshly fetched observation into a stored one.
    ///
    /// Returns `None` when `incoming` is older than `self`. Summary-only
    /// observations keep the stored detail fields.
    #[must_use]
    pub fn merged_with(&self, incoming: &Change) -> Option<Change> {
        if incoming.updated < self.updated {
            return None;
        }
        if incoming.detailed {
            return Some(incoming.clone());
        }
        Some(Change {
            message: self.message.clone(),
            current_revision: self.current_revision.clone(),
            detailed: self.detailed,
            files: self.files.clone(),
            messages: self.messages.clone(),
            ..incoming.clone()
        })
    }
}

/// A file touched by the current revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    /// Single-letter status: `A`dded, `D`eleted, `R`enamed, `C`opied, `M`odified.
    pub status: char,
    pub lines_inserted: i32,
    pub lines_deleted: i32,
}

/// A review label and the votes cast on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub name: String,
    pub approved: bool,
    pub rejected: bool,
    pub votes: Vec<LabelVote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVote {
    pub reviewer: String,
    pub value: i32,
}

/// A message posted on the change (review comments, bot output, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub revision_number: Option<i32>,
}

/// Structured output of the analysis pipeline for one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub project: String,
    pub change_number: i64,
    pub category: Category,
    pub summary: String,
    pub discussion: String,
    pub philosophy_notes: String,
    pub insights: Vec<String>,
    pub key_changes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// An empty result for `change` carrying only a category.
    #[must_use]
    pub fn empty_for(change: &Change, category: Category, updated_at: DateTime<Utc>) -> Self {
        Self {
            project: change.project.clone(),
            change_number: change.change_number,
            category,
            summary: String::new(),
            discussion: String::new(),
            philosophy_notes: String::new(),
            insights: Vec::new(),
            key_changes: Vec::new(),
            updated_at,
        }
    }
}
