//! Conversion from wire `ChangeInfo` to the domain [`Change`].

use chrono::{DateTime, Utc};

use super::types::{ChangeInfo, LabelInfo};
use crate::change::{Change, ChangeMessage, ChangedFile, LabelSummary, LabelVote};
use crate::entity::change_status::ChangeStatus;

/// Convert one API record, stamping it with `synced_at`.
///
/// A record counts as `detailed` when its current revision carries a
/// commit; that only happens when the detail flags were requested.
/// Unknown statuses fall back to open.
#[must_use]
pub fn to_change(info: ChangeInfo, synced_at: DateTime<Utc>) -> Change {
    let status = info.status.parse().unwrap_or_else(|_| {
        tracing::debug!(status = %info.status, number = info.number, "Unknown change status");
        ChangeStatus::Open
    });

    let current = info
        .current_revision
        .as_ref()
        .and_then(|sha| info.revisions.get(sha));

    let commit_message = current
        .and_then(|rev| rev.commit.as_ref())
        .map(|commit| commit.message.clone());
    let detailed = commit_message.is_some();

    let files = current
        .map(|rev| {
            rev.files
                .iter()
                .map(|(path, file)| ChangedFile {
                    path: path.clone(),
                    status: file
                        .status
                        .as_deref()
                        .and_then(|s| s.chars().next())
                        .unwrap_or('M'),
                    lines_inserted: file.lines_inserted,
                    lines_deleted: file.lines_deleted,
                })
                .collect()
        })
        .unwrap_or_default();

    let labels = info
        .labels
        .iter()
        .map(|(name, label)| to_label_summary(name, label))
        .collect();

    let messages = info
        .messages
        .into_iter()
        .map(|msg| ChangeMessage {
            author: msg
                .author
                .map(|a| a.display_name())
                .unwrap_or_else(|| "server".to_string()),
            date: msg.date,
            message: msg.message,
            revision_number: msg.revision_number,
        })
        .collect();

    Change {
        change_number: info.number,
        change_id: info.change_id,
        project: info.project,
        branch: info.branch,
        status,
        topic: info.topic.filter(|t| !t.is_empty()),
        work_in_progress: info.work_in_progress,
        subject: info.subject,
        message: commit_message.unwrap_or_default(),
        current_revision: info.current_revision,
        insertions: info.insertions,
        deletions: info.deletions,
        owner_name: info.owner.display_name(),
        owner_email: info.owner.email,
        created: info.created,
        updated: info.updated,
        submitted: info.submitted,
        last_synced_at: synced_at,
        detailed,
        files,
        labels,
        messages,
    }
}

fn to_label_summary(name: &str, label: &LabelInfo) -> LabelSummary {
    LabelSummary {
        name: name.to_string(),
        approved: label.approved.is_some(),
        rejected: label.rejected.is_some(),
        votes: label
            .all
            .iter()
            .filter_map(|approval| {
                approval.value.filter(|v| *v != 0).map(|value| LabelVote {
                    reviewer: approval.account.display_name(),
                    value,
                })
            })
            .collect(),
    }
}
