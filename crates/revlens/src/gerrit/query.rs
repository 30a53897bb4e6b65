//! Query expressions and request parameters for `/changes/`.

use chrono::{DateTime, Utc};

use crate::entity::change_status::ChangeStatus;

/// Named detail-inclusion flags (`o=` parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailFlag {
    CurrentRevision,
    CurrentCommit,
    CurrentFiles,
    Labels,
    DetailedLabels,
    Messages,
    DetailedAccounts,
}

impl DetailFlag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DetailFlag::CurrentRevision => "CURRENT_REVISION",
            DetailFlag::CurrentCommit => "CURRENT_COMMIT",
            DetailFlag::CurrentFiles => "CURRENT_FILES",
            DetailFlag::Labels => "LABELS",
            DetailFlag::DetailedLabels => "DETAILED_LABELS",
            DetailFlag::Messages => "MESSAGES",
            DetailFlag::DetailedAccounts => "DETAILED_ACCOUNTS",
        }
    }
}

/// Flags for a full sync: everything analysis needs.
pub const FULL_DETAIL: &[DetailFlag] = &[
    DetailFlag::CurrentRevision,
    DetailFlag::CurrentCommit,
    DetailFlag::CurrentFiles,
    DetailFlag::DetailedLabels,
    DetailFlag::Messages,
    DetailFlag::DetailedAccounts,
];

/// Flags for light polling: status, labels and owner only.
pub const LIGHT_DETAIL: &[DetailFlag] = &[DetailFlag::Labels, DetailFlag::DetailedAccounts];

/// Build the `q=` expression for one status.
///
/// Terms are always, in order: project, status, WIP exclusion, and a
/// date-only `after:` cutoff. Branches are deliberately absent: the
/// server's branch patterns are unreliable, so branch filtering happens
/// locally after fetching.
#[must_use]
pub fn build_query(
    status: ChangeStatus,
    since: DateTime<Utc>,
    project: &str,
    exclude_wip: bool,
) -> String {
    let mut terms = Vec::with_capacity(4);
    if !project.is_empty() {
        terms.push(format!("project:{project}"));
    }
    terms.push(format!("status:{}", status.as_query_value()));
    if exclude_wip {
        terms.push("-is:wip".to_string());
    }
    terms.push(format!("after:{}", since.format("%Y-%m-%d")));
    terms.join(" ")
}

/// One page request against `/changes/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    /// Query expression, see [`build_query`].
    pub query: String,
    /// Page size (`n`).
    pub limit: u32,
    /// Offset of the first result (`S`).
    pub start: u32,
    pub flags: Vec<DetailFlag>,
}

impl ChangeQuery {
    #[must_use]
    pub fn new(query: impl Into<String>, limit: u32, flags: &[DetailFlag]) -> Self {
        Self {
            query: query.into(),
            limit,
            start: 0,
            flags: flags.to_vec(),
        }
    }

    /// The same query starting at `start`.
    #[must_use]
    pub fn at(&self, start: u32) -> Self {
        Self {
            start,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 1)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn terms_appear_in_fixed_order() {
        let q = build_query(ChangeStatus::Merged, since(), "platform/core", true);
        assert_eq!(
            q,
            "project:platform/core status:merged -is:wip after:2024-03-09"
        );
    }

    #[test]
    fn wip_term_is_omitted_when_not_excluding() {
        let q = build_query(ChangeStatus::Open, since(), "tools", false);
        assert_eq!(q, "project:tools status:open after:2024-03-09");
    }

    #[test]
    fn cutoff_is_date_only() {
        let q = build_query(ChangeStatus::Abandoned, since(), "tools", false);
        assert!(!q.contains("23:59"));
        assert!(q.ends_with("after:2024-03-09"));
    }

    #[test]
    fn empty_project_drops_the_project_term() {
        let q = build_query(ChangeStatus::Open, since(), "", true);
        assert_eq!(q, "status:open -is:wip after:2024-03-09");
    }

    #[test]
    fn query_never_mentions_branches() {
        let q = build_query(ChangeStatus::Open, since(), "p", true);
        assert!(!q.contains("branch:"));
    }

    #[test]
    fn at_only_moves_the_offset() {
        let query = ChangeQuery::new("status:open", 25, LIGHT_DETAIL);
        let next = query.at(25);
        assert_eq!(next.start, 25);
        assert_eq!(next.limit, 25);
        assert_eq!(next.query, query.query);
        assert_eq!(next.flags, query.flags);
    }
}
