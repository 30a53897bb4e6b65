//! Wire types for the review server's REST API.
//!
//! Only fields revlens uses are modelled; unknown fields are ignored.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Timestamp layout used by the API: `2024-05-01 12:00:00.000000000`, always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse an API timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}

/// `ChangeInfo` entity as returned by `/changes/`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeInfo {
    pub project: String,
    pub branch: String,
    #[serde(default)]
    pub topic: Option<String>,
    pub change_id: String,
    pub subject: String,
    /// `NEW`, `MERGED` or `ABANDONED`.
    pub status: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub created: DateTime<Utc>,
    #[serde(deserialize_with = "de_timestamp")]
    pub updated: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub submitted: Option<DateTime<Utc>>,
    #[serde(rename = "_number")]
    pub number: i64,
    pub owner: AccountInfo,
    #[serde(default)]
    pub insertions: i32,
    #[serde(default)]
    pub deletions: i32,
    #[serde(default)]
    pub work_in_progress: bool,
    #[serde(default)]
    pub current_revision: Option<String>,
    #[serde(default)]
    pub revisions: HashMap<String, RevisionInfo>,
    #[serde(default)]
    pub labels: BTreeMap<String, LabelInfo>,
    #[serde(default)]
    pub messages: Vec<ChangeMessageInfo>,
    /// Present on the last element of a page; not relied upon.
    #[serde(rename = "_more_changes", default)]
    pub more_changes: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInfo {
    #[serde(rename = "_account_id", default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl AccountInfo {
    /// Best human-readable name available.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| self.email.clone())
            .or_else(|| self.account_id.map(|id| format!("account {id}")))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevisionInfo {
    #[serde(rename = "_number")]
    pub number: i32,
    #[serde(default)]
    pub commit: Option<CommitInfo>,
    #[serde(default)]
    pub files: BTreeMap<String, FileInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileInfo {
    /// Absent means modified.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub lines_inserted: i32,
    #[serde(default)]
    pub lines_deleted: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelInfo {
    #[serde(default)]
    pub approved: Option<AccountInfo>,
    #[serde(default)]
    pub rejected: Option<AccountInfo>,
    /// Only with `DETAILED_LABELS`.
    #[serde(default)]
    pub all: Vec<ApprovalInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalInfo {
    #[serde(flatten)]
    pub account: AccountInfo,
    #[serde(default)]
    pub value: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeMessageInfo {
    #[serde(default)]
    pub author: Option<AccountInfo>,
    #[serde(deserialize_with = "de_timestamp")]
    pub date: DateTime<Utc>,
    pub message: String,
    #[serde(rename = "_revision_number", default)]
    pub revision_number: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_nanosecond_timestamps_as_utc() {
        let ts = parse_timestamp("2024-05-01 12:34:56.123000000").expect("valid");
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.hour(), 12);
        assert_eq!(ts.nanosecond(), 123_000_000);
    }

    #[test]
    fn rejects_rfc3339_timestamps() {
        assert!(parse_timestamp("2024-05-01T12:34:56Z").is_none());
    }

    #[test]
    fn change_info_tolerates_minimal_payload() {
        let json = r#"{
            "id": "demo~main~I8473b95934b5732ac55d26311a706c9c2bde9940",
            "project": "demo",
            "branch": "main",
            "change_id": "I8473b95934b5732ac55d26311a706c9c2bde9940",
            "subject": "Implementing Feature X",
            "status": "NEW",
            "created": "2013-02-01 09:59:32.126000000",
            "updated": "2013-02-21 11:16:36.775000000",
            "_number": 3965,
            "owner": {"name": "John Doe"}
        }"#;
        let info: ChangeInfo = serde_json::from_str(json).expect("minimal change parses");
        assert_eq!(info.number, 3965);
        assert!(info.submitted.is_none());
        assert!(info.revisions.is_empty());
        assert!(!info.more_changes);
        assert_eq!(info.owner.display_name(), "John Doe");
    }

    #[test]
    fn display_name_falls_back_through_identity_fields() {
        let account = AccountInfo {
            account_id: Some(7),
            ..AccountInfo::default()
        };
        assert_eq!(account.display_name(), "account 7");

        let account = AccountInfo {
            username: Some("jdoe".into()),
            email: Some("j@example.com".into()),
            ..AccountInfo::default()
        };
        assert_eq!(account.display_name(), "jdoe");
    }
}
