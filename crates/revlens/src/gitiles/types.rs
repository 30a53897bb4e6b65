//! Gitiles JSON envelopes.

use serde::Deserialize;

/// Response of `+log/<ref>?format=JSON`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitilesLog {
    pub log: Vec<GitilesCommit>,
    /// Cursor for the next page, when more history exists.
    #[serde(default)]
    pub next: Option<String>,
}

/// Response of `+/<commit>?format=JSON` (and each `log` element).
#[derive(Debug, Clone, Deserialize)]
pub struct GitilesCommit {
    pub commit: String,
    #[serde(default)]
    pub tree: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    pub author: GitilesPerson,
    pub committer: GitilesPerson,
    pub message: String,
    /// Only present on single-commit responses.
    #[serde(default)]
    pub tree_diff: Vec<TreeDiffEntry>,
}

impl GitilesCommit {
    /// First line of the commit message.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitilesPerson {
    pub name: String,
    pub email: String,
    /// Free-form git date, e.g. `Wed May 01 10:00:00 2024 +0000`.
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeDiffEntry {
    /// `add`, `modify`, `delete`, `rename` or `copy`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub new_path: Option<String>,
}

impl TreeDiffEntry {
    /// The path that exists after the change (or the deleted one).
    #[must_use]
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .filter(|p| *p != "/dev/null")
            .or(self.old_path.as_deref())
            .unwrap_or_default()
    }
}
