//! Review status of a change.

use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a change on the review server.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "merged")]
    Merged,
    #[sea_orm(string_value = "abandoned")]
    Abandoned,
}

impl ChangeStatus {
    /// All statuses, in the order a sync run visits them by default.
    pub const ALL: [ChangeStatus; 3] = [
        ChangeStatus::Open,
        ChangeStatus::Merged,
        ChangeStatus::Abandoned,
    ];

    /// The value used in `status:` query terms.
    #[must_use]
    pub fn as_query_value(self) -> &'static str {
        match self {
            ChangeStatus::Open => "open",
            ChangeStatus::Merged => "merged",
            ChangeStatus::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_query_value())
    }
}

impl FromStr for ChangeStatus {
    type Err = String;

    /// Accepts both the lowercase query form and the uppercase wire form
    /// (`NEW`, `MERGED`, `ABANDONED`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" | "new" => Ok(ChangeStatus::Open),
            "merged" => Ok(ChangeStatus::Merged),
            "abandoned" => Ok(ChangeStatus::Abandoned),
            other => Err(format!("unknown change status: {other}")),
        }
    }
}
