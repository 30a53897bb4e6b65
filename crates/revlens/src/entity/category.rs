//! Closed set of analysis categories.

use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a change is mostly about.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[sea_orm(string_value = "error-handling")]
    ErrorHandling,
    #[sea_orm(string_value = "testing")]
    Testing,
    #[sea_orm(string_value = "performance")]
    Performance,
    #[sea_orm(string_value = "concurrency")]
    Concurrency,
    #[sea_orm(string_value = "api-design")]
    ApiDesign,
    #[sea_orm(string_value = "tooling")]
    Tooling,
    #[sea_orm(string_value = "documentation")]
    Documentation,
    #[sea_orm(string_value = "other")]
    #[default]
    Other,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::ErrorHandling => "error-handling",
            Category::Testing => "testing",
            Category::Performance => "performance",
            Category::Concurrency => "concurrency",
            Category::ApiDesign => "api-design",
            Category::Tooling => "tooling",
            Category::Documentation => "documentation",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Lenient: models write `api_design`, `API Design` or `api-design`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '_' | ' ' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "error-handling" | "errors" => Ok(Category::ErrorHandling),
            "testing" | "tests" => Ok(Category::Testing),
            "performance" => Ok(Category::Performance),
            "concurrency" => Ok(Category::Concurrency),
            "api-design" | "api" => Ok(Category::ApiDesign),
            "tooling" => Ok(Category::Tooling),
            "documentation" | "docs" => Ok(Category::Documentation),
            "other" => Ok(Category::Other),
            _ => Err(format!("unknown category: {s}")),
        }
    }
}
