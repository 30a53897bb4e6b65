//! Change entity - one row per (project, change number).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::change_status::ChangeStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "changes")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Identity ────────────────────────────────────────────────────────────
    pub project: String,
    pub change_number: i64,
    pub change_id: String,

    // ─── Classification ──────────────────────────────────────────────────────
    pub branch: String,
    pub status: ChangeStatus,
    pub topic: Option<String>,
    #[sea_orm(default_value = false)]
    pub work_in_progress: bool,

    // ─── Content ─────────────────────────────────────────────────────────────
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub current_revision: Option<String>,
    pub insertions: i32,
    pub deletions: i32,

    // ─── Provenance ──────────────────────────────────────────────────────────
    pub owner_name: String,
    pub owner_email: Option<String>,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub created: DateTimeWithTimeZone,
    /// Server-side last update; never moves backwards for a stored row.
    pub updated: DateTimeWithTimeZone,
    pub submitted: Option<DateTimeWithTimeZone>,

    // ─── Detail (JSON) ───────────────────────────────────────────────────────
    #[sea_orm(default_value = false)]
    pub detailed: bool,
    #[sea_orm(column_type = "Json")]
    pub files: serde_json::Value,
    #[sea_orm(column_type = "Json")]
    pub labels: serde_json::Value,
    #[sea_orm(column_type = "Json")]
    pub messages: serde_json::Value,

    // ─── Tracking ────────────────────────────────────────────────────────────
    pub last_synced_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::analysis_result::Entity")]
    AnalysisResult,
}

impl Related<super::analysis_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
