//! AnalysisResult entity - at most one row per change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::category::Category;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analysis_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The analysed change; unique.
    pub change_ref: Uuid,

    pub category: Category,
    #[sea_orm(column_type = "Text")]
    pub summary: String,
    #[sea_orm(column_type = "Text")]
    pub discussion: String,
    #[sea_orm(column_type = "Text")]
    pub philosophy_notes: String,
    /// Ordered list of strings.
    #[sea_orm(column_type = "Json")]
    pub insights: serde_json::Value,
    #[sea_orm(column_type = "Json")]
    pub key_changes: serde_json::Value,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::change::Entity",
        from = "Column::ChangeRef",
        to = "super::change::Column::Id",
        on_delete = "Cascade"
    )]
    Change,
}

impl Related<super::change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Change.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
