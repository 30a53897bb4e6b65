//! SyncCursor entity - the per-(project, status) "fetched up to" watermark.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::change_status::ChangeStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_cursors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Unique together with `status`.
    pub project: String,
    pub status: ChangeStatus,
    /// Changes updated after this instant still need fetching.
    pub position: DateTimeWithTimeZone,
    pub advanced_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
