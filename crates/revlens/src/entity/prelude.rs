//! Common re-exports for convenient entity usage.

pub use super::analysis_result::{
    ActiveModel as AnalysisResultActiveModel, Column as AnalysisResultColumn,
    Entity as AnalysisResultEntity, Model as AnalysisResultModel,
};
pub use super::category::Category;
pub use super::change::{
    ActiveModel as ChangeActiveModel, Column as ChangeColumn, Entity as ChangeEntity,
    Model as ChangeModel,
};
pub use super::change_status::ChangeStatus;
pub use super::sync_cursor::{
    ActiveModel as SyncCursorActiveModel, Column as SyncCursorColumn, Entity as SyncCursorEntity,
    Model as SyncCursorModel,
};
