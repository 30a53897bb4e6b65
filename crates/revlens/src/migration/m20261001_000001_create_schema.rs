//! Initial migration: changes, sync cursors and analysis results.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_changes(manager).await?;
        self.create_sync_cursors(manager).await?;
        self.create_analysis_results(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalysisResults::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncCursors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Changes::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_changes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Changes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Changes::Id).uuid().not_null().primary_key())
                    // Identity
                    .col(ColumnDef::new(Changes::Project).string().not_null())
                    .col(ColumnDef::new(Changes::ChangeNumber).big_integer().not_null())
                    .col(ColumnDef::new(Changes::ChangeId).string().not_null())
                    // Classification
                    .col(ColumnDef::new(Changes::Branch).string().not_null())
                    .col(ColumnDef::new(Changes::Status).string().not_null())
                    .col(ColumnDef::new(Changes::Topic).string().null())
                    .col(
                        ColumnDef::new(Changes::WorkInProgress)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // Content
                    .col(ColumnDef::new(Changes::Subject).string().not_null())
                    .col(ColumnDef::new(Changes::Message).text().not_null())
                    .col(ColumnDef::new(Changes::CurrentRevision).string().null())
                    .col(
                        ColumnDef::new(Changes::Insertions)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Changes::Deletions)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    // Provenance
                    .col(ColumnDef::new(Changes::OwnerName).string().not_null())
                    .col(ColumnDef::new(Changes::OwnerEmail).string().null())
                    // Timestamps
                    .col(
                        ColumnDef::new(Changes::Created)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Changes::Updated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Changes::Submitted)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    // Detail
                    .col(
                        ColumnDef::new(Changes::Detailed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Changes::Files)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Changes::Labels)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Changes::Messages)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    // Tracking
                    .col(
                        ColumnDef::new(Changes::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key used by upserts
        manager
            .create_index(
                Index::create()
                    .name("idx_changes_project_number")
                    .table(Changes::Table)
                    .col(Changes::Project)
                    .col(Changes::ChangeNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_changes_updated")
                    .table(Changes::Table)
                    .col(Changes::Updated)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_changes_owner_name")
                    .table(Changes::Table)
                    .col(Changes::OwnerName)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sync_cursors(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncCursors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncCursors::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncCursors::Project).string().not_null())
                    .col(ColumnDef::new(SyncCursors::Status).string().not_null())
                    .col(
                        ColumnDef::new(SyncCursors::Position)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncCursors::AdvancedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_cursors_project_status")
                    .table(SyncCursors::Table)
                    .col(SyncCursors::Project)
                    .col(SyncCursors::Status)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_analysis_results(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisResults::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalysisResults::ChangeRef).uuid().not_null())
                    .col(
                        ColumnDef::new(AnalysisResults::Category)
                            .string()
                            .not_null()
                            .default("other"),
                    )
                    .col(ColumnDef::new(AnalysisResults::Summary).text().not_null())
                    .col(
                        ColumnDef::new(AnalysisResults::Discussion)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalysisResults::PhilosophyNotes)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalysisResults::Insights)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(AnalysisResults::KeyChanges)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(AnalysisResults::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analysis_results_change")
                            .from(AnalysisResults::Table, AnalysisResults::ChangeRef)
                            .to(Changes::Table, Changes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One live analysis per change
        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_results_change_ref")
                    .table(AnalysisResults::Table)
                    .col(AnalysisResults::ChangeRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "changes")]
enum Changes {
    Table,
    Id,
    Project,
    ChangeNumber,
    ChangeId,
    Branch,
    Status,
    Topic,
    WorkInProgress,
    Subject,
    Message,
    CurrentRevision,
    Insertions,
    Deletions,
    OwnerName,
    OwnerEmail,
    Created,
    Updated,
    Submitted,
    Detailed,
    Files,
    Labels,
    Messages,
    LastSyncedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "sync_cursors")]
enum SyncCursors {
    Table,
    Id,
    Project,
    Status,
    Position,
    AdvancedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "analysis_results")]
enum AnalysisResults {
    Table,
    Id,
    ChangeRef,
    Category,
    Summary,
    Discussion,
    PhilosophyNotes,
    Insights,
    KeyChanges,
    UpdatedAt,
}
