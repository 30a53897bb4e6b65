//! sea-orm backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
    sea_query::{Alias, Expr, OnConflict},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{Result, Store, StoreError, newest_per_change};
use crate::change::{AnalysisResult, Change};
use crate::entity::change_status::ChangeStatus;
use crate::entity::prelude::*;

/// Rows per INSERT; keeps bound parameters well under SQLite's limit.
const UPSERT_CHUNK_ROWS: usize = 40;

/// A [`Store`] over a sea-orm connection.
///
/// The schema comes from [`crate::migration::Migrator`]. Share it behind
/// an `Arc`.
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    #[must_use]
    pub fn into_connection(self) -> DatabaseConnection {
        self.db
    }

    async fn find_change_model(
        &self,
        project: &str,
        change_number: i64,
    ) -> Result<Option<ChangeModel>> {
        ChangeEntity::find()
            .filter(ChangeColumn::Project.eq(project))
            .filter(ChangeColumn::ChangeNumber.eq(change_number))
            .one(&self.db)
            .await
            .map_err(StoreError::from)
    }

    async fn insert_changes(&self, changes: &[&Change], on_conflict: OnConflict) -> Result<u64> {
        let mut written = 0u64;
        for chunk in changes.chunks(UPSERT_CHUNK_ROWS) {
            let models = chunk
                .iter()
                .map(|change| change_active_model(change))
                .collect::<Result<Vec<_>>>()?;
            written += ChangeEntity::insert_many(models)
                .on_conflict(on_conflict.clone())
                .exec_without_returning(&self.db)
                .await?;
        }
        Ok(written)
    }
}

// ─── Upsert Clauses ──────────────────────────────────────────────────────────

/// Columns every observation refreshes.
const SUMMARY_COLUMNS: [ChangeColumn; 15] = [
    ChangeColumn::ChangeId,
    ChangeColumn::Branch,
    ChangeColumn::Status,
    ChangeColumn::Topic,
    ChangeColumn::WorkInProgress,
    ChangeColumn::Subject,
    ChangeColumn::Insertions,
    ChangeColumn::Deletions,
    ChangeColumn::OwnerName,
    ChangeColumn::OwnerEmail,
    ChangeColumn::Created,
    ChangeColumn::Updated,
    ChangeColumn::Submitted,
    ChangeColumn::Labels,
    ChangeColumn::LastSyncedAt,
];

/// Columns only a detailed observation carries.
const DETAIL_COLUMNS: [ChangeColumn; 5] = [
    ChangeColumn::Message,
    ChangeColumn::CurrentRevision,
    ChangeColumn::Detailed,
    ChangeColumn::Files,
    ChangeColumn::Messages,
];

/// ON CONFLICT clause for change upserts.
///
/// The natural key is (project, change_number). Rows are only rewritten
/// when the incoming `updated` is not older than the stored one, so a
/// stale page can never regress a change.
pub(crate) fn build_change_on_conflict(detailed: bool) -> OnConflict {
    let mut columns = SUMMARY_COLUMNS.to_vec();
    if detailed {
        columns.extend(DETAIL_COLUMNS);
    }
    OnConflict::columns([ChangeColumn::Project, ChangeColumn::ChangeNumber])
        .update_columns(columns)
        .action_and_where(
            Expr::col((ChangeEntity, ChangeColumn::Updated))
                .lte(Expr::col((Alias::new("excluded"), ChangeColumn::Updated))),
        )
        .to_owned()
}

fn cursor_on_conflict() -> OnConflict {
    OnConflict::columns([SyncCursorColumn::Project, SyncCursorColumn::Status])
        .update_columns([SyncCursorColumn::Position, SyncCursorColumn::AdvancedAt])
        .action_and_where(
            Expr::col((SyncCursorEntity, SyncCursorColumn::Position))
                .lt(Expr::col((Alias::new("excluded"), SyncCursorColumn::Position))),
        )
        .to_owned()
}

fn analysis_on_conflict() -> OnConflict {
    OnConflict::column(AnalysisResultColumn::ChangeRef)
        .update_columns([
            AnalysisResultColumn::Category,
            AnalysisResultColumn::Summary,
            AnalysisResultColumn::Discussion,
            AnalysisResultColumn::PhilosophyNotes,
            AnalysisResultColumn::Insights,
            AnalysisResultColumn::KeyChanges,
            AnalysisResultColumn::UpdatedAt,
        ])
        .to_owned()
}

// ─── Conversion ──────────────────────────────────────────────────────────────

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn from_json<T: DeserializeOwned>(column: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StoreError::InvalidData(format!("{column}: {e}")))
}

pub(crate) fn change_active_model(change: &Change) -> Result<ChangeActiveModel> {
    Ok(ChangeActiveModel {
        id: Set(Uuid::new_v4()),
        project: Set(change.project.clone()),
        change_number: Set(change.change_number),
        change_id: Set(change.change_id.clone()),
        branch: Set(change.branch.clone()),
        status: Set(change.status),
        topic: Set(change.topic.clone()),
        work_in_progress: Set(change.work_in_progress),
        subject: Set(change.subject.clone()),
        message: Set(change.message.clone()),
        current_revision: Set(change.current_revision.clone()),
        insertions: Set(change.insertions),
        deletions: Set(change.deletions),
        owner_name: Set(change.owner_name.clone()),
        owner_email: Set(change.owner_email.clone()),
        created: Set(change.created.fixed_offset()),
        updated: Set(change.updated.fixed_offset()),
        submitted: Set(change.submitted.map(|t| t.fixed_offset())),
        detailed: Set(change.detailed),
        files: Set(to_json(&change.files)?),
        labels: Set(to_json(&change.labels)?),
        messages: Set(to_json(&change.messages)?),
        last_synced_at: Set(change.last_synced_at.fixed_offset()),
    })
}

fn to_change(model: ChangeModel) -> Result<Change> {
    Ok(Change {
        change_number: model.change_number,
        change_id: model.change_id,
        project: model.project,
        branch: model.branch,
        status: model.status,
        topic: model.topic,
        work_in_progress: model.work_in_progress,
        subject: model.subject,
        message: model.message,
        current_revision: model.current_revision,
        insertions: model.insertions,
        deletions: model.deletions,
        owner_name: model.owner_name,
        owner_email: model.owner_email,
        created: model.created.with_timezone(&Utc),
        updated: model.updated.with_timezone(&Utc),
        submitted: model.submitted.map(|t| t.with_timezone(&Utc)),
        last_synced_at: model.last_synced_at.with_timezone(&Utc),
        detailed: model.detailed,
        files: from_json("files", model.files)?,
        labels: from_json("labels", model.labels)?,
        messages: from_json("messages", model.messages)?,
    })
}

fn to_analysis(project: &str, change_number: i64, model: AnalysisResultModel) -> Result<AnalysisResult> {
    Ok(AnalysisResult {
        project: project.to_string(),
        change_number,
        category: model.category,
        summary: model.summary,
        discussion: model.discussion,
        philosophy_notes: model.philosophy_notes,
        insights: from_json("insights", model.insights)?,
        key_changes: from_json("key_changes", model.key_changes)?,
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

#[async_trait]
impl Store for DbStore {
    async fn upsert_changes(&self, changes: &[Change]) -> Result<u64> {
        let (detailed, summary): (Vec<&Change>, Vec<&Change>) = newest_per_change(changes)
            .into_iter()
            .partition(|change| change.detailed);

        let mut written = 0;
        if !detailed.is_empty() {
            written += self
                .insert_changes(&detailed, build_change_on_conflict(true))
                .await?;
        }
        if !summary.is_empty() {
            written += self
                .insert_changes(&summary, build_change_on_conflict(false))
                .await?;
        }
        tracing::debug!(count = changes.len(), written, "Upserted changes");
        Ok(written)
    }

    async fn cursor(&self, project: &str, status: ChangeStatus) -> Result<Option<DateTime<Utc>>> {
        let cursor = SyncCursorEntity::find()
            .filter(SyncCursorColumn::Project.eq(project))
            .filter(SyncCursorColumn::Status.eq(status))
            .one(&self.db)
            .await?;
        Ok(cursor.map(|c| c.position.with_timezone(&Utc)))
    }

    async fn advance_cursor(
        &self,
        project: &str,
        status: ChangeStatus,
        to: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let current = self.cursor(project, status).await?;
        let position = current.map_or(to, |c| c.max(to));
        if current == Some(position) {
            return Ok(position);
        }

        let model = SyncCursorActiveModel {
            id: Set(Uuid::new_v4()),
            project: Set(project.to_string()),
            status: Set(status),
            position: Set(position.fixed_offset()),
            advanced_at: Set(Utc::now().fixed_offset()),
        };
        SyncCursorEntity::insert(model)
            .on_conflict(cursor_on_conflict())
            .exec_without_returning(&self.db)
            .await?;
        Ok(position)
    }

    async fn select_unanalyzed(&self, limit: u64) -> Result<Vec<Change>> {
        ChangeEntity::find()
            .left_join(AnalysisResultEntity)
            .filter(
                Condition::any()
                    .add(AnalysisResultColumn::Id.is_null())
                    .add(
                        Expr::col((AnalysisResultEntity, AnalysisResultColumn::UpdatedAt))
                            .lt(Expr::col((ChangeEntity, ChangeColumn::Updated))),
                    ),
            )
            .order_by_asc(ChangeColumn::Updated)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_change)
            .collect()
    }

    async fn upsert_analysis(&self, result: &AnalysisResult) -> Result<()> {
        let change = self
            .find_change_model(&result.project, result.change_number)
            .await?
            .ok_or_else(|| {
                StoreError::ChangeNotFound(format!("{}~{}", result.project, result.change_number))
            })?;

        let model = AnalysisResultActiveModel {
            id: Set(Uuid::new_v4()),
            change_ref: Set(change.id),
            category: Set(result.category),
            summary: Set(result.summary.clone()),
            discussion: Set(result.discussion.clone()),
            philosophy_notes: Set(result.philosophy_notes.clone()),
            insights: Set(to_json(&result.insights)?),
            key_changes: Set(to_json(&result.key_changes)?),
            updated_at: Set(result.updated_at.fixed_offset()),
        };
        AnalysisResultEntity::insert(model)
            .on_conflict(analysis_on_conflict())
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn find_change(&self, project: &str, change_number: i64) -> Result<Option<Change>> {
        self.find_change_model(project, change_number)
            .await?
            .map(to_change)
            .transpose()
    }

    async fn find_analysis(
        &self,
        project: &str,
        change_number: i64,
    ) -> Result<Option<AnalysisResult>> {
        AnalysisResultEntity::find()
            .inner_join(ChangeEntity)
            .filter(ChangeColumn::Project.eq(project))
            .filter(ChangeColumn::ChangeNumber.eq(change_number))
            .one(&self.db)
            .await?
            .map(|model| to_analysis(project, change_number, model))
            .transpose()
    }

    async fn recent_changes(&self, owner_name: &str, limit: u64) -> Result<Vec<Change>> {
        ChangeEntity::find()
            .filter(ChangeColumn::OwnerName.eq(owner_name))
            .order_by_desc(ChangeColumn::Updated)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_change)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::change;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait, TryIntoModel};

    fn change_model(change: &Change) -> ChangeModel {
        change_active_model(change)
            .expect("serializable")
            .try_into_model()
            .expect("complete model")
    }

    #[tokio::test]
    async fn upsert_of_nothing_touches_nothing() {
        let store = DbStore::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        assert_eq!(store.upsert_changes(&[]).await.expect("upsert"), 0);
        assert!(store.into_connection().into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn detailed_and_summary_rows_use_separate_statements() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([
                MockExecResult {
                    rows_affected: 1,
                    last_insert_id: 0,
                },
                MockExecResult {
                    rows_affected: 1,
                    last_insert_id: 0,
                },
            ])
            .into_connection();
        let store = DbStore::new(db);

        let detailed = change(1, "main", ChangeStatus::Open, 1);
        let mut light = change(2, "main", ChangeStatus::Open, 1);
        light.detailed = false;

        let written = store
            .upsert_changes(&[detailed, light])
            .await
            .expect("upsert");
        assert_eq!(written, 2);

        assert_eq!(store.into_connection().into_transaction_log().len(), 2);
    }

    #[test]
    fn summary_upsert_leaves_detail_columns_alone() {
        let sql = |detailed: bool| {
            ChangeEntity::insert(
                change_active_model(&change(1, "main", ChangeStatus::Open, 0)).expect("model"),
            )
            .on_conflict(build_change_on_conflict(detailed))
            .build(DatabaseBackend::Sqlite)
            .to_string()
        };

        let full = sql(true);
        let summary = sql(false);
        assert!(full.contains(r#"ON CONFLICT ("project", "change_number")"#));
        assert!(full.contains(r#""files" = "excluded"."files""#));
        assert!(!summary.contains(r#""files" = "excluded"."files""#));
        assert!(!summary.contains(r#""message" = "excluded"."message""#));
        assert!(summary.contains(r#""labels" = "excluded"."labels""#));
        assert!(summary.contains(r#""changes"."updated" <= "excluded"."updated""#));
    }

    #[tokio::test]
    async fn cursor_reads_stored_position() {
        let position = change(1, "main", ChangeStatus::Open, 0).created;
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![SyncCursorModel {
                id: Uuid::new_v4(),
                project: "p".into(),
                status: ChangeStatus::Merged,
                position: position.fixed_offset(),
                advanced_at: position.fixed_offset(),
            }]])
            .into_connection();
        let store = DbStore::new(db);

        assert_eq!(
            store.cursor("p", ChangeStatus::Merged).await.expect("read"),
            Some(position)
        );
    }

    #[tokio::test]
    async fn advancing_to_an_older_position_writes_nothing() {
        let position = change(1, "main", ChangeStatus::Open, 0).created;
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![SyncCursorModel {
                id: Uuid::new_v4(),
                project: "p".into(),
                status: ChangeStatus::Open,
                position: position.fixed_offset(),
                advanced_at: position.fixed_offset(),
            }]])
            .into_connection();
        let store = DbStore::new(db);

        let result = store
            .advance_cursor("p", ChangeStatus::Open, position - Duration::days(1))
            .await
            .expect("advance");
        assert_eq!(result, position);
        // Only the read.
        assert_eq!(store.into_connection().into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn find_change_restores_json_columns() {
        let stored = change(7, "release-1.0", ChangeStatus::Merged, 3);
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![change_model(&stored)]])
            .into_connection();
        let store = DbStore::new(db);

        let found = store
            .find_change("platform/core", 7)
            .await
            .expect("query")
            .expect("present");
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn corrupt_json_column_is_invalid_data() {
        let mut model = change_model(&change(7, "main", ChangeStatus::Open, 0));
        model.files = serde_json::json!({"not": "a list"});
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![model]])
            .into_connection();
        let store = DbStore::new(db);

        let err = store
            .find_change("platform/core", 7)
            .await
            .expect_err("corrupt");
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn analysis_for_unknown_change_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<ChangeModel>::new()])
            .into_connection();
        let store = DbStore::new(db);
        let orphan = change(9, "main", ChangeStatus::Open, 0);

        let err = store
            .upsert_analysis(&AnalysisResult::empty_for(
                &orphan,
                crate::change::Category::Other,
                orphan.updated,
            ))
            .await
            .expect_err("unknown change");
        assert!(matches!(err, StoreError::ChangeNotFound(_)));
    }
}
