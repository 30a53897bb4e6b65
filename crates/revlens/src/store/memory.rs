//! In-process store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Result, Store, StoreError, newest_per_change};
use crate::change::{AnalysisResult, Change};
use crate::entity::change_status::ChangeStatus;

type ChangeKey = (String, i64);

#[derive(Default)]
struct State {
    changes: BTreeMap<ChangeKey, Change>,
    cursors: HashMap<(String, ChangeStatus), DateTime<Utc>>,
    analyses: HashMap<ChangeKey, AnalysisResult>,
}

/// A [`Store`] kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.state().changes.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_changes(&self, changes: &[Change]) -> Result<u64> {
        let mut state = self.state();
        let mut written = 0u64;
        for change in newest_per_change(changes) {
            let key = (change.project.clone(), change.change_number);
            let next = match state.changes.get(&key) {
                Some(stored) => stored.merged_with(change),
                None => Some(change.clone()),
            };
            if let Some(next) = next {
                state.changes.insert(key, next);
                written += 1;
            }
        }
        Ok(written)
    }

    async fn cursor(&self, project: &str, status: ChangeStatus) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .state()
            .cursors
            .get(&(project.to_string(), status))
            .copied())
    }

    async fn advance_cursor(
        &self,
        project: &str,
        status: ChangeStatus,
        to: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let mut state = self.state();
        let position = state
            .cursors
            .entry((project.to_string(), status))
            .or_insert(to);
        if *position < to {
            *position = to;
        }
        Ok(*position)
    }

    async fn select_unanalyzed(&self, limit: u64) -> Result<Vec<Change>> {
        let state = self.state();
        let mut pending: Vec<&Change> = state
            .changes
            .iter()
            .filter(|(key, change)| {
                state
                    .analyses
                    .get(*key)
                    .is_none_or(|analysis| analysis.updated_at < change.updated)
            })
            .map(|(_, change)| change)
            .collect();
        pending.sort_by_key(|change| change.updated);
        Ok(pending
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn upsert_analysis(&self, result: &AnalysisResult) -> Result<()> {
        let mut state = self.state();
        let key = (result.project.clone(), result.change_number);
        if !state.changes.contains_key(&key) {
            return Err(StoreError::ChangeNotFound(format!(
                "{}~{}",
                result.project, result.change_number
            )));
        }
        state.analyses.insert(key, result.clone());
        Ok(())
    }

    async fn find_change(&self, project: &str, change_number: i64) -> Result<Option<Change>> {
        Ok(self
            .state()
            .changes
            .get(&(project.to_string(), change_number))
            .cloned())
    }

    async fn find_analysis(
        &self,
        project: &str,
        change_number: i64,
    ) -> Result<Option<AnalysisResult>> {
        Ok(self
            .state()
            .analyses
            .get(&(project.to_string(), change_number))
            .cloned())
    }

    async fn recent_changes(&self, owner_name: &str, limit: u64) -> Result<Vec<Change>> {
        let state = self.state();
        let mut owned: Vec<&Change> = state
            .changes
            .values()
            .filter(|change| change.owner_name == owner_name)
            .collect();
        owned.sort_by(|a, b| b.updated.cmp(&a.updated));
        Ok(owned
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Category;
    use crate::change::fixtures::change;
    use chrono::Duration;

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![
            change(1, "main", ChangeStatus::Open, 1),
            change(2, "main", ChangeStatus::Open, 2),
        ];
        assert_eq!(store.upsert_changes(&batch).await.expect("upsert"), 2);
        store.upsert_changes(&batch).await.expect("upsert");
        assert_eq!(store.change_count(), 2);
    }

    #[tokio::test]
    async fn older_observation_is_ignored() {
        let store = MemoryStore::new();
        store
            .upsert_changes(&[change(1, "main", ChangeStatus::Merged, 10)])
            .await
            .expect("upsert");
        let written = store
            .upsert_changes(&[change(1, "main", ChangeStatus::Open, 5)])
            .await
            .expect("upsert");

        assert_eq!(written, 0);
        let stored = store
            .find_change("platform/core", 1)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, ChangeStatus::Merged);
    }

    #[tokio::test]
    async fn summary_only_observation_keeps_detail() {
        let store = MemoryStore::new();
        let detailed = change(1, "main", ChangeStatus::Open, 1);
        store.upsert_changes(&[detailed.clone()]).await.expect("upsert");

        let mut light = change(1, "main", ChangeStatus::Merged, 2);
        light.detailed = false;
        light.message.clear();
        light.files.clear();
        light.messages.clear();
        store.upsert_changes(&[light]).await.expect("upsert");

        let stored = store
            .find_change("platform/core", 1)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, ChangeStatus::Merged);
        assert!(stored.detailed);
        assert_eq!(stored.message, detailed.message);
        assert_eq!(stored.files, detailed.files);
    }

    #[tokio::test]
    async fn cursor_never_moves_backwards() {
        let store = MemoryStore::new();
        let t = change(1, "main", ChangeStatus::Open, 0).created;

        assert_eq!(store.cursor("p", ChangeStatus::Open).await.expect("read"), None);
        assert_eq!(
            store
                .advance_cursor("p", ChangeStatus::Open, t)
                .await
                .expect("advance"),
            t
        );
        let earlier = t - Duration::hours(1);
        assert_eq!(
            store
                .advance_cursor("p", ChangeStatus::Open, earlier)
                .await
                .expect("advance"),
            t
        );
        assert_eq!(
            store.cursor("p", ChangeStatus::Open).await.expect("read"),
            Some(t)
        );
        assert_eq!(store.cursor("p", ChangeStatus::Merged).await.expect("read"), None);
    }

    #[tokio::test]
    async fn unanalyzed_includes_stale_analyses() {
        let store = MemoryStore::new();
        let first = change(1, "main", ChangeStatus::Open, 1);
        let second = change(2, "main", ChangeStatus::Open, 2);
        store
            .upsert_changes(&[second.clone(), first.clone()])
            .await
            .expect("upsert");

        let pending = store.select_unanalyzed(10).await.expect("select");
        let numbers: Vec<i64> = pending.iter().map(|c| c.change_number).collect();
        assert_eq!(numbers, vec![1, 2]);

        store
            .upsert_analysis(&AnalysisResult::empty_for(&first, Category::Testing, first.updated))
            .await
            .expect("analysis");
        let pending = store.select_unanalyzed(10).await.expect("select");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].change_number, 2);

        let updated = change(1, "main", ChangeStatus::Merged, 30);
        store.upsert_changes(&[updated]).await.expect("upsert");
        let pending = store.select_unanalyzed(1).await.expect("select");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].change_number, 2);
        assert_eq!(store.select_unanalyzed(10).await.expect("select").len(), 2);
    }

    #[tokio::test]
    async fn analysis_requires_a_stored_change() {
        let store = MemoryStore::new();
        let orphan = change(9, "main", ChangeStatus::Open, 0);
        let err = store
            .upsert_analysis(&AnalysisResult::empty_for(&orphan, Category::Other, orphan.updated))
            .await
            .expect_err("unknown change");
        assert!(matches!(err, StoreError::ChangeNotFound(_)));
    }

    #[tokio::test]
    async fn recent_changes_are_newest_first() {
        let store = MemoryStore::new();
        let mut foreign = change(3, "main", ChangeStatus::Open, 9);
        foreign.owner_name = "Someone Else".into();
        store
            .upsert_changes(&[
                change(1, "main", ChangeStatus::Open, 1),
                change(2, "main", ChangeStatus::Open, 5),
                foreign,
            ])
            .await
            .expect("upsert");

        let recent = store.recent_changes("Ada Lovelace", 10).await.expect("recent");
        let numbers: Vec<i64> = recent.iter().map(|c| c.change_number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }
}
