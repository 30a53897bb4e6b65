//! Scripted change source for sync tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::change::Change;
use crate::entity::change_status::ChangeStatus;
use crate::gerrit::{ChangeQuery, ChangeSource, GerritError};

/// Serves slices of a fixed per-status item list according to `n`/`S`,
/// or a scripted error for a status.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    items: Mutex<HashMap<ChangeStatus, Vec<Change>>>,
    failures: Mutex<HashMap<ChangeStatus, fn() -> GerritError>>,
    queries: Mutex<Vec<ChangeQuery>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(self, status: ChangeStatus, items: Vec<Change>) -> Self {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(status, items);
        self
    }

    pub fn failing(self, status: ChangeStatus, error: fn() -> GerritError) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(status, error);
        self
    }

    pub fn queries(&self) -> Vec<ChangeQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn queries_for(&self, status: ChangeStatus) -> Vec<ChangeQuery> {
        self.queries()
            .into_iter()
            .filter(|q| status_of(q) == Some(status))
            .collect()
    }
}

fn status_of(query: &ChangeQuery) -> Option<ChangeStatus> {
    query
        .query
        .split_whitespace()
        .find_map(|term| term.strip_prefix("status:"))
        .and_then(|s| s.parse().ok())
}

#[async_trait]
impl ChangeSource for ScriptedSource {
    async fn query_changes(
        &self,
        query: &ChangeQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, GerritError> {
        if cancel.is_cancelled() {
            return Err(GerritError::Cancelled);
        }
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.clone());

        let status = status_of(query).expect("query carries a status term");
        if let Some(error) = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&status)
        {
            return Err(error());
        }

        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let all = items.get(&status).map(Vec::as_slice).unwrap_or_default();
        let start = (query.start as usize).min(all.len());
        let end = (start + query.limit as usize).min(all.len());
        Ok(all[start..end].to_vec())
    }
}
