//! Compile progress snapshots and the table that publishes them.
//!
//! The [`JobRunner`](crate::job_runner::JobRunner) is the only writer. Each
//! module has its own slot holding an immutable `Arc<Progress>`; publishing
//! swaps the `Arc`, so a reader holding a snapshot never sees it change.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::names::ModuleName;

/// Compile lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Idle,
    Compiling,
}

/// Point-in-time view of one compile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleName>,
    /// Sub-phase description, e.g. `"publishing output"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Progress {
    pub fn idle() -> Self {
        Self {
            status: ProgressStatus::Idle,
            job_id: None,
            module: None,
            detail: None,
            started_at: None,
        }
    }

    pub fn compiling(job_id: u64, module: ModuleName) -> Self {
        Self {
            status: ProgressStatus::Compiling,
            job_id: Some(job_id),
            module: Some(module),
            detail: None,
            started_at: Some(chrono::Utc::now()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "status": "idle" }))
    }
}

/// Per-module progress slots. An empty slot means the module is idle.
#[derive(Default)]
pub struct ProgressTable {
    slots: RwLock<BTreeMap<ModuleName, Arc<Progress>>>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `progress.module`. Snapshots without a
    /// module are ignored.
    pub async fn publish(&self, progress: Progress) {
        let Some(module) = progress.module.clone() else {
            return;
        };
        self.slots.write().await.insert(module, Arc::new(progress));
    }

    /// Mark `module` idle.
    pub async fn clear(&self, module: &ModuleName) {
        self.slots.write().await.remove(module);
    }

    /// The longest-running in-flight compile, or `None` when idle.
    pub async fn progress_for_compiling_job(&self) -> Option<Arc<Progress>> {
        self.slots
            .read()
            .await
            .values()
            .min_by_key(|p| p.job_id.unwrap_or(u64::MAX))
            .cloned()
    }

}
