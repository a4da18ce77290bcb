use std::sync::Arc;

use codeserver_core::job_runner::JobRunner;
use codeserver_core::outbox_table::OutboxTable;
use codeserver_core::progress::ProgressTable;
use codeserver_core::source_handler::SourceHandler;
use tokio::sync::Semaphore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registered modules and their published output.
    pub outboxes: Arc<OutboxTable>,
    /// In-flight compile status, read by `/progress`.
    pub progress: Arc<ProgressTable>,
    /// Per-module compile queues.
    pub runner: Arc<JobRunner>,
    /// Serves `/sourcemaps/`.
    pub sources: Arc<SourceHandler>,
    /// Bounds how many recompile requests may wait on a job at once.
    pub recompile_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        config: Arc<ServerConfig>,
        outboxes: Arc<OutboxTable>,
        progress: Arc<ProgressTable>,
        runner: Arc<JobRunner>,
    ) -> Self {
        let sources = Arc::new(SourceHandler::new(
            Arc::clone(&outboxes),
            config.source_dirs.clone(),
        ));
        let recompile_permits = Arc::new(Semaphore::new(config.max_recompile_waiters));
        Self {
            config,
            outboxes,
            progress,
            runner,
            sources,
            recompile_permits,
        }
    }
}
