//! A single recompile request and the handle its submitter waits on.

use tokio::sync::oneshot;
use tracing::Span;

use crate::names::{BindingProperties, ModuleName};

/// Pass/fail outcome of a job plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    ok: bool,
    message: String,
}

impl JobResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `"ok"` or `"failed"`, as reported to HTTP clients.
    pub fn status(&self) -> &'static str {
        if self.ok {
            "ok"
        } else {
            "failed"
        }
    }
}

/// A recompile of one module with a set of binding properties.
///
/// Consumed by [`JobRunner::submit`](crate::job_runner::JobRunner::submit);
/// the paired [`JobHandle`] receives the result.
#[derive(Debug)]
pub struct Job {
    module: ModuleName,
    bindings: BindingProperties,
    span: Span,
    result_tx: oneshot::Sender<JobResult>,
}

impl Job {
    /// Create a job. Log output of the compile is recorded inside `span`.
    pub fn new(module: ModuleName, bindings: BindingProperties, span: Span) -> (Self, JobHandle) {
        let (result_tx, result_rx) = oneshot::channel();
        let job = Self {
            module,
            bindings,
            span,
            result_tx,
        };
        (job, JobHandle { result_rx })
    }

    pub fn module(&self) -> &ModuleName {
        &self.module
    }

    /// Split into the parts the runner needs.
    pub(crate) fn into_parts(self) -> (ModuleName, BindingProperties, Span, JobResolver) {
        (
            self.module,
            self.bindings,
            self.span,
            JobResolver {
                result_tx: self.result_tx,
            },
        )
    }
}

/// Write side of a job's result slot. Resolving consumes it.
#[derive(Debug)]
pub(crate) struct JobResolver {
    result_tx: oneshot::Sender<JobResult>,
}

impl JobResolver {
    pub(crate) fn resolve(self, result: JobResult) {
        // The waiter may have gone away (client disconnected).
        let _ = self.result_tx.send(result);
    }
}

/// Read side of a job's result slot.
#[derive(Debug)]
pub struct JobHandle {
    result_rx: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    /// Wait until the job finishes. A job dropped without a result counts
    /// as failed.
    pub async fn wait_for_result(self) -> JobResult {
        self.result_rx
            .await
            .unwrap_or_else(|_| JobResult::failed("job was dropped before completing"))
    }
}
