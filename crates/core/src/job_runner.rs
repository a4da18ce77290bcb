//! Recompile scheduling.
//!
//! Every module gets one long-lived worker task fed by an unbounded queue.
//! Jobs for the same module therefore run strictly one at a time, in
//! submission order; jobs for different modules run concurrently on their
//! own workers. A submitted job always runs to completion, even if its
//! waiter goes away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::compiler::{CompileRequest, Compiler};
use crate::job::{Job, JobHandle, JobResult};
use crate::names::{BindingProperties, ModuleName};
use crate::outbox::Outbox;
use crate::outbox_table::OutboxTable;
use crate::progress::{Progress, ProgressTable};

struct QueuedJob {
    id: u64,
    job: Job,
}

pub struct JobRunner {
    queues: HashMap<ModuleName, mpsc::UnboundedSender<QueuedJob>>,
    next_job_id: AtomicU64,
}

impl JobRunner {
    /// Spawn one worker per module in `outboxes`.
    ///
    /// `keep_compiles` is how many compile directories each module retains,
    /// including the one being served.
    pub fn start(
        compiler: Arc<dyn Compiler>,
        outboxes: &OutboxTable,
        progress: Arc<ProgressTable>,
        keep_compiles: usize,
    ) -> Arc<Self> {
        let mut queues = HashMap::new();

        for outbox in outboxes.outboxes() {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = ModuleWorker {
                outbox: Arc::clone(outbox),
                compiler: Arc::clone(&compiler),
                progress: Arc::clone(&progress),
                keep_compiles: keep_compiles.max(1),
            };
            tokio::spawn(worker.run(rx));
            queues.insert(outbox.module_name().clone(), tx);
        }

        tracing::info!(modules = queues.len(), "Job runner started");

        Arc::new(Self {
            queues,
            next_job_id: AtomicU64::new(1),
        })
    }

    /// Queue `job` behind any jobs already queued for its module. Returns
    /// the assigned job id. Jobs for unknown modules fail immediately.
    pub fn submit(&self, job: Job) -> u64 {
        let id = self.next_job_id.fetch_add(1, Ordering::SeqCst);

        let Some(queue) = self.queues.get(job.module()) else {
            let module = job.module().clone();
            tracing::warn!(job_id = id, %module, "Job submitted for unknown module");
            let (_, _, _, resolver) = job.into_parts();
            resolver.resolve(JobResult::failed(format!("unknown module: {module}")));
            return id;
        };

        if let Err(mpsc::error::SendError(queued)) = queue.send(QueuedJob { id, job }) {
            tracing::error!(job_id = id, "Module worker is gone; failing job");
            let (_, _, _, resolver) = queued.job.into_parts();
            resolver.resolve(JobResult::failed("job runner is shut down"));
        } else {
            tracing::debug!(job_id = id, "Job queued");
        }

        id
    }

    /// Compile every module once with default binding properties and wait
    /// for all of them.
    pub async fn compile_all(&self) -> Vec<(ModuleName, JobResult)> {
        let mut modules: Vec<&ModuleName> = self.queues.keys().collect();
        modules.sort();

        let handles: Vec<(ModuleName, JobHandle)> = modules
            .into_iter()
            .map(|module| {
                let span = tracing::info_span!("precompile", %module);
                let (job, handle) = Job::new(module.clone(), BindingProperties::default(), span);
                self.submit(job);
                (module.clone(), handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (module, handle) in handles {
            results.push((module, handle.wait_for_result().await));
        }
        results
    }
}

/// Owns the compile lifecycle of one module.
struct ModuleWorker {
    outbox: Arc<Outbox>,
    compiler: Arc<dyn Compiler>,
    progress: Arc<ProgressTable>,
    keep_compiles: usize,
}

impl ModuleWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<QueuedJob>) {
        while let Some(QueuedJob { id, job }) = rx.recv().await {
            let (module, bindings, span, resolver) = job.into_parts();
            let result = self.process(id, module, bindings).instrument(span).await;
            resolver.resolve(result);
        }
        tracing::debug!(module = %self.outbox.module_name(), "Module worker stopped");
    }

    async fn process(
        &self,
        job_id: u64,
        module: ModuleName,
        bindings: BindingProperties,
    ) -> JobResult {
        tracing::info!(job_id, %module, bindings = ?bindings, "Compile started");
        let progress = Progress::compiling(job_id, module.clone());
        self.progress
            .publish(progress.clone().with_detail("preparing"))
            .await;

        let result = self.compile(&progress, job_id, &module, bindings).await;

        self.progress.clear(&module).await;
        result
    }

    async fn compile(
        &self,
        progress: &Progress,
        job_id: u64,
        module: &ModuleName,
        bindings: BindingProperties,
    ) -> JobResult {
        let pending = match self.outbox.prepare_compile_dir().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(job_id, %module, error = %e, "Cannot prepare compile directory");
                return JobResult::failed(e.to_string());
            }
        };

        self.progress
            .publish(progress.clone().with_detail("compiling"))
            .await;

        let request = CompileRequest {
            job_id,
            module: module.clone(),
            bindings,
            war_dir: pending.war_dir().to_path_buf(),
            extras_dir: pending.extras_dir().to_path_buf(),
        };

        let started = Instant::now();
        match self.compiler.compile(&request).await {
            Ok(output) => {
                self.write_log(&output.log).await;
                self.progress
                    .publish(progress.clone().with_detail("publishing output"))
                    .await;

                let compile_id = pending.id();
                self.outbox.publish(pending, output.permutations).await;
                self.outbox.prune(self.keep_compiles).await;

                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    job_id,
                    %module,
                    compile_id,
                    permutations = output.permutations,
                    elapsed_ms,
                    "Compile succeeded",
                );
                JobResult::succeeded(format!("compiled {module} in {elapsed_ms}ms"))
            }
            Err(e) => {
                let log = e.log().map(str::to_string).unwrap_or_else(|| e.to_string());
                self.write_log(&log).await;
                self.outbox.discard(pending).await;

                tracing::error!(job_id, %module, error = %e, "Compile failed");
                JobResult::failed(e.to_string())
            }
        }
    }

    async fn write_log(&self, log: &str) {
        let path = self.outbox.compile_log();
        if let Err(e) = tokio::fs::write(&path, log).await {
            tracing::warn!(
                module = %self.outbox.module_name(),
                path = %path.display(),
                error = %e,
                "Failed to write compile log",
            );
        }
    }
}
