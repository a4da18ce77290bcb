//! Per-module compiled-artifact area.
//!
//! Each compile writes into a fresh numbered directory under the module's
//! root. Once the compile succeeds, the [`Outbox`] swaps its `current`
//! pointer to the new [`CompileDir`] in one step, so readers resolve paths
//! against either the complete old output or the complete new output.
//!
//! ```text
//! <work_dir>/<module>/
//!     compile.log
//!     compile-1/war/...
//!     compile-1/extras/...
//!     compile-2/...
//! ```
//!
//! A [`ResolvedFile`] keeps its compile directory alive, and pruning skips
//! any replaced directory that is still held.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::names::ModuleName;

const COMPILE_DIR_PREFIX: &str = "compile-";
const COMPILE_LOG_NAME: &str = "compile.log";

/// The output of one successful compile. Immutable once published.
#[derive(Debug)]
pub struct CompileDir {
    id: u64,
    war: PathBuf,
    extras: PathBuf,
    permutations: u32,
}

impl CompileDir {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn extras_dir(&self) -> &Path {
        &self.extras
    }

    /// Resolve a request path such as `/hello/hello.nocache.js` against
    /// this compile's war directory.
    pub async fn find_file(
        self: &Arc<Self>,
        request_path: &str,
    ) -> Result<ResolvedFile, CoreError> {
        let path = resolve_file(&self.war, request_path).await?;
        Ok(self.hold(path))
    }

    /// Resolve a path relative to this compile's extras directory, e.g.
    /// `rpcPolicyManifest/manifest.txt`.
    pub async fn find_extra_file(
        self: &Arc<Self>,
        relative: &str,
    ) -> Result<ResolvedFile, CoreError> {
        let path = resolve_file(&self.extras, relative).await?;
        Ok(self.hold(path))
    }

    fn hold(self: &Arc<Self>, path: PathBuf) -> ResolvedFile {
        ResolvedFile {
            path,
            compile: Arc::clone(self),
        }
    }
}

/// A file inside a published compile. The compile directory is not pruned
/// while any `ResolvedFile` pointing into it is alive.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    path: PathBuf,
    compile: Arc<CompileDir>,
}

impl ResolvedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compile_id(&self) -> u64 {
        self.compile.id
    }
}

impl AsRef<Path> for ResolvedFile {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl PartialEq for ResolvedFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ResolvedFile {}

/// A directory being written by an in-flight compile. Not visible to readers.
#[derive(Debug)]
pub struct PendingCompile {
    id: u64,
    root: PathBuf,
    war: PathBuf,
    extras: PathBuf,
}

impl PendingCompile {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn war_dir(&self) -> &Path {
        &self.war
    }

    pub fn extras_dir(&self) -> &Path {
        &self.extras
    }
}

#[derive(Debug)]
pub struct Outbox {
    module: ModuleName,
    root: PathBuf,
    current: RwLock<Option<Arc<CompileDir>>>,
    /// Compiles replaced by a later publish, tracked so `prune` can tell
    /// whether a reader still holds one.
    retired: Mutex<Vec<Weak<CompileDir>>>,
    next_id: AtomicU64,
}

impl Outbox {
    /// Create the module's root directory under `work_dir`.
    ///
    /// Compile numbering continues after any directories left by a previous
    /// run, but those directories are never served.
    pub async fn create(module: ModuleName, work_dir: &Path) -> Result<Self, CoreError> {
        let root = work_dir.join(module.as_str());
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| CoreError::Internal(format!("cannot create {}: {e}", root.display())))?;

        let last_id = list_compile_ids(&root).await.into_iter().max().unwrap_or(0);

        Ok(Self {
            module,
            root,
            current: RwLock::new(None),
            retired: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(last_id + 1),
        })
    }

    pub fn module_name(&self) -> &ModuleName {
        &self.module
    }

    /// Path of the most recent compile log. A concurrent recompile may
    /// overwrite it while it is being read.
    pub fn compile_log(&self) -> PathBuf {
        self.root.join(COMPILE_LOG_NAME)
    }

    /// Snapshot of the published output, if any compile has succeeded.
    pub async fn current(&self) -> Option<Arc<CompileDir>> {
        self.current.read().await.clone()
    }

    pub async fn war_dir(&self) -> Option<PathBuf> {
        self.current().await.map(|dir| dir.war.clone())
    }

    /// Resolve a request path such as `/hello/hello.nocache.js` against the
    /// current war directory.
    pub async fn find_file(&self, request_path: &str) -> Result<ResolvedFile, CoreError> {
        let dir = self
            .current()
            .await
            .ok_or_else(|| CoreError::not_found("OutputFile", request_path))?;
        dir.find_file(request_path).await
    }

    /// Resolve a path relative to the current extras directory, e.g.
    /// `rpcPolicyManifest/manifest.txt`.
    pub async fn find_extra_file(&self, relative: &str) -> Result<ResolvedFile, CoreError> {
        let dir = self
            .current()
            .await
            .ok_or_else(|| CoreError::not_found("ExtraFile", relative))?;
        dir.find_extra_file(relative).await
    }

    /// Per-module values for the module page.
    pub async fn template_variables(&self) -> Value {
        match self.current().await {
            Some(dir) => json!({
                "moduleName": self.module,
                "compileId": dir.id,
                "permutations": dir.permutations,
                "warDir": dir.war.display().to_string(),
            }),
            None => json!({
                "moduleName": self.module,
                "compileId": null,
                "permutations": null,
                "warDir": null,
            }),
        }
    }

    /// Allocate a fresh, empty compile directory.
    pub(crate) async fn prepare_compile_dir(&self) -> Result<PendingCompile, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let root = self.root.join(format!("{COMPILE_DIR_PREFIX}{id}"));
        let war = root.join("war");
        let extras = root.join("extras");

        for dir in [&war, &extras] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                CoreError::Internal(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        Ok(PendingCompile {
            id,
            root,
            war,
            extras,
        })
    }

    /// Make `pending` the served output.
    pub(crate) async fn publish(&self, pending: PendingCompile, permutations: u32) {
        let next = Arc::new(CompileDir {
            id: pending.id,
            war: pending.war,
            extras: pending.extras,
            permutations,
        });
        let previous = self.current.write().await.replace(next);
        if let Some(previous) = previous {
            self.retired_dirs().push(Arc::downgrade(&previous));
        }
    }

    /// Remove the directory of a compile that will never be published.
    pub(crate) async fn discard(&self, pending: PendingCompile) {
        if let Err(e) = tokio::fs::remove_dir_all(&pending.root).await {
            tracing::warn!(
                module = %self.module,
                dir = %pending.root.display(),
                error = %e,
                "Failed to remove abandoned compile directory",
            );
        }
    }

    /// Delete old compile directories, keeping the current one plus up to
    /// `keep - 1` predecessors. A directory some reader still holds through a
    /// [`ResolvedFile`] or a [`current`](Self::current) snapshot is skipped
    /// and retried on the next prune.
    pub async fn prune(&self, keep: usize) {
        let Some(current) = self.current().await else {
            return;
        };
        let in_use = self.held_compile_ids();

        let mut older: Vec<u64> = list_compile_ids(&self.root)
            .await
            .into_iter()
            .filter(|id| *id < current.id)
            .collect();
        older.sort_unstable_by(|a, b| b.cmp(a));

        for id in older.into_iter().skip(keep.saturating_sub(1)) {
            if in_use.contains(&id) {
                tracing::debug!(
                    module = %self.module,
                    compile_id = id,
                    "Compile directory still in use, not pruned",
                );
                continue;
            }
            let dir = self.root.join(format!("{COMPILE_DIR_PREFIX}{id}"));
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    tracing::debug!(module = %self.module, compile_id = id, "Pruned compile directory");
                }
                Err(e) => {
                    tracing::warn!(
                        module = %self.module,
                        dir = %dir.display(),
                        error = %e,
                        "Failed to prune compile directory",
                    );
                }
            }
        }
    }

    /// Ids of replaced compiles that are still referenced somewhere.
    fn held_compile_ids(&self) -> HashSet<u64> {
        let mut retired = self.retired_dirs();
        retired.retain(|dir| dir.strong_count() > 0);
        retired.iter().filter_map(Weak::upgrade).map(|dir| dir.id).collect()
    }

    fn retired_dirs(&self) -> MutexGuard<'_, Vec<Weak<CompileDir>>> {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Join `relative` onto `base`, refusing anything that is not a plain
/// relative path of normal components, and require a regular file.
async fn resolve_file(base: &Path, relative: &str) -> Result<PathBuf, CoreError> {
    let path = resolve_under(base, relative)
        .ok_or_else(|| CoreError::not_found("File", relative))?;

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(CoreError::not_found("File", relative)),
    }
}

/// Lexically resolve `relative` beneath `base`. A leading `/` is allowed.
pub fn resolve_under(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() || relative.contains('\\') {
        return None;
    }

    let rel = Path::new(relative);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }

    let joined = base.join(rel);
    joined.starts_with(base).then_some(joined)
}

async fn list_compile_ids(root: &Path) -> Vec<u64> {
    let mut ids = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(root).await else {
        return ids;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if let Some(id) = name
            .to_str()
            .and_then(|n| n.strip_prefix(COMPILE_DIR_PREFIX))
            .and_then(|n| n.parse::<u64>().ok())
        {
            ids.push(id);
        }
    }
    ids
}
