//! The compiler boundary.
//!
//! [`Compiler`] is the seam the job runner drives. [`CommandCompiler`] runs
//! an external program as a subprocess, passing the module, the output
//! directories and the binding properties on the command line, and
//! capturing its stdout/stderr as the compile log.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::names::{BindingProperties, ModuleName};
use crate::paths::cache_js_strong_name;

/// Maximum log bytes captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Everything a compiler needs for one run.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub job_id: u64,
    pub module: ModuleName,
    pub bindings: BindingProperties,
    /// Fresh, empty directory that receives the servable output.
    pub war_dir: PathBuf,
    /// Fresh, empty directory for auxiliary output (policy manifests,
    /// source maps).
    pub extras_dir: PathBuf,
}

/// Result of a successful compile.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub log: String,
    /// Number of distinct `<strong name>.cache.js` files produced.
    pub permutations: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("compiler exited with code {exit_code}")]
    Failed { exit_code: i32, log: String },

    #[error("cannot run compiler: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Compiler output captured before the failure, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            Self::Failed { log, .. } => Some(log),
            Self::Io(_) => None,
        }
    }
}

#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileError>;
}

/// Runs `program args... --module <m> --war <dir> --extras <dir>
/// [--set name=value]...`. Exit status 0 means success.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn build_command(&self, request: &CompileRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--module")
            .arg(request.module.as_str())
            .arg("--war")
            .arg(&request.war_dir)
            .arg("--extras")
            .arg(&request.extras_dir);
        for (name, value) in request.bindings.iter() {
            cmd.arg("--set").arg(format!("{name}={value}"));
        }
        cmd
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileError> {
        let mut cmd = self.build_command(request);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(read_stream(stdout));
        let stderr_task = tokio::spawn(read_stream(stderr));

        let status = child.wait().await?;

        let mut log = stdout_task.await.unwrap_or_default();
        log.extend(stderr_task.await.unwrap_or_default());
        let log = String::from_utf8_lossy(&log).into_owned();

        if !status.success() {
            return Err(CompileError::Failed {
                exit_code: status.code().unwrap_or(-1),
                log,
            });
        }

        let permutations = count_permutations(&request.war_dir, &request.module).await;
        Ok(CompileOutput { log, permutations })
    }
}

/// Count `<STRONG_NAME>.cache.js` files in `war_dir/<module>/`.
pub async fn count_permutations(war_dir: &Path, module: &ModuleName) -> u32 {
    let Ok(mut entries) = tokio::fs::read_dir(war_dir.join(module.as_str())).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            if cache_js_strong_name(&format!("/{name}")).is_some() {
                count += 1;
            }
        }
    }
    count
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

#[cfg(all(test, unix))]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_helpers::module;

    const HASH: &str = "0123456789ABCDEF0123456789ABCDEF";

    fn request(dir: &tempfile::TempDir, bindings: BindingProperties) -> CompileRequest {
        let war_dir = dir.path().join("war");
        let extras_dir = dir.path().join("extras");
        std::fs::create_dir_all(&war_dir).unwrap();
        std::fs::create_dir_all(&extras_dir).unwrap();
        CompileRequest {
            job_id: 1,
            module: module("hello"),
            bindings,
            war_dir,
            extras_dir,
        }
    }

    /// `sh -c <script> sh ...` so the appended flags land in `$1..$n`.
    fn shell(script: &str) -> CommandCompiler {
        CommandCompiler::new("sh", vec!["-c".into(), script.into(), "sh".into()])
    }

    #[tokio::test]
    async fn success_captures_log_and_counts_permutations() {
        let dir = tempfile::tempdir().unwrap();
        let bindings = BindingProperties::from_query([("user.agent", "safari")]);
        let compiler = shell(&format!(
            r#"mkdir -p "$4/$2" && touch "$4/$2/{HASH}.cache.js" "$4/$2/$2.nocache.js" && echo "compiled $2 with $8""#
        ));

        let output = compiler.compile(&request(&dir, bindings)).await.unwrap();

        assert!(output.log.contains("compiled hello with user.agent=safari"));
        assert_eq!(output.permutations, 1);
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure_with_log() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = shell("echo '[ERROR] boom' >&2; exit 3");

        let err = compiler
            .compile(&request(&dir, BindingProperties::default()))
            .await
            .unwrap_err();

        assert_matches!(err, CompileError::Failed { exit_code: 3, .. });
        assert!(err.log().unwrap().contains("[ERROR] boom"));
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = CommandCompiler::new("/nonexistent/compiler", Vec::new());

        let err = compiler
            .compile(&request(&dir, BindingProperties::default()))
            .await
            .unwrap_err();

        assert_matches!(err, CompileError::Io(_));
        assert!(err.log().is_none());
    }
}
