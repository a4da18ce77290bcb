#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use codeserver_api::config::ServerConfig;
use codeserver_api::router::build_app_router;
use codeserver_api::state::AppState;
use codeserver_core::compiler::{CompileError, CompileOutput, CompileRequest, Compiler};
use codeserver_core::job_runner::JobRunner;
use codeserver_core::names::ModuleName;
use codeserver_core::outbox_table::OutboxTable;
use codeserver_core::progress::ProgressTable;

pub const STRONG_NAME: &str = "0123456789ABCDEF0123456789ABCDEF";
pub const POLICY_FILE: &str = "FEDCBA9876543210FEDCBA9876543210.gwt.rpc";

/// Stand-in compiler producing a small but complete output set per module:
///
/// - `war/<m>/<m>.nocache.js` containing `compile <n>`
/// - `war/<m>/<STRONG_NAME>.cache.js`
/// - `war/<m>/deferred.js.gz` (only a compressed variant)
/// - `war/<m>/<POLICY_FILE>` and its manifest under `extras/`
/// - `extras/symbolMaps/<STRONG_NAME>_sourceMap0.json`
#[derive(Default)]
pub struct FakeCompiler {
    delay: Mutex<Duration>,
    fail_next: AtomicBool,
    compiles: AtomicUsize,
    last_bindings: Mutex<HashMap<String, String>>,
}

impl FakeCompiler {
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn last_bindings(&self) -> HashMap<String, String> {
        self.last_bindings.lock().unwrap().clone()
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileError> {
        let delay = *self.delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        *self.last_bindings.lock().unwrap() = request
            .bindings
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CompileError::Failed {
                exit_code: 1,
                log: "[INFO] starting\n[ERROR] Line 3: cannot resolve <Foo>\n".to_string(),
            });
        }

        let n = self.compiles.fetch_add(1, Ordering::SeqCst) + 1;
        let name = request.module.as_str();

        let war = request.war_dir.join(name);
        tokio::fs::create_dir_all(&war).await?;
        tokio::fs::write(war.join(format!("{name}.nocache.js")), format!("compile {n}")).await?;
        tokio::fs::write(war.join(format!("{STRONG_NAME}.cache.js")), "cached();").await?;
        tokio::fs::write(war.join("deferred.js.gz"), [0x1f, 0x8b, 0x08, 0x00]).await?;
        tokio::fs::write(war.join(POLICY_FILE), "policy").await?;

        let manifest_dir = request.extras_dir.join("rpcPolicyManifest");
        tokio::fs::create_dir_all(&manifest_dir).await?;
        tokio::fs::write(
            manifest_dir.join("manifest.txt"),
            format!("# services\ncom.example.GreetingService, {POLICY_FILE}\n"),
        )
        .await?;

        let maps_dir = request.extras_dir.join("symbolMaps");
        tokio::fs::create_dir_all(&maps_dir).await?;
        tokio::fs::write(
            maps_dir.join(format!("{STRONG_NAME}_sourceMap0.json")),
            r#"{"version":3}"#,
        )
        .await?;

        Ok(CompileOutput {
            log: format!("[INFO] compiled {name}\n"),
            permutations: 1,
        })
    }
}

/// A running application backed by a scratch directory.
pub struct TestApp {
    pub router: Router,
    pub compiler: Arc<FakeCompiler>,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Run the startup compile for every module.
    pub async fn compile_all(&self) {
        for (module, result) in self.state.runner.compile_all().await {
            assert!(result.is_ok(), "compile of {module} failed");
        }
    }
}

/// Build a test `ServerConfig` rooted in `dir`.
pub fn test_config(dir: &TempDir, modules: &[&str]) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        modules: modules
            .iter()
            .map(|m| ModuleName::parse(m).unwrap())
            .collect(),
        work_dir: dir.path().join("work"),
        compiler_command: "unused".to_string(),
        compiler_args: Vec::new(),
        source_dirs: vec![source_root(dir)],
        max_recompile_waiters: 4,
        keep_compiles: 2,
        precompile: false,
    }
}

fn source_root(dir: &TempDir) -> PathBuf {
    dir.path().join("src")
}

/// Build the full application router with the same middleware stack as
/// production, a fake compiler, and a source root containing
/// `com/example/GreetingService.java`.
pub async fn build_test_app(modules: &[&str]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, modules);

    let java = source_root(&dir).join("com/example");
    std::fs::create_dir_all(&java).unwrap();
    std::fs::write(java.join("GreetingService.java"), "interface GreetingService {}").unwrap();

    let outboxes = Arc::new(
        OutboxTable::create(&config.modules, &config.work_dir)
            .await
            .unwrap(),
    );
    let progress = Arc::new(ProgressTable::new());
    let compiler = Arc::new(FakeCompiler::default());
    let runner = JobRunner::start(
        compiler.clone(),
        &outboxes,
        Arc::clone(&progress),
        config.keep_compiles,
    );

    let state = AppState::new(Arc::new(config), outboxes, progress, runner);
    let router = build_app_router(state.clone());

    TestApp {
        router,
        compiler,
        state,
        _dir: dir,
    }
}

/// Collect a response body as a UTF-8 string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Value of a response header, if present and ASCII.
pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
