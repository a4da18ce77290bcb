//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::compiler::{CompileError, CompileOutput, CompileRequest, Compiler};
use crate::names::ModuleName;
use crate::outbox::Outbox;

pub const TEST_STRONG_NAME: &str = "0123456789ABCDEF0123456789ABCDEF";

pub fn module(name: &str) -> ModuleName {
    ModuleName::parse(name).expect("valid module name")
}

/// Publish a compile whose directory contains `files`, given as paths
/// relative to the compile root (`war/...` or `extras/...`).
pub async fn publish_files(outbox: &Outbox, files: &[(&str, &str)]) {
    let pending = outbox.prepare_compile_dir().await.expect("prepare");
    let root = pending
        .war_dir()
        .parent()
        .expect("compile root")
        .to_path_buf();
    for (relative, content) in files {
        let path = root.join(relative);
        tokio::fs::create_dir_all(path.parent().expect("parent"))
            .await
            .expect("mkdir");
        tokio::fs::write(&path, content).await.expect("write");
    }
    outbox.publish(pending, 1).await;
}

#[derive(Default)]
struct InFlight {
    current: usize,
    max: usize,
}

/// Writes `war/<m>/<m>.nocache.js` containing `compile <n>`, where `n`
/// counts this module's successful compiles. Records concurrency.
#[derive(Default)]
pub struct FakeCompiler {
    delay: Duration,
    fail_next: AtomicBool,
    total: AtomicUsize,
    successes: Mutex<HashMap<ModuleName, usize>>,
    per_module: Mutex<HashMap<ModuleName, InFlight>>,
    overall: Mutex<InFlight>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn total_compiles(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self, name: &str) -> usize {
        self.per_module
            .lock()
            .unwrap()
            .get(&module(name))
            .map_or(0, |f| f.max)
    }

    pub fn max_concurrent_overall(&self) -> usize {
        self.overall.lock().unwrap().max
    }

    fn enter(&self, module: &ModuleName) {
        let mut per_module = self.per_module.lock().unwrap();
        let entry = per_module.entry(module.clone()).or_default();
        entry.current += 1;
        entry.max = entry.max.max(entry.current);

        let mut overall = self.overall.lock().unwrap();
        overall.current += 1;
        overall.max = overall.max.max(overall.current);
    }

    fn exit(&self, module: &ModuleName) {
        if let Some(entry) = self.per_module.lock().unwrap().get_mut(module) {
            entry.current -= 1;
        }
        self.overall.lock().unwrap().current -= 1;
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileError> {
        self.enter(&request.module);
        self.total.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let result = if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(CompileError::Failed {
                exit_code: 1,
                log: "[ERROR] fake failure\n".to_string(),
            })
        } else {
            let n = {
                let mut successes = self.successes.lock().unwrap();
                let count = successes.entry(request.module.clone()).or_default();
                *count += 1;
                *count
            };
            let name = request.module.as_str();
            let dir = request.war_dir.join(name);
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(dir.join(format!("{name}.nocache.js")), format!("compile {n}"))
                .await?;
            tokio::fs::write(dir.join(format!("{TEST_STRONG_NAME}.cache.js")), "cached").await?;
            Ok(CompileOutput {
                log: format!("[INFO] compiled {name}\n"),
                permutations: 1,
            })
        };

        self.exit(&request.module);
        result
    }
}
