//! Registry of every module's [`Outbox`], fixed at startup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::CoreError;
use crate::names::ModuleName;
use crate::outbox::{Outbox, ResolvedFile};

/// Location of the RPC policy manifest inside a compile's extras directory.
pub const POLICY_MANIFEST_PATH: &str = "rpcPolicyManifest/manifest.txt";

const POLICY_FILE_SUFFIX: &str = ".gwt.rpc";

/// One `service, policy file` line of a policy manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    pub service_name: String,
    pub policy_file: String,
}

#[derive(Debug)]
pub struct OutboxTable {
    names: Vec<ModuleName>,
    outboxes: HashMap<ModuleName, Arc<Outbox>>,
    config: Value,
}

impl OutboxTable {
    /// Create one outbox per module under `work_dir`. Order is kept.
    pub async fn create(modules: &[ModuleName], work_dir: &Path) -> Result<Self, CoreError> {
        let mut names = Vec::with_capacity(modules.len());
        let mut outboxes = HashMap::with_capacity(modules.len());

        for module in modules {
            if outboxes.contains_key(module) {
                return Err(CoreError::Validation(format!(
                    "module listed twice: {module}"
                )));
            }
            let outbox = Outbox::create(module.clone(), work_dir).await?;
            outboxes.insert(module.clone(), Arc::new(outbox));
            names.push(module.clone());
        }

        let config = json!({
            "moduleNames": names,
            "serverVersion": env!("CARGO_PKG_VERSION"),
        });

        Ok(Self {
            names,
            outboxes,
            config,
        })
    }

    /// Look up a module by its raw name. Malformed names are simply absent.
    pub fn find_by_module_name(&self, name: &str) -> Option<Arc<Outbox>> {
        let name = ModuleName::parse(name).ok()?;
        self.outboxes.get(&name).cloned()
    }

    /// Module names in configuration order.
    pub fn module_names(&self) -> &[ModuleName] {
        &self.names
    }

    /// Outboxes in configuration order.
    pub fn outboxes(&self) -> impl Iterator<Item = &Arc<Outbox>> {
        self.names.iter().filter_map(|name| self.outboxes.get(name))
    }

    /// Global front-end configuration. A fresh copy the caller may extend.
    pub fn config(&self) -> Value {
        self.config.clone()
    }

    /// Find `<file>.gwt.rpc` in any module's current output.
    pub async fn find_policy_file(&self, file_name: &str) -> Result<ResolvedFile, CoreError> {
        if file_name.contains('/') || !file_name.ends_with(POLICY_FILE_SUFFIX) {
            return Err(CoreError::not_found("PolicyFile", file_name));
        }

        for outbox in self.outboxes() {
            let candidate = format!("{}/{file_name}", outbox.module_name());
            if let Ok(path) = outbox.find_file(&candidate).await {
                return Ok(path);
            }
        }

        Err(CoreError::not_found("PolicyFile", file_name))
    }

    /// Parsed policy manifests for every module that has one.
    pub async fn policy_manifests(&self) -> Vec<(ModuleName, Vec<PolicyEntry>)> {
        let mut manifests = Vec::new();
        for outbox in self.outboxes() {
            let Ok(path) = outbox.find_extra_file(POLICY_MANIFEST_PATH).await else {
                continue;
            };
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    manifests.push((outbox.module_name().clone(), parse_policy_manifest(&text)));
                }
                Err(e) => {
                    tracing::warn!(
                        module = %outbox.module_name(),
                        error = %e,
                        "Failed to read policy manifest",
                    );
                }
            }
        }
        manifests
    }
}

/// Parse manifest lines of the form `service.Name, POLICY.gwt.rpc`.
/// Blank lines, `#` comments and short lines are skipped.
pub fn parse_policy_manifest(text: &str) -> Vec<PolicyEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(", ");
            let service_name = fields.next()?;
            let policy_file = fields.next()?;
            Some(PolicyEntry {
                service_name: service_name.to_string(),
                policy_file: policy_file.to_string(),
            })
        })
        .collect()
}
