//! Source maps and debugging sources under `/sourcemaps/`.
//!
//! Source maps come from the module's current extras directory
//! (`symbolMaps/<HASH>_sourceMap0.json`). Source files are read from the
//! configured source roots and do not depend on compiled output.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::CoreError;
use crate::names::{ModuleName, StrongName, STRONG_NAME_PATTERN};
use crate::outbox::{resolve_under, Outbox, ResolvedFile};
use crate::outbox_table::OutboxTable;

pub const SOURCEMAP_PATH: &str = "/sourcemaps/";

const SOURCE_MAP_SUFFIX: &str = "_sourceMap0.json";
const SYMBOL_MAPS_DIR: &str = "symbolMaps";
const HASH_PLACEHOLDER: &str = "__HASH__";

static SOURCE_MAP_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{STRONG_NAME_PATTERN}_sourceMap0\\.json$")).expect("valid regex")
});

pub fn is_source_map_request(path: &str) -> bool {
    path.starts_with(SOURCEMAP_PATH)
}

/// URL of a module's source map with `__HASH__` in place of the strong name.
pub fn source_map_location_template(module: &str) -> String {
    format!("{SOURCEMAP_PATH}{module}/{HASH_PLACEHOLDER}{SOURCE_MAP_SUFFIX}")
}

pub fn source_map_url(module: &str, strong_name: &StrongName) -> String {
    source_map_location_template(module).replace(HASH_PLACEHOLDER, strong_name.as_str())
}

/// What a `/sourcemaps/` request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceResponse {
    /// Directory index; `entries` are hrefs relative to the directory.
    Listing {
        module: ModuleName,
        directory: String,
        entries: Vec<String>,
    },
    SourceMap(ResolvedFile),
    SourceFile(PathBuf),
}

#[derive(Debug)]
pub struct SourceHandler {
    outboxes: Arc<OutboxTable>,
    source_roots: Vec<PathBuf>,
}

impl SourceHandler {
    pub fn new(outboxes: Arc<OutboxTable>, source_roots: Vec<PathBuf>) -> Self {
        Self {
            outboxes,
            source_roots,
        }
    }

    pub async fn handle(&self, path: &str) -> Result<SourceResponse, CoreError> {
        let rest = path
            .strip_prefix(SOURCEMAP_PATH)
            .ok_or_else(|| CoreError::not_found("Source", path))?;
        let (module_name, rest) = rest.split_once('/').unwrap_or((rest, ""));

        let outbox = self
            .outboxes
            .find_by_module_name(module_name)
            .ok_or_else(|| CoreError::not_found("Module", module_name))?;
        let module = outbox.module_name().clone();

        if rest.is_empty() {
            let entries = self.list_source_maps(&outbox).await;
            return Ok(SourceResponse::Listing {
                module,
                directory: String::new(),
                entries,
            });
        }

        if SOURCE_MAP_FILE_RE.is_match(rest) {
            let map = outbox
                .find_extra_file(&format!("{SYMBOL_MAPS_DIR}/{rest}"))
                .await?;
            return Ok(SourceResponse::SourceMap(map));
        }

        if let Some(directory) = rest.strip_suffix('/') {
            let entries = self.list_source_directory(directory).await?;
            return Ok(SourceResponse::Listing {
                module,
                directory: rest.to_string(),
                entries,
            });
        }

        for root in &self.source_roots {
            let Some(candidate) = resolve_under(root, rest) else {
                continue;
            };
            if tokio::fs::metadata(&candidate)
                .await
                .is_ok_and(|meta| meta.is_file())
            {
                return Ok(SourceResponse::SourceFile(candidate));
            }
        }

        Err(CoreError::not_found("SourceFile", rest))
    }

    async fn list_source_maps(&self, outbox: &Outbox) -> Vec<String> {
        let Some(current) = outbox.current().await else {
            return Vec::new();
        };
        let mut names = read_dir_names(&current.extras_dir().join(SYMBOL_MAPS_DIR)).await;
        names.retain(|name| SOURCE_MAP_FILE_RE.is_match(name));
        names
    }

    /// Merge the entries of `directory` across all source roots.
    /// Sub-directories are listed with a trailing `/`.
    async fn list_source_directory(&self, directory: &str) -> Result<Vec<String>, CoreError> {
        let mut found = false;
        let mut entries = Vec::new();

        for root in &self.source_roots {
            let Some(dir) = resolve_under(root, directory) else {
                continue;
            };
            let Ok(mut read) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            found = true;
            while let Ok(Some(entry)) = read.next_entry().await {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
                entries.push(if is_dir { format!("{name}/") } else { name });
            }
        }

        if !found {
            return Err(CoreError::not_found("SourceDirectory", directory));
        }
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}

async fn read_dir_names(dir: &std::path::Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut read) = tokio::fs::read_dir(dir).await else {
        return names;
    };
    while let Ok(Some(entry)) = read.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_helpers::{module, publish_files, TEST_STRONG_NAME};

    async fn handler(dir: &tempfile::TempDir) -> SourceHandler {
        let table = OutboxTable::create(&[module("hello")], &dir.path().join("work"))
            .await
            .unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("com/example")).unwrap();
        std::fs::write(src.join("com/example/Hello.java"), "class Hello {}").unwrap();
        SourceHandler::new(Arc::new(table), vec![src])
    }

    #[test]
    fn templates_and_urls() {
        assert!(is_source_map_request("/sourcemaps/hello/"));
        assert!(!is_source_map_request("/hello/sourcemaps/"));
        assert_eq!(
            source_map_location_template("hello"),
            "/sourcemaps/hello/__HASH___sourceMap0.json"
        );
        let strong = StrongName::parse(TEST_STRONG_NAME).unwrap();
        assert_eq!(
            source_map_url("hello", &strong),
            format!("/sourcemaps/hello/{TEST_STRONG_NAME}_sourceMap0.json")
        );
    }

    #[tokio::test]
    async fn source_map_is_served_from_extras() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(&dir).await;
        let outbox = handler.outboxes.find_by_module_name("hello").unwrap();
        let map_name = format!("{TEST_STRONG_NAME}_sourceMap0.json");
        let map_path = format!("extras/symbolMaps/{map_name}");
        publish_files(&outbox, &[(map_path.as_str(), "{}")]).await;

        let response = handler
            .handle(&format!("/sourcemaps/hello/{map_name}"))
            .await
            .unwrap();
        assert_matches!(response, SourceResponse::SourceMap(_));

        let listing = handler.handle("/sourcemaps/hello/").await.unwrap();
        assert_matches!(listing, SourceResponse::Listing { entries, .. } if entries == vec![map_name.clone()]);
    }

    #[tokio::test]
    async fn source_files_come_from_source_roots() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(&dir).await;

        let response = handler
            .handle("/sourcemaps/hello/com/example/Hello.java")
            .await
            .unwrap();
        assert_matches!(response, SourceResponse::SourceFile(path) if path.ends_with("com/example/Hello.java"));

        let listing = handler.handle("/sourcemaps/hello/com/").await.unwrap();
        assert_matches!(listing, SourceResponse::Listing { entries, .. } if entries == vec!["example/".to_string()]);
    }

    #[tokio::test]
    async fn missing_things_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(&dir).await;

        assert_matches!(
            handler.handle("/sourcemaps/other/").await,
            Err(CoreError::NotFound { .. })
        );
        assert_matches!(
            handler.handle("/sourcemaps/hello/Missing.java").await,
            Err(CoreError::NotFound { .. })
        );
        assert_matches!(
            handler
                .handle(&format!("/sourcemaps/hello/{TEST_STRONG_NAME}_sourceMap0.json"))
                .await,
            Err(CoreError::NotFound { .. })
        );
        assert_matches!(
            handler.handle("/sourcemaps/hello/../work/x.java").await,
            Err(CoreError::NotFound { .. })
        );
    }
}
