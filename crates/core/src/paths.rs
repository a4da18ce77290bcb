//! Request-path grammar.
//!
//! Every inbound path is classified here before anything touches the
//! filesystem. Only paths built from safe segments (`[A-Za-z0-9_-]`, dots
//! between them) are routed; anything else is [`RequestTarget::Ignored`].

use std::sync::LazyLock;

use regex::Regex;

use crate::names::{
    StrongName, SAFE_DIRECTORY_PATTERN, SAFE_FILENAME_PATTERN, STRONG_NAME_PATTERN,
};
use crate::source_handler::is_source_map_request;

static MODULE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^/({SAFE_DIRECTORY_PATTERN})/$")).expect("valid regex")
});

static DIRECTORY_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^/(?:{SAFE_DIRECTORY_PATTERN}/)+$")).expect("valid regex")
});

static FILE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^/(?:{SAFE_DIRECTORY_PATTERN}/)+{SAFE_FILENAME_PATTERN}$"
    ))
    .expect("valid regex")
});

static CACHE_JS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"/({STRONG_NAME_PATTERN})\.cache\.js$")).expect("valid regex")
});

const RECOMPILE_PREFIX: &str = "/recompile/";
const LOG_PREFIX: &str = "/log/";
const POLICIES_PREFIX: &str = "/policies/";

/// What an inbound GET path refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    FrontPage,
    DevModeOn,
    /// Raw module name; looked up (and rejected) by the caller.
    Recompile(String),
    Log(String),
    Favicon,
    PolicyIndex,
    Progress,
    ModulePage(String),
    /// Full path under `/sourcemaps/`.
    Source(String),
    /// Everything after `/policies/`.
    PolicyFile(String),
    /// A compiled output file. `module` is the first path segment.
    OutputFile { module: String, path: String },
    Ignored,
}

/// Classify a request path. Fixed endpoints win over the generic grammar.
pub fn classify(path: &str) -> RequestTarget {
    match path {
        "/" => return RequestTarget::FrontPage,
        "/dev_mode_on.js" => return RequestTarget::DevModeOn,
        "/favicon.ico" => return RequestTarget::Favicon,
        "/policies/" => return RequestTarget::PolicyIndex,
        "/progress" => return RequestTarget::Progress,
        _ => {}
    }

    if let Some(module) = path.strip_prefix(RECOMPILE_PREFIX) {
        return RequestTarget::Recompile(module.to_string());
    }
    if let Some(module) = path.strip_prefix(LOG_PREFIX) {
        return RequestTarget::Log(module.to_string());
    }

    if let Some(caps) = MODULE_PATH_RE.captures(path) {
        return RequestTarget::ModulePage(caps[1].to_string());
    }

    if is_safe_directory_path(path) && is_source_map_request(path) {
        return RequestTarget::Source(path.to_string());
    }

    if is_safe_file_path(path) {
        if is_source_map_request(path) {
            return RequestTarget::Source(path.to_string());
        }
        if let Some(rest) = path.strip_prefix(POLICIES_PREFIX) {
            return RequestTarget::PolicyFile(rest.to_string());
        }
        // The grammar guarantees a second slash.
        let module = path[1..].split('/').next().unwrap_or_default();
        return RequestTarget::OutputFile {
            module: module.to_string(),
            path: path.to_string(),
        };
    }

    RequestTarget::Ignored
}

/// `/dir/.../file.ext` made only of safe segments.
pub fn is_safe_file_path(path: &str) -> bool {
    FILE_PATH_RE.is_match(path)
}

/// `/dir/.../` made only of safe segments.
pub fn is_safe_directory_path(path: &str) -> bool {
    DIRECTORY_PATH_RE.is_match(path)
}

/// The strong name of a `/<HASH>.cache.js` path, if it is one.
pub fn cache_js_strong_name(path: &str) -> Option<StrongName> {
    CACHE_JS_RE
        .captures(path)
        .and_then(|caps| StrongName::parse(&caps[1]))
}
