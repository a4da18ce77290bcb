//! Validated identifiers: module names, strong names, JSONP callbacks, and
//! the binding-property map passed through to the compiler.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;

/// One path segment, optionally dot-separated. No extension required.
pub const SAFE_DIRECTORY_PATTERN: &str = r"(?:[a-zA-Z0-9_-]+\.)*[a-zA-Z0-9_-]+";

/// A file name. At least one dot (an extension) is required.
pub const SAFE_FILENAME_PATTERN: &str = r"(?:[a-zA-Z0-9_-]+\.)+[a-zA-Z0-9_-]+";

/// 32 upper-case hex digits.
pub const STRONG_NAME_PATTERN: &str = r"[0-9A-F]{32}";

/// Dotted JavaScript identifier, e.g. `foo.bar_1`.
const CALLBACK_PATTERN: &str = r"^(?:[a-zA-Z_][a-zA-Z0-9_]*\.)*[a-zA-Z_][a-zA-Z0-9_]*$";

/// Query parameter that selects JSONP. Never forwarded to the compiler.
pub const CALLBACK_PARAM: &str = "_callback";

static MODULE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{SAFE_DIRECTORY_PATTERN}$")).expect("valid regex")
});

static STRONG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{STRONG_NAME_PATTERN}$")).expect("valid regex"));

static CALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CALLBACK_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// ModuleName
// ---------------------------------------------------------------------------

/// Name of one independently compiled unit, e.g. `com.example.Hello`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ModuleName(String);

impl ModuleName {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        if MODULE_NAME_RE.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(CoreError::Validation(format!("invalid module name: {name:?}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// StrongName
// ---------------------------------------------------------------------------

/// Content hash naming an immutable `.cache.js` output file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrongName(String);

impl StrongName {
    pub fn parse(hash: &str) -> Option<Self> {
        STRONG_NAME_RE
            .is_match(hash)
            .then(|| Self(hash.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrongName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `callback` may be placed in call position of a JSONP response.
pub fn is_valid_callback(callback: &str) -> bool {
    CALLBACK_RE.is_match(callback)
}

// ---------------------------------------------------------------------------
// BindingProperties
// ---------------------------------------------------------------------------

/// Binding-property overrides supplied by the browser.
///
/// Values are not checked here; the compiler restricts each property to its
/// declared value set. Only the JSONP callback key is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BindingProperties(BTreeMap<String, String>);

impl BindingProperties {
    /// Collect query parameters. When a key repeats, its first value wins.
    pub fn from_query<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in params {
            let key = key.into();
            if key == CALLBACK_PARAM {
                continue;
            }
            map.entry(key).or_insert_with(|| value.into());
        }
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
