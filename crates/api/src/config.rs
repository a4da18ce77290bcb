use std::path::PathBuf;

use codeserver_core::names::ModuleName;

/// Configuration errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Server configuration loaded from environment variables.
///
/// Defaults bind to loopback only: there is no authentication, so anyone
/// who can reach the port can trigger a recompile.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `9876`).
    pub port: u16,
    /// Modules to serve, in display order.
    pub modules: Vec<ModuleName>,
    /// Root of every module's output area.
    pub work_dir: PathBuf,
    /// Compiler executable.
    pub compiler_command: String,
    /// Arguments placed before the per-job flags.
    pub compiler_args: Vec<String>,
    /// Roots searched for `/sourcemaps/` source files.
    pub source_dirs: Vec<PathBuf>,
    /// Recompile requests allowed to wait on a job at the same time.
    pub max_recompile_waiters: usize,
    /// Compile directories retained per module, including the served one.
    pub keep_compiles: usize,
    /// Compile every module once before accepting requests.
    pub precompile: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default               |
    /// |-------------------------|-----------------------|
    /// | `HOST`                  | `127.0.0.1`           |
    /// | `PORT`                  | `9876`                |
    /// | `MODULES`               | required              |
    /// | `WORK_DIR`              | `./codeserver-work`   |
    /// | `COMPILER_COMMAND`      | required              |
    /// | `COMPILER_ARGS`         | empty                 |
    /// | `SOURCE_DIRS`           | empty                 |
    /// | `MAX_RECOMPILE_WAITERS` | `4`                   |
    /// | `KEEP_COMPILES`         | `3`                   |
    /// | `PRECOMPILE`            | `true`                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".into());
        let port = parse_or("PORT", lookup("PORT"), 9876u16)?;

        let modules = lookup("MODULES")
            .ok_or(ConfigError::Missing("MODULES"))?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                ModuleName::parse(name).map_err(|e| ConfigError::Invalid {
                    var: "MODULES",
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if modules.is_empty() {
            return Err(ConfigError::Missing("MODULES"));
        }

        let work_dir = PathBuf::from(lookup("WORK_DIR").unwrap_or_else(|| "./codeserver-work".into()));

        let compiler_command = lookup("COMPILER_COMMAND")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("COMPILER_COMMAND"))?;

        let compiler_args: Vec<String> = lookup("COMPILER_ARGS")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let source_dirs: Vec<PathBuf> = lookup("SOURCE_DIRS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();

        let max_recompile_waiters =
            parse_or("MAX_RECOMPILE_WAITERS", lookup("MAX_RECOMPILE_WAITERS"), 4usize)?;
        if max_recompile_waiters == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_RECOMPILE_WAITERS",
                reason: "must be at least 1".into(),
            });
        }

        let keep_compiles = parse_or("KEEP_COMPILES", lookup("KEEP_COMPILES"), 3usize)?;
        if keep_compiles == 0 {
            return Err(ConfigError::Invalid {
                var: "KEEP_COMPILES",
                reason: "must be at least 1".into(),
            });
        }
        let precompile = parse_or("PRECOMPILE", lookup("PRECOMPILE"), true)?;

        Ok(Self {
            host,
            port,
            modules,
            work_dir,
            compiler_command,
            compiler_args,
            source_dirs,
            max_recompile_waiters,
            keep_compiles,
            precompile,
        })
    }
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
