//! Runtime configuration, read once from the environment at startup.

use std::path::PathBuf;

use crate::error::{DeployError, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_BIND_PORT: u16 = 8025;
pub const DEFAULT_PROJECT_FILE_DIR: &str = ".";
pub const DEFAULT_PROJECT_FILE_NAME: &str = "projects.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    /// `Some` exactly when signature checking is enabled.
    pub webhook_secret: Option<String>,
    pub project_file_dir: PathBuf,
    pub project_file_name: String,
    pub log_dir: Option<PathBuf>,
    /// Log matched scripts instead of running them.
    pub dry_run: bool,
}

impl Config {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset. Enabling `CHECK_GITHUB_HASH` without a
    /// `GITHUB_SECRET` is an error: the server must not start accepting
    /// unverifiable requests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        // GIN_ADDR / GIN_PORT are accepted as fallbacks for older deployments
        let bind_port = match get("BIND_PORT").or_else(|| get("GIN_PORT")) {
            Some(port) => port.parse().map_err(|_| {
                DeployError::ConfigError(format!("Invalid bind port value '{}'", port))
            })?,
            None => DEFAULT_BIND_PORT,
        };

        let check_signature = get("CHECK_GITHUB_HASH")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        let webhook_secret = if check_signature {
            match get("GITHUB_SECRET") {
                Some(secret) => Some(secret),
                None => {
                    return Err(DeployError::ConfigError(
                        "CHECK_GITHUB_HASH is enabled but GITHUB_SECRET is not set".to_string(),
                    ));
                }
            }
        } else {
            None
        };

        Ok(Config {
            bind_addr: get("BIND_ADDR")
                .or_else(|| get("GIN_ADDR"))
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            bind_port,
            webhook_secret,
            project_file_dir: get("PRJ_FILE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROJECT_FILE_DIR)),
            project_file_name: get("PRJ_FILE_NAME")
                .unwrap_or_else(|| DEFAULT_PROJECT_FILE_NAME.to_string()),
            log_dir: get("LOG_DIR").map(PathBuf::from),
            dry_run: get("DRY_RUN").and_then(|v| parse_bool(&v)).unwrap_or(false),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    pub fn project_file_path(&self) -> PathBuf {
        self.project_file_dir.join(&self.project_file_name)
    }

    pub fn signature_check_enabled(&self) -> bool {
        self.webhook_secret.is_some()
    }
}

/// Accepts the usual spellings of a boolean flag; anything else is `None`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
