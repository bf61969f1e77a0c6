//! File-backed project registry.
//!
//! The backing file is re-read on every lookup so edits take effect without a
//! restart. Loading and matching are separate steps: `load()` produces a
//! [`RegistrySnapshot`], and the snapshot answers `find()`.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::{DeployError, Result};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub repo_name: String,
    pub accepted_branches: Vec<String>,
    /// Empty means the project is recognized but nothing is run.
    pub script_name: String,
    pub command_list: Vec<String>,
    pub desc: String,
}

impl Project {
    pub fn accepts(&self, repo_name: &str, branch: &str) -> bool {
        self.repo_name == repo_name && self.accepted_branches.iter().any(|b| b == branch)
    }

    pub fn has_script(&self) -> bool {
        !self.script_name.is_empty()
    }
}

/// The projects decoded from one read of the registry file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl RegistrySnapshot {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// First project, in file order, whose name matches and whose branch
    /// list contains `branch`. A name match without the branch does not stop
    /// the scan.
    pub fn find(&self, repo_name: &str, branch: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.accepts(repo_name, branch))
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Anything that can hand out a fresh snapshot of the configured projects.
#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn load(&self) -> RegistrySnapshot;

    async fn lookup(&self, repo_name: &str, branch: &str) -> Option<Project> {
        self.load().await.find(repo_name, branch).cloned()
    }
}

/// A fixed, in-memory set of projects.
#[async_trait]
impl ProjectSource for RegistrySnapshot {
    async fn load(&self) -> RegistrySnapshot {
        self.clone()
    }
}

/// Reads the project list from a JSON file on every `load()`.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn try_load(&self) -> Result<RegistrySnapshot> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| DeployError::RegistryRead {
                path: self.path.clone(),
                source,
            })?;
        RegistrySnapshot::from_json(&bytes).map_err(|source| DeployError::RegistryParse {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl ProjectSource for FileRegistry {
    /// Read or parse failures degrade to an empty snapshot, so a broken file
    /// means "nothing matches", never "everything matches".
    async fn load(&self) -> RegistrySnapshot {
        match self.try_load().await {
            Ok(snapshot) => {
                debug!(
                    "Loaded {} project(s) from {:?}",
                    snapshot.projects.len(),
                    self.path
                );
                snapshot
            }
            Err(e) => {
                warn!("{}; continuing with no projects", e);
                RegistrySnapshot::default()
            }
        }
    }
}
