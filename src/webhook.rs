//! Webhook related structures

use serde::Deserialize;

/// The two fields of a push event the pipeline reads. Every other field of
/// the payload is ignored, and missing fields decode as empty, so deliveries
/// without a ref (e.g. `ping`) simply match nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub repository: Repository,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub name: String,
}

impl PushEvent {
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Last `/`-separated segment of the ref, e.g. `main` for `refs/heads/main`.
    pub fn branch(&self) -> &str {
        match self.git_ref.rfind('/') {
            Some(idx) => &self.git_ref[idx + 1..],
            None => &self.git_ref,
        }
    }

    pub fn repo_name(&self) -> &str {
        &self.repository.name
    }
}
