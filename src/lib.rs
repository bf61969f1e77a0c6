pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod signature;
pub mod webhook;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use config::Config;
use dispatch::{Dispatcher, DryRunDispatcher, ShellDispatcher};
use pipeline::WebhookPipeline;
use registry::FileRegistry;
use signature::SignatureVerifier;

pub struct AppState {
    pub pipeline: WebhookPipeline,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: WebhookPipeline) -> Self {
        Self {
            pipeline,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Wires the file-backed registry and the shell (or dry-run) dispatcher
    /// from the startup configuration.
    pub fn from_config(config: &Config) -> Self {
        let verifier = config.webhook_secret.as_deref().map(SignatureVerifier::new);
        let registry = Arc::new(FileRegistry::new(config.project_file_path()));
        let dispatcher: Arc<dyn Dispatcher> = if config.dry_run {
            Arc::new(DryRunDispatcher::new())
        } else {
            Arc::new(ShellDispatcher::default())
        };

        Self::new(WebhookPipeline::new(verifier, registry, dispatcher))
    }
}

pub type SharedState = Arc<AppState>;
