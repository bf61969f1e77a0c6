//! Authenticate → decode → match → dispatch.

use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::DeployError;
use crate::registry::ProjectSource;
use crate::signature::SignatureVerifier;
use crate::webhook::PushEvent;

/// How a single webhook delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    MissingSignature,
    InvalidSignature,
    MalformedPayload,
    NoMatchingProject { repo_name: String, branch: String },
    /// Matched a project that has no script configured.
    NoAction { repo_name: String, branch: String },
    Dispatched { repo_name: String, branch: String, script: String },
}

impl PipelineOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineOutcome::MissingSignature => StatusCode::BAD_REQUEST,
            PipelineOutcome::InvalidSignature => StatusCode::UNAUTHORIZED,
            PipelineOutcome::MalformedPayload => StatusCode::BAD_REQUEST,
            PipelineOutcome::NoMatchingProject { .. } => StatusCode::NO_CONTENT,
            PipelineOutcome::NoAction { .. } => StatusCode::OK,
            PipelineOutcome::Dispatched { .. } => StatusCode::OK,
        }
    }
}

pub struct WebhookPipeline {
    /// `None` disables signature checking.
    verifier: Option<SignatureVerifier>,
    projects: Arc<dyn ProjectSource>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl WebhookPipeline {
    pub fn new(
        verifier: Option<SignatureVerifier>,
        projects: Arc<dyn ProjectSource>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            verifier,
            projects,
            dispatcher,
        }
    }

    /// Runs one delivery. `signature` is the raw `X-Hub-Signature-256` value,
    /// if the request carried one. The body is the unmodified request body.
    pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> PipelineOutcome {
        // Signature checking is optional; when on, the raw body must verify
        if let Some(verifier) = &self.verifier {
            let Some(signature) = signature else {
                warn!("Signature checking is enabled but no signature header was supplied");
                return PipelineOutcome::MissingSignature;
            };
            if !verifier.verify(body, signature) {
                error!("Signature verification failed");
                return PipelineOutcome::InvalidSignature;
            }
        }

        // Parse body as JSON; only invalid JSON is rejected here
        let event = match PushEvent::from_slice(body) {
            Ok(event) => event,
            Err(e) => {
                info!("{}", DeployError::from(e));
                return PipelineOutcome::MalformedPayload;
            }
        };

        // Branch is the last segment of the ref, e.g. "refs/heads/main" -> "main"
        let repo_name = event.repo_name().to_string();
        let branch = event.branch().to_string();
        debug!("Push event for repo '{}' branch '{}'", repo_name, branch);

        // Find matching project based on repo name and branch (file is re-read)
        let Some(project) = self.projects.lookup(&repo_name, &branch).await else {
            warn!(
                "No matching project for repo '{}' and branch '{}', skipping.",
                repo_name, branch
            );
            return PipelineOutcome::NoMatchingProject { repo_name, branch };
        };

        if !project.has_script() {
            info!(
                "Project '{}' recognized for branch '{}', but no script is configured.",
                repo_name, branch
            );
            return PipelineOutcome::NoAction { repo_name, branch };
        }

        // Fire and forget; the response does not wait on the script
        info!(
            "Dispatching '{}' for repo '{}' branch '{}'",
            project.script_name, repo_name, branch
        );
        self.dispatcher.dispatch(&project.script_name);

        PipelineOutcome::Dispatched {
            repo_name,
            branch,
            script: project.script_name,
        }
    }
}
