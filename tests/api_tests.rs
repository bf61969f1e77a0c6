//! Router-level tests for the webhook server.
//!
//! Registries are real JSON files in a temp dir; dispatch goes through the
//! dry-run dispatcher so tests can see which scripts would have run.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use push_deploy::dispatch::DryRunDispatcher;
use push_deploy::pipeline::WebhookPipeline;
use push_deploy::registry::FileRegistry;
use push_deploy::signature::{SIGNATURE_HEADER, SignatureVerifier};
use push_deploy::{AppState, api};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "It's a Secret to Everybody";

struct TestApp {
    app: Router,
    dispatcher: Arc<DryRunDispatcher>,
    dir: TempDir,
}

fn registry_json() -> Value {
    json!({
        "projects": [
            {
                "repoName": "site",
                "acceptedBranches": ["main"],
                "scriptName": "deploy.sh",
                "commandList": [],
                "desc": "public site"
            },
            {
                "repoName": "docs",
                "acceptedBranches": ["main"],
                "scriptName": ""
            }
        ]
    })
}

fn create_app(check_signature: bool) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("projects.json");
    std::fs::write(&path, registry_json().to_string()).expect("write registry");

    let dispatcher = Arc::new(DryRunDispatcher::new());
    let verifier = check_signature.then(|| SignatureVerifier::new(SECRET));
    let pipeline = WebhookPipeline::new(
        verifier,
        Arc::new(FileRegistry::new(path)),
        dispatcher.clone(),
    );

    TestApp {
        app: api::router(Arc::new(AppState::new(pipeline))),
        dispatcher,
        dir,
    }
}

fn push_body(repo: &str, git_ref: &str) -> String {
    json!({
        "ref": git_ref,
        "before": "0000000000000000000000000000000000000000",
        "repository": { "name": repo, "full_name": format!("octo/{}", repo) },
        "pusher": { "name": "octo" }
    })
    .to_string()
}

async fn post(app: &Router, body: &str, signature: Option<&str>) -> StatusCode {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        request = request.header(SIGNATURE_HEADER, signature);
    }
    let request = request
        .body(Body::from(body.to_string()))
        .expect("request");

    app.clone().oneshot(request).await.expect("response").status()
}

mod liveness {
    use super::*;

    #[tokio::test]
    async fn root_returns_status_payload() {
        let test = create_app(false);
        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");

        let response = test.app.clone().oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["status"].is_string());
        assert_eq!(body["name"], "push_deploy");
        assert!(body["uptime_seconds"].is_u64());
    }
}

mod matching {
    use super::*;

    #[tokio::test]
    async fn matching_push_dispatches_and_returns_ok() {
        let test = create_app(false);

        let status = post(&test.app, &push_body("site", "refs/heads/main"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(test.dispatcher.invocations(), vec!["deploy.sh"]);
    }

    #[tokio::test]
    async fn unaccepted_branch_returns_no_content() {
        let test = create_app(false);

        let status = post(&test.app, &push_body("site", "refs/heads/dev"), None).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn unknown_repo_returns_no_content() {
        let test = create_app(false);

        let status = post(&test.app, &push_body("blog", "refs/heads/main"), None).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn project_without_script_returns_ok_without_dispatch() {
        let test = create_app(false);

        let status = post(&test.app, &push_body("docs", "refs/heads/main"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_returns_bad_request() {
        let test = create_app(false);

        let status = post(&test.app, "{\"ref\": \"refs/heads/main\"", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn ping_without_ref_returns_no_content() {
        let test = create_app(false);
        let ping = json!({
            "zen": "Keep it simple",
            "hook_id": 1,
            "repository": { "name": "site" }
        })
        .to_string();

        let status = post(&test.app, &ping, None).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn signed_ping_returns_no_content() {
        let test = create_app(true);
        let ping = json!({ "zen": "Keep it simple", "hook_id": 1 }).to_string();
        let signature = SignatureVerifier::new(SECRET).sign(ping.as_bytes()).unwrap();

        let status = post(&test.app, &ping, Some(&signature)).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_registry_file_means_no_match() {
        let test = create_app(false);
        std::fs::remove_file(test.dir.path().join("projects.json")).unwrap();

        let status = post(&test.app, &push_body("site", "refs/heads/main"), None).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn registry_edits_apply_to_the_next_delivery() {
        let test = create_app(false);
        let body = push_body("site", "refs/heads/dev");
        assert_eq!(post(&test.app, &body, None).await, StatusCode::NO_CONTENT);

        let mut registry = registry_json();
        registry["projects"][0]["acceptedBranches"] = json!(["main", "dev"]);
        std::fs::write(test.dir.path().join("projects.json"), registry.to_string()).unwrap();

        assert_eq!(post(&test.app, &body, None).await, StatusCode::OK);
        assert_eq!(test.dispatcher.invocations(), vec!["deploy.sh"]);
    }
}

mod signatures {
    use super::*;

    #[tokio::test]
    async fn missing_header_returns_bad_request() {
        let test = create_app(true);

        let status = post(&test.app, &push_body("site", "refs/heads/main"), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn empty_header_returns_bad_request() {
        let test = create_app(true);

        let status = post(&test.app, &push_body("site", "refs/heads/main"), Some("")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn wrong_signature_returns_unauthorized() {
        let test = create_app(true);
        let body = push_body("site", "refs/heads/main");
        let forged = SignatureVerifier::new("not the secret")
            .sign(body.as_bytes())
            .unwrap();

        let status = post(&test.app, &body, Some(&forged)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(test.dispatcher.invocations().is_empty());
    }

    #[tokio::test]
    async fn correct_signature_dispatches() {
        let test = create_app(true);
        let body = push_body("site", "refs/heads/main");
        let signature = SignatureVerifier::new(SECRET).sign(body.as_bytes()).unwrap();

        let status = post(&test.app, &body, Some(&signature)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(test.dispatcher.invocations(), vec!["deploy.sh"]);
    }

    #[tokio::test]
    async fn signature_over_different_body_is_rejected() {
        let test = create_app(true);
        let signed = push_body("site", "refs/heads/dev");
        let sent = push_body("site", "refs/heads/main");
        let signature = SignatureVerifier::new(SECRET).sign(signed.as_bytes()).unwrap();

        let status = post(&test.app, &sent, Some(&signature)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn identical_redelivery_dispatches_again() {
        let test = create_app(true);
        let body = push_body("site", "refs/heads/main");
        let signature = SignatureVerifier::new(SECRET).sign(body.as_bytes()).unwrap();

        assert_eq!(post(&test.app, &body, Some(&signature)).await, StatusCode::OK);
        assert_eq!(post(&test.app, &body, Some(&signature)).await, StatusCode::OK);

        assert_eq!(test.dispatcher.invocations(), vec!["deploy.sh", "deploy.sh"]);
    }
}

mod concurrency {
    use super::*;
    use tokio::task::JoinSet;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deliveries_each_dispatch() {
        let test = create_app(false);
        let body = push_body("site", "refs/heads/main");

        let mut deliveries = JoinSet::new();
        for _ in 0..8 {
            let app = test.app.clone();
            let body = body.clone();
            deliveries.spawn(async move { post(&app, &body, None).await });
        }

        while let Some(status) = deliveries.join_next().await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }
        assert_eq!(
            test.dispatcher.invocations(),
            vec!["deploy.sh"; 8]
        );
    }
}

mod shell_dispatch {
    use super::*;
    use push_deploy::dispatch::ShellDispatcher;
    use push_deploy::registry::{Project, RegistrySnapshot};
    use std::time::Duration;

    #[tokio::test]
    async fn response_does_not_wait_for_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("deployed");
        let script = dir.path().join("deploy.sh");
        std::fs::write(
            &script,
            format!("sleep 0.3\necho done > \"{}\"\n", marker.display()),
        )
        .unwrap();

        let registry = RegistrySnapshot::new(vec![Project {
            repo_name: "site".to_string(),
            accepted_branches: vec!["main".to_string()],
            script_name: script.to_string_lossy().into_owned(),
            ..Default::default()
        }]);
        let pipeline = WebhookPipeline::new(
            None,
            Arc::new(registry),
            Arc::new(ShellDispatcher::default()),
        );
        let app = api::router(Arc::new(AppState::new(pipeline)));

        let status = post(&app, &push_body("site", "refs/heads/main"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!marker.exists());

        let mut waited = Duration::ZERO;
        while !marker.exists() && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            waited += Duration::from_millis(50);
        }
        assert!(marker.exists(), "script never ran");
    }
}
