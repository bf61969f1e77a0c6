//! Webhook handler for push events

use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
};
use tracing::debug;

use crate::SharedState;
use crate::signature::SIGNATURE_HEADER;

/// POST / - Runs the delivery through the pipeline and maps the outcome to a
/// status. Matched scripts are already running in the background by the time
/// this returns.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    // An empty header counts as missing. A non-empty header that is not
    // valid UTF-8 is still present, and cannot match.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_str().unwrap_or_default());

    let outcome = state.pipeline.handle(signature, &body).await;
    debug!("Webhook outcome: {:?}", outcome);

    outcome.status_code()
}
