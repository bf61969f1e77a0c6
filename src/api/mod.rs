//! HTTP surface: liveness on `GET /`, webhook deliveries on `POST /`.

pub mod status;
pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;

pub use status::root;
pub use webhook::handle_webhook;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root).post(handle_webhook))
        .with_state(state)
}
