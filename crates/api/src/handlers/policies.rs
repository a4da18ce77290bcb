//! RPC policy files: `/policies/` and `/policies/<file>.gwt.rpc`.

use axum::response::Response;

use crate::error::AppResult;
use crate::html;
use crate::response::{self, send_file};
use crate::state::AppState;

pub async fn policy_index(state: &AppState) -> Response {
    let manifests = state.outboxes.policy_manifests().await;
    response::html(html::policy_index(&manifests))
}

/// Looked up across every module's current output, first match wins.
pub async fn policy_file(state: &AppState, file_name: &str) -> AppResult<Response> {
    let file = state.outboxes.find_policy_file(file_name).await?;
    send_file(file.path(), "text/plain; charset=utf-8").await
}
