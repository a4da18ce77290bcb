use axum::response::Response;
use codeserver_core::progress::Progress;

use crate::response::json_or_jsonp;
use crate::state::AppState;

/// Status of the compiling job with the lowest id, or `{"status":"idle"}`.
pub async fn progress(state: &AppState, callback: Option<&str>) -> Response {
    let json = match state.progress.progress_for_compiling_job().await {
        Some(progress) => progress.to_json(),
        None => Progress::idle().to_json(),
    };
    json_or_jsonp(&json, callback)
}
