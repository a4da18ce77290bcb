use std::io::ErrorKind;

use axum::http::header::HeaderValue;
use axum::response::Response;
use codeserver_core::error::CoreError;

use crate::error::AppResult;
use crate::html::log_page as render_log_page;
use crate::response::html;
use crate::state::AppState;

/// The module's most recent compile log as HTML.
///
/// A recompile in progress may be rewriting the log; whatever is on disk
/// at the time of the read is returned.
pub async fn log_page(state: &AppState, module_name: &str) -> AppResult<Response> {
    let outbox = state
        .outboxes
        .find_by_module_name(module_name)
        .ok_or_else(|| CoreError::not_found("Module", module_name))?;

    let bytes = match tokio::fs::read(outbox.compile_log()).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CoreError::not_found("CompileLog", module_name).into());
        }
        Err(e) => return Err(e.into()),
    };
    let text = String::from_utf8_lossy(&bytes);

    let mut response = html(render_log_page(outbox.module_name().as_str(), &text));
    response
        .headers_mut()
        .insert("content-style-type", HeaderValue::from_static("text/css"));
    Ok(response)
}
