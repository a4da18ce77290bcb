//! Compiled output files.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use codeserver_core::error::CoreError;
use codeserver_core::paths::cache_js_strong_name;
use codeserver_core::source_handler::source_map_url;

use crate::error::{AppError, AppResult};
use crate::mime::content_type_for_extension;
use crate::response::send_file;
use crate::state::AppState;

const X_SOURCEMAP: HeaderName = HeaderName::from_static("x-sourcemap");

/// Serve `path` from the module's current output.
///
/// When only `<path>.gz` exists it is sent as-is with
/// `Content-Encoding: gzip`, provided the client accepts gzip; otherwise
/// the request fails with 501.
pub async fn output_file(
    state: &AppState,
    module_name: &str,
    path: &str,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let outbox = state
        .outboxes
        .find_by_module_name(module_name)
        .ok_or_else(|| CoreError::not_found("Module", module_name))?;

    // Both lookups use one snapshot so a publish in between cannot mix
    // compiles, and `file` keeps that compile from being pruned until the
    // file is open.
    let current = outbox
        .current()
        .await
        .ok_or_else(|| CoreError::not_found("OutputFile", path))?;
    let (file, gzipped) = match current.find_file(path).await {
        Ok(file) => (file, false),
        Err(CoreError::NotFound { .. }) => {
            let file = current.find_file(&format!("{path}.gz")).await?;
            if !accepts_gzip(headers) {
                return Err(AppError::UnsupportedEncoding(path.to_string()));
            }
            (file, true)
        }
        Err(e) => return Err(e.into()),
    };

    let mut response = send_file(file.path(), content_type_for_extension(path)).await?;
    let response_headers = response.headers_mut();

    if gzipped {
        response_headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    if let Some(strong_name) = cache_js_strong_name(path) {
        let url = source_map_url(outbox.module_name().as_str(), &strong_name);
        let value =
            HeaderValue::from_str(&url).map_err(|e| AppError::InternalError(e.to_string()))?;
        response_headers.insert(X_SOURCEMAP, value);
    }
    response_headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );

    Ok(response)
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}
