//! Response rendering shared by the handlers: JSON / JSONP bodies, no-cache
//! headers and streamed files.

use std::path::Path;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use codeserver_core::error::CoreError;
use codeserver_core::names::is_valid_callback;
use serde_json::Value;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};

/// Stub sent in place of a call to a callback that failed validation.
pub const INVALID_CALLBACK_STUB: &str = "alert('invalid callback parameter');\n";

/// Mark a response as uncacheable. Nearly every page can change after a
/// recompile or a server restart; only `.cache.js` files are immutable.
pub fn set_no_cache_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}

/// Render `json` as plain JSON, or as JSONP when a callback was supplied.
///
/// A callback that is not a dotted identifier is never executed: the body
/// becomes an alert stub followed by the bare JSON.
pub fn json_or_jsonp(json: &Value, callback: Option<&str>) -> Response {
    match callback {
        None => (
            [(header::CONTENT_TYPE, "application/json")],
            json.to_string(),
        )
            .into_response(),
        Some(callback) if is_valid_callback(callback) => (
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("{callback}({json});\n"),
        )
            .into_response(),
        Some(callback) => {
            tracing::error!(%callback, "Invalid callback");
            (
                [(header::CONTENT_TYPE, "application/javascript")],
                format!("{INVALID_CALLBACK_STUB}{json}"),
            )
                .into_response()
        }
    }
}

/// An HTML page with `text/html` content type.
pub fn html(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Stream a file from disk without buffering it in memory.
pub async fn send_file(path: &Path, content_type: &str) -> AppResult<Response> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::not_found("File", path.display().to_string()).into());
        }
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}
