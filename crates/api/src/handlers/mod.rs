//! Request handlers.
//!
//! The code server has a fixed route set described by a path grammar rather
//! than by route patterns, so a single fallback handler classifies every
//! request and hands it to the matching module below.

pub mod log;
pub mod output;
pub mod pages;
pub mod policies;
pub mod progress;
pub mod recompile;
pub mod sources;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use codeserver_core::names::CALLBACK_PARAM;
use codeserver_core::paths::{self, RequestTarget};

use crate::error::AppResult;
use crate::response::set_no_cache_headers;
use crate::state::AppState;

/// Query string as ordered key/value pairs.
pub type QueryParams = Vec<(String, String)>;

/// Entry point for every request.
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<QueryParams>,
) -> Response {
    let path = uri.path();

    let mut response = if method == Method::GET {
        route(&state, path, &headers, params)
            .await
            .unwrap_or_else(IntoResponse::into_response)
    } else {
        tracing::warn!(%method, %path, "Ignored request");
        StatusCode::NOT_FOUND.into_response()
    };

    if !path.ends_with(".cache.js") {
        set_no_cache_headers(response.headers_mut());
    }
    response
}

async fn route(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    params: QueryParams,
) -> AppResult<Response> {
    match paths::classify(path) {
        RequestTarget::FrontPage => Ok(pages::front_page(state)),
        RequestTarget::DevModeOn => Ok(pages::dev_mode_on(state)),
        RequestTarget::Recompile(module) => recompile::recompile(state, &module, params).await,
        RequestTarget::Log(module) => log::log_page(state, &module).await,
        RequestTarget::Favicon => Ok(pages::favicon()),
        RequestTarget::PolicyIndex => Ok(policies::policy_index(state).await),
        RequestTarget::Progress => Ok(progress::progress(state, callback_param(&params)).await),
        RequestTarget::ModulePage(module) => pages::module_page(state, &module).await,
        RequestTarget::Source(path) => sources::source(state, &path).await,
        RequestTarget::PolicyFile(file) => policies::policy_file(state, &file).await,
        RequestTarget::OutputFile { module, path } => {
            output::output_file(state, &module, &path, headers).await
        }
        RequestTarget::Ignored => {
            tracing::warn!(%path, "Ignored get request");
            Ok(StatusCode::NOT_FOUND.into_response())
        }
    }
}

/// The JSONP callback, if the caller asked for one.
pub fn callback_param(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .find(|(key, _)| key == CALLBACK_PARAM)
        .map(|(_, value)| value.as_str())
}
