use axum::response::Response;
use codeserver_core::source_handler::SourceResponse;

use crate::error::AppResult;
use crate::html::source_listing;
use crate::response::{html, send_file};
use crate::state::AppState;

/// Anything under `/sourcemaps/`.
pub async fn source(state: &AppState, path: &str) -> AppResult<Response> {
    match state.sources.handle(path).await? {
        SourceResponse::Listing {
            module,
            directory,
            entries,
        } => Ok(html(source_listing(&module, &directory, &entries))),
        SourceResponse::SourceMap(file) => send_file(file.path(), "application/json").await,
        SourceResponse::SourceFile(file) => send_file(&file, "text/plain; charset=utf-8").await,
    }
}
