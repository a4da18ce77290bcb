//! Front page, module pages, `dev_mode_on.js` and the favicon.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use codeserver_core::error::CoreError;

use crate::error::AppResult;
use crate::html::{
    page_with_json, script_with_json, DEV_MODE_ON_TEMPLATE, FRONT_PAGE_TEMPLATE,
    MODULE_PAGE_TEMPLATE,
};
use crate::response::html;
use crate::state::AppState;

const FAVICON: &[u8] = include_bytes!("../../assets/favicon.ico");

/// Global variable the bookmarklet script reads its configuration from.
const DEV_MODE_CONFIG_VAR: &str = "__gwt_codeserver_config";

pub fn front_page(state: &AppState) -> Response {
    html(page_with_json(
        "config",
        &state.outboxes.config(),
        FRONT_PAGE_TEMPLATE,
    ))
}

pub fn dev_mode_on(state: &AppState) -> Response {
    let body = script_with_json(
        DEV_MODE_CONFIG_VAR,
        &state.outboxes.config(),
        DEV_MODE_ON_TEMPLATE,
    );
    ([(header::CONTENT_TYPE, "application/javascript")], body).into_response()
}

pub async fn module_page(state: &AppState, module_name: &str) -> AppResult<Response> {
    let outbox = state
        .outboxes
        .find_by_module_name(module_name)
        .ok_or_else(|| CoreError::not_found("Module", module_name))?;
    let variables = outbox.template_variables().await;
    Ok(html(page_with_json("config", &variables, MODULE_PAGE_TEMPLATE)))
}

/// `image/x-icon` explicitly; some browsers refuse the default type in `<img>`.
pub fn favicon() -> Response {
    ([(header::CONTENT_TYPE, "image/x-icon")], FAVICON).into_response()
}
