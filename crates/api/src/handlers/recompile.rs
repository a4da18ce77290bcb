//! `/recompile/<module>`: submit a job and wait for it.
//!
//! This is a GET so the bookmarklet can call it cross-origin via JSONP.
//! Query parameters are passed to the compiler as binding properties; the
//! compiler only accepts declared values for those, so an unauthenticated
//! caller can at most trigger a spurious recompile.

use axum::response::Response;
use codeserver_core::error::CoreError;
use codeserver_core::job::Job;
use codeserver_core::names::BindingProperties;
use serde_json::json;

use super::{callback_param, QueryParams};
use crate::error::{AppError, AppResult};
use crate::response::json_or_jsonp;
use crate::state::AppState;

pub async fn recompile(
    state: &AppState,
    module_name: &str,
    params: QueryParams,
) -> AppResult<Response> {
    let outbox = state
        .outboxes
        .find_by_module_name(module_name)
        .ok_or_else(|| CoreError::not_found("Module", module_name))?;
    let module = outbox.module_name().clone();

    let callback = callback_param(&params).map(str::to_string);
    let bindings = BindingProperties::from_query(params);

    let _permit = state
        .recompile_permits
        .acquire()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let span = tracing::info_span!("recompile", %module);
    let (job, handle) = Job::new(module.clone(), bindings, span);
    let job_id = state.runner.submit(job);
    let result = handle.wait_for_result().await;

    tracing::info!(
        job_id,
        %module,
        status = result.status(),
        message = result.message(),
        "Recompile finished",
    );

    let mut config = state.outboxes.config();
    config["status"] = json!(result.status());
    Ok(json_or_jsonp(&config, callback.as_deref()))
}
