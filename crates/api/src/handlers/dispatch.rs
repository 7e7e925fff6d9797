use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
};
use gateway_core::DispatchError;
use gateway_dispatcher::InboundRequest;

use crate::context::request_context;
use crate::error::{ApiError, ApiResult};
use crate::response::outcome_response;
use crate::routes::AppState;

/// 所有网关路由的入口，交给分发核心解析与转发
pub async fn dispatch_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let ctx = request_context(&headers, &state.server);
    let fail = |error: DispatchError| ApiError::new(error, ctx.trace_id());

    let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
        .map_err(|e| fail(DispatchError::InvalidRequest(format!("查询参数无效: {e}"))))?
        .0;

    let body = if body.is_empty() {
        None
    } else {
        let value = serde_json::from_slice::<serde_json::Value>(&body).map_err(|e| {
            fail(DispatchError::InvalidRequest(format!(
                "请求体不是合法的JSON: {e}"
            )))
        })?;
        Some(value)
    };

    let request = InboundRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query,
        body,
    };

    state
        .core
        .dispatch(request, &ctx)
        .await
        .map(outcome_response)
        .map_err(fail)
}
