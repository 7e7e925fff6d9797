use std::any::Any;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gateway_core::ErrorKind;
use tower_http::{
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::context::{header_str, REQUEST_ID_HEADER};
use crate::error::error_body;

/// 保证每个请求都带有 `x-request-id`，并回写到响应头
///
/// 请求头按请求上下文的同一规则规范化后写回请求，响应回显的值与 trace id 一致。
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let value = header_str(request.headers(), REQUEST_ID_HEADER)
        .and_then(|v| HeaderValue::from_str(v).ok())
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(value) = value else {
        return next.run(request).await;
    };
    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, value);
    response
}

pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = header_str(request.headers(), REQUEST_ID_HEADER)
        .unwrap_or_default()
        .to_string();
    let start = std::time::Instant::now();

    info!(request_id = %request_id, "开始处理请求: {} {}", method, uri);

    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        request_id = %request_id,
        "完成请求处理: {} {} - 状态: {} - 耗时: {:?}",
        method,
        uri,
        response.status(),
        duration
    );

    response
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(AnyOrigin)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

pub fn trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
}

/// 处理器发生 panic 时返回统一的 500 响应
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "请求处理发生panic");

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        error_body(status, "系统内部错误", ErrorKind::Internal, ""),
    )
        .into_response()
}
