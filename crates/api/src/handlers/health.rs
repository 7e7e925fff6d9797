use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

/// 聚合健康报告，只读取缓存的熔断状态，不访问下游
///
/// 健康或降级返回 200，不健康返回 503。
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let report = state.core.health();
    let status = if report.status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "service": "api-gateway",
            "status": report.status,
            "endpoints": report.endpoints,
            "broker": report.broker,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
