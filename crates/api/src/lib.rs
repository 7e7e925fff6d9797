//! # Gateway API
//!
//! 网关的HTTP入口，基于Axum构建。
//!
//! - `GET /` 问候信息
//! - `GET /health` 聚合健康报告（健康/降级 200，不健康 503）
//! - 其余路径由分发核心按配置的路由表解析，同步转发给下游服务或异步发布到消息代理
//!
//! 请求头 `x-request-id`、`x-correlation-id`、`x-request-timeout-ms`、`Authorization`
//! 被读入请求上下文；响应总是带有 `x-request-id`。

pub mod context;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

use gateway_core::{GatewayConfig, ServerConfig};
use gateway_dispatcher::DispatchCore;
use middleware::{cors_layer, panic_response, request_id, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(core: Arc<DispatchCore>, config: &GatewayConfig) -> Router {
    let state = AppState {
        core,
        server: Arc::new(config.server.clone()),
    };
    with_layers(create_routes(state), &config.server)
}

/// 为路由加上网关的中间件栈，最外层为 `x-request-id`
pub fn with_layers(router: Router, server: &ServerConfig) -> Router {
    let mut app = router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(request_logging))
        .layer(trace_layer());
    if server.cors_enabled {
        app = app.layer(cors_layer());
    }
    app.layer(axum::middleware::from_fn(request_id))
}
