use axum::{routing::get, Router};
use std::sync::Arc;

use gateway_core::ServerConfig;
use gateway_dispatcher::DispatchCore;

use crate::handlers::{dispatch::dispatch_handler, health::health_check, root::root_handler};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<DispatchCore>,
    pub server: Arc<ServerConfig>,
}

/// 创建网关路由
///
/// `/` 与 `/health` 由网关自身处理，其余请求全部交给分发核心的路由表。
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .fallback(dispatch_handler)
        .with_state(state)
}
