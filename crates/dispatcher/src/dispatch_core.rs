//! 分发核心
//!
//! 由显式传入的 `GatewayConfig`、连接工厂与消息代理构建，不依赖任何全局客户端。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use anyhow::{Context, Result};
use gateway_core::{
    CircuitState, DispatchError, GatewayConfig, GatewayResult, RequestContext, TransportKind,
};
use gateway_domain::{
    Broker, CapabilityEndpoint, CapabilityRequest, ConnectionFactory, HealthReport, HealthStatus,
    Method, PublishAck, RequestParts, ResolvedRoute, Route, RpcResponse, KNOWN_CAPABILITIES,
};
use tracing::{debug, info, warn};

use crate::health::HealthAggregator;
use crate::metrics;
use crate::publisher::Publisher;
use crate::router::Router;
use crate::sync_dispatch::SyncEndpoint;

/// 进入分发核心的请求
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// 分发结果
#[derive(Debug)]
pub enum DispatchOutcome {
    /// 同步调用的下游响应，原样透传
    Response(RpcResponse),
    /// 异步发布已被代理确认
    Accepted(PublishAck),
}

pub struct DispatchCore {
    router: Router,
    sync_endpoints: HashMap<String, Arc<SyncEndpoint>>,
    async_endpoints: HashMap<String, CapabilityEndpoint>,
    publisher: Publisher,
    health: HealthAggregator,
}

impl DispatchCore {
    pub fn new(
        config: &GatewayConfig,
        factory: Arc<dyn ConnectionFactory>,
        broker: Arc<dyn Broker>,
    ) -> Result<Self> {
        config.validate().context("网关配置无效")?;

        let mut sync_endpoints = HashMap::new();
        let mut async_endpoints = HashMap::new();
        let mut records = Vec::new();

        for endpoint_config in &config.endpoints {
            if !KNOWN_CAPABILITIES.contains(&endpoint_config.capability.as_str()) {
                anyhow::bail!(
                    "端点 {} 的能力 {} 不受支持",
                    endpoint_config.name,
                    endpoint_config.capability
                );
            }

            let endpoint = CapabilityEndpoint::from(endpoint_config);
            match endpoint.transport {
                TransportKind::SyncRpc => {
                    let sync = Arc::new(SyncEndpoint::new(
                        endpoint,
                        factory.clone(),
                        &config.pool,
                        config.circuit_breaker.clone(),
                    ));
                    records.push(sync.health().clone());
                    sync_endpoints.insert(endpoint_config.capability.clone(), sync);
                }
                TransportKind::AsyncPublish => {
                    async_endpoints.insert(endpoint_config.capability.clone(), endpoint);
                }
            }
        }

        let routes = config
            .routes
            .iter()
            .map(|route| -> Result<Route> {
                let method = route
                    .method
                    .parse::<Method>()
                    .map_err(|e| anyhow::anyhow!(e))?;
                let endpoint = config
                    .endpoint_for(&route.capability)
                    .with_context(|| format!("能力 {} 没有对应端点", route.capability))?;
                Ok(Route {
                    method,
                    pattern: route.path.clone(),
                    capability: route.capability.clone(),
                    transport: endpoint.transport,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let router = Router::build(routes).context("构建路由表失败")?;
        info!(
            routes = router.len(),
            sync_endpoints = sync_endpoints.len(),
            async_endpoints = async_endpoints.len(),
            broker = broker.kind(),
            "分发核心初始化完成"
        );

        Ok(Self {
            router,
            sync_endpoints,
            async_endpoints,
            publisher: Publisher::new(
                broker.clone(),
                Duration::from_millis(config.broker.ack_timeout_ms),
            ),
            health: HealthAggregator::new(records, broker),
        })
    }

    pub fn resolve(&self, method: &str, path: &str) -> GatewayResult<ResolvedRoute> {
        self.router.resolve(method, path)
    }

    /// 解析路由、解码请求，再按传输方式同步调用或异步发布
    pub async fn dispatch(
        &self,
        request: InboundRequest,
        ctx: &RequestContext,
    ) -> GatewayResult<DispatchOutcome> {
        let started = StdInstant::now();
        let resolved = self.resolve(&request.method, &request.path)?;
        let capability = resolved.route.capability.clone();

        let result = self.dispatch_resolved(resolved, request, ctx).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        metrics::record_dispatch(&capability, outcome, started.elapsed());

        match &result {
            Ok(_) => debug!(capability = %capability, trace_id = %ctx.trace_id(), "分发完成"),
            Err(e) if e.is_client_error() => {
                debug!(capability = %capability, trace_id = %ctx.trace_id(), error = %e, "请求被拒绝")
            }
            Err(e) => {
                warn!(capability = %capability, trace_id = %ctx.trace_id(), error = %e, "分发失败")
            }
        }
        result
    }

    async fn dispatch_resolved(
        &self,
        resolved: ResolvedRoute,
        request: InboundRequest,
        ctx: &RequestContext,
    ) -> GatewayResult<DispatchOutcome> {
        let capability = resolved.route.capability.as_str();
        let parts = RequestParts {
            path_params: resolved.path_params,
            query: request.query,
            body: request.body,
        };
        let typed = CapabilityRequest::decode(capability, &parts)?;

        match resolved.route.transport {
            TransportKind::SyncRpc => {
                let endpoint = self.sync_endpoints.get(capability).ok_or_else(|| {
                    DispatchError::Internal(format!("能力 {capability} 没有同步端点"))
                })?;
                endpoint
                    .call(&typed, ctx)
                    .await
                    .map(DispatchOutcome::Response)
            }
            TransportKind::AsyncPublish => {
                let endpoint = self.async_endpoints.get(capability).ok_or_else(|| {
                    DispatchError::Internal(format!("能力 {capability} 没有异步端点"))
                })?;
                self.publisher
                    .publish(endpoint, &typed, ctx)
                    .await
                    .map(DispatchOutcome::Accepted)
            }
        }
    }

    pub fn health(&self) -> HealthReport {
        self.health.report()
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health.status()
    }

    /// 端点的熔断状态
    pub fn circuit_state(&self, capability: &str) -> Option<CircuitState> {
        self.sync_endpoints
            .get(capability)
            .map(|e| e.health().state())
    }

    /// 端点连接池当前可借出的连接数
    pub fn available_connections(&self, capability: &str) -> Option<usize> {
        self.sync_endpoints
            .get(capability)
            .map(|e| e.pool().available())
    }

    /// 关闭所有连接池与消息代理连接
    pub async fn shutdown(&self) {
        for endpoint in self.sync_endpoints.values() {
            endpoint.pool().close();
        }
        if let Err(e) = self.publisher.broker().close().await {
            warn!(error = %e, "关闭消息代理连接失败");
        }
        info!("分发核心已关闭");
    }
}
