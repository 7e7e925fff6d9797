use std::time::Duration;

use async_trait::async_trait;
use gateway_core::TransportError;

use crate::entities::CapabilityEndpoint;

/// 发往下游服务的一次RPC调用
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub operation: String,
    pub payload: serde_json::Value,
    pub trace_id: String,
    pub credentials: Option<String>,
    /// 本次尝试的超时时间
    pub timeout: Duration,
}

/// 下游返回的响应，任何状态码都原样透传给调用方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RpcResponse {
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 连接池中的单个传输连接，同一时刻只被一个调用独占
#[async_trait]
pub trait Connection: Send {
    async fn call(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError>;
}

/// 为端点创建新连接
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        endpoint: &CapabilityEndpoint,
    ) -> Result<Box<dyn Connection>, TransportError>;
}
