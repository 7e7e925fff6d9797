//! JSON over HTTP 的同步RPC传输
//!
//! 每个操作映射为 `POST {address}/rpc/{operation}`，请求体为类型化请求序列化后的JSON。
//! 每个池化连接持有独立的 `reqwest::Client`，且每个主机只保留一个空闲连接，
//! 因此连接池的容量就是到下游的实际并发连接上限。

use std::time::Duration;

use async_trait::async_trait;
use gateway_core::{PoolConfig, TransportError};
use gateway_domain::{CapabilityEndpoint, Connection, ConnectionFactory, RpcRequest, RpcResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;
use url::Url;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 基于 reqwest 的连接工厂
#[derive(Debug, Clone)]
pub struct HttpConnectionFactory {
    connect_timeout: Duration,
}

impl HttpConnectionFactory {
    pub fn new(pool: &PoolConfig) -> Self {
        Self {
            connect_timeout: pool.connect_timeout(),
        }
    }
}

/// 拼接操作的调用地址
pub fn operation_url(address: &str, operation: &str) -> Result<Url, TransportError> {
    let raw = format!("{}/rpc/{operation}", address.trim_end_matches('/'));
    Url::parse(&raw).map_err(|e| TransportError::Connect(format!("无效的端点地址 {address}: {e}")))
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::ConnectionReset(error.to_string())
    }
}

#[async_trait]
impl ConnectionFactory for HttpConnectionFactory {
    async fn connect(
        &self,
        endpoint: &CapabilityEndpoint,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let base = Url::parse(&endpoint.address).map_err(|e| {
            TransportError::Connect(format!("无效的端点地址 {}: {e}", endpoint.address))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(TransportError::Connect(format!(
                "不支持的端点协议: {}",
                base.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| TransportError::Connect(format!("创建HTTP客户端失败: {e}")))?;

        debug!(endpoint = %endpoint.name, address = %endpoint.address, "创建HTTP连接");
        Ok(Box::new(HttpConnection {
            client,
            address: endpoint.address.clone(),
        }))
    }
}

pub struct HttpConnection {
    client: reqwest::Client,
    address: String,
}

#[async_trait]
impl Connection for HttpConnection {
    async fn call(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let url = operation_url(&self.address, &request.operation)?;

        let mut builder = self
            .client
            .post(url)
            .timeout(request.timeout)
            .header(REQUEST_ID_HEADER, &request.trace_id)
            .json(&request.payload);
        if let Some(credentials) = &request.credentials {
            builder = builder.header(AUTHORIZATION, credentials);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;

        Ok(RpcResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_url() {
        let url = operation_url("http://localhost:50054", "user.get").unwrap();
        assert_eq!(url.as_str(), "http://localhost:50054/rpc/user.get");

        let url = operation_url("http://localhost:50054/", "user.list").unwrap();
        assert_eq!(url.as_str(), "http://localhost:50054/rpc/user.list");
    }

    #[test]
    fn test_operation_url_invalid_address() {
        let err = operation_url("not a url", "user.get").unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
