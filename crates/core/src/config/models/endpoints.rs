use serde::{Deserialize, Serialize};

use super::resilience::RetryConfig;

/// 调用下游能力所使用的传输方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// 同步RPC调用，等待下游响应
    SyncRpc,
    /// 异步发布到消息代理，等待代理确认
    AsyncPublish,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::SyncRpc => "sync_rpc",
            TransportKind::AsyncPublish => "async_publish",
        }
    }
}

/// 下游能力端点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// 端点名称，在健康报告中显示
    pub name: String,
    /// 所属服务（能力族）
    pub service: String,
    /// 能力标识，例如 `user.get`
    pub capability: String,
    /// 同步端点为下游基础URL，异步端点为路由键
    pub address: String,
    pub transport: TransportKind,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub idempotent: bool,
    /// 所属服务是否为系统正常运行的必需服务
    #[serde(default = "default_required")]
    pub required: bool,
    /// 异步端点发布的事件类型
    #[serde(default)]
    pub event_type: Option<String>,
    /// 覆盖全局连接池大小
    #[serde(default)]
    pub max_connections: Option<usize>,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_required() -> bool {
    true
}

impl EndpointConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            return Err(anyhow::anyhow!("端点名称不能为空"));
        }
        if self.service.is_empty() {
            return Err(anyhow::anyhow!("端点 {} 的服务名称不能为空", self.name));
        }
        if self.capability.is_empty() {
            return Err(anyhow::anyhow!("端点 {} 的能力标识不能为空", self.name));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow::anyhow!("端点 {} 的超时时间必须大于0", self.name));
        }
        if self.max_connections == Some(0) {
            return Err(anyhow::anyhow!("端点 {} 的连接池大小必须大于0", self.name));
        }

        match self.transport {
            TransportKind::SyncRpc => {
                let url = url::Url::parse(&self.address).map_err(|e| {
                    anyhow::anyhow!("端点 {} 的地址无效 {}: {e}", self.name, self.address)
                })?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(anyhow::anyhow!(
                        "端点 {} 的地址必须是HTTP(S)格式: {}",
                        self.name,
                        self.address
                    ));
                }
            }
            TransportKind::AsyncPublish => {
                if self.address.is_empty() {
                    return Err(anyhow::anyhow!("端点 {} 的路由键不能为空", self.name));
                }
                if self.event_type.as_deref().map_or(true, str::is_empty) {
                    return Err(anyhow::anyhow!("异步端点 {} 必须配置事件类型", self.name));
                }
            }
        }

        self.retry
            .validate()
            .map_err(|e| anyhow::anyhow!("端点 {} 的重试策略无效: {e}", self.name))
    }
}

/// 路由配置：一个 (方法, 路径模式) 对应一个能力
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
    pub method: String,
    pub path: String,
    pub capability: String,
}

impl RouteConfig {
    pub fn new(method: &str, path: &str, capability: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            capability: capability.to_string(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.method.is_empty() {
            return Err(anyhow::anyhow!("路由方法不能为空: {}", self.path));
        }
        if !self.path.starts_with('/') {
            return Err(anyhow::anyhow!("路由路径必须以 / 开头: {}", self.path));
        }
        if self.capability.is_empty() {
            return Err(anyhow::anyhow!("路由 {} {} 未指定能力", self.method, self.path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_endpoint() -> EndpointConfig {
        EndpointConfig {
            name: "user-service.get".to_string(),
            service: "user-service".to_string(),
            capability: "user.get".to_string(),
            address: "http://localhost:50054".to_string(),
            transport: TransportKind::SyncRpc,
            timeout_ms: 2_000,
            idempotent: true,
            required: true,
            event_type: None,
            max_connections: None,
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn test_sync_endpoint_requires_http_address() {
        assert!(sync_endpoint().validate().is_ok());

        let mut endpoint = sync_endpoint();
        endpoint.address = "amqp://localhost".to_string();
        assert!(endpoint.validate().is_err());

        endpoint.address = "not a url".to_string();
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn test_async_endpoint_requires_event_type() {
        let mut endpoint = sync_endpoint();
        endpoint.transport = TransportKind::AsyncPublish;
        endpoint.address = "notifications.send".to_string();
        assert!(endpoint.validate().is_err());

        endpoint.event_type = Some("notification.requested".to_string());
        assert!(endpoint.validate().is_ok());
    }

    #[test]
    fn test_route_path_must_be_absolute() {
        assert!(RouteConfig::new("GET", "/users/:id", "user.get")
            .validate()
            .is_ok());
        assert!(RouteConfig::new("GET", "users/:id", "user.get")
            .validate()
            .is_err());
    }
}
