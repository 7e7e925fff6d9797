use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use gateway_core::{EndpointConfig, RetryConfig, TransportKind};
use serde::{Deserialize, Serialize};

/// HTTP方法
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(format!("不支持的HTTP方法: {s}")),
        }
    }
}

/// 路由：(方法, 路径模式) → (能力, 传输方式)
///
/// 启动时由配置构建，之后只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub pattern: String,
    pub capability: String,
    pub transport: TransportKind,
}

/// 路由解析结果，附带从路径中捕获的参数
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub route: Route,
    pub path_params: HashMap<String, String>,
}

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 总尝试次数（包含首次）
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
            jitter_factor: config.jitter_factor,
        }
    }
}

/// 下游能力端点
#[derive(Debug, Clone)]
pub struct CapabilityEndpoint {
    pub name: String,
    pub service: String,
    pub capability: String,
    pub address: String,
    pub transport: TransportKind,
    pub timeout: Duration,
    pub idempotent: bool,
    pub required: bool,
    pub event_type: Option<String>,
    pub max_connections: Option<usize>,
    pub retry: RetryPolicy,
}

impl From<&EndpointConfig> for CapabilityEndpoint {
    fn from(config: &EndpointConfig) -> Self {
        Self {
            name: config.name.clone(),
            service: config.service.clone(),
            capability: config.capability.clone(),
            address: config.address.clone(),
            transport: config.transport,
            timeout: Duration::from_millis(config.timeout_ms),
            idempotent: config.idempotent,
            required: config.required,
            event_type: config.event_type.clone(),
            max_connections: config.max_connections,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

impl CapabilityEndpoint {
    /// 本端点一次分发最多允许的尝试次数，非幂等端点只尝试一次
    pub fn max_attempts(&self) -> u32 {
        if self.idempotent {
            self.retry.max_attempts
        } else {
            1
        }
    }

    /// 发布的事件类型，未配置时使用能力标识
    pub fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or(&self.capability)
    }
}
