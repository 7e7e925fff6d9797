use std::time::Duration;

use thiserror::Error;

/// 网关分发错误
///
/// 路由类错误（`NotFound`、`MethodNotAllowed`、`InvalidRequest`）属于客户端错误，原样返回；
/// 其余为分发错误，对外统一为规范化的失败响应，只携带错误类型，不暴露传输层细节。
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("路由未找到: {method} {path}")]
    NotFound { method: String, path: String },

    #[error("方法不被允许: {method} {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
    },

    #[error("请求无效: {0}")]
    InvalidRequest(String),

    #[error("连接池已耗尽: {endpoint}")]
    PoolExhausted { endpoint: String },

    #[error("熔断器已打开: {endpoint}")]
    CircuitOpen { endpoint: String },

    #[error("上游服务不可用: {endpoint} (尝试次数: {attempts})")]
    UpstreamUnavailable { endpoint: String, attempts: u32 },

    #[error("请求已超过截止时间")]
    DeadlineExceeded,

    #[error("发布确认超时: {event_type}")]
    PublishTimeout { event_type: String },

    #[error("消息代理不可用: {0}")]
    BrokerUnavailable(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误类型标识，附加在对外响应与日志中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    MethodNotAllowed,
    InvalidRequest,
    PoolExhausted,
    CircuitOpen,
    UpstreamUnavailable,
    DeadlineExceeded,
    PublishTimeout,
    BrokerUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::PoolExhausted => "POOL_EXHAUSTED",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::PublishTimeout => "PUBLISH_TIMEOUT",
            ErrorKind::BrokerUnavailable => "BROKER_UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound { .. } => ErrorKind::NotFound,
            DispatchError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            DispatchError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            DispatchError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            DispatchError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            DispatchError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            DispatchError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            DispatchError::PublishTimeout { .. } => ErrorKind::PublishTimeout,
            DispatchError::BrokerUnavailable(_) => ErrorKind::BrokerUnavailable,
            DispatchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 是否为客户端错误（路由/请求格式问题）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::MethodNotAllowed | ErrorKind::InvalidRequest
        )
    }
}

/// 传输层错误，只在分发核心内部使用，用于决定重试与熔断
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("建立连接失败: {0}")]
    Connect(String),

    #[error("连接被重置: {0}")]
    ConnectionReset(String),

    #[error("调用超时 (超时时间: {0:?})")]
    Timeout(Duration),
}

/// 消息代理错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("消息代理不可用: {0}")]
    Unavailable(String),

    #[error("消息被代理拒绝: {0}")]
    Rejected(String),

    #[error("序列化错误: {0}")]
    Serialization(String),
}

impl From<BrokerError> for DispatchError {
    fn from(error: BrokerError) -> Self {
        match error {
            BrokerError::Serialization(msg) => DispatchError::Internal(msg),
            other => DispatchError::BrokerUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_errors_are_client_errors() {
        let not_found = DispatchError::NotFound {
            method: "GET".to_string(),
            path: "/missing".to_string(),
        };
        assert!(not_found.is_client_error());
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let circuit = DispatchError::CircuitOpen {
            endpoint: "user-service.get".to_string(),
        };
        assert!(!circuit.is_client_error());
        assert_eq!(circuit.kind().as_str(), "CIRCUIT_OPEN");
    }

    #[test]
    fn test_broker_error_conversion() {
        let error: DispatchError = BrokerError::Rejected("nack".to_string()).into();
        assert_eq!(error.kind(), ErrorKind::BrokerUnavailable);

        let error: DispatchError = BrokerError::Serialization("bad".to_string()).into();
        assert_eq!(error.kind(), ErrorKind::Internal);
    }
}
