//! 单个入站请求的上下文
//!
//! 在请求进入时创建，在响应写出后销毁，从不持久化。

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: String,
    correlation_id: String,
    deadline: Instant,
    credentials: Option<String>,
}

impl RequestContext {
    /// 创建新的请求上下文，截止时间为当前时间加上`timeout`
    pub fn new(timeout: Duration) -> Self {
        let trace_id = Uuid::new_v4().to_string();
        Self {
            correlation_id: trace_id.clone(),
            trace_id,
            deadline: Instant::now() + timeout,
            credentials: None,
        }
    }

    /// 使用调用方传入的追踪ID；关联ID未单独指定时跟随追踪ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        if self.correlation_id == self.trace_id {
            self.correlation_id = trace_id.clone();
        }
        self.trace_id = trace_id;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// 调用方凭证，不做解析，原样透传给下游
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn credentials(&self) -> Option<&str> {
        self.credentials.as_deref()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// 距离截止时间的剩余时长，已过期时为零
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
