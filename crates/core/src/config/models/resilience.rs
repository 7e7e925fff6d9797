use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection pool defaults, shared by every sync endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: usize,
    /// Longest a caller waits for a free connection, further bounded by its deadline
    pub acquire_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            acquire_timeout_ms: 1_000,
            connect_timeout_ms: 2_000,
        }
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("连接池最大连接数必须大于0"));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(anyhow::anyhow!("连接池获取超时时间必须大于0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }
        Ok(())
    }
}

/// 重试策略配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大尝试次数（包含首次调用）
    pub max_attempts: u32,
    /// 首次重试前的退避时间（毫秒）
    pub initial_backoff_ms: u64,
    /// 最大退避时间（毫秒）
    pub max_backoff_ms: u64,
    /// 指数退避倍数
    pub multiplier: f64,
    /// 退避时间的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
            multiplier: 2.0,
            jitter_factor: 0.1, // 10%的随机抖动
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }
        if self.multiplier < 1.0 {
            return Err(anyhow::anyhow!("退避倍数不能小于1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!("抖动系数必须在0.0到1.0之间"));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(anyhow::anyhow!("最大退避时间不能小于初始退避时间"));
        }
        Ok(())
    }
}
