//! 同步RPC分发

use std::sync::Arc;

use gateway_core::{
    CircuitBreakerConfig, CircuitState, DispatchError, GatewayResult, PoolConfig, RequestContext,
    TransportError,
};
use gateway_domain::{CapabilityEndpoint, CapabilityRequest, ConnectionFactory, RpcRequest, RpcResponse};
use tracing::{debug, warn};

use crate::circuit_breaker::HealthRecord;
use crate::metrics;
use crate::pool::{ConnectionPool, PoolError};
use crate::retry::backoff_delay;
use crate::timeout::{run_bounded, Bounded, WaitBudget};

/// 单次尝试的失败
enum AttemptError {
    /// 传输失败，计入熔断并可能重试
    Transport(TransportError),
    /// 不计入熔断，直接返回给调用方
    Dispatch(DispatchError),
}

/// 同步端点：端点定义、连接池与健康记录
pub struct SyncEndpoint {
    endpoint: CapabilityEndpoint,
    pool: ConnectionPool,
    health: Arc<HealthRecord>,
}

impl SyncEndpoint {
    pub fn new(
        endpoint: CapabilityEndpoint,
        factory: Arc<dyn ConnectionFactory>,
        pool_config: &PoolConfig,
        circuit_config: CircuitBreakerConfig,
    ) -> Self {
        let health = Arc::new(HealthRecord::new(&endpoint, circuit_config));
        let pool = ConnectionPool::new(endpoint.clone(), factory, pool_config);
        Self {
            endpoint,
            pool,
            health,
        }
    }

    pub fn endpoint(&self) -> &CapabilityEndpoint {
        &self.endpoint
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn health(&self) -> &Arc<HealthRecord> {
        &self.health
    }

    /// 调用下游能力，返回的响应原样透传（包括应用层错误）
    ///
    /// 首次尝试前熔断器已打开时快速失败；幂等端点在传输失败时按退避策略重试，
    /// 非幂等端点只尝试一次。重试途中熔断器被打开则停止重试，按已做的尝试次数
    /// 返回`UpstreamUnavailable`。
    pub async fn call(
        &self,
        request: &CapabilityRequest,
        ctx: &RequestContext,
    ) -> GatewayResult<RpcResponse> {
        let payload = request.payload()?;
        let max_attempts = self.endpoint.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if ctx.is_expired() {
                return Err(DispatchError::DeadlineExceeded);
            }

            let permit = match self.health.try_acquire() {
                Ok(permit) => permit,
                Err(_) if attempt == 1 => {
                    return Err(DispatchError::CircuitOpen {
                        endpoint: self.endpoint.name.clone(),
                    })
                }
                Err(_) => return Err(self.exhausted(attempt - 1)),
            };

            let rpc = RpcRequest {
                operation: request.operation().to_string(),
                payload: payload.clone(),
                trace_id: ctx.trace_id().to_string(),
                credentials: ctx.credentials().map(str::to_string),
                timeout: self.endpoint.timeout,
            };

            metrics::record_attempt(&self.endpoint.name);
            match self.attempt(rpc, ctx).await {
                Ok(response) => {
                    permit.success();
                    debug!(
                        endpoint = %self.endpoint.name,
                        trace_id = %ctx.trace_id(),
                        attempt,
                        status = response.status,
                        "下游调用完成"
                    );
                    return Ok(response);
                }
                Err(AttemptError::Dispatch(error)) => {
                    // 许可未结算：普通许可不计数，试探许可会重新打开熔断器
                    drop(permit);
                    return Err(error);
                }
                Err(AttemptError::Transport(error)) => {
                    permit.failure();
                    warn!(
                        endpoint = %self.endpoint.name,
                        trace_id = %ctx.trace_id(),
                        attempt,
                        max_attempts,
                        error = %error,
                        "下游传输失败"
                    );

                    if attempt >= max_attempts || self.health.state() != CircuitState::Closed {
                        return Err(self.exhausted(attempt));
                    }

                    let delay =
                        backoff_delay(&self.endpoint.retry, attempt - 1).min(ctx.remaining());
                    metrics::record_retry(&self.endpoint.name);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        mut rpc: RpcRequest,
        ctx: &RequestContext,
    ) -> Result<RpcResponse, AttemptError> {
        let mut connection = self
            .pool
            .acquire(ctx.deadline())
            .await
            .map_err(|e| self.pool_error(e))?;

        let budget = WaitBudget::new(self.endpoint.timeout, ctx.deadline());
        rpc.timeout = budget.remaining();

        match run_bounded(budget, connection.call(&rpc)).await {
            Bounded::Completed(Ok(response)) => Ok(response),
            Bounded::Completed(Err(error)) => Err(AttemptError::Transport(error)),
            Bounded::DeadlineExpired => Err(AttemptError::Dispatch(DispatchError::DeadlineExceeded)),
            Bounded::LimitExpired => Err(AttemptError::Transport(TransportError::Timeout(
                self.endpoint.timeout,
            ))),
        }
    }

    fn exhausted(&self, attempts: u32) -> DispatchError {
        DispatchError::UpstreamUnavailable {
            endpoint: self.endpoint.name.clone(),
            attempts,
        }
    }

    fn pool_error(&self, error: PoolError) -> AttemptError {
        match error {
            PoolError::Connect(e) => AttemptError::Transport(e),
            PoolError::Exhausted => AttemptError::Dispatch(DispatchError::PoolExhausted {
                endpoint: self.endpoint.name.clone(),
            }),
            PoolError::DeadlineExceeded => AttemptError::Dispatch(DispatchError::DeadlineExceeded),
            PoolError::Closed => {
                AttemptError::Dispatch(DispatchError::Internal("连接池已关闭".to_string()))
            }
        }
    }
}
