//! 每个同步端点的连接池
//!
//! 容量由信号量限制，空闲连接放在短暂持有的互斥锁中，只做push/pop，
//! 网络调用期间不持有任何锁。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use gateway_core::{PoolConfig, TransportError};
use gateway_domain::{CapabilityEndpoint, Connection, ConnectionFactory, RpcRequest, RpcResponse};
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::debug;

use crate::metrics;
use crate::timeout::{run_bounded, Bounded, WaitBudget};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("等待连接超时")]
    Exhausted,

    #[error("等待连接时请求已超过截止时间")]
    DeadlineExceeded,

    #[error("连接池已关闭")]
    Closed,

    #[error(transparent)]
    Connect(#[from] TransportError),
}

pub struct ConnectionPool {
    endpoint: CapabilityEndpoint,
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<Vec<Box<dyn Connection>>>,
    permits: Semaphore,
    max_connections: usize,
    acquire_timeout: Duration,
    connect_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(
        endpoint: CapabilityEndpoint,
        factory: Arc<dyn ConnectionFactory>,
        config: &PoolConfig,
    ) -> Self {
        let max_connections = endpoint.max_connections.unwrap_or(config.max_connections);
        Self {
            endpoint,
            factory,
            idle: Mutex::new(Vec::with_capacity(max_connections)),
            permits: Semaphore::new(max_connections),
            max_connections,
            acquire_timeout: config.acquire_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }

    /// 当前可被借出的连接数（空闲或尚未创建）
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn idle_count(&self) -> usize {
        self.idle_list().len()
    }

    fn idle_list(&self) -> MutexGuard<'_, Vec<Box<dyn Connection>>> {
        // push/pop 不会在持锁期间panic，中毒的锁内容仍然可用
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 借出一个连接，等待时间为 `min(acquire_timeout, deadline)`
    ///
    /// 没有空闲连接时通过工厂懒创建，建连失败计为传输失败。
    pub async fn acquire(&self, deadline: Instant) -> Result<PooledConnection<'_>, PoolError> {
        let budget = WaitBudget::new(self.acquire_timeout, deadline);
        let permit = match run_bounded(budget, self.permits.acquire()).await {
            Bounded::Completed(Ok(permit)) => permit,
            Bounded::Completed(Err(_)) => return Err(PoolError::Closed),
            Bounded::DeadlineExpired => {
                metrics::record_pool_timeout(&self.endpoint.name);
                return Err(PoolError::DeadlineExceeded);
            }
            Bounded::LimitExpired => {
                metrics::record_pool_timeout(&self.endpoint.name);
                return Err(PoolError::Exhausted);
            }
        };

        let idle = self.idle_list().pop();
        let connection = match idle {
            Some(connection) => connection,
            None => self.connect(deadline).await?,
        };

        Ok(PooledConnection {
            pool: self,
            connection: Some(connection),
            reusable: true,
            _permit: permit,
        })
    }

    async fn connect(&self, deadline: Instant) -> Result<Box<dyn Connection>, PoolError> {
        debug!(endpoint = %self.endpoint.name, "创建新连接");
        let budget = WaitBudget::new(self.connect_timeout, deadline);
        match run_bounded(budget, self.factory.connect(&self.endpoint)).await {
            Bounded::Completed(result) => Ok(result?),
            Bounded::DeadlineExpired => Err(PoolError::DeadlineExceeded),
            Bounded::LimitExpired => Err(PoolError::Connect(TransportError::Timeout(
                self.connect_timeout,
            ))),
        }
    }

    /// 关闭连接池：唤醒所有等待者并丢弃空闲连接
    pub fn close(&self) {
        self.permits.close();
        self.idle_list().clear();
    }

    fn release(&self, connection: Box<dyn Connection>) {
        let mut idle = self.idle_list();
        if !self.permits.is_closed() && idle.len() < self.max_connections {
            idle.push(connection);
        }
    }
}

/// 借出的连接，被一个调用独占
///
/// 丢弃时立即释放容量；调用成功的连接放回空闲列表，调用失败或被中途取消的连接直接丢弃。
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    connection: Option<Box<dyn Connection>>,
    reusable: bool,
    _permit: SemaphorePermit<'a>,
}

impl PooledConnection<'_> {
    pub async fn call(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionReset("连接已被回收".to_string()))?;

        self.reusable = false;
        let response = connection.call(request).await?;
        self.reusable = true;
        Ok(response)
    }
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("endpoint", &self.pool.endpoint.name)
            .field("reusable", &self.reusable)
            .finish()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            if self.reusable {
                self.pool.release(connection);
            } else {
                debug!(endpoint = %self.pool.endpoint.name, "丢弃损坏的连接");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_core::{EndpointConfig, RetryConfig, TransportKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoConnection {
        fail: bool,
    }

    #[async_trait]
    impl Connection for EchoConnection {
        async fn call(&mut self, _request: &RpcRequest) -> Result<RpcResponse, TransportError> {
            if self.fail {
                Err(TransportError::ConnectionReset("reset".to_string()))
            } else {
                Ok(RpcResponse::json(200, &serde_json::json!({"ok": true})))
            }
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        fail_calls: bool,
    }

    #[async_trait]
    impl ConnectionFactory for CountingFactory {
        async fn connect(
            &self,
            _endpoint: &CapabilityEndpoint,
        ) -> Result<Box<dyn Connection>, TransportError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoConnection {
                fail: self.fail_calls,
            }))
        }
    }

    fn endpoint() -> CapabilityEndpoint {
        CapabilityEndpoint::from(&EndpointConfig {
            name: "inventory-service.get".to_string(),
            service: "inventory-service".to_string(),
            capability: "inventory.get".to_string(),
            address: "http://localhost:50051".to_string(),
            transport: TransportKind::SyncRpc,
            timeout_ms: 100,
            idempotent: true,
            required: true,
            event_type: None,
            max_connections: Some(2),
            retry: RetryConfig::default(),
        })
    }

    fn pool(factory: Arc<CountingFactory>, acquire_timeout_ms: u64) -> ConnectionPool {
        let config = PoolConfig {
            acquire_timeout_ms,
            ..PoolConfig::default()
        };
        ConnectionPool::new(endpoint(), factory, &config)
    }

    fn request() -> RpcRequest {
        RpcRequest {
            operation: "inventory.get".to_string(),
            payload: serde_json::json!({"sku": "SKU-1"}),
            trace_id: "trace".to_string(),
            credentials: None,
            timeout: Duration::from_millis(100),
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_connections_are_reused() {
        let factory = Arc::new(CountingFactory::default());
        let pool = pool(factory.clone(), 100);

        for _ in 0..3 {
            let mut conn = pool.acquire(far_deadline()).await.unwrap();
            conn.call(&request()).await.unwrap();
        }

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_broken_connections_are_discarded() {
        let factory = Arc::new(CountingFactory {
            fail_calls: true,
            ..CountingFactory::default()
        });
        let pool = pool(factory.clone(), 100);

        let mut conn = pool.acquire(far_deadline()).await.unwrap();
        assert!(conn.call(&request()).await.is_err());
        drop(conn);

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_when_acquire_timeout_binds() {
        let pool = pool(Arc::new(CountingFactory::default()), 20);
        let _a = pool.acquire(far_deadline()).await.unwrap();
        let _b = pool.acquire(far_deadline()).await.unwrap();

        let err = pool.acquire(far_deadline()).await.unwrap_err();
        assert_eq!(err, PoolError::Exhausted);
    }

    #[tokio::test]
    async fn test_deadline_during_wait_leaves_capacity_unchanged() {
        let pool = pool(Arc::new(CountingFactory::default()), 5_000);
        let a = pool.acquire(far_deadline()).await.unwrap();
        let b = pool.acquire(far_deadline()).await.unwrap();
        assert_eq!(pool.available(), 0);

        let deadline = Instant::now() + Duration::from_millis(20);
        let err = pool.acquire(deadline).await.unwrap_err();
        assert_eq!(err, PoolError::DeadlineExceeded);
        assert_eq!(pool.available(), 0);

        drop(a);
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_waiters() {
        let pool = pool(Arc::new(CountingFactory::default()), 100);
        pool.close();
        let err = pool.acquire(far_deadline()).await.unwrap_err();
        assert_eq!(err, PoolError::Closed);
    }
}
