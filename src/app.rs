use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gateway_api::create_app;
use gateway_core::GatewayConfig;
use gateway_dispatcher::DispatchCore;
use gateway_infrastructure::{BrokerFactory, HttpConnectionFactory};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

/// 网关应用：分发核心加上HTTP入口
pub struct GatewayApp {
    config: GatewayConfig,
    core: Arc<DispatchCore>,
}

impl GatewayApp {
    /// 根据配置创建消息代理与传输，构建分发核心
    pub async fn new(config: GatewayConfig) -> Result<Self> {
        info!(
            endpoints = config.endpoints.len(),
            routes = config.routes.len(),
            broker = ?config.broker.r#type,
            "初始化网关"
        );

        let broker = BrokerFactory::create(&config.broker).await?;
        let factory = Arc::new(HttpConnectionFactory::new(&config.pool));
        let core = DispatchCore::new(&config, factory, broker).context("创建分发核心失败")?;

        Ok(Self {
            config,
            core: Arc::new(core),
        })
    }

    pub fn core(&self) -> &Arc<DispatchCore> {
        &self.core
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let address = &self.config.server.bind_address;
        TcpListener::bind(address)
            .await
            .with_context(|| format!("绑定监听地址失败: {address}"))
    }

    /// 运行HTTP服务直到收到关闭信号，然后在限定时间内排空请求并关闭分发核心
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let app = create_app(self.core.clone(), &self.config);
        let local_addr = listener.local_addr().context("获取监听地址失败")?;
        info!("网关HTTP服务启动在: {}", local_addr);

        let (drained_tx, drained_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    let _ = drained_tx.send(());
                })
                .await;
            if let Err(e) = &result {
                warn!("HTTP服务异常退出: {e}");
            }
            result
        });

        let _ = drained_rx.await;
        let drain_timeout = Duration::from_secs(self.config.server.shutdown_timeout_seconds);
        info!("开始排空进行中的请求（超时: {:?}）", drain_timeout);

        match tokio::time::timeout(drain_timeout, server).await {
            Ok(Ok(Ok(()))) => info!("HTTP服务已停止"),
            Ok(Ok(Err(e))) => warn!("HTTP服务停止时发生错误: {e}"),
            Ok(Err(e)) => warn!("HTTP服务任务失败: {e}"),
            Err(_) => warn!("排空请求超时，强制停止"),
        }

        self.core.shutdown().await;
        Ok(())
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_rx).await
    }
}
