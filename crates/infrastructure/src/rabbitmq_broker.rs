use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use gateway_core::{BrokerConfig, BrokerError};
use gateway_domain::{Broker, OutboundMessage, PublishReceipt};
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    ExchangeKind,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// RabbitMQ消息代理
///
/// 所有事件发布到同一个 topic exchange，路由键为端点地址。通道开启发布确认，
/// 发布在互斥的单一通道上按顺序提交，确认在锁外等待。
pub struct RabbitMqBroker {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    config: BrokerConfig,
}

impl RabbitMqBroker {
    /// 连接RabbitMQ并声明exchange
    pub async fn connect(config: BrokerConfig) -> Result<Self, BrokerError> {
        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds);
        let connection = tokio::time::timeout(
            connect_timeout,
            Connection::connect(&config.url, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| BrokerError::Unavailable(format!("连接RabbitMQ超时: {connect_timeout:?}")))?
        .map_err(|e| BrokerError::Unavailable(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Unavailable(format!("创建通道失败: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Unavailable(format!("开启发布确认失败: {e}")))?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                BrokerError::Unavailable(format!("声明exchange {} 失败: {e}", config.exchange))
            })?;

        info!(exchange = %config.exchange, "成功连接到RabbitMQ");

        Ok(Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            config,
        })
    }

    fn properties(message: &OutboundMessage) -> BasicProperties {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        BasicProperties::default()
            .with_delivery_mode(2) // 2 = persistent
            .with_content_type("application/json".into())
            .with_message_id(message.message_id.clone().into())
            .with_correlation_id(message.correlation_id.clone().into())
            .with_kind(message.event_type.clone().into())
            .with_timestamp(timestamp)
    }
}

#[async_trait]
impl Broker for RabbitMqBroker {
    fn kind(&self) -> &'static str {
        "rabbitmq"
    }

    fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    async fn submit(&self, message: OutboundMessage) -> Result<PublishReceipt, BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Unavailable("RabbitMQ连接已断开".to_string()));
        }

        let confirm = {
            let channel = self.channel.lock().await;
            channel
                .basic_publish(
                    &self.config.exchange,
                    &message.routing_key,
                    BasicPublishOptions::default(),
                    &message.body,
                    Self::properties(&message),
                )
                .await
                .map_err(|e| {
                    BrokerError::Unavailable(format!(
                        "发布消息到 {} 失败: {e}",
                        message.routing_key
                    ))
                })?
        };

        debug!(
            routing_key = %message.routing_key,
            message_id = %message.message_id,
            "消息已提交，等待确认"
        );

        let message_id = message.message_id;
        Ok(PublishReceipt::new(async move {
            let confirmation = confirm
                .await
                .map_err(|e| BrokerError::Unavailable(format!("等待发布确认失败: {e}")))?;
            if confirmation.is_nack() {
                warn!(message_id = %message_id, "消息被RabbitMQ拒绝");
                return Err(BrokerError::Rejected(format!("消息 {message_id} 被拒绝")));
            }
            Ok(())
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Ok(());
        }
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| BrokerError::Unavailable(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}
