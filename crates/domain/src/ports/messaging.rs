use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use gateway_core::BrokerError;
use serde::{Deserialize, Serialize};

/// 提交给消息代理的消息
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub routing_key: String,
    pub message_id: String,
    pub correlation_id: String,
    pub event_type: String,
    pub body: Vec<u8>,
}

/// 提交成功后得到的回执，`confirm` 等待代理确认
pub struct PublishReceipt {
    confirmation: BoxFuture<'static, Result<(), BrokerError>>,
}

impl PublishReceipt {
    pub fn new<F>(confirmation: F) -> Self
    where
        F: Future<Output = Result<(), BrokerError>> + Send + 'static,
    {
        Self {
            confirmation: confirmation.boxed(),
        }
    }

    /// 已被确认的回执
    pub fn confirmed() -> Self {
        Self::new(futures::future::ready(Ok(())))
    }

    pub async fn confirm(self) -> Result<(), BrokerError> {
        self.confirmation.await
    }
}

impl std::fmt::Debug for PublishReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishReceipt").finish_non_exhaustive()
    }
}

/// 代理确认后返回给调用方的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishAck {
    pub event_type: String,
    pub correlation_id: String,
    pub message_id: String,
}

/// 消息代理
///
/// 发布分两个阶段：`submit` 在单一通道上按顺序提交消息，返回的回执
/// 在代理确认（或拒绝）后完成。
#[async_trait]
pub trait Broker: Send + Sync {
    fn kind(&self) -> &'static str;

    fn is_connected(&self) -> bool;

    async fn submit(&self, message: OutboundMessage) -> Result<PublishReceipt, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}
