use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gateway_core::BrokerError;
use gateway_domain::{Broker, EventEnvelope, OutboundMessage, PublishReceipt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// 内存消息代理
///
/// 每个路由键一条有界队列，提交即确认。适用于单进程部署与测试；
/// 部署时由`start_delivery_sink`启动的后台任务取走排队的事件。
#[derive(Debug)]
pub struct InMemoryBroker {
    queues: RwLock<HashMap<String, QueueChannels>>,
    capacity: usize,
    closed: AtomicBool,
}

#[derive(Debug)]
struct QueueChannels {
    sender: mpsc::Sender<OutboundMessage>,
    receiver: Arc<Mutex<mpsc::Receiver<OutboundMessage>>>,
}

impl QueueChannels {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

impl InMemoryBroker {
    pub fn new(capacity: usize) -> Self {
        info!(capacity, "创建内存消息代理");
        Self {
            queues: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    async fn sender_for(&self, routing_key: &str) -> mpsc::Sender<OutboundMessage> {
        if let Some(queue) = self.queues.read().await.get(routing_key) {
            return queue.sender.clone();
        }
        let mut queues = self.queues.write().await;
        queues
            .entry(routing_key.to_string())
            .or_insert_with(|| QueueChannels::new(self.capacity))
            .sender
            .clone()
    }

    /// 启动后台投递任务，按间隔取走所有队列中的事件并写入日志
    ///
    /// 代理关闭或被释放后任务退出。
    pub fn start_delivery_sink(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let broker = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(broker) = broker.upgrade() else {
                    break;
                };
                if !broker.is_connected() {
                    break;
                }
                broker.deliver_pending().await;
            }
            debug!("内存代理投递任务退出");
        })
    }

    async fn deliver_pending(&self) -> usize {
        let routing_keys: Vec<String> = self.queues.read().await.keys().cloned().collect();
        let mut delivered = 0;
        for routing_key in routing_keys {
            for message in self.drain(&routing_key).await {
                info!(
                    routing_key = %routing_key,
                    message_id = %message.message_id,
                    event_type = %message.event_type,
                    correlation_id = %message.correlation_id,
                    "内存代理投递事件"
                );
                delivered += 1;
            }
        }
        delivered
    }

    /// 取出某个路由键下当前排队的全部消息
    pub async fn drain(&self, routing_key: &str) -> Vec<OutboundMessage> {
        let receiver = match self.queues.read().await.get(routing_key) {
            Some(queue) => queue.receiver.clone(),
            None => return Vec::new(),
        };
        let mut receiver = receiver.lock().await;
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// 取出排队的事件并解码为信封
    pub async fn drain_events(&self, routing_key: &str) -> Result<Vec<EventEnvelope>, BrokerError> {
        self.drain(routing_key)
            .await
            .iter()
            .map(|m| EventEnvelope::from_bytes(&m.body))
            .collect()
    }

    /// 某个路由键下排队的消息数
    pub async fn queue_size(&self, routing_key: &str) -> usize {
        self.queues
            .read()
            .await
            .get(routing_key)
            .map(|q| self.capacity - q.sender.capacity())
            .unwrap_or(0)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    fn kind(&self) -> &'static str {
        "in_memory"
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn submit(&self, message: OutboundMessage) -> Result<PublishReceipt, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("内存消息代理已关闭".to_string()));
        }

        let sender = self.sender_for(&message.routing_key).await;
        let routing_key = message.routing_key.clone();
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                BrokerError::Rejected(format!("队列 {routing_key} 已满"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                BrokerError::Unavailable(format!("队列 {routing_key} 已关闭"))
            }
        })?;

        debug!(routing_key = %routing_key, "消息已写入内存队列");
        Ok(PublishReceipt::confirmed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        info!("内存消息代理已关闭");
        Ok(())
    }
}
