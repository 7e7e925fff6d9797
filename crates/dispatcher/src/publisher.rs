//! 异步发布
//!
//! 两个阶段都受 `min(请求截止时间, 确认超时)` 约束：先在代理的单一通道上提交，
//! 再等待代理确认。

use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use gateway_core::{DispatchError, GatewayResult, RequestContext};
use gateway_domain::{
    Broker, CapabilityEndpoint, CapabilityRequest, EventEnvelope, OutboundMessage, PublishAck,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::timeout::{run_bounded, Bounded, WaitBudget};

pub struct Publisher {
    broker: Arc<dyn Broker>,
    ack_timeout: Duration,
}

impl Publisher {
    pub fn new(broker: Arc<dyn Broker>, ack_timeout: Duration) -> Self {
        Self {
            broker,
            ack_timeout,
        }
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub async fn publish(
        &self,
        endpoint: &CapabilityEndpoint,
        request: &CapabilityRequest,
        ctx: &RequestContext,
    ) -> GatewayResult<PublishAck> {
        let started = StdInstant::now();
        let event_type = endpoint.event_type().to_string();

        let result = self.submit_and_confirm(endpoint, &event_type, request, ctx).await;

        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(DispatchError::PublishTimeout { .. }) => "timeout",
            Err(_) => "failed",
        };
        metrics::record_publish(&event_type, outcome, started.elapsed());
        result
    }

    async fn submit_and_confirm(
        &self,
        endpoint: &CapabilityEndpoint,
        event_type: &str,
        request: &CapabilityRequest,
        ctx: &RequestContext,
    ) -> GatewayResult<PublishAck> {
        let envelope = EventEnvelope::new(event_type, ctx.correlation_id(), request.payload()?);
        let message = OutboundMessage {
            routing_key: endpoint.address.clone(),
            message_id: Uuid::new_v4().to_string(),
            correlation_id: ctx.correlation_id().to_string(),
            event_type: event_type.to_string(),
            body: envelope.to_bytes()?,
        };
        let message_id = message.message_id.clone();
        let timeout = || DispatchError::PublishTimeout {
            event_type: event_type.to_string(),
        };

        let budget = WaitBudget::new(self.ack_timeout, ctx.deadline());

        let receipt = match run_bounded(budget, self.broker.submit(message)).await {
            Bounded::Completed(result) => result.map_err(|e| {
                warn!(event_type, error = %e, "提交消息失败");
                DispatchError::from(e)
            })?,
            Bounded::DeadlineExpired | Bounded::LimitExpired => {
                warn!(event_type, "提交消息超时");
                return Err(timeout());
            }
        };

        match run_bounded(budget, receipt.confirm()).await {
            Bounded::Completed(result) => result.map_err(|e| {
                warn!(event_type, error = %e, "消息未被代理确认");
                DispatchError::from(e)
            })?,
            Bounded::DeadlineExpired | Bounded::LimitExpired => {
                warn!(event_type, "等待代理确认超时");
                return Err(timeout());
            }
        }

        info!(
            event_type,
            correlation_id = %ctx.correlation_id(),
            message_id = %message_id,
            routing_key = %endpoint.address,
            "事件已发布并确认"
        );

        Ok(PublishAck {
            event_type: event_type.to_string(),
            correlation_id: ctx.correlation_id().to_string(),
            message_id,
        })
    }
}
