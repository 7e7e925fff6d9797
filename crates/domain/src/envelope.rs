use chrono::{DateTime, Utc};
use gateway_core::BrokerError;
use serde::{Deserialize, Serialize};

/// 异步发布时包装业务负载的事件信封
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    pub event_type: String,
    pub correlation_id: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        correlation_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            correlation_id: correlation_id.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BrokerError> {
        serde_json::to_vec(self).map_err(|e| BrokerError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BrokerError> {
        serde_json::from_slice(bytes).map_err(|e| BrokerError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_format() {
        let envelope = EventEnvelope::new(
            "notification.requested",
            "corr-1",
            json!({"user_id": 7, "channel": "email", "message": "hi"}),
        );
        let value: serde_json::Value = serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();

        assert_eq!(value["event_type"], "notification.requested");
        assert_eq!(value["correlation_id"], "corr-1");
        assert_eq!(value["payload"]["user_id"], 7);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_invalid_bytes_are_serialization_errors() {
        let err = EventEnvelope::from_bytes(b"not json").unwrap_err();
        assert!(matches!(err, BrokerError::Serialization(_)));
    }
}
