use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_dispatcher::DispatchOutcome;
use gateway_domain::{PublishAck, RpcResponse};
use serde::{Deserialize, Serialize};

/// 异步发布被代理确认后的响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub event_type: String,
    pub correlation_id: String,
    pub message_id: String,
}

impl From<PublishAck> for AcceptedResponse {
    fn from(ack: PublishAck) -> Self {
        Self {
            status: "accepted".to_string(),
            event_type: ack.event_type,
            correlation_id: ack.correlation_id,
            message_id: ack.message_id,
        }
    }
}

/// 下游响应原样透传：状态码、内容类型与响应体
fn passthrough(response: RpcResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut out = (status, Body::from(response.body)).into_response();
    if let Some(value) = response
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        out.headers_mut().insert(CONTENT_TYPE, value);
    }
    out
}

pub fn outcome_response(outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::Response(response) => passthrough(response),
        DispatchOutcome::Accepted(ack) => {
            (StatusCode::ACCEPTED, Json(AcceptedResponse::from(ack))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_keeps_status_and_body() {
        let response = outcome_response(DispatchOutcome::Response(RpcResponse {
            status: 404,
            content_type: Some("application/json".to_string()),
            body: br#"{"error":"user not found"}"#.to_vec(),
        }));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], br#"{"error":"user not found"}"#);
    }

    #[test]
    fn test_accepted_response() {
        let response = outcome_response(DispatchOutcome::Accepted(PublishAck {
            event_type: "notification.requested".to_string(),
            correlation_id: "corr-1".to_string(),
            message_id: "msg-1".to_string(),
        }));
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
