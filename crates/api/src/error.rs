use axum::{
    http::{header::ALLOW, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{DispatchError, ErrorKind};
use serde_json::json;

/// 对外返回的分发错误，携带请求的追踪ID
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ApiError {
    pub error: DispatchError,
    pub trace_id: String,
}

impl ApiError {
    pub fn new(error: DispatchError, trace_id: impl Into<String>) -> Self {
        Self {
            error,
            trace_id: trace_id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.error.kind())
    }

    /// 返回给调用方的错误信息，不包含传输层细节
    fn public_message(&self) -> String {
        match &self.error {
            DispatchError::BrokerUnavailable(_) => "消息代理不可用".to_string(),
            DispatchError::Internal(_) => "系统内部错误".to_string(),
            other => other.to_string(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::PoolExhausted | ErrorKind::CircuitOpen | ErrorKind::BrokerUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::DeadlineExceeded | ErrorKind::PublishTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_body(
    status: StatusCode,
    message: &str,
    kind: ErrorKind,
    trace_id: &str,
) -> Json<serde_json::Value> {
    Json(json!({
        "error": {
            "message": message,
            "type": kind.as_str(),
            "code": status.as_u16(),
            "trace_id": trace_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }
    }))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = error_body(
            status,
            &self.public_message(),
            self.error.kind(),
            &self.trace_id,
        );
        let mut response = (status, body).into_response();

        if let DispatchError::MethodNotAllowed { allowed, .. } = &self.error {
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ErrorKind::NotFound, 404),
            (ErrorKind::MethodNotAllowed, 405),
            (ErrorKind::InvalidRequest, 400),
            (ErrorKind::PoolExhausted, 503),
            (ErrorKind::CircuitOpen, 503),
            (ErrorKind::UpstreamUnavailable, 502),
            (ErrorKind::DeadlineExceeded, 504),
            (ErrorKind::PublishTimeout, 504),
            (ErrorKind::BrokerUnavailable, 503),
            (ErrorKind::Internal, 500),
        ];
        for (kind, status) in cases {
            assert_eq!(status_for(kind).as_u16(), status, "{kind}");
        }
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow_header() {
        let error = ApiError::new(
            DispatchError::MethodNotAllowed {
                method: "DELETE".to_string(),
                path: "/users/1".to_string(),
                allowed: vec!["GET".to_string(), "PUT".to_string()],
            },
            "trace-1",
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET, PUT");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let error = ApiError::new(
            DispatchError::UpstreamUnavailable {
                endpoint: "user-service.get".to_string(),
                attempts: 3,
            },
            "trace-2",
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "UPSTREAM_UNAVAILABLE");
        assert_eq!(body["error"]["code"], 502);
        assert_eq!(body["error"]["trace_id"], "trace-2");
        assert!(body["error"]["message"].is_string());
        assert!(body["error"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let error = ApiError::new(
            DispatchError::BrokerUnavailable("channel 7 closed by 10.0.0.5".to_string()),
            "trace-3",
        );
        let body = body_json(error.into_response()).await;
        let message = body["error"]["message"].as_str().unwrap();
        assert!(!message.contains("10.0.0.5"));
        assert_eq!(body["error"]["type"], "BROKER_UNAVAILABLE");
    }
}
