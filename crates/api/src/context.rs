//! 从入站请求头构建请求上下文

use std::time::Duration;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use gateway_core::{RequestContext, ServerConfig};
use tracing::debug;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// 读取请求头：去掉首尾空白，空值与非UTF-8值视为未携带
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 请求的截止时长
///
/// 未携带或无法解析 `x-request-timeout-ms` 时使用默认值，调用方给出的值被限制在
/// `[1, max_deadline_ms]` 之内。
pub fn request_timeout(headers: &HeaderMap, server: &ServerConfig) -> Duration {
    let millis = match header_str(headers, REQUEST_TIMEOUT_HEADER) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(ms) => ms.clamp(1, server.max_deadline_ms),
            Err(_) => {
                debug!(value = raw, "忽略无效的请求超时头");
                server.default_deadline_ms
            }
        },
        None => server.default_deadline_ms,
    };
    Duration::from_millis(millis)
}

pub fn request_context(headers: &HeaderMap, server: &ServerConfig) -> RequestContext {
    let mut ctx = RequestContext::new(request_timeout(headers, server));

    if let Some(trace_id) = header_str(headers, REQUEST_ID_HEADER) {
        ctx = ctx.with_trace_id(trace_id);
    }
    if let Some(correlation_id) = header_str(headers, CORRELATION_ID_HEADER) {
        ctx = ctx.with_correlation_id(correlation_id);
    }
    if let Some(credentials) = header_str(headers, AUTHORIZATION.as_str()) {
        ctx = ctx.with_credentials(credentials);
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn server() -> ServerConfig {
        ServerConfig {
            default_deadline_ms: 5_000,
            max_deadline_ms: 30_000,
            ..ServerConfig::default()
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_request_timeout_defaults_and_clamps() {
        let server = server();
        assert_eq!(
            request_timeout(&HeaderMap::new(), &server),
            Duration::from_millis(5_000)
        );
        assert_eq!(
            request_timeout(&headers(&[(REQUEST_TIMEOUT_HEADER, "250")]), &server),
            Duration::from_millis(250)
        );
        assert_eq!(
            request_timeout(&headers(&[(REQUEST_TIMEOUT_HEADER, "600000")]), &server),
            Duration::from_millis(30_000)
        );
        assert_eq!(
            request_timeout(&headers(&[(REQUEST_TIMEOUT_HEADER, "0")]), &server),
            Duration::from_millis(1)
        );
        assert_eq!(
            request_timeout(&headers(&[(REQUEST_TIMEOUT_HEADER, "soon")]), &server),
            Duration::from_millis(5_000)
        );
    }

    #[tokio::test]
    async fn test_request_context_reads_headers() {
        let ctx = request_context(
            &headers(&[
                (REQUEST_ID_HEADER, "trace-1"),
                (CORRELATION_ID_HEADER, "corr-1"),
                ("authorization", "Bearer abc"),
            ]),
            &server(),
        );
        assert_eq!(ctx.trace_id(), "trace-1");
        assert_eq!(ctx.correlation_id(), "corr-1");
        assert_eq!(ctx.credentials(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_request_context_generates_ids() {
        let ctx = request_context(&HeaderMap::new(), &server());
        assert!(!ctx.trace_id().is_empty());
        assert_eq!(ctx.trace_id(), ctx.correlation_id());
        assert_eq!(ctx.credentials(), None);
    }
}
