//! Test helper utilities

use std::time::Duration;

use gateway_core::RequestContext;
use tokio::time::sleep;

/// Wait for a condition to be true with timeout
pub async fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Request context with the given deadline in milliseconds
pub fn context_with_deadline(ms: u64) -> RequestContext {
    RequestContext::new(Duration::from_millis(ms))
}
