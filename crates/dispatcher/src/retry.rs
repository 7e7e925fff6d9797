use std::time::Duration;

use gateway_domain::RetryPolicy;

/// 计算第`retry`次重试（从0开始）前的退避时间
///
/// 指数退避，限制在`max_backoff`以内，并叠加±`jitter_factor`比例的随机抖动。
pub fn backoff_delay(policy: &RetryPolicy, retry: u32) -> Duration {
    let base = policy.initial_backoff.as_millis() as f64;
    let max = policy.max_backoff.as_millis() as f64;

    let exponential = base * policy.multiplier.powi(retry as i32);
    let capped = exponential.min(max);

    let jitter = capped * policy.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
    let delay = (capped + jitter).clamp(0.0, max);

    Duration::from_millis(delay as u64)
}
