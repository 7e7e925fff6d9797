//! 端点健康记录与熔断器
//!
//! 每个同步端点一条记录，只用原子变量维护状态，读写都不会阻塞。
//! 冷却结束后通过CAS `Open -> HalfOpen` 保证同一时刻只放行一个试探调用。

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gateway_core::{CircuitBreakerConfig, CircuitState};
use gateway_domain::{CapabilityEndpoint, EndpointHealth};
use tracing::{info, warn};

use crate::metrics;

const NO_SUCCESS: i64 = i64::MIN;

pub struct HealthRecord {
    name: String,
    service: String,
    required: bool,
    config: CircuitBreakerConfig,
    epoch: Instant,
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    /// 最近一次成功的Unix毫秒时间戳
    last_success_ms: AtomicI64,
    /// 打开时刻，相对`epoch`的毫秒数
    opened_at_ms: AtomicU64,
    cooldown_ms: AtomicU64,
}

impl HealthRecord {
    pub fn new(endpoint: &CapabilityEndpoint, config: CircuitBreakerConfig) -> Self {
        let cooldown_ms = config.cooldown_ms;
        Self {
            name: endpoint.name.clone(),
            service: endpoint.service.clone(),
            required: endpoint.required,
            config,
            epoch: Instant::now(),
            state: AtomicU8::new(CircuitState::Closed.as_u8()),
            consecutive_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            last_success_ms: AtomicI64::new(NO_SUCCESS),
            opened_at_ms: AtomicU64::new(0),
            cooldown_ms: AtomicU64::new(cooldown_ms),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn current_cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms.load(Ordering::SeqCst))
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// 申请一次调用许可
    ///
    /// `Closed` 时直接放行；`Open` 且冷却结束时，CAS成功的调用者获得试探许可；
    /// 其余情况返回`Err(state)`，调用方应快速失败而不做任何传输I/O。
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>, CircuitState> {
        loop {
            match self.state() {
                CircuitState::Closed => return Ok(CircuitPermit::new(self, false)),
                CircuitState::HalfOpen => return Err(CircuitState::HalfOpen),
                CircuitState::Open => {
                    let opened_at = self.opened_at_ms.load(Ordering::SeqCst);
                    let cooldown = self.cooldown_ms.load(Ordering::SeqCst);
                    if self.now_ms().saturating_sub(opened_at) < cooldown {
                        return Err(CircuitState::Open);
                    }
                    if self
                        .state
                        .compare_exchange(
                            CircuitState::Open.as_u8(),
                            CircuitState::HalfOpen.as_u8(),
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
                    {
                        info!(endpoint = %self.name, "冷却结束，放行试探调用");
                        metrics::record_circuit_transition(&self.name, "half_open");
                        return Ok(CircuitPermit::new(self, true));
                    }
                }
            }
        }
    }

    fn record_success(&self, trial: bool) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.total_successes.fetch_add(1, Ordering::SeqCst);
        self.last_success_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);

        if trial {
            self.cooldown_ms
                .store(self.config.cooldown_ms, Ordering::SeqCst);
            if self
                .state
                .compare_exchange(
                    CircuitState::HalfOpen.as_u8(),
                    CircuitState::Closed.as_u8(),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                info!(endpoint = %self.name, "试探调用成功，熔断器关闭");
                metrics::record_circuit_transition(&self.name, "closed");
            }
        }
    }

    fn record_failure(&self, trial: bool) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        self.total_failures.fetch_add(1, Ordering::SeqCst);

        if trial {
            let current = self.cooldown_ms.load(Ordering::SeqCst);
            let grown = ((current as f64) * self.config.backoff_multiplier) as u64;
            let next = grown.min(self.config.max_cooldown_ms).max(current);
            self.cooldown_ms.store(next, Ordering::SeqCst);
            self.opened_at_ms.store(self.now_ms(), Ordering::SeqCst);
            self.state
                .store(CircuitState::Open.as_u8(), Ordering::SeqCst);
            warn!(
                endpoint = %self.name,
                cooldown_ms = next,
                "试探调用失败，熔断器重新打开"
            );
            metrics::record_circuit_transition(&self.name, "open");
            return;
        }

        if failures >= u64::from(self.config.failure_threshold)
            && self.state() == CircuitState::Closed
        {
            self.opened_at_ms.store(self.now_ms(), Ordering::SeqCst);
            if self
                .state
                .compare_exchange(
                    CircuitState::Closed.as_u8(),
                    CircuitState::Open.as_u8(),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                warn!(
                    endpoint = %self.name,
                    consecutive_failures = failures,
                    "连续传输失败达到阈值，熔断器打开"
                );
                metrics::record_circuit_transition(&self.name, "open");
            }
        }
    }

    /// 试探调用没有产生结果就被放弃，重新打开熔断器并重新计算冷却
    fn abandon_trial(&self) {
        self.opened_at_ms.store(self.now_ms(), Ordering::SeqCst);
        if self
            .state
            .compare_exchange(
                CircuitState::HalfOpen.as_u8(),
                CircuitState::Open.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            warn!(endpoint = %self.name, "试探调用被放弃，熔断器重新打开");
            metrics::record_circuit_transition(&self.name, "open");
        }
    }

    pub fn snapshot(&self) -> EndpointHealth {
        let last_success = match self.last_success_ms.load(Ordering::SeqCst) {
            NO_SUCCESS => None,
            ms => DateTime::<Utc>::from_timestamp_millis(ms),
        };
        EndpointHealth {
            name: self.name.clone(),
            service: self.service.clone(),
            state: self.state(),
            last_success,
            failure_count: self.consecutive_failures(),
            success_count: self.total_successes.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for HealthRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthRecord")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("consecutive_failures", &self.consecutive_failures())
            .finish()
    }
}

/// 熔断器放行许可
///
/// 必须以`success`或`failure`结算；未结算就被丢弃的试探许可会重新打开熔断器，
/// 普通许可被丢弃则不计入任何结果。
#[must_use]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    record: &'a HealthRecord,
    trial: bool,
    settled: bool,
}

impl<'a> CircuitPermit<'a> {
    fn new(record: &'a HealthRecord, trial: bool) -> Self {
        Self {
            record,
            trial,
            settled: false,
        }
    }

    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.record.record_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.record.record_failure(self.trial);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.record.abandon_trial();
        }
    }
}
