//! 截止时间约束下的等待预算

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// 一次等待允许的时长，以及真正起约束作用的是哪一方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBudget {
    pub until: Instant,
    /// 为true时请求截止时间先于自身上限到达
    pub deadline_binds: bool,
}

impl WaitBudget {
    /// `min(now + limit, deadline)`
    pub fn new(limit: Duration, deadline: Instant) -> Self {
        let local = Instant::now() + limit;
        if deadline <= local {
            Self {
                until: deadline,
                deadline_binds: true,
            }
        } else {
            Self {
                until: local,
                deadline_binds: false,
            }
        }
    }

    pub fn remaining(&self) -> Duration {
        self.until.saturating_duration_since(Instant::now())
    }
}

/// 等待结果：完成，或在预算耗尽时返回超时的一方
#[derive(Debug, PartialEq, Eq)]
pub enum Bounded<T> {
    Completed(T),
    /// 请求截止时间到达
    DeadlineExpired,
    /// 操作自身的超时上限到达
    LimitExpired,
}

/// 在预算内等待`future`，超时后丢弃该future
pub async fn run_bounded<F, T>(budget: WaitBudget, future: F) -> Bounded<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout_at(budget.until, future).await {
        Ok(value) => Bounded::Completed(value),
        Err(_) if budget.deadline_binds => Bounded::DeadlineExpired,
        Err(_) => Bounded::LimitExpired,
    }
}
