use std::collections::HashMap;
use std::sync::Arc;

use gateway_core::CircuitState;
use gateway_domain::{Broker, BrokerHealth, HealthReport, HealthStatus};

use crate::circuit_breaker::HealthRecord;

/// 根据各同步端点的熔断状态计算整体健康状态
///
/// 全部关闭为 `Healthy`；某个必需服务的全部端点都已打开为 `Unhealthy`；其余为 `Degraded`。
pub fn aggregate_status<'a, I>(endpoints: I) -> HealthStatus
where
    I: IntoIterator<Item = (&'a str, bool, CircuitState)>,
{
    let mut all_closed = true;
    // service -> (是否必需, 是否全部打开)
    let mut families: HashMap<&str, (bool, bool)> = HashMap::new();

    for (service, required, state) in endpoints {
        all_closed &= state == CircuitState::Closed;
        let family = families.entry(service).or_insert((false, true));
        family.0 |= required;
        family.1 &= state == CircuitState::Open;
    }

    if all_closed {
        HealthStatus::Healthy
    } else if families
        .values()
        .any(|(required, all_open)| *required && *all_open)
    {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    }
}

/// 健康聚合器，只读取缓存的健康记录，从不访问网络
pub struct HealthAggregator {
    records: Vec<Arc<HealthRecord>>,
    broker: Arc<dyn Broker>,
}

impl HealthAggregator {
    pub fn new(records: Vec<Arc<HealthRecord>>, broker: Arc<dyn Broker>) -> Self {
        Self { records, broker }
    }

    pub fn status(&self) -> HealthStatus {
        aggregate_status(
            self.records
                .iter()
                .map(|r| (r.service(), r.required(), r.state())),
        )
    }

    pub fn report(&self) -> HealthReport {
        let endpoints: Vec<_> = self.records.iter().map(|r| r.snapshot()).collect();
        let status = aggregate_status(
            self.records
                .iter()
                .zip(&endpoints)
                .map(|(r, e)| (r.service(), r.required(), e.state)),
        );

        HealthReport {
            status,
            endpoints,
            broker: BrokerHealth {
                kind: self.broker.kind().to_string(),
                connected: self.broker.is_connected(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CircuitState::{Closed, HalfOpen, Open};

    #[test]
    fn test_all_closed_is_healthy() {
        let status = aggregate_status([
            ("user-service", true, Closed),
            ("order-service", true, Closed),
        ]);
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[test]
    fn test_empty_is_healthy() {
        let none: Vec<(&str, bool, CircuitState)> = Vec::new();
        assert_eq!(aggregate_status(none), HealthStatus::Healthy);
    }

    #[test]
    fn test_partial_failure_is_degraded() {
        let status = aggregate_status([
            ("user-service", true, Open),
            ("user-service", true, Closed),
            ("order-service", true, Closed),
        ]);
        assert_eq!(status, HealthStatus::Degraded);

        let status = aggregate_status([("user-service", true, HalfOpen)]);
        assert_eq!(status, HealthStatus::Degraded);
    }

    #[test]
    fn test_required_family_all_open_is_unhealthy() {
        let status = aggregate_status([
            ("user-service", true, Open),
            ("user-service", true, Open),
            ("order-service", true, Closed),
        ]);
        assert_eq!(status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_optional_family_all_open_is_degraded() {
        let status = aggregate_status([
            ("inventory-service", false, Open),
            ("order-service", true, Closed),
        ]);
        assert_eq!(status, HealthStatus::Degraded);
    }
}
