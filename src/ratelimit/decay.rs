//! Background decay of the admission count.
//!
//! Each limiter owns exactly one decay task. It is spawned when the limiter
//! is constructed and runs until the limiter's close token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::counter::AdmissionCounter;
use super::limit::Limit;
use super::limiter::Shared;
use crate::error::{LimiterError, Result};

/// How the admission count recovers over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayPolicy {
    /// Reset the count to zero once per interval.
    FixedWindow {
        /// Length of one window
        interval: Duration,
    },
    /// Free one unit every `interval / limit`.
    Gradual {
        /// Time between single-unit decrements
        tick: Duration,
    },
}

impl DecayPolicy {
    /// Resolve and validate the policy for a given ceiling and interval.
    ///
    /// Gradual recovery splits the interval into `limit` sub-periods, so it
    /// requires a finite, non-zero ceiling and an interval long enough that
    /// each sub-period is at least one nanosecond.
    pub fn resolve(limit: Limit, interval: Duration, gradual_recovery: bool) -> Result<Self> {
        if interval.is_zero() {
            return Err(LimiterError::Config(
                "decay interval must be greater than zero".to_string(),
            ));
        }

        if !gradual_recovery {
            return Ok(DecayPolicy::FixedWindow { interval });
        }

        let units = match limit {
            Limit::Finite(0) => {
                return Err(LimiterError::Config(
                    "gradual recovery requires a non-zero limit".to_string(),
                ))
            }
            Limit::Finite(units) => units,
            Limit::Infinite => {
                return Err(LimiterError::Config(
                    "gradual recovery requires a finite limit".to_string(),
                ))
            }
        };

        let tick_nanos = interval.as_nanos() / u128::from(units);
        let tick_nanos = u64::try_from(tick_nanos).map_err(|_| {
            LimiterError::Config(format!("decay interval {:?} is too large", interval))
        })?;
        if tick_nanos == 0 {
            return Err(LimiterError::Config(format!(
                "decay interval {:?} is too short to spread over {} units",
                interval, units
            )));
        }

        Ok(DecayPolicy::Gradual {
            tick: Duration::from_nanos(tick_nanos),
        })
    }

    /// Time between decay ticks.
    pub fn period(&self) -> Duration {
        match self {
            DecayPolicy::FixedWindow { interval } => *interval,
            DecayPolicy::Gradual { tick } => *tick,
        }
    }

    /// Apply one decay tick, returning how many units were freed.
    pub fn apply(&self, counter: &AdmissionCounter) -> u64 {
        match self {
            DecayPolicy::FixedWindow { .. } => counter.reset(),
            DecayPolicy::Gradual { .. } => counter.release(1),
        }
    }
}

/// First-tick deadline used when `now + period` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Spawn the decay task for `shared` on the current Tokio runtime.
///
/// The first tick fires one full period after this call.
pub(crate) fn spawn(shared: Arc<Shared>, policy: DecayPolicy) -> Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| LimiterError::NoRuntime)?;
    let start = first_deadline(Instant::now(), policy.period());
    Ok(runtime.spawn(run(shared, policy, start)))
}

fn first_deadline(now: Instant, period: Duration) -> Instant {
    now.checked_add(period).unwrap_or_else(|| now + FAR_FUTURE)
}

async fn run(shared: Arc<Shared>, policy: DecayPolicy, start: Instant) {
    let mut ticker = time::interval_at(start, policy.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shared.closed.cancelled() => {
                debug!("Decay task stopping");
                return;
            }
            _ = ticker.tick() => {
                let freed = policy.apply(&shared.counter);
                if freed > 0 {
                    debug!(
                        freed = freed,
                        current = shared.counter.current(),
                        "Decay freed capacity"
                    );
                    shared.capacity.notify_waiters();
                } else {
                    trace!("Decay tick with nothing to free");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_window_policy() {
        let policy = DecayPolicy::resolve(Limit::new(3), Duration::from_secs(1), false).unwrap();

        assert_eq!(
            policy,
            DecayPolicy::FixedWindow {
                interval: Duration::from_secs(1)
            }
        );
        assert_eq!(policy.period(), Duration::from_secs(1));
    }

    #[test]
    fn test_fixed_window_allows_infinite_and_zero_limits() {
        assert!(DecayPolicy::resolve(Limit::Infinite, Duration::from_secs(1), false).is_ok());
        assert!(DecayPolicy::resolve(Limit::new(0), Duration::from_secs(1), false).is_ok());
    }

    #[test]
    fn test_gradual_policy_splits_interval() {
        let policy =
            DecayPolicy::resolve(Limit::new(4), Duration::from_millis(400), true).unwrap();

        assert_eq!(
            policy,
            DecayPolicy::Gradual {
                tick: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn test_gradual_policy_keeps_sub_second_precision() {
        let policy = DecayPolicy::resolve(Limit::new(3), Duration::from_secs(1), true).unwrap();

        assert_eq!(policy.period(), Duration::from_nanos(333_333_333));
    }

    #[test]
    fn test_gradual_rejects_zero_limit() {
        let err = DecayPolicy::resolve(Limit::new(0), Duration::from_secs(1), true).unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_gradual_rejects_infinite_limit() {
        let err = DecayPolicy::resolve(Limit::Infinite, Duration::from_secs(1), true).unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_gradual_rejects_sub_nanosecond_tick() {
        let err =
            DecayPolicy::resolve(Limit::new(1000), Duration::from_nanos(999), true).unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = DecayPolicy::resolve(Limit::new(1), Duration::ZERO, false).unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_huge_interval_first_deadline_saturates() {
        let policy =
            DecayPolicy::resolve(Limit::new(3), Duration::from_secs(u64::MAX), false).unwrap();
        let now = Instant::now();

        assert_eq!(first_deadline(now, policy.period()), now + FAR_FUTURE);
        assert_eq!(
            first_deadline(now, Duration::from_millis(100)),
            now + Duration::from_millis(100)
        );
    }

    #[test]
    fn test_apply_fixed_window_resets() {
        let counter = AdmissionCounter::new(Limit::new(3));
        for _ in 0..3 {
            counter.try_increment();
        }

        let policy = DecayPolicy::FixedWindow {
            interval: Duration::from_secs(1),
        };
        assert_eq!(policy.apply(&counter), 3);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_apply_gradual_frees_one_unit() {
        let counter = AdmissionCounter::new(Limit::new(3));
        for _ in 0..2 {
            counter.try_increment();
        }

        let policy = DecayPolicy::Gradual {
            tick: Duration::from_millis(10),
        };
        assert_eq!(policy.apply(&counter), 1);
        assert_eq!(policy.apply(&counter), 1);
        assert_eq!(policy.apply(&counter), 0);
        assert_eq!(counter.current(), 0);
    }
}
