//! Core limiter implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::counter::AdmissionCounter;
use super::decay::{self, DecayPolicy};
use super::limit::Limit;
use crate::config::LimiterConfig;
use crate::error::Result;

/// Decay interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// Construction-time settings for a [`Limiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    /// Maximum admissions before decay frees capacity
    pub limit: Limit,
    /// Period of the decay window
    pub interval: Duration,
    /// Free one unit per `interval / limit` instead of resetting per window
    pub gradual_recovery: bool,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            limit: Limit::Infinite,
            interval: DEFAULT_INTERVAL,
            gradual_recovery: false,
        }
    }
}

impl LimiterSettings {
    /// Resolve the decay policy, rejecting invalid combinations.
    pub fn validate(&self) -> Result<DecayPolicy> {
        DecayPolicy::resolve(self.limit, self.interval, self.gradual_recovery)
    }
}

/// A single configuration change applied at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterOption {
    /// Override the default infinite ceiling
    MaxLimit(Limit),
    /// Override the default one-hour decay interval
    Interval(Duration),
    /// Switch from fixed-window reset to gradual recovery
    GradualRecovery,
}

impl LimiterOption {
    fn apply(self, settings: &mut LimiterSettings) {
        match self {
            LimiterOption::MaxLimit(limit) => settings.limit = limit,
            LimiterOption::Interval(interval) => settings.interval = interval,
            LimiterOption::GradualRecovery => settings.gradual_recovery = true,
        }
    }
}

/// Set the ceiling.
pub fn with_max_limit(limit: impl Into<Limit>) -> LimiterOption {
    LimiterOption::MaxLimit(limit.into())
}

/// Set the decay interval.
pub fn with_interval(interval: impl Into<Duration>) -> LimiterOption {
    LimiterOption::Interval(interval.into())
}

/// Enable gradual recovery.
pub fn with_gradual_recovery() -> LimiterOption {
    LimiterOption::GradualRecovery
}

/// State shared between the limiter handle and its decay task.
pub(crate) struct Shared {
    pub(crate) counter: AdmissionCounter,
    /// Signalled whenever decay frees capacity
    pub(crate) capacity: Notify,
    /// Fired once by `close`; observable after the fact
    pub(crate) closed: CancellationToken,
}

/// An admission limiter with a ceiling and a background decay task.
///
/// The decay task starts in the constructor and runs until [`Limiter::close`]
/// is called or the limiter is dropped. Owners that keep the limiter for the
/// whole process lifetime should still call `close` (or `shutdown`) when done;
/// otherwise the task lives as long as the handle does.
///
/// Waiters are not served in FIFO order: any waiter may claim a freed slot.
pub struct Limiter {
    shared: Arc<Shared>,
    settings: LimiterSettings,
    policy: DecayPolicy,
    decay_task: Mutex<Option<JoinHandle<()>>>,
}

impl Limiter {
    /// Create a limiter, applying `options` in order over the defaults.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = LimiterOption>,
    {
        let mut settings = LimiterSettings::default();
        for option in options {
            option.apply(&mut settings);
        }
        Self::with_settings(settings)
    }

    /// Create a limiter from a loaded configuration.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        Self::with_settings(LimiterSettings::try_from(config)?)
    }

    /// Create a limiter from explicit settings.
    pub fn with_settings(settings: LimiterSettings) -> Result<Self> {
        let policy = settings.validate()?;

        let shared = Arc::new(Shared {
            counter: AdmissionCounter::new(settings.limit),
            capacity: Notify::new(),
            closed: CancellationToken::new(),
        });
        let decay_task = decay::spawn(Arc::clone(&shared), policy)?;

        info!(
            limit = %settings.limit,
            interval = ?settings.interval,
            policy = ?policy,
            "Limiter started"
        );

        Ok(Self {
            shared,
            settings,
            policy,
            decay_task: Mutex::new(Some(decay_task)),
        })
    }

    /// Try to claim one unit of capacity without blocking.
    ///
    /// Admission keeps working after `close`, but the count no longer decays.
    pub fn allow(&self) -> bool {
        let allowed = self.shared.counter.try_increment();
        trace!(allowed = allowed, "Admission check");
        allowed
    }

    /// Admissions counted since the last decay.
    pub fn current(&self) -> u64 {
        self.shared.counter.current()
    }

    /// Capacity left before the ceiling, or `None` for an infinite ceiling.
    pub fn remaining(&self) -> Option<u64> {
        self.shared.counter.remaining()
    }

    /// Wait until a unit of capacity is claimed.
    ///
    /// Returns `true` once admitted, or `false` if `cancel` fires or the
    /// limiter is closed first. A limiter that is already closed, or a token
    /// that is already cancelled, resolves to `false` without claiming.
    ///
    /// Dropping the returned future abandons the wait with no lingering work.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let notified = self.shared.capacity.notified();
        tokio::pin!(notified);

        loop {
            if self.shared.closed.is_cancelled() || cancel.is_cancelled() {
                debug!("Wait abandoned before admission");
                return false;
            }

            // Register before checking so a decay tick between the failed
            // claim and the suspension still wakes this waiter.
            notified.as_mut().enable();
            if self.allow() {
                return true;
            }

            tokio::select! {
                biased;
                _ = self.shared.closed.cancelled() => {
                    debug!("Wait ended by limiter close");
                    return false;
                }
                _ = cancel.cancelled() => {
                    debug!("Wait cancelled by caller");
                    return false;
                }
                _ = notified.as_mut() => {}
            }

            notified.set(self.shared.capacity.notified());
        }
    }

    /// Wait for admission for at most `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        let cancel = CancellationToken::new();
        tokio::time::timeout(timeout, self.wait(&cancel))
            .await
            .unwrap_or(false)
    }

    /// Stop the decay task and release every pending waiter.
    ///
    /// Calling this more than once is a no-op.
    pub fn close(&self) {
        if self.shared.closed.is_cancelled() {
            return;
        }
        info!(current = self.current(), "Closing limiter");
        self.shared.closed.cancel();
    }

    /// Close the limiter and wait for the decay task to finish.
    pub async fn shutdown(&self) {
        self.close();

        let task = self.decay_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Decay task ended abnormally");
            }
        }
    }

    /// Whether the limiter has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Get the ceiling.
    pub fn limit(&self) -> Limit {
        self.settings.limit
    }

    /// Get the configured decay interval.
    pub fn interval(&self) -> Duration {
        self.settings.interval
    }

    /// Whether gradual recovery is enabled.
    pub fn is_gradual_recovery(&self) -> bool {
        self.settings.gradual_recovery
    }

    /// Get the resolved decay policy.
    pub fn policy(&self) -> DecayPolicy {
        self.policy
    }
}

impl Drop for Limiter {
    fn drop(&mut self) {
        self.shared.closed.cancel();
    }
}

impl fmt::Debug for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limiter")
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .field("current", &self.current())
            .field("has_capacity", &self.shared.counter.has_capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
