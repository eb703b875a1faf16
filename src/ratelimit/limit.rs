//! Ceiling and window types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Maximum number of admissions allowed before a decay event frees capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Limit {
    /// At most this many admissions per window
    Finite(u64),
    /// No ceiling; every admission succeeds
    #[default]
    Infinite,
}

impl Limit {
    /// Create a finite ceiling.
    pub const fn new(limit: u64) -> Self {
        Limit::Finite(limit)
    }

    /// Whether this is the infinite ceiling.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Limit::Infinite)
    }

    /// The finite ceiling, if any.
    pub fn as_finite(&self) -> Option<u64> {
        match self {
            Limit::Finite(limit) => Some(*limit),
            Limit::Infinite => None,
        }
    }

    /// Whether one more admission fits on top of `current`.
    pub fn admits(&self, current: u64) -> bool {
        match self {
            Limit::Finite(limit) => current < *limit,
            Limit::Infinite => true,
        }
    }

    /// Remaining capacity given `current` admissions; `None` when infinite.
    pub fn remaining(&self, current: u64) -> Option<u64> {
        self.as_finite().map(|limit| limit.saturating_sub(current))
    }
}

impl From<u64> for Limit {
    fn from(limit: u64) -> Self {
        Limit::Finite(limit)
    }
}

impl From<Option<u64>> for Limit {
    fn from(limit: Option<u64>) -> Self {
        limit.map_or(Limit::Infinite, Limit::Finite)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Finite(limit) => write!(f, "{}", limit),
            Limit::Infinite => f.write_str("infinite"),
        }
    }
}

/// Named decay windows, usable in place of a raw interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// One second
    Second,
    /// One minute
    Minute,
    /// One hour
    Hour,
    /// One day
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }
}

impl From<TimeWindow> for Duration {
    fn from(window: TimeWindow) -> Self {
        window.duration()
    }
}
