//! Gatehouse - In-Process Admission Control
//!
//! This crate bounds how many events may be admitted within a time window.
//! A [`Limiter`] holds a ceiling and an admission count; a background task
//! owned by the limiter decays the count, either resetting it once per
//! window or freeing one unit at a time. Callers can try to claim capacity
//! without blocking or wait for it with cancellation.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use config::LimiterConfig;
pub use error::{LimiterError, Result};
pub use ratelimit::{
    with_gradual_recovery, with_interval, with_max_limit, Limit, Limiter, LimiterOption,
    TimeWindow,
};
pub use tokio_util::sync::CancellationToken;
