//! Admission limiting logic and state management.

mod counter;
mod decay;
mod limit;
mod limiter;

pub use counter::AdmissionCounter;
pub use decay::DecayPolicy;
pub use limit::{Limit, TimeWindow};
pub use limiter::{
    with_gradual_recovery, with_interval, with_max_limit, Limiter, LimiterOption,
    LimiterSettings, DEFAULT_INTERVAL,
};
