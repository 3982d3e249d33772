// Domain models

mod counters;
mod traffic;

pub use counters::{CounterSnapshot, ResourceClass, ResourceCounters};
pub use traffic::{DayBucket, MonthRollup, RateSample, WeekRollup};
