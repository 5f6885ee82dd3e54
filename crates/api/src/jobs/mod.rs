//! Background job scheduler and job implementations.

mod pool_metrics;
mod promotion_sweep;
mod scheduler;

pub use pool_metrics::PoolMetricsJob;
pub use promotion_sweep::PromotionSweepJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
