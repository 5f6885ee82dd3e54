//! Periodic waitlist promotion across all published events.
//!
//! Cancellations and capacity increases promote inline. The sweep picks up
//! anything those paths missed, for example a process that stopped between
//! committing a cancellation and running the promotion pass.

use domain::services::WaitlistPromoter;

use super::scheduler::{Job, JobFrequency};

pub struct PromotionSweepJob {
    promoter: WaitlistPromoter,
    interval_secs: u64,
}

impl PromotionSweepJob {
    pub fn new(promoter: WaitlistPromoter, interval_secs: u64) -> Self {
        Self {
            promoter,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for PromotionSweepJob {
    fn name(&self) -> &'static str {
        "promotion_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> anyhow::Result<usize> {
        Ok(self.promoter.sweep().await?)
    }
}
