use crate::budget::{Admission, DenyReason};
use crate::energy::PowerModel;
use crate::pool::HostPool;
use crate::registry::Job;

/// Hard ceiling on estimated instantaneous platform power. Memoryless: the
/// cap neither reserves energy nor tracks time.
#[derive(Debug)]
pub struct PowerCap {
    model: PowerModel,
    power_limit: f64,
}

impl PowerCap {
    pub fn new(model: PowerModel, power_limit: f64) -> Self {
        PowerCap { model, power_limit }
    }

    #[inline]
    pub fn power_limit(&self) -> f64 {
        self.power_limit
    }

    /// Estimated platform power if `width` more hosts start computing.
    pub fn projected_power(&self, width: u32, pool: &HostPool) -> f64 {
        self.model
            .platform_power(pool.busy_count() + width, pool.free_count() - width)
    }

    pub fn admit(&self, job: &Job, pool: &HostPool) -> Admission {
        if pool.free_count() < job.width {
            return Admission::No(DenyReason::Hosts);
        }
        if self.projected_power(job.width, pool) <= self.power_limit {
            Admission::Yes
        } else {
            Admission::No(DenyReason::Power)
        }
    }
}
