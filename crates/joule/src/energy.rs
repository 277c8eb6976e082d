use serde::{Deserialize, Serialize};

/// Estimation parameters of the platform power model (watts per host).
///
/// These are estimates configured by the operator; the simulator may apply
/// different true values. Over-estimating the compute power is safe, it only
/// produces a more conservative schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerModel {
    pub idle_watts: f64,
    pub comp_watts: f64,
}

impl PowerModel {
    pub fn new(idle_watts: f64, comp_watts: f64) -> Self {
        PowerModel {
            idle_watts,
            comp_watts,
        }
    }

    /// Estimated energy (J) a job draws over its whole walltime.
    #[inline]
    pub fn job_energy(&self, width: u32, walltime: f64) -> f64 {
        width as f64 * self.comp_watts * walltime
    }

    /// Estimated instantaneous power (W) drawn by a job's hosts.
    #[inline]
    pub fn job_power(&self, width: u32) -> f64 {
        width as f64 * self.comp_watts
    }

    /// Estimated instantaneous platform power (W) for the given host split.
    #[inline]
    pub fn platform_power(&self, busy_hosts: u32, idle_hosts: u32) -> f64 {
        busy_hosts as f64 * self.comp_watts + idle_hosts as f64 * self.idle_watts
    }
}
