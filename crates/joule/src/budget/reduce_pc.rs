use crate::budget::{Admission, DenyReason, Reservation};
use crate::energy::PowerModel;
use crate::pool::HostPool;
use crate::registry::{Job, JobRegistry};

/// Upper bound (s) on how far ahead of `now` an energy-driven wait may push
/// the pivot's expected start. Keeps replenishment-driven reservations short
/// so they are recomputed against fresh state.
pub const RESERVATION_HORIZON: f64 = 5.0;

/// Rate-reduction floor factors; which one applies depends on the queue
/// composition (see [`min_rate_factor`]).
const RATE_FLOOR_SMALL_JOBS: f64 = 0.5;
const RATE_FLOOR_DEFAULT: f64 = 0.3;

/// Variant of the energy budget that expresses the pivot's reservation as a
/// slowdown of the replenishment rate over the window leading up to the
/// expected start, instead of holding energy statically. Whatever still
/// flows in is free for backfill.
#[derive(Debug)]
pub struct ReducePc {
    model: PowerModel,
    rate_nominal: f64,
    rate_current: f64,
    monitoring_interval: f64,
    available: f64,
    consumed: f64,
    last_update: Option<f64>,
    reservation: Option<Reservation>,
}

/// Floor factor for the reduced rate: when more than half of the waiting
/// jobs need less than half of the queue's mean energy, keep the floor at
/// 50% of nominal so the small jobs are not starved of replenishment.
pub fn min_rate_factor(energies: &[f64]) -> f64 {
    if energies.is_empty() {
        return RATE_FLOOR_DEFAULT;
    }
    let mean = energies.iter().sum::<f64>() / energies.len() as f64;
    let small = energies.iter().filter(|e| **e < mean * 0.5).count();
    if small * 2 > energies.len() {
        RATE_FLOOR_SMALL_JOBS
    } else {
        RATE_FLOOR_DEFAULT
    }
}

impl ReducePc {
    pub fn new(model: PowerModel, rate: f64, monitoring_interval: f64) -> Self {
        ReducePc {
            model,
            rate_nominal: rate,
            rate_current: rate,
            monitoring_interval,
            available: 0.0,
            consumed: 0.0,
            last_update: None,
            reservation: None,
        }
    }

    #[inline]
    pub fn available(&self) -> f64 {
        self.available
    }

    #[inline]
    pub fn nominal_rate(&self) -> f64 {
        self.rate_nominal
    }

    #[inline]
    pub fn current_rate(&self) -> f64 {
        self.rate_current
    }

    #[inline]
    pub fn consumed(&self) -> f64 {
        self.consumed
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        self.reservation.as_ref()
    }

    pub fn on_tick(&mut self, now: f64, pool: &HostPool) {
        match self.last_update {
            None => {
                self.available = self.rate_nominal * self.monitoring_interval;
                self.last_update = Some(now);
            }
            Some(last) => {
                let elapsed = now - last;
                if elapsed > 0.0 {
                    let released = self.rate_current * elapsed;
                    let drawn = self
                        .model
                        .platform_power(pool.busy_count(), pool.free_count())
                        * elapsed;
                    self.available += released - drawn;
                    self.consumed += drawn;
                    self.last_update = Some(now);
                }
            }
        }
        if let Some(r) = &self.reservation {
            if now >= r.end {
                self.reservation = None;
                self.rate_current = self.rate_nominal;
            }
        }
    }

    fn deny(&self, job: &Job, reason: DenyReason) -> Admission {
        match &self.reservation {
            Some(r) if r.job_id == job.id => Admission::Reserved(r.end),
            _ => Admission::No(reason),
        }
    }

    /// Same lookahead rule as the static energy budget, only drawn against
    /// the reduced rate. No static hold is subtracted: the slowdown itself
    /// is the reservation.
    pub fn admit(&self, job: &Job, pool: &HostPool) -> Admission {
        if pool.free_count() < job.width {
            return self.deny(job, DenyReason::Hosts);
        }
        let required = self.model.job_energy(job.width, job.walltime);
        if self.available >= 0.0
            && required <= self.available + self.rate_current * job.walltime
        {
            Admission::Yes
        } else {
            self.deny(job, DenyReason::Energy)
        }
    }

    pub fn on_launch(&mut self, job: &Job) {
        if self.reservation.as_ref().map(|r| r.job_id.as_str()) == Some(job.id.as_str()) {
            self.pivot_runnable();
        }
    }

    /// Slows replenishment just enough that the pivot's energy is covered
    /// by `expected_start`, clamped to the queue-dependent floor.
    pub fn pivot_not_runnable(
        &mut self,
        job: &Job,
        now: f64,
        expected_start: f64,
        registry: &JobRegistry,
    ) {
        let until_start = expected_start - now;
        if until_start <= 0.0 {
            return;
        }
        let energies: Vec<f64> = registry
            .waiting()
            .map(|j| self.model.job_energy(j.width, j.walltime))
            .collect();
        let floor = min_rate_factor(&energies) * self.rate_nominal;
        let pivot_energy = self.model.job_energy(job.width, job.walltime);
        self.rate_current = (self.rate_nominal - pivot_energy / until_start).max(floor);
        self.reservation = Some(Reservation {
            job_id: job.id.clone(),
            end: expected_start,
        });
        log::debug!(
            "replenishment reduced to {} W for pivot {} until {}",
            self.rate_current,
            job.id,
            expected_start
        );
    }

    pub fn pivot_runnable(&mut self) {
        self.reservation = None;
        self.rate_current = self.rate_nominal;
    }
}

#[cfg(test)]
mod tests {
    use super::{min_rate_factor, ReducePc};
    use crate::budget::{Admission, DenyReason};
    use crate::energy::PowerModel;
    use crate::pool::HostPool;
    use crate::registry::{Job, JobRegistry};

    fn job(id: &str, width: u32, walltime: f64) -> Job {
        Job {
            id: id.to_string(),
            width,
            walltime,
            submit_time: 0.0,
        }
    }

    fn model() -> PowerModel {
        PowerModel::new(100.0, 200.0)
    }

    #[test]
    fn test_min_rate_factor_hysteresis() {
        assert_eq!(min_rate_factor(&[]), 0.3);
        // uniform queue: nothing below half the mean
        assert_eq!(min_rate_factor(&[100.0, 100.0, 100.0]), 0.3);
        // mean 2550: three of four below half of it
        assert_eq!(min_rate_factor(&[10_000.0, 100.0, 50.0, 50.0]), 0.5);
        // exactly half is not "more than half"
        assert_eq!(min_rate_factor(&[10_000.0, 10_000.0, 100.0, 100.0]), 0.3);
    }

    #[test]
    fn test_reservation_reduces_rate_to_floor() {
        let mut budget = ReducePc::new(model(), 800.0, 600.0);
        let registry = JobRegistry::new();
        // pivot needs 80 kJ; over 50 s the nominal flow cannot cover it,
        // so the rate pins at the 0.3 floor.
        let pivot = job("pivot", 4, 100.0);
        budget.pivot_not_runnable(&pivot, 0.0, 50.0, &registry);
        assert_eq!(budget.current_rate(), 240.0);
        assert_eq!(budget.reservation().unwrap().end, 50.0);
    }

    #[test]
    fn test_reservation_partial_reduction() {
        let mut budget = ReducePc::new(model(), 800.0, 600.0);
        let registry = JobRegistry::new();
        // 2000 J over 10 s: reduce by 200 W, well above the floor
        let pivot = job("pivot", 1, 10.0);
        budget.pivot_not_runnable(&pivot, 0.0, 10.0, &registry);
        assert_eq!(budget.current_rate(), 600.0);
    }

    #[test]
    fn test_reservation_expires_on_tick() {
        let mut budget = ReducePc::new(model(), 800.0, 600.0);
        let pool = HostPool::new(4);
        let registry = JobRegistry::new();
        budget.on_tick(0.0, &pool);
        budget.pivot_not_runnable(&job("pivot", 4, 100.0), 0.0, 50.0, &registry);
        assert_eq!(budget.current_rate(), 240.0);

        budget.on_tick(10.0, &pool);
        assert!(budget.reservation().is_some());
        budget.on_tick(50.0, &pool);
        assert!(budget.reservation().is_none());
        assert_eq!(budget.current_rate(), 800.0);
    }

    #[test]
    fn test_tick_releases_at_reduced_rate() {
        let mut budget = ReducePc::new(model(), 800.0, 600.0);
        let pool = HostPool::new(4);
        let registry = JobRegistry::new();
        budget.on_tick(0.0, &pool);
        let seed = budget.available();
        budget.pivot_not_runnable(&job("pivot", 4, 100.0), 0.0, 50.0, &registry);

        budget.on_tick(10.0, &pool);
        // released 240 W * 10 s, drawn 4 idle hosts * 100 W * 10 s
        assert_eq!(budget.available(), seed + 2400.0 - 4000.0);
        assert_eq!(budget.consumed(), 4000.0);
    }

    #[test]
    fn test_admit_uses_reduced_rate_in_lookahead() {
        let mut budget = ReducePc::new(model(), 800.0, 600.0);
        let registry = JobRegistry::new();
        // counter still at zero (no tick): admission leans on lookahead only
        budget.pivot_not_runnable(&job("pivot", 4, 100.0), 0.0, 50.0, &registry);
        assert_eq!(budget.current_rate(), 240.0);

        // 2000 J needed; 240 W * 10 s = 2400 J flows in during the job
        assert_eq!(
            budget.admit(&job("small", 1, 10.0), &HostPool::new(4)),
            Admission::Yes
        );
        // 4000 J needed; 240 W * 10 s does not cover it (nominal would)
        assert_eq!(
            budget.admit(&job("wide", 2, 10.0), &HostPool::new(4)),
            Admission::No(DenyReason::Energy)
        );
    }
}
