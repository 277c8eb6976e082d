pub mod energy_budget;
pub mod power_cap;
pub mod reduce_pc;

pub use energy_budget::EnergyBudget;
pub use power_cap::PowerCap;
pub use reduce_pc::ReducePc;

use std::fmt;

use crate::config::{Policy, SchedulerConfig};
use crate::pool::HostPool;
use crate::registry::{Job, JobRegistry};
use crate::JobId;

/// Answer to "may this job start now?".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Yes,
    No(DenyReason),
    /// The job is the reserved pivot and still has to wait; carries the
    /// reservation horizon.
    Reserved(f64),
}

impl Admission {
    #[inline]
    pub fn is_yes(&self) -> bool {
        matches!(self, Admission::Yes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Hosts,
    Power,
    Energy,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Hosts => write!(f, "not enough free hosts"),
            DenyReason::Power => write!(f, "power ceiling exceeded"),
            DenyReason::Energy => write!(f, "energy shortage"),
        }
    }
}

/// Active reservation for the pivot job.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub job_id: JobId,
    /// Backfill horizon: a candidate must free its hosts by this time.
    pub end: f64,
}

/// Replenishment-side view used when estimating how long the pivot has to
/// wait for energy.
#[derive(Debug, Clone, Copy)]
pub struct EnergyView {
    pub available: f64,
    pub nominal_rate: f64,
}

/// No budget: admission is limited by host availability only. Backs the
/// FCFS baseline and plain EASY backfilling.
#[derive(Debug, Default)]
pub struct Unlimited {
    reservation: Option<Reservation>,
}

impl Unlimited {
    pub fn admit(&self, job: &Job, pool: &HostPool) -> Admission {
        if pool.free_count() < job.width {
            match &self.reservation {
                Some(r) if r.job_id == job.id => Admission::Reserved(r.end),
                _ => Admission::No(DenyReason::Hosts),
            }
        } else {
            Admission::Yes
        }
    }

    pub fn pivot_not_runnable(&mut self, job: &Job, expected_start: f64) {
        self.reservation = Some(Reservation {
            job_id: job.id.clone(),
            end: expected_start,
        });
    }

    pub fn pivot_runnable(&mut self) {
        self.reservation = None;
    }

    pub fn on_launch(&mut self, job: &Job) {
        if self.reservation.as_ref().map(|r| r.job_id.as_str()) == Some(job.id.as_str()) {
            self.pivot_runnable();
        }
    }
}

/// The budget constraint gating admissions, one variant per policy.
/// Variants are tagged alternatives; dispatch is by tag.
#[derive(Debug)]
pub enum BudgetController {
    Unlimited(Unlimited),
    PowerCap(PowerCap),
    EnergyBudget(EnergyBudget),
    ReducePc(ReducePc),
}

impl BudgetController {
    pub fn from_config(config: &SchedulerConfig, nb_hosts: u32) -> Self {
        let model = config.power_model();
        // Budget over a period collapses to a rate (and a power ceiling)
        // of budget_fraction * H * P_comp watts.
        let rate = config.budget_fraction * nb_hosts as f64 * config.p_comp;
        match config.policy {
            Policy::Fcfs | Policy::EasyBackfilling => {
                BudgetController::Unlimited(Default::default())
            }
            Policy::PowerCap => BudgetController::PowerCap(PowerCap::new(model, rate)),
            Policy::EnergyBudget => BudgetController::EnergyBudget(EnergyBudget::new(
                model,
                rate,
                config.period_length,
            )),
            Policy::ReducePc => {
                BudgetController::ReducePc(ReducePc::new(model, rate, config.period_length))
            }
        }
    }

    /// Advances budget state to `now`; must precede admissibility queries
    /// within a tick.
    pub fn on_tick(&mut self, now: f64, pool: &HostPool) {
        match self {
            BudgetController::Unlimited(_) | BudgetController::PowerCap(_) => {}
            BudgetController::EnergyBudget(c) => c.on_tick(now, pool),
            BudgetController::ReducePc(c) => c.on_tick(now, pool),
        }
    }

    pub fn admit(&self, job: &Job, _now: f64, pool: &HostPool) -> Admission {
        match self {
            BudgetController::Unlimited(c) => c.admit(job, pool),
            BudgetController::PowerCap(c) => c.admit(job, pool),
            BudgetController::EnergyBudget(c) => c.admit(job, pool),
            BudgetController::ReducePc(c) => c.admit(job, pool),
        }
    }

    pub fn on_launch(&mut self, job: &Job, _now: f64) {
        match self {
            BudgetController::Unlimited(c) => c.on_launch(job),
            BudgetController::PowerCap(_) => {}
            BudgetController::EnergyBudget(c) => c.on_launch(job),
            BudgetController::ReducePc(c) => c.on_launch(job),
        }
    }

    pub fn on_complete(&mut self, _job: &Job, _now: f64) {
        // Host release is visible through the pool; no variant keeps
        // per-job budget state past launch.
    }

    /// The pivot cannot run now; variants may install a reservation.
    pub fn pivot_not_runnable(
        &mut self,
        job: &Job,
        now: f64,
        expected_start: f64,
        registry: &JobRegistry,
    ) {
        debug_assert!(expected_start > now);
        match self {
            BudgetController::Unlimited(c) => c.pivot_not_runnable(job, expected_start),
            BudgetController::PowerCap(_) => {}
            BudgetController::EnergyBudget(c) => c.pivot_not_runnable(job, now),
            BudgetController::ReducePc(c) => {
                c.pivot_not_runnable(job, now, expected_start, registry)
            }
        }
    }

    /// Clears any reservation and restores nominal replenishment.
    pub fn pivot_runnable(&mut self) {
        match self {
            BudgetController::Unlimited(c) => c.pivot_runnable(),
            BudgetController::PowerCap(_) => {}
            BudgetController::EnergyBudget(c) => c.pivot_runnable(),
            BudgetController::ReducePc(c) => c.pivot_runnable(),
        }
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            BudgetController::Unlimited(c) => c.reservation.as_ref(),
            BudgetController::PowerCap(_) => None,
            BudgetController::EnergyBudget(c) => c.reservation(),
            BudgetController::ReducePc(c) => c.reservation(),
        }
    }

    pub fn reserved_job(&self) -> Option<&str> {
        self.reservation().map(|r| r.job_id.as_str())
    }

    pub fn reservation_end(&self) -> Option<f64> {
        self.reservation().map(|r| r.end)
    }

    /// Whether the tick starts with the eager launch sweep over the whole
    /// queue (the energy-counter policies do; the memoryless ones do not).
    pub fn uses_eager_sweep(&self) -> bool {
        matches!(
            self,
            BudgetController::EnergyBudget(_) | BudgetController::ReducePc(_)
        )
    }

    /// Energy counter and nominal rate, for energy-wait estimation.
    pub fn energy_view(&self) -> Option<EnergyView> {
        match self {
            BudgetController::Unlimited(_) | BudgetController::PowerCap(_) => None,
            BudgetController::EnergyBudget(c) => Some(EnergyView {
                available: c.available(),
                nominal_rate: c.rate(),
            }),
            BudgetController::ReducePc(c) => Some(EnergyView {
                available: c.available(),
                nominal_rate: c.nominal_rate(),
            }),
        }
    }

    /// Upper bound on how far ahead an energy-driven wait may push the
    /// expected start, relative to `now`.
    pub fn energy_wait_cap(&self) -> Option<f64> {
        match self {
            BudgetController::ReducePc(_) => Some(reduce_pc::RESERVATION_HORIZON),
            _ => None,
        }
    }
}
