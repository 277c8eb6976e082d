use crate::budget::{Admission, BudgetController};
use crate::config::{Policy, SchedulerConfig};
use crate::energy::PowerModel;
use crate::messages::{Decision, Event};
use crate::pool::HostPool;
use crate::registry::{Job, JobRegistry};
use crate::Result;

/// Safety margin applied to the energy-wait estimate of the pivot.
const ENERGY_WAIT_MARGIN: f64 = 1.1;

/// Fallback horizon when the resource timeline cannot satisfy a job.
const FAR_FUTURE: f64 = 1e9;

/// The EASY-backfilling decision loop: consumes one event batch per tick and
/// answers with the decisions taken at that timestamp. Owns the host pool,
/// the job registry and the budget controller between ticks; the caller owns
/// the clock and must drive `now` forward monotonically.
pub struct Scheduler {
    config: SchedulerConfig,
    model: PowerModel,
    pool: HostPool,
    registry: JobRegistry,
    controller: BudgetController,
    now: f64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let model = config.power_model();
        let controller = BudgetController::from_config(&config, 0);
        Ok(Scheduler {
            model,
            pool: HostPool::new(0),
            registry: JobRegistry::new(),
            controller,
            now: 0.0,
            config,
        })
    }

    #[inline]
    pub fn pool(&self) -> &HostPool {
        &self.pool
    }

    #[inline]
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    #[inline]
    pub fn controller(&self) -> &BudgetController {
        &self.controller
    }

    /// One synchronous tick: ingest `events`, advance the budget state and
    /// sweep the queue. Decisions come back in the order they were taken.
    pub fn take_decisions(&mut self, now: f64, events: &[Event]) -> Result<Vec<Decision>> {
        debug_assert!(now >= self.now, "simulation time moved backwards");
        self.now = now;
        let mut decisions = Vec::new();

        for event in events {
            self.ingest(event, now, &mut decisions)?;
        }
        self.controller.on_tick(now, &self.pool);

        if self.config.policy == Policy::Fcfs {
            self.fcfs_sweep(now, &mut decisions);
        } else {
            self.schedule(now, &mut decisions);
        }
        Ok(decisions)
    }

    fn ingest(&mut self, event: &Event, now: f64, decisions: &mut Vec<Decision>) -> Result<()> {
        match event {
            Event::Hello => {
                decisions.push(Decision::EdcHello {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                });
            }
            Event::SimulationBegins { nb_hosts } => {
                if *nb_hosts == 0 {
                    return Err("simulation begins on a platform with no hosts".into());
                }
                log::info!("platform initialized with {} hosts", nb_hosts);
                self.pool = HostPool::new(*nb_hosts);
                self.registry = JobRegistry::new();
                self.controller = BudgetController::from_config(&self.config, *nb_hosts);
            }
            Event::JobSubmitted {
                job_id,
                width,
                walltime,
            } => {
                let job = Job {
                    id: job_id.clone(),
                    width: *width,
                    walltime: *walltime,
                    submit_time: now,
                };
                if job.width == 0 || job.width > self.pool.nb_hosts() {
                    log::debug!(
                        "rejecting job {}: requests {} of {} hosts",
                        job.id,
                        job.width,
                        self.pool.nb_hosts()
                    );
                    decisions.push(Decision::RejectJob { job_id: job.id });
                } else {
                    self.registry.enqueue(job);
                }
            }
            Event::JobCompleted { job_id } => {
                match self.registry.complete(job_id) {
                    Some((job, allocation)) => {
                        self.pool.release(&allocation);
                        log::debug!(
                            "job {} completed, {} hosts freed",
                            job.id,
                            allocation.width()
                        );
                        self.controller.on_complete(&job, now);
                    }
                    // duplicate or stray delivery
                    None => log::debug!("ignoring completion of unknown job {}", job_id),
                }
                if self.controller.reserved_job() == Some(job_id.as_str()) {
                    self.controller.pivot_runnable();
                }
            }
            Event::AllStaticJobsSubmitted => {
                log::debug!("workload has no further static submissions");
            }
        }
        Ok(())
    }

    /// The baseline: strictly head-of-line, one blocked job stalls the rest.
    fn fcfs_sweep(&mut self, now: f64, decisions: &mut Vec<Decision>) {
        while let Some(head) = self.registry.head().cloned() {
            if !self.controller.admit(&head, now, &self.pool).is_yes() {
                break;
            }
            if !self.allocate_and_launch(&head, now, decisions) {
                break;
            }
        }
    }

    fn schedule(&mut self, now: f64, decisions: &mut Vec<Decision>) {
        // Eager launch sweep: under an energy counter, any waiting job whose
        // admission already holds may go, pivot included.
        if self.controller.uses_eager_sweep() {
            let waiting: Vec<Job> = self.registry.waiting().cloned().collect();
            for job in waiting {
                if self.controller.admit(&job, now, &self.pool).is_yes() {
                    self.allocate_and_launch(&job, now, decisions);
                }
            }
        }

        // Pivot: launch it now or reserve its expected start.
        if self.controller.reservation().is_none() {
            if let Some(head) = self.registry.head().cloned() {
                match self.controller.admit(&head, now, &self.pool) {
                    Admission::Yes => {
                        self.allocate_and_launch(&head, now, decisions);
                    }
                    admission => {
                        let expected_start = self.expected_start(&head, now);
                        log::debug!(
                            "pivot {} withheld ({:?}), expected start {}",
                            head.id,
                            admission,
                            expected_start
                        );
                        if expected_start > now {
                            self.controller.pivot_not_runnable(
                                &head,
                                now,
                                expected_start,
                                &self.registry,
                            );
                        }
                    }
                }
            }
        }

        // Backfill: later jobs may pass the pivot only if they free their
        // hosts before the reserved start.
        let horizon = self.controller.reservation_end();
        let candidates: Vec<Job> = self.registry.iter_backfill().cloned().collect();
        for job in candidates {
            if Some(job.id.as_str()) == self.controller.reserved_job() {
                continue;
            }
            let fits_window = horizon.map(|end| now + job.walltime <= end).unwrap_or(true);
            if fits_window && self.controller.admit(&job, now, &self.pool).is_yes() {
                self.allocate_and_launch(&job, now, decisions);
            }
        }

        // The reserved pivot may have become runnable within this very tick.
        if let Some(reserved_id) = self.controller.reserved_job().map(str::to_string) {
            if let Some(head) = self.registry.head().cloned() {
                if head.id == reserved_id
                    && self.controller.admit(&head, now, &self.pool).is_yes()
                    && self.allocate_and_launch(&head, now, decisions)
                {
                    self.controller.pivot_runnable();
                }
            }
        }
    }

    fn allocate_and_launch(&mut self, job: &Job, now: f64, decisions: &mut Vec<Decision>) -> bool {
        let allocation = match self.pool.try_allocate(job.width) {
            Some(allocation) => allocation,
            None => {
                // stays queued; the next tick retries
                log::warn!(
                    "not enough hosts for job {} (requested {}, {} free)",
                    job.id,
                    job.width,
                    self.pool.free_count()
                );
                return false;
            }
        };
        let hosts = allocation.to_compact_string();
        self.registry.promote(&job.id, allocation, now);
        self.controller.on_launch(job, now);
        log::debug!("launching job {} on hosts {}", job.id, hosts);
        decisions.push(Decision::ExecuteJob {
            job_id: job.id.clone(),
            hosts,
        });
        true
    }

    /// Earliest believable start for the pivot: when enough hosts will have
    /// been freed by completing jobs, pushed further out if the energy
    /// counter must refill first.
    fn expected_start(&self, job: &Job, now: f64) -> f64 {
        let mut start = self.earliest_hosts_time(job.width, now);
        if let Some(view) = self.controller.energy_view() {
            let required = self.model.job_energy(job.width, job.walltime);
            if required > view.available && view.nominal_rate > 0.0 {
                let mut wait =
                    (required - view.available) / view.nominal_rate * ENERGY_WAIT_MARGIN;
                if let Some(cap) = self.controller.energy_wait_cap() {
                    wait = wait.min(cap);
                }
                start = start.max(now + wait);
            }
        }
        start
    }

    /// Walks the projected-end timeline of running jobs until `width` hosts
    /// are cumulatively free.
    fn earliest_hosts_time(&self, width: u32, now: f64) -> f64 {
        let mut free = self.pool.free_count();
        if free >= width {
            return now;
        }
        let mut ends: Vec<(f64, u32)> = self
            .registry
            .running()
            .map(|r| (r.expected_end, r.job.width))
            .collect();
        ends.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (end, released) in ends {
            free += released;
            if free >= width {
                return end.max(now);
            }
        }
        now + FAR_FUTURE
    }
}
