use crate::common::ids::HostId;
use crate::config::{Policy, SchedulerConfig};
use crate::engine::Scheduler;
use crate::messages::{Decision, Event};
use crate::Set;

pub fn test_config(policy: Policy) -> SchedulerConfig {
    SchedulerConfig {
        policy,
        budget_fraction: 1.0,
        period_length: 600.0,
        p_idle: 100.0,
        p_comp: 200.0,
    }
}

pub fn submit(id: &str, width: u32, walltime: f64) -> Event {
    Event::JobSubmitted {
        job_id: id.to_string(),
        width,
        walltime,
    }
}

pub fn completed(id: &str) -> Event {
    Event::JobCompleted {
        job_id: id.to_string(),
    }
}

/// Drives a scheduler through ticks and re-checks the structural invariants
/// after every one of them.
pub struct TestEnv {
    pub scheduler: Scheduler,
}

impl TestEnv {
    pub fn new(config: SchedulerConfig, nb_hosts: u32) -> Self {
        let mut scheduler = Scheduler::new(config).unwrap();
        let decisions = scheduler
            .take_decisions(0.0, &[Event::Hello, Event::SimulationBegins { nb_hosts }])
            .unwrap();
        assert!(matches!(decisions[0], Decision::EdcHello { .. }));
        TestEnv { scheduler }
    }

    pub fn tick(&mut self, now: f64, events: &[Event]) -> Vec<Decision> {
        let decisions = self.scheduler.take_decisions(now, events).unwrap();
        self.check_invariants();
        decisions
    }

    /// Free hosts and running allocations must partition the platform, and
    /// no job may be both waiting and running.
    fn check_invariants(&self) {
        let pool = self.scheduler.pool();
        let registry = self.scheduler.registry();

        let mut seen: Set<HostId> = pool.free_hosts().collect();
        assert_eq!(seen.len() as u32, pool.free_count());
        let mut busy = 0;
        for running in registry.running() {
            busy += running.allocation.width();
            assert_eq!(running.job.width, running.allocation.width());
            for id in running.allocation.hosts() {
                assert!(seen.insert(*id), "host {} double-booked", id);
            }
        }
        assert_eq!(seen.len() as u32, pool.nb_hosts());
        assert_eq!(busy, pool.busy_count());

        for job in registry.waiting() {
            assert!(
                registry.get_running(&job.id).is_none(),
                "job {} is both waiting and running",
                job.id
            );
        }
    }
}

pub fn executed(decisions: &[Decision]) -> Vec<(String, String)> {
    decisions
        .iter()
        .filter_map(|d| match d {
            Decision::ExecuteJob { job_id, hosts } => Some((job_id.clone(), hosts.clone())),
            _ => None,
        })
        .collect()
}

pub fn executed_ids(decisions: &[Decision]) -> Vec<String> {
    executed(decisions).into_iter().map(|(id, _)| id).collect()
}

pub fn rejected_ids(decisions: &[Decision]) -> Vec<String> {
    decisions
        .iter()
        .filter_map(|d| match d {
            Decision::RejectJob { job_id } => Some(job_id.clone()),
            _ => None,
        })
        .collect()
}
