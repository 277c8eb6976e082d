use std::collections::VecDeque;

use crate::pool::Allocation;
use crate::{JobId, Map};

/// Immutable description of a submitted job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub width: u32,
    pub walltime: f64,
    pub submit_time: f64,
}

/// A job that has been dispatched, together with its scheduling state.
#[derive(Debug)]
pub struct RunningJob {
    pub job: Job,
    pub allocation: Allocation,
    pub start_time: f64,
    pub expected_end: f64,
}

/// The wait queue (strict submission order) and the map of running jobs.
///
/// The queue is never reordered; jobs leave it either by promotion to the
/// running map or by rejection at ingestion, before they ever enter.
#[derive(Debug, Default)]
pub struct JobRegistry {
    queue: VecDeque<Job>,
    running: Map<JobId, RunningJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn enqueue(&mut self, job: Job) {
        self.queue.push_back(job);
    }

    /// The pivot: the head-of-line job governed by FCFS.
    #[inline]
    pub fn head(&self) -> Option<&Job> {
        self.queue.front()
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn waiting(&self) -> impl Iterator<Item = &Job> {
        self.queue.iter()
    }

    /// Backfill candidates: every waiting job except the pivot.
    pub fn iter_backfill(&self) -> impl Iterator<Item = &Job> {
        self.queue.iter().skip(1)
    }

    pub fn is_waiting(&self, job_id: &str) -> bool {
        self.queue.iter().any(|job| job.id == job_id)
    }

    /// Moves a waiting job into the running map with start time `now`.
    ///
    /// Panics if the job is not waiting; launching a job that is not queued
    /// is a programming error of the engine.
    pub fn promote(&mut self, job_id: &str, allocation: Allocation, now: f64) -> &RunningJob {
        let pos = self
            .queue
            .iter()
            .position(|job| job.id == job_id)
            .expect("promoted job is not in the wait queue");
        let job = self.queue.remove(pos).unwrap();
        debug_assert_eq!(job.width, allocation.width());
        let expected_end = now + job.walltime;
        let id = job.id.clone();
        self.running.insert(
            id.clone(),
            RunningJob {
                job,
                allocation,
                start_time: now,
                expected_end,
            },
        );
        self.running.get(&id).unwrap()
    }

    /// Removes a completed job, handing back what is needed to release its
    /// hosts. Unknown ids yield `None` (duplicate deliveries are tolerated
    /// by the caller).
    pub fn complete(&mut self, job_id: &str) -> Option<(Job, Allocation)> {
        self.running
            .remove(job_id)
            .map(|running| (running.job, running.allocation))
    }

    pub fn running(&self) -> impl Iterator<Item = &RunningJob> {
        self.running.values()
    }

    pub fn get_running(&self, job_id: &str) -> Option<&RunningJob> {
        self.running.get(job_id)
    }
}
