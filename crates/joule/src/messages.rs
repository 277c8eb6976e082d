use serde::{Deserialize, Serialize};

use crate::JobId;

/// What the simulator tells us happened since the previous tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    /// Protocol handshake; answered with `Decision::EdcHello`.
    Hello,
    SimulationBegins {
        nb_hosts: u32,
    },
    JobSubmitted {
        job_id: JobId,
        width: u32,
        walltime: f64,
    },
    JobCompleted {
        job_id: JobId,
    },
    /// Informational; the workload has no further static submissions.
    AllStaticJobsSubmitted,
}

/// What we tell the simulator to do at the current timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Decision {
    EdcHello {
        name: String,
        version: String,
    },
    RejectJob {
        job_id: JobId,
    },
    ExecuteJob {
        job_id: JobId,
        /// Compact ascending host list, e.g. `0-3` or `0,2-4`.
        hosts: String,
    },
}
