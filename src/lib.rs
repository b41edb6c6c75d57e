//! CPU scheduling simulator.
//!
//! A population of processes with arrival and burst times is driven over a
//! virtual clock by one of five policies (FCFS, SJF, Priority, Round Robin,
//! MLFQ), tracking per-process waiting, turnaround and response times and
//! aggregate metrics.

// Per-event trace: arrivals, dispatch, preemption, expiry, completion.
macro_rules! v_trace {
    ($($arg:tt)*) => {
        ::log::debug!(target: "schedsim::trace", $($arg)*)
    };
}

// Ready-queue dumps.
macro_rules! q_trace {
    ($($arg:tt)*) => {
        ::log::trace!(target: "schedsim::queue", $($arg)*)
    };
}

pub mod driver;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod process;
pub mod registry;
pub mod schedulers;
pub mod state;
pub mod timeline;
pub mod utils;

pub use driver::{AlgorithmChange, SimConfig, Simulator};
pub use error::{Result, SimError};
pub use feedback::{FeedbackSink, LogFeedback, Suggestion, Trigger, Verdict};
pub use metrics::{calculate_metrics, Metrics};
pub use process::{Pid, Process, ProcessSpec, State};
pub use registry::ProcessTable;
pub use schedulers::{
    mlfq_details, parse_schedspec, Algorithm, MlfqQueue, MlfqView, SchedParams, Scheduler,
};
pub use state::SchedState;
pub use timeline::{Segment, Timeline};
