use std::collections::VecDeque;

use crate::process::Pid;

/// Transient scheduler bookkeeping threaded from one step to the next.
///
/// Holds pids only; the processes themselves live in the
/// [`ProcessTable`](crate::registry::ProcessTable).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedState {
    /// Never contains the running process or a completed one.
    pub ready: VecDeque<Pid>,
    pub running: Option<Pid>,
    /// Completion order, append-only.
    pub completed: Vec<Pid>,
    /// Simulated time the next step runs at.
    pub now: f64,
    /// Round Robin / MLFQ only.
    pub quantum_left: f64,
}

impl SchedState {
    pub fn new() -> Self {
        SchedState::default()
    }

    /// Clears ready queue, running slot and quantum. Completion history and
    /// the clock survive.
    pub fn clear_transient(&mut self) {
        self.ready.clear();
        self.running = None;
        self.quantum_left = 0.0;
    }

    pub fn is_queued(&self, pid: Pid) -> bool {
        self.ready.contains(&pid)
    }

    pub fn is_completed(&self, pid: Pid) -> bool {
        self.completed.contains(&pid)
    }

    pub fn forget(&mut self, pid: Pid) {
        self.ready.retain(|&p| p != pid);
    }
}
