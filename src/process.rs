use std::fmt;

use crate::error::{Result, SimError};

pub type Pid = u32;

/// Lifecycle of a simulated process.
///
/// `NotArrived -> Ready -> Running -> Completed`, with `Running -> Ready`
/// on preemption or quantum expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    NotArrived,
    Ready,
    Running,
    Completed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::NotArrived => "not arrived",
            State::Ready => "ready",
            State::Running => "running",
            State::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// The user-editable part of a process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    /// Forces a specific id; `None` lets the registry mint one.
    pub id: Option<Pid>,
    pub name: String,
    pub arrival: f64,
    pub burst: f64,
    /// Lower number = higher priority.
    pub priority: i32,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, arrival: f64, burst: f64, priority: i32) -> Self {
        ProcessSpec {
            id: None,
            name: name.into(),
            arrival,
            burst,
            priority,
        }
    }

    pub fn with_id(mut self, id: Pid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.arrival.is_finite() || self.arrival < 0.0 {
            return Err(SimError::InvalidArrival {
                arrival: self.arrival,
            });
        }
        if !self.burst.is_finite() || self.burst <= 0.0 {
            return Err(SimError::InvalidBurst { burst: self.burst });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub id: Pid,
    pub name: String,
    pub arrival: f64,
    pub burst: f64,
    pub priority: i32,

    pub state: State,
    pub remaining: f64,
    pub wait: f64,
    pub turnaround: f64,
    /// Set once, at first dispatch.
    pub response: Option<f64>,
    /// Set once, at completion.
    pub completion: Option<f64>,
    /// MLFQ tier, 1 (highest) to 3. `None` until MLFQ first sees the process.
    pub queue_level: Option<u8>,
}

impl Process {
    pub(crate) fn new(id: Pid, spec: ProcessSpec, now: f64) -> Process {
        let mut process = Process {
            id,
            name: spec.name,
            arrival: spec.arrival,
            burst: spec.burst,
            priority: spec.priority,
            state: State::NotArrived,
            remaining: spec.burst,
            wait: 0.0,
            turnaround: 0.0,
            response: None,
            completion: None,
            queue_level: None,
        };
        process.restart(now);
        process
    }

    /// Drops all run history and recomputes the arrival state against `now`.
    pub(crate) fn restart(&mut self, now: f64) {
        self.state = if self.arrival <= now {
            State::Ready
        } else {
            State::NotArrived
        };
        self.remaining = self.burst;
        self.wait = 0.0;
        self.turnaround = 0.0;
        self.response = None;
        self.completion = None;
    }

    pub(crate) fn apply(&mut self, spec: ProcessSpec) {
        self.name = spec.name;
        self.arrival = spec.arrival;
        self.burst = spec.burst;
        self.priority = spec.priority;
        self.remaining = spec.burst;
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Completed
    }

    /// Running and Completed processes are owned by the simulation.
    pub fn is_editable(&self) -> bool {
        !matches!(self.state, State::Running | State::Completed)
    }

    pub fn level(&self) -> u8 {
        self.queue_level.unwrap_or(1)
    }
}
