use crate::process::{Pid, State};
use thiserror::Error;

/// Everything a registry mutation or driver control can refuse.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("burst time must be finite and greater than zero, got {burst}")]
    InvalidBurst { burst: f64 },

    #[error("arrival time must be finite and non-negative, got {arrival}")]
    InvalidArrival { arrival: f64 },

    #[error("process id {0} is already in use")]
    DuplicateId(Pid),

    #[error("no process id is left above {0}")]
    IdSpaceExhausted(Pid),

    #[error("no process with id {0}")]
    UnknownProcess(Pid),

    #[error("process {pid} is {state} and can no longer be edited or removed")]
    ProcessBusy { pid: Pid, state: State },

    #[error("time quantum must be finite and greater than zero, got {0}")]
    InvalidQuantum(f64),

    #[error("speed multiplier must be finite and greater than zero, got {0}")]
    InvalidSpeed(f64),

    #[error("simulation step must be finite and greater than zero, got {0}")]
    InvalidStep(f64),

    #[error("unknown scheduling algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("line {line}: {reason}")]
    Input { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
