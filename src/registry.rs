//! Process registry.
//!
//! Sole owner of every [`Process`]. The scheduler state only ever holds
//! pids into this table. Processes are kept sorted by id.

use log::warn;

use crate::error::{Result, SimError};
use crate::process::{Pid, Process, ProcessSpec, State};

#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    processes: Vec<Process>,
}

impl ProcessTable {
    pub fn new() -> Self {
        ProcessTable {
            processes: Vec::new(),
        }
    }

    /// Registers a process; it is Ready right away if it has already arrived
    /// by `now`.
    pub fn add(&mut self, spec: ProcessSpec, now: f64) -> Result<Pid> {
        spec.validate()?;
        let id = match spec.id {
            Some(id) => id,
            None => self.next_id()?,
        };
        if self.get(id).is_some() {
            warn!("rejecting process {:?}: id {} is taken", spec.name, id);
            return Err(SimError::DuplicateId(id));
        }
        let process = Process::new(id, spec, now);
        let at = self.position(id).unwrap_or_else(|at| at);
        v_trace!("{:.2}: registered process {} ({})", now, id, process.state);
        self.processes.insert(at, process);
        Ok(id)
    }

    /// Replaces the static parameters of a process that has not started
    /// running. The remaining time restarts from the new burst time.
    pub fn update(&mut self, id: Pid, spec: ProcessSpec, now: f64) -> Result<()> {
        spec.validate()?;
        let process = self.editable_mut(id)?;
        process.apply(spec);
        process.state = if process.arrival <= now {
            State::Ready
        } else {
            State::NotArrived
        };
        Ok(())
    }

    pub fn remove(&mut self, id: Pid) -> Result<Process> {
        self.editable_mut(id)?;
        let at = self.position(id).map_err(|_| SimError::UnknownProcess(id))?;
        Ok(self.processes.remove(at))
    }

    /// Moves every process whose arrival time has passed from NotArrived to
    /// Ready. Returns how many were promoted.
    pub fn promote_arrivals(&mut self, now: f64) -> usize {
        let mut promoted = 0;
        for p in self
            .processes
            .iter_mut()
            .filter(|p| p.state == State::NotArrived && p.arrival <= now)
        {
            p.state = State::Ready;
            promoted += 1;
            v_trace!("{:.2}: {} arrived", now, p.id);
        }
        promoted
    }

    /// Returns every process to its pre-run state as of `initial_time`.
    /// Under MLFQ everyone restarts on level 1.
    pub fn reset(&mut self, initial_time: f64, mlfq: bool) {
        for p in &mut self.processes {
            p.restart(initial_time);
            p.queue_level = if mlfq { Some(1) } else { None };
        }
    }

    /// Puts every unfinished process back on MLFQ level 1.
    pub fn reset_levels(&mut self) {
        for p in self.processes.iter_mut().filter(|p| !p.is_done()) {
            p.queue_level = Some(1);
        }
    }

    pub fn get(&self, id: Pid) -> Option<&Process> {
        self.position(id).ok().map(|at| &self.processes[at])
    }

    pub(crate) fn get_mut(&mut self, id: Pid) -> Option<&mut Process> {
        match self.position(id) {
            Ok(at) => Some(&mut self.processes[at]),
            Err(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.iter()
    }

    pub fn as_slice(&self) -> &[Process] {
        &self.processes
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn all_done(&self) -> bool {
        !self.processes.is_empty() && self.processes.iter().all(Process::is_done)
    }

    /// One past the largest live id, or 1 for an empty table.
    fn next_id(&self) -> Result<Pid> {
        match self.processes.last() {
            Some(p) => p.id.checked_add(1).ok_or(SimError::IdSpaceExhausted(p.id)),
            None => Ok(1),
        }
    }

    fn position(&self, id: Pid) -> std::result::Result<usize, usize> {
        self.processes.binary_search_by_key(&id, |p| p.id)
    }

    fn editable_mut(&mut self, id: Pid) -> Result<&mut Process> {
        let process = self.get_mut(id).ok_or(SimError::UnknownProcess(id))?;
        if !process.is_editable() {
            warn!("process {} is {}, refusing to modify it", id, process.state);
            return Err(SimError::ProcessBusy {
                pid: id,
                state: process.state,
            });
        }
        Ok(process)
    }
}
