//! The scheduling policies.
//!
//! Every policy shares one step function, [`step`], which walks the same
//! phases each tick: admit newly ready processes, order the ready queue,
//! check for preemption, dispatch, execute, complete, expire the quantum
//! and accrue waiting time. A [`Scheduler`] only decides how the ready
//! queue is ranked and what the quantum and preemption rules are.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, SimError};
use crate::process::{Pid, Process, State};
use crate::registry::ProcessTable;
use crate::state::SchedState;

/// Remaining or quantum time at or below this counts as used up.
pub const TIME_EPSILON: f64 = 1e-9;

pub const MLFQ_LEVELS: u8 = 3;

/// Quantum per MLFQ level; the bottom level is plain FCFS.
pub const MLFQ_QUANTA: [Option<f64>; MLFQ_LEVELS as usize] = [Some(2.0), Some(4.0), None];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Fcfs,
    Sjf,
    Priority,
    RoundRobin,
    Mlfq,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Fcfs,
        Algorithm::Sjf,
        Algorithm::Priority,
        Algorithm::RoundRobin,
        Algorithm::Mlfq,
    ];
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Algorithm::Fcfs => "FCFS",
            Algorithm::Sjf => "SJF",
            Algorithm::Priority => "Priority",
            Algorithm::RoundRobin => "RoundRobin",
            Algorithm::Mlfq => "MLFQ",
        };
        f.write_str(s)
    }
}

impl FromStr for Algorithm {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fcfs" => Ok(Algorithm::Fcfs),
            "sjf" => Ok(Algorithm::Sjf),
            "priority" => Ok(Algorithm::Priority),
            "roundrobin" | "rr" => Ok(Algorithm::RoundRobin),
            "mlfq" => Ok(Algorithm::Mlfq),
            _ => Err(SimError::UnknownAlgorithm(s.to_owned())),
        }
    }
}

/// Policy parameters. `quantum` is read by Round Robin, `preemptive` by SJF
/// and Priority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedParams {
    pub quantum: f64,
    pub preemptive: bool,
}

impl Default for SchedParams {
    fn default() -> Self {
        SchedParams {
            quantum: 2.0,
            preemptive: false,
        }
    }
}

impl SchedParams {
    pub fn validate(&self) -> Result<()> {
        if !self.quantum.is_finite() || self.quantum <= 0.0 {
            return Err(SimError::InvalidQuantum(self.quantum));
        }
        Ok(())
    }
}

/// Parses a compact scheduler spec: `F`, `S`, `S:p`, `P`, `P:p`, `R<quantum>`
/// or `M`. A full algorithm name is accepted as well.
pub fn parse_schedspec(spec: &str) -> Result<(Algorithm, SchedParams)> {
    static SPEC_RE: OnceLock<Regex> = OnceLock::new();
    let re = SPEC_RE.get_or_init(|| {
        Regex::new(r"^(?:([FM])|([SP])(:p)?|R(\d+(?:\.\d+)?))$").expect("scheduler spec pattern")
    });

    let Some(caps) = re.captures(spec) else {
        let algorithm = spec.parse()?;
        return Ok((algorithm, SchedParams::default()));
    };

    let mut params = SchedParams::default();
    let algorithm = if let Some(m) = caps.get(1) {
        if m.as_str() == "F" {
            Algorithm::Fcfs
        } else {
            Algorithm::Mlfq
        }
    } else if let Some(m) = caps.get(2) {
        params.preemptive = caps.get(3).is_some();
        if m.as_str() == "S" {
            Algorithm::Sjf
        } else {
            Algorithm::Priority
        }
    } else {
        let quantum = caps.get(4).map_or("", |m| m.as_str());
        params.quantum = quantum
            .parse()
            .map_err(|_| SimError::UnknownAlgorithm(spec.to_owned()))?;
        Algorithm::RoundRobin
    };
    params.validate()?;
    Ok((algorithm, params))
}

/// A scheduling policy, as seen by [`step`].
pub trait Scheduler {
    fn algorithm(&self) -> Algorithm;

    /// Ranks two ready processes; `Less` is dispatched first. Ties are broken
    /// by [`order_ready`], not here.
    fn compare(&self, a: &Process, b: &Process) -> Ordering;

    /// Round Robin keeps pure FIFO order and never re-sorts.
    fn reorders(&self) -> bool {
        true
    }

    fn preemptive(&self) -> bool {
        false
    }

    /// Quantum granted on dispatch; `None` runs to completion.
    fn quantum(&self, _p: &Process) -> Option<f64> {
        None
    }

    /// Called when a process joins the ready queue.
    fn admit(&self, _p: &mut Process) {}

    /// Called when a process uses up its quantum without finishing.
    fn expire(&self, _p: &mut Process) {}
}

pub struct Fcfs;

impl Scheduler for Fcfs {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Fcfs
    }

    fn compare(&self, a: &Process, b: &Process) -> Ordering {
        a.arrival.total_cmp(&b.arrival)
    }
}

/// Shortest remaining time first.
pub struct Sjf {
    pub preemptive: bool,
}

impl Scheduler for Sjf {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Sjf
    }

    fn compare(&self, a: &Process, b: &Process) -> Ordering {
        a.remaining.total_cmp(&b.remaining)
    }

    fn preemptive(&self) -> bool {
        self.preemptive
    }
}

pub struct Prio {
    pub preemptive: bool,
}

impl Scheduler for Prio {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Priority
    }

    fn compare(&self, a: &Process, b: &Process) -> Ordering {
        a.priority.cmp(&b.priority)
    }

    fn preemptive(&self) -> bool {
        self.preemptive
    }
}

pub struct RoundRobin {
    pub quantum: f64,
}

impl Scheduler for RoundRobin {
    fn algorithm(&self) -> Algorithm {
        Algorithm::RoundRobin
    }

    fn compare(&self, _a: &Process, _b: &Process) -> Ordering {
        Ordering::Equal
    }

    fn reorders(&self) -> bool {
        false
    }

    fn quantum(&self, _p: &Process) -> Option<f64> {
        Some(self.quantum)
    }
}

/// Three-level feedback queue: 2s, 4s, then FCFS.
///
/// Processes only ever move down. There is no aging, so a long job that
/// reaches level 3 stays there for the rest of the run.
pub struct Mlfq;

impl Scheduler for Mlfq {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Mlfq
    }

    fn compare(&self, a: &Process, b: &Process) -> Ordering {
        a.level()
            .cmp(&b.level())
            .then_with(|| a.arrival.total_cmp(&b.arrival))
    }

    fn quantum(&self, p: &Process) -> Option<f64> {
        let level = p.level().clamp(1, MLFQ_LEVELS);
        MLFQ_QUANTA[usize::from(level - 1)]
    }

    fn admit(&self, p: &mut Process) {
        if p.queue_level.is_none() {
            p.queue_level = Some(1);
        }
    }

    fn expire(&self, p: &mut Process) {
        p.queue_level = Some((p.level() + 1).min(MLFQ_LEVELS));
    }
}

pub fn build(algorithm: Algorithm, params: SchedParams) -> Result<Box<dyn Scheduler>> {
    let scheduler: Box<dyn Scheduler> = match algorithm {
        Algorithm::Fcfs => Box::new(Fcfs),
        Algorithm::Sjf => Box::new(Sjf {
            preemptive: params.preemptive,
        }),
        Algorithm::Priority => Box::new(Prio {
            preemptive: params.preemptive,
        }),
        Algorithm::RoundRobin => {
            params.validate()?;
            Box::new(RoundRobin {
                quantum: params.quantum,
            })
        }
        Algorithm::Mlfq => Box::new(Mlfq),
    };
    Ok(scheduler)
}

/// Sorts the ready queue by the policy's ranking, then arrival time, then
/// id. The order is total, so sorting an unchanged queue again is a no-op.
pub fn order_ready(sched: &dyn Scheduler, ready: &mut VecDeque<Pid>, table: &ProcessTable) {
    if !sched.reorders() {
        return;
    }
    ready.make_contiguous().sort_by(|&a, &b| match (table.get(a), table.get(b)) {
        (Some(pa), Some(pb)) => sched
            .compare(pa, pb)
            .then_with(|| pa.arrival.total_cmp(&pb.arrival))
            .then_with(|| pa.id.cmp(&pb.id)),
        _ => a.cmp(&b),
    });
}

/// Advances the scheduler by `dt` seconds of simulated time at `state.now`.
///
/// Negative or non-finite `dt` is treated as zero.
pub fn step(
    sched: &dyn Scheduler,
    mut state: SchedState,
    table: &mut ProcessTable,
    dt: f64,
) -> SchedState {
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

    admit(sched, &mut state, table);
    order_ready(sched, &mut state.ready, table);
    q_trace!("{:.2}: ready {:?} running {:?}", state.now, state.ready, state.running);

    if sched.preemptive() {
        preempt(sched, &mut state, table);
    }

    if state.running.is_none() {
        if let Some(pid) = state.ready.pop_front() {
            dispatch(sched, &mut state, table, pid);
        }
    }

    if let Some(pid) = state.running {
        execute(sched, &mut state, table, pid, dt);
    }

    for &pid in &state.ready {
        if let Some(p) = table.get_mut(pid) {
            p.wait += dt;
        }
    }

    state
}

fn admit(sched: &dyn Scheduler, state: &mut SchedState, table: &mut ProcessTable) {
    let arrivals: Vec<Pid> = table
        .iter()
        .filter(|p| {
            p.state == State::Ready
                && state.running != Some(p.id)
                && !state.is_queued(p.id)
                && !state.is_completed(p.id)
        })
        .map(|p| p.id)
        .collect();

    for pid in arrivals {
        if let Some(p) = table.get_mut(pid) {
            sched.admit(p);
        }
        state.ready.push_back(pid);
    }
}

fn preempt(sched: &dyn Scheduler, state: &mut SchedState, table: &mut ProcessTable) {
    let (Some(current), Some(&challenger)) = (state.running, state.ready.front()) else {
        return;
    };
    let beats = match (table.get(challenger), table.get(current)) {
        (Some(ch), Some(cur)) => sched.compare(ch, cur) == Ordering::Less,
        _ => false,
    };
    if !beats {
        return;
    }

    state.ready.pop_front();
    if let Some(p) = table.get_mut(current) {
        p.state = State::Ready;
    }
    state.ready.push_back(current);
    v_trace!("{:.2}: {} preempts {}", state.now, challenger, current);

    dispatch(sched, state, table, challenger);
    order_ready(sched, &mut state.ready, table);
}

fn dispatch(sched: &dyn Scheduler, state: &mut SchedState, table: &mut ProcessTable, pid: Pid) {
    let Some(p) = table.get_mut(pid) else {
        return;
    };
    p.state = State::Running;
    if p.response.is_none() {
        p.response = Some(state.now - p.arrival);
    }
    state.quantum_left = sched.quantum(p).unwrap_or(f64::INFINITY);
    state.running = Some(pid);
    v_trace!(
        "{:.2}: dispatch {} rem={:.2} quantum={}",
        state.now,
        pid,
        p.remaining,
        state.quantum_left
    );
}

fn execute(
    sched: &dyn Scheduler,
    state: &mut SchedState,
    table: &mut ProcessTable,
    pid: Pid,
    dt: f64,
) {
    let now = state.now;
    let Some(p) = table.get_mut(pid) else {
        state.running = None;
        return;
    };

    p.remaining -= dt;
    state.quantum_left -= dt;

    if p.remaining <= TIME_EPSILON {
        p.remaining = 0.0;
        p.state = State::Completed;
        p.completion = Some(now);
        p.turnaround = now - p.arrival;
        p.wait = p.turnaround - p.burst;
        state.completed.push(pid);
        state.running = None;
        state.quantum_left = 0.0;
        v_trace!("{:.2}: {} done tat={:.2} wait={:.2}", now, pid, p.turnaround, p.wait);
    } else if state.quantum_left <= TIME_EPSILON {
        sched.expire(p);
        p.state = State::Ready;
        v_trace!("{:.2}: {} quantum expired (level {:?})", now, pid, p.queue_level);
        state.ready.push_back(pid);
        state.running = None;
        state.quantum_left = 0.0;
        order_ready(sched, &mut state.ready, table);
    }
}

/// One MLFQ level as seen from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct MlfqQueue {
    pub level: u8,
    /// `None` for the FCFS bottom level.
    pub quantum: Option<f64>,
    pub processes: Vec<Pid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MlfqView {
    pub queues: Vec<MlfqQueue>,
}

/// Buckets every Ready process by MLFQ level. Read-only.
pub fn mlfq_details(processes: &[Process]) -> MlfqView {
    let mut queues: Vec<MlfqQueue> = MLFQ_QUANTA
        .iter()
        .zip(1..=MLFQ_LEVELS)
        .map(|(&quantum, level)| MlfqQueue {
            level,
            quantum,
            processes: Vec::new(),
        })
        .collect();

    for p in processes.iter().filter(|p| p.state == State::Ready) {
        let level = p.level().clamp(1, MLFQ_LEVELS);
        queues[usize::from(level - 1)].processes.push(p.id);
    }

    MlfqView { queues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessSpec;

    fn table(specs: &[(f64, f64, i32)]) -> ProcessTable {
        let mut table = ProcessTable::new();
        for &(arrival, burst, priority) in specs {
            table
                .add(ProcessSpec::new("p", arrival, burst, priority), 0.0)
                .unwrap();
        }
        table
    }

    fn run(sched: &dyn Scheduler, table: &mut ProcessTable, steps: usize) -> SchedState {
        let mut state = SchedState::new();
        for _ in 0..steps {
            state.now += 0.1;
            table.promote_arrivals(state.now);
            state = step(sched, state, table, 0.1);
        }
        state
    }

    #[test]
    fn parse_compact_specs() {
        assert_eq!(parse_schedspec("F").unwrap().0, Algorithm::Fcfs);
        assert_eq!(parse_schedspec("M").unwrap().0, Algorithm::Mlfq);

        let (algo, params) = parse_schedspec("S:p").unwrap();
        assert_eq!(algo, Algorithm::Sjf);
        assert!(params.preemptive);

        let (algo, params) = parse_schedspec("P").unwrap();
        assert_eq!(algo, Algorithm::Priority);
        assert!(!params.preemptive);

        let (algo, params) = parse_schedspec("R3.5").unwrap();
        assert_eq!(algo, Algorithm::RoundRobin);
        assert_eq!(params.quantum, 3.5);

        assert_eq!(parse_schedspec("roundrobin").unwrap().0, Algorithm::RoundRobin);
        assert!(matches!(parse_schedspec("X9"), Err(SimError::UnknownAlgorithm(_))));
        assert!(matches!(parse_schedspec("R0"), Err(SimError::InvalidQuantum(_))));
    }

    #[test]
    fn algorithm_names_round_trip() {
        for algo in Algorithm::ALL {
            assert_eq!(algo.to_string().parse::<Algorithm>().unwrap(), algo);
        }
    }

    #[test]
    fn build_rejects_bad_quantum() {
        let params = SchedParams {
            quantum: -1.0,
            preemptive: false,
        };
        assert!(build(Algorithm::RoundRobin, params).is_err());
        assert!(build(Algorithm::Fcfs, params).is_ok());
    }

    #[test]
    fn ties_break_by_arrival_then_id() {
        let table = table(&[(2.0, 3.0, 1), (1.0, 3.0, 1), (1.0, 3.0, 1)]);
        let mut ready: VecDeque<Pid> = VecDeque::from(vec![1, 3, 2]);
        order_ready(&Prio { preemptive: false }, &mut ready, &table);
        assert_eq!(ready, VecDeque::from(vec![2, 3, 1]));
    }

    #[test]
    fn reordering_twice_is_stable() {
        let table = table(&[(0.0, 5.0, 2), (0.0, 2.0, 2), (1.0, 2.0, 1), (0.5, 9.0, 1)]);
        for sched in [
            Box::new(Fcfs) as Box<dyn Scheduler>,
            Box::new(Sjf { preemptive: false }),
            Box::new(Prio { preemptive: true }),
            Box::new(Mlfq),
        ] {
            let mut ready: VecDeque<Pid> = VecDeque::from(vec![4, 3, 2, 1]);
            order_ready(sched.as_ref(), &mut ready, &table);
            let once = ready.clone();
            order_ready(sched.as_ref(), &mut ready, &table);
            assert_eq!(ready, once, "{}", sched.algorithm());
        }
    }

    #[test]
    fn round_robin_keeps_fifo_order() {
        let table = table(&[(0.0, 5.0, 0), (0.0, 1.0, 0)]);
        let mut ready: VecDeque<Pid> = VecDeque::from(vec![1, 2]);
        order_ready(&RoundRobin { quantum: 1.0 }, &mut ready, &table);
        assert_eq!(ready, VecDeque::from(vec![1, 2]));
    }

    #[test]
    fn admission_never_duplicates() {
        let mut table = table(&[(0.0, 5.0, 0), (0.0, 5.0, 0)]);
        let mut state = SchedState::new();
        state = step(&Fcfs, state, &mut table, 0.0);
        state = step(&Fcfs, state, &mut table, 0.0);
        assert_eq!(state.running, Some(1));
        assert_eq!(state.ready, VecDeque::from(vec![2]));
    }

    #[test]
    fn negative_dt_changes_nothing() {
        let mut table = table(&[(0.0, 5.0, 0)]);
        let state = step(&Fcfs, SchedState::new(), &mut table, -3.0);
        let state = step(&Fcfs, state, &mut table, f64::NAN);
        assert_eq!(state.running, Some(1));
        assert_eq!(table.get(1).unwrap().remaining, 5.0);
    }

    #[test]
    fn dispatch_records_response_once() {
        let mut table = table(&[(0.0, 1.0, 0), (0.0, 1.0, 0)]);
        let mut state = SchedState::new();
        state.now = 0.5;
        state = step(&Fcfs, state, &mut table, 0.1);
        assert_eq!(table.get(1).unwrap().response, Some(0.5));
        assert_eq!(table.get(2).unwrap().response, None);
        assert!((table.get(2).unwrap().wait - 0.1).abs() < 1e-12);
        assert_eq!(state.running, Some(1));
    }

    #[test]
    fn preemptive_priority_swaps_on_better_arrival() {
        let mut table = table(&[(0.0, 4.0, 5), (1.0, 2.0, 1)]);
        let state = run(&Prio { preemptive: true }, &mut table, 12);
        assert_eq!(state.running, Some(2));
        assert_eq!(table.get(1).unwrap().state, State::Ready);
        assert_eq!(state.ready, VecDeque::from(vec![1]));
    }

    #[test]
    fn equal_rank_does_not_preempt() {
        let mut table = table(&[(0.0, 4.0, 1), (1.0, 2.0, 1)]);
        let state = run(&Prio { preemptive: true }, &mut table, 15);
        assert_eq!(state.running, Some(1));
    }

    #[test]
    fn mlfq_demotes_on_expiry_and_floors_at_three() {
        let mut table = table(&[(0.0, 20.0, 0)]);
        let mut state = SchedState::new();
        for i in 1..=100 {
            state.now += 0.1;
            table.promote_arrivals(state.now);
            state = step(&Mlfq, state, &mut table, 0.1);
            if i == 25 {
                assert_eq!(table.get(1).unwrap().queue_level, Some(2));
            }
        }
        assert_eq!(table.get(1).unwrap().queue_level, Some(3));
        assert_eq!(state.running, Some(1));

        let mut p = table.get(1).unwrap().clone();
        Mlfq.expire(&mut p);
        assert_eq!(p.queue_level, Some(3));
        assert_eq!(Mlfq.quantum(&p), None);
    }

    #[test]
    fn mlfq_details_buckets_ready_processes() {
        let mut table = table(&[(0.0, 5.0, 0), (0.0, 5.0, 0), (0.0, 5.0, 0), (9.0, 1.0, 0)]);
        table.get_mut(2).unwrap().queue_level = Some(2);
        table.get_mut(3).unwrap().queue_level = Some(3);
        let before = table.as_slice().to_vec();

        let view = mlfq_details(table.as_slice());
        assert_eq!(view.queues.len(), 3);
        assert_eq!(view.queues[0].processes, vec![1]);
        assert_eq!(view.queues[0].quantum, Some(2.0));
        assert_eq!(view.queues[1].processes, vec![2]);
        assert_eq!(view.queues[1].quantum, Some(4.0));
        assert_eq!(view.queues[2].processes, vec![3]);
        assert_eq!(view.queues[2].quantum, None);
        assert_eq!(table.as_slice(), before.as_slice());
    }
}
