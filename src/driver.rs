//! Simulation driver.
//!
//! Owns the virtual clock and everything the policy step needs. A host
//! calls [`Simulator::frame`] once per rendering tick; the elapsed wall
//! time since the previous tick, times the speed multiplier, becomes the
//! simulated `dt`. Tests and batch runs call [`Simulator::step`] directly.
//!
//! Everything here is single threaded. A step is applied in full before
//! any accessor can observe the simulator again.

use std::time::Instant;

use log::info;

use crate::error::{Result, SimError};
use crate::feedback::{self, FeedbackSink, Suggestion, Verdict};
use crate::metrics::{calculate_metrics, Metrics};
use crate::process::{Pid, Process, ProcessSpec, State};
use crate::registry::ProcessTable;
use crate::schedulers::{self, mlfq_details, Algorithm, MlfqView, SchedParams, Scheduler};
use crate::state::SchedState;
use crate::timeline::Timeline;

/// Simulated seconds between periodic metrics refreshes.
pub const METRICS_INTERVAL: f64 = 1.0;

/// No periodic feedback before this much simulated time has passed.
pub const FEEDBACK_WARMUP: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub algorithm: Algorithm,
    pub params: SchedParams,
    pub speed: f64,
    /// Fixed `dt` for batch runs.
    pub step: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            algorithm: Algorithm::Fcfs,
            params: SchedParams::default(),
            speed: 1.0,
            step: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgorithmChange {
    pub time: f64,
    pub algorithm: Algorithm,
}

fn check_speed(speed: f64) -> Result<()> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(SimError::InvalidSpeed(speed));
    }
    Ok(())
}

fn sanitize(dt: f64) -> f64 {
    if dt.is_finite() {
        dt.max(0.0)
    } else {
        0.0
    }
}

pub struct Simulator {
    table: ProcessTable,
    state: SchedState,
    scheduler: Box<dyn Scheduler>,
    params: SchedParams,

    clock: f64,
    speed: f64,
    running: bool,
    last_tick: Option<Instant>,

    last_metrics_at: f64,
    metrics: Option<Metrics>,
    suggestion: Option<Suggestion>,
    verdict: Option<Verdict>,
    history: Vec<AlgorithmChange>,
    timeline: Timeline,
    sink: Option<Box<dyn FeedbackSink>>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self> {
        check_speed(config.speed)?;
        let scheduler = schedulers::build(config.algorithm, config.params)?;
        Ok(Simulator {
            table: ProcessTable::new(),
            state: SchedState::new(),
            scheduler,
            params: config.params,
            clock: 0.0,
            speed: config.speed,
            running: false,
            last_tick: None,
            last_metrics_at: 0.0,
            metrics: None,
            suggestion: None,
            verdict: None,
            history: Vec::new(),
            timeline: Timeline::new(),
            sink: None,
        })
    }

    pub fn set_feedback_sink(&mut self, sink: Box<dyn FeedbackSink>) {
        self.sink = Some(sink);
    }

    pub fn add_process(&mut self, spec: ProcessSpec) -> Result<Pid> {
        let id = self.table.add(spec, self.clock)?;
        self.verdict = None;
        Ok(id)
    }

    pub fn update_process(&mut self, id: Pid, spec: ProcessSpec) -> Result<()> {
        self.table.update(id, spec, self.clock)?;
        if self.table.get(id).map(|p| p.state) != Some(State::Ready) {
            self.state.forget(id);
        }
        Ok(())
    }

    pub fn remove_process(&mut self, id: Pid) -> Result<Process> {
        let process = self.table.remove(id)?;
        self.state.forget(id);
        Ok(process)
    }

    /// Switches policy. Ready queue, running slot and quantum start over;
    /// process history is kept. Switching to MLFQ puts every unfinished
    /// process back on level 1.
    pub fn set_algorithm(&mut self, algorithm: Algorithm, params: SchedParams) -> Result<()> {
        self.scheduler = schedulers::build(algorithm, params)?;
        if let Some(pid) = self.state.running {
            if let Some(p) = self.table.get_mut(pid) {
                p.state = State::Ready;
            }
        }
        self.state.clear_transient();
        if algorithm == Algorithm::Mlfq {
            self.table.reset_levels();
        }
        self.params = params;
        self.suggestion = None;
        self.history.push(AlgorithmChange {
            time: self.clock,
            algorithm,
        });
        info!("{:.2}: switched to {}", self.clock, algorithm);
        Ok(())
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Starts running with `now` as the baseline for the first frame.
    pub fn start_at(&mut self, now: Instant) {
        if !self.running {
            info!("{:.2}: start ({})", self.clock, self.algorithm());
        }
        self.running = true;
        self.last_tick = Some(now);
    }

    pub fn pause(&mut self) {
        if self.running {
            info!("{:.2}: pause", self.clock);
        }
        self.running = false;
        self.last_tick = None;
    }

    /// Stops the run and rewinds everything to time zero.
    pub fn reset(&mut self) {
        self.running = false;
        self.last_tick = None;
        self.clock = 0.0;
        self.table.reset(0.0, self.algorithm() == Algorithm::Mlfq);
        self.state = SchedState::new();
        self.last_metrics_at = 0.0;
        self.metrics = None;
        self.suggestion = None;
        self.verdict = None;
        self.history.clear();
        self.timeline.clear();
        info!("reset");
    }

    /// Takes effect from the next frame.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        check_speed(speed)?;
        self.speed = speed;
        Ok(())
    }

    pub fn frame(&mut self) -> bool {
        self.frame_at(Instant::now())
    }

    /// Advances by the wall time since the previous frame, scaled by the
    /// speed. Returns whether the host should schedule another frame.
    pub fn frame_at(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        let elapsed = match self.last_tick {
            Some(prev) => now
                .checked_duration_since(prev)
                .map_or(0.0, |d| d.as_secs_f64()),
            None => 0.0,
        };
        self.last_tick = Some(now);
        self.step(elapsed * self.speed);
        self.running
    }

    /// Advances the simulation by `dt` simulated seconds.
    pub fn step(&mut self, dt: f64) -> &SchedState {
        let dt = sanitize(dt);
        self.clock += dt;
        self.table.promote_arrivals(self.clock);

        let mut state = std::mem::take(&mut self.state);
        state.now = self.clock;
        self.state = schedulers::step(self.scheduler.as_ref(), state, &mut self.table, dt);

        if let Some(pid) = self.state.running {
            self.timeline.record(pid, self.clock, dt);
        }

        if self.clock - self.last_metrics_at >= METRICS_INTERVAL {
            let metrics = self.refresh_metrics();
            self.last_metrics_at = self.clock;
            if self.clock > FEEDBACK_WARMUP {
                self.give_feedback(&metrics);
            }
        }

        if self.verdict.is_none() && self.table.all_done() {
            self.finish();
        }

        &self.state
    }

    /// Steps with a fixed `dt` until every process completes or the clock
    /// passes `limit`. Returns whether everything completed.
    pub fn run_to_completion(&mut self, dt: f64, limit: f64) -> Result<bool> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidStep(dt));
        }
        while !self.table.all_done() && self.clock < limit {
            self.step(dt);
        }
        Ok(self.table.all_done())
    }

    fn refresh_metrics(&mut self) -> Metrics {
        let metrics = calculate_metrics(self.table.as_slice(), &self.state.completed);
        self.metrics = Some(metrics);
        metrics
    }

    fn give_feedback(&mut self, metrics: &Metrics) {
        if let Some(suggestion) = feedback::evaluate(self.algorithm(), metrics) {
            if let Some(sink) = self.sink.as_mut() {
                sink.suggest(&suggestion);
            }
            self.suggestion = Some(suggestion);
        }
    }

    fn finish(&mut self) {
        let metrics = self.refresh_metrics();
        self.running = false;
        self.last_tick = None;
        info!(
            "{:.2}: all {} processes completed under {}",
            self.clock,
            self.table.len(),
            self.algorithm()
        );

        self.give_feedback(&metrics);
        let algorithm = self.algorithm();
        let verdict = feedback::verdict(algorithm, self.params.quantum, &metrics);
        if let Some(sink) = self.sink.as_mut() {
            sink.summarize(algorithm, &verdict, &metrics);
        }
        self.verdict = Some(verdict);
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.table
    }

    pub fn state(&self) -> &SchedState {
        &self.state
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Only available while MLFQ is the active policy.
    pub fn mlfq_details(&self) -> Option<MlfqView> {
        (self.algorithm() == Algorithm::Mlfq).then(|| mlfq_details(self.table.as_slice()))
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        self.suggestion.as_ref()
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn history(&self) -> &[AlgorithmChange] {
        &self.history
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn algorithm(&self) -> Algorithm {
        self.scheduler.algorithm()
    }

    pub fn params(&self) -> SchedParams {
        self.params
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
