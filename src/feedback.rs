//! Threshold checks that suggest a better-suited algorithm.
//!
//! Only the triggers live here. Turning a [`Suggestion`] or [`Verdict`]
//! into prose is the job of whatever implements [`FeedbackSink`].

use log::info;

use crate::metrics::Metrics;
use crate::schedulers::Algorithm;

pub const HIGH_AVERAGE_WAIT: f64 = 8.0;
pub const LOW_UTILIZATION: f64 = 0.7;
pub const CONVOY_AVERAGE_WAIT: f64 = 10.0;
pub const SMALL_QUANTUM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// High waiting time and short jobs outnumber long ones.
    ManyShortJobs { short: usize },
    /// High waiting time with interactive jobs present.
    Interactive { interactive: usize },
    LowUtilization { utilization: f64 },
    MixedWorkload { short: usize, long: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub current: Algorithm,
    pub suggested: Algorithm,
    pub trigger: Trigger,
    pub metrics: Metrics,
}

/// How the active algorithm fared over a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    ConvoyEffect,
    Adequate,
    Starvation,
    ShortJobsFavored,
    PriorityCompleted { average_wait: f64 },
    HighSwitchOverhead { quantum: f64 },
    FairSlices { quantum: f64 },
    Balanced,
}

/// Checks the triggers in order; a later match replaces an earlier one.
pub fn evaluate(current: Algorithm, metrics: &Metrics) -> Option<Suggestion> {
    let mut found: Option<(Algorithm, Trigger)> = None;

    if metrics.average_waiting_time > HIGH_AVERAGE_WAIT {
        if metrics.short_processes > metrics.long_processes && current != Algorithm::Sjf {
            found = Some((
                Algorithm::Sjf,
                Trigger::ManyShortJobs {
                    short: metrics.short_processes,
                },
            ));
        } else if metrics.interactive_processes > 0 && current != Algorithm::RoundRobin {
            found = Some((
                Algorithm::RoundRobin,
                Trigger::Interactive {
                    interactive: metrics.interactive_processes,
                },
            ));
        }
    }

    if metrics.cpu_utilization < LOW_UTILIZATION && current != Algorithm::Priority {
        found = Some((
            Algorithm::Priority,
            Trigger::LowUtilization {
                utilization: metrics.cpu_utilization,
            },
        ));
    }

    if metrics.short_processes > 0 && metrics.long_processes > 0 && current != Algorithm::Mlfq {
        found = Some((
            Algorithm::Mlfq,
            Trigger::MixedWorkload {
                short: metrics.short_processes,
                long: metrics.long_processes,
            },
        ));
    }

    found.map(|(suggested, trigger)| Suggestion {
        current,
        suggested,
        trigger,
        metrics: *metrics,
    })
}

/// `quantum` is only read for Round Robin.
pub fn verdict(algorithm: Algorithm, quantum: f64, metrics: &Metrics) -> Verdict {
    match algorithm {
        Algorithm::Fcfs if metrics.average_waiting_time > CONVOY_AVERAGE_WAIT => {
            Verdict::ConvoyEffect
        }
        Algorithm::Fcfs => Verdict::Adequate,
        Algorithm::Sjf
            if metrics.long_processes > 0 && metrics.average_waiting_time > HIGH_AVERAGE_WAIT =>
        {
            Verdict::Starvation
        }
        Algorithm::Sjf => Verdict::ShortJobsFavored,
        Algorithm::Priority => Verdict::PriorityCompleted {
            average_wait: metrics.average_waiting_time,
        },
        Algorithm::RoundRobin if quantum < SMALL_QUANTUM => Verdict::HighSwitchOverhead { quantum },
        Algorithm::RoundRobin => Verdict::FairSlices { quantum },
        Algorithm::Mlfq => Verdict::Balanced,
    }
}

/// Receiver for feedback, typically a prose generator in the UI layer.
pub trait FeedbackSink {
    fn suggest(&mut self, suggestion: &Suggestion);

    fn summarize(&mut self, _algorithm: Algorithm, _verdict: &Verdict, _metrics: &Metrics) {}
}

/// Writes feedback to the log.
#[derive(Debug, Default)]
pub struct LogFeedback;

impl FeedbackSink for LogFeedback {
    fn suggest(&mut self, s: &Suggestion) {
        info!("{} -> consider {}: {:?}", s.current, s.suggested, s.trigger);
    }

    fn summarize(&mut self, algorithm: Algorithm, verdict: &Verdict, _metrics: &Metrics) {
        info!("{} finished: {:?}", algorithm, verdict);
    }
}
