//! Aggregate performance numbers over a process population.
//!
//! `cpu_utilization` is total requested burst over the last completion
//! time, so it can read above 1.0 while a run is still in progress.

use std::fmt;

use crate::process::{Pid, Process};

/// Floor for the elapsed-time denominator before anything has completed.
pub const MIN_ELAPSED: f64 = 0.001;

/// Bursts at or below this count as short.
pub const SHORT_BURST: f64 = 5.0;

/// Short bursts that arrive after time zero count as interactive.
pub const INTERACTIVE_BURST: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metrics {
    pub average_waiting_time: f64,
    pub average_turnaround_time: f64,
    pub average_response_time: f64,
    pub cpu_utilization: f64,
    pub throughput: f64,
    pub short_processes: usize,
    pub long_processes: usize,
    pub interactive_processes: usize,
    /// Approximation: one switch between each pair of completions.
    pub context_switches: usize,
    pub waiting_time_variance: f64,
    /// `1 / (1 + variance)`, 1.0 is perfectly even waiting.
    pub fairness_score: f64,
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Population variance; zero for an empty slice.
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values.iter().sum(), values.len());
    mean(values.iter().map(|v| (v - m).powi(2)).sum(), values.len())
}

/// Computes the metrics record. Total over any input: an empty population
/// yields zeros and a fairness score of 1.
pub fn calculate_metrics(processes: &[Process], completed: &[Pid]) -> Metrics {
    let n = processes.len();
    let completed_count = completed.len();

    let average_waiting_time = mean(processes.iter().map(|p| p.wait).sum(), n);
    let average_turnaround_time = mean(processes.iter().map(|p| p.turnaround).sum(), n);

    let total_response: f64 = processes
        .iter()
        .filter_map(|p| p.response)
        .filter(|r| *r >= 0.0)
        .sum();
    let average_response_time = total_response / completed_count.max(1) as f64;

    let last_completion = processes
        .iter()
        .filter(|p| completed.contains(&p.id))
        .filter_map(|p| p.completion)
        .fold(MIN_ELAPSED, f64::max);

    let total_burst: f64 = processes.iter().map(|p| p.burst).sum();
    let cpu_utilization = total_burst / last_completion;
    let throughput = completed_count as f64 / last_completion;

    let short_processes = processes.iter().filter(|p| p.burst <= SHORT_BURST).count();
    let interactive_processes = processes
        .iter()
        .filter(|p| p.burst <= INTERACTIVE_BURST && p.arrival > 0.0)
        .count();

    let waits: Vec<f64> = processes.iter().map(|p| p.wait).collect();
    let waiting_time_variance = variance(&waits);

    Metrics {
        average_waiting_time,
        average_turnaround_time,
        average_response_time,
        cpu_utilization,
        throughput,
        short_processes,
        long_processes: n - short_processes,
        interactive_processes,
        context_switches: completed_count.saturating_sub(1),
        waiting_time_variance,
        fairness_score: 1.0 / (1.0 + waiting_time_variance),
    }
}

impl Metrics {
    pub fn is_finite(&self) -> bool {
        [
            self.average_waiting_time,
            self.average_turnaround_time,
            self.average_response_time,
            self.cpu_utilization,
            self.throughput,
            self.waiting_time_variance,
            self.fairness_score,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SUM: wait {:.2} tat {:.2} resp {:.2} cpu {:.2}% thru {:.4}/s",
            self.average_waiting_time,
            self.average_turnaround_time,
            self.average_response_time,
            self.cpu_utilization * 100.0,
            self.throughput,
        )?;
        write!(
            f,
            "     short {} long {} interactive {} switches {} fairness {:.3} (var {:.3})",
            self.short_processes,
            self.long_processes,
            self.interactive_processes,
            self.context_switches,
            self.fairness_score,
            self.waiting_time_variance,
        )
    }
}
