use crate::process::Pid;

/// A stretch of simulated time during which one process held the CPU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub pid: Pid,
    pub start: f64,
    pub end: f64,
}

/// Gantt-chart data, one segment per uninterrupted run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    segments: Vec<Segment>,
}

impl Timeline {
    pub fn new() -> Self {
        Timeline::default()
    }

    /// Records that `pid` ran during the step that ended at `now`.
    pub fn record(&mut self, pid: Pid, now: f64, dt: f64) {
        if let Some(last) = self.segments.last_mut() {
            if last.pid == pid {
                last.end = now;
                return;
            }
        }
        self.segments.push(Segment {
            pid,
            start: (now - dt).max(0.0),
            end: now,
        });
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}
