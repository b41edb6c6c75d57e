use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, SimError};
use crate::process::ProcessSpec;

// The input file describes one process per line:
//
//     <name> <arrival> <burst> <priority>
//
// Lines starting with '#' and blank lines are skipped.
pub fn read_input_file(filename: impl AsRef<Path>) -> Result<Vec<ProcessSpec>> {
    let file = File::open(filename)?;
    parse_workload(BufReader::new(file))
}

pub fn parse_workload(reader: impl BufRead) -> Result<Vec<ProcessSpec>> {
    let mut specs = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let spec = parse_line(line).map_err(|reason| SimError::Input {
            line: idx + 1,
            reason,
        })?;
        specs.push(spec);
    }
    Ok(specs)
}

fn parse_line(line: &str) -> std::result::Result<ProcessSpec, String> {
    let mut iter = line.split_whitespace();
    let name = iter.next().ok_or("missing name")?;
    let arrival = field(iter.next(), "arrival")?;
    let burst = field(iter.next(), "burst")?;
    let priority = field(iter.next(), "priority")?;
    if let Some(extra) = iter.next() {
        return Err(format!("unexpected trailing field {:?}", extra));
    }
    let spec = ProcessSpec::new(name, arrival, burst, priority);
    spec.validate().map_err(|e| e.to_string())?;
    Ok(spec)
}

fn field<T: std::str::FromStr>(raw: Option<&str>, what: &str) -> std::result::Result<T, String> {
    let raw = raw.ok_or_else(|| format!("missing {}", what))?;
    raw.parse()
        .map_err(|_| format!("failed to parse {} from {:?}", what, raw))
}

/// The workload used when no input file is given.
pub fn sample_workload() -> Vec<ProcessSpec> {
    vec![
        ProcessSpec::new("Process-1", 0.0, 6.0, 3),
        ProcessSpec::new("Process-2", 2.0, 4.0, 1),
        ProcessSpec::new("Process-3", 4.0, 2.0, 4),
        ProcessSpec::new("Process-4", 6.0, 8.0, 2),
    ]
}
