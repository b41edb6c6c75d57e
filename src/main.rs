use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use log::{warn, LevelFilter};

use schedsim::utils::{read_input_file, sample_workload};
use schedsim::{parse_schedspec, LogFeedback, Process, SimConfig, Simulator};

/// Roughly one display refresh.
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Default)]
struct Flags {
    v_option: bool,
    q_option: bool,
}

struct Options {
    config: SimConfig,
    inputfile: Option<PathBuf>,
    realtime: bool,
    limit: f64,
    flags: Flags,
}

fn process_row(p: &Process) -> String {
    fn opt(v: Option<f64>) -> String {
        v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
    }

    // Clock drift can leave an unwaited process a hair below zero.
    format!(
        "{:04}: {:>12} {:6.2} {:6.2} {:3} | {:>7} {:7.2} {:7.2} {:>7}",
        p.id,
        p.name,
        p.arrival,
        p.burst,
        p.priority,
        opt(p.completion),
        p.turnaround,
        p.wait.max(0.0),
        opt(p.response),
    )
}

fn print_summary(sim: &Simulator) {
    println!("{} (quantum {})", sim.algorithm(), sim.params().quantum);
    for p in sim.processes().iter() {
        println!("{}", process_row(p));
    }

    let gantt: Vec<String> = sim
        .timeline()
        .segments()
        .iter()
        .map(|s| format!("{}[{:.1}-{:.1}]", s.pid, s.start, s.end))
        .collect();
    println!("GANTT: {}", gantt.join(" "));

    if let Some(metrics) = sim.metrics() {
        println!("{}", metrics);
    }
}

fn run_realtime(sim: &mut Simulator, limit: f64) {
    sim.start();
    loop {
        thread::sleep(FRAME);
        if !sim.frame() || sim.clock() >= limit {
            break;
        }
    }
    sim.pause();
}

fn actual_main_fn(opts: Options) -> Result<()> {
    let specs = match &opts.inputfile {
        Some(path) => read_input_file(path)
            .with_context(|| format!("failed to read workload {}", path.display()))?,
        None => sample_workload(),
    };

    let mut sim = Simulator::new(opts.config)?;
    sim.set_feedback_sink(Box::new(LogFeedback));
    for spec in specs {
        let name = spec.name.clone();
        sim.add_process(spec)
            .with_context(|| format!("failed to add process {:?}", name))?;
    }

    let done = if opts.realtime {
        run_realtime(&mut sim, opts.limit);
        sim.processes().all_done()
    } else {
        sim.start();
        sim.run_to_completion(opts.config.step, opts.limit)?
    };

    print_summary(&sim);
    if !done && !sim.processes().is_empty() {
        warn!("stopped at {:.2}s before every process completed", sim.clock());
    }
    Ok(())
}

fn number(matches: &ArgMatches, name: &str) -> Result<f64> {
    let raw = matches.value_of(name).unwrap_or_default();
    raw.parse()
        .with_context(|| format!("--{} expects a number, got {:?}", name, raw))
}

fn positive(matches: &ArgMatches, name: &str) -> Result<f64> {
    let value = number(matches, name)?;
    if !(value.is_finite() && value > 0.0) {
        bail!("--{} must be a positive number, got {}", name, value);
    }
    Ok(value)
}

fn parse_args(actual_args: &[String]) -> Result<Options> {
    let matches = Command::new("schedsim")
        .about("CPU scheduling simulator")
        .arg(
            Arg::new("schedspec")
                .short('s')
                .long("schedspec")
                .takes_value(true)
                .default_value("F")
                .validator(|v| parse_schedspec(v).map(|_| ()))
                .help("Scheduler specification (F, S[:p], P[:p], R<quantum>, M)"),
        )
        .arg(
            Arg::new("inputfile")
                .long("inputfile")
                .takes_value(true)
                .help("Process workload file; the built-in sample is used if omitted"),
        )
        .arg(
            Arg::new("step")
                .long("step")
                .takes_value(true)
                .default_value("0.1")
                .help("Simulated seconds per step in batch mode"),
        )
        .arg(
            Arg::new("speed")
                .long("speed")
                .takes_value(true)
                .default_value("1")
                .help("Simulated seconds per wall second in realtime mode"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .takes_value(true)
                .default_value("10000")
                .help("Give up after this much simulated time"),
        )
        .arg(
            Arg::new("realtime")
                .long("realtime")
                .help("Drive the simulation from the wall clock"),
        )
        .arg(Arg::new("v_flag").short('v').help("Trace scheduling events"))
        .arg(Arg::new("q_flag").short('q').help("Trace the ready queue"))
        .try_get_matches_from(actual_args)?;

    let (algorithm, params) = parse_schedspec(matches.value_of("schedspec").unwrap_or("F"))?;
    let step = positive(&matches, "step")?;
    let limit = positive(&matches, "limit")?;

    Ok(Options {
        config: SimConfig {
            algorithm,
            params,
            speed: number(&matches, "speed")?,
            step,
        },
        inputfile: matches.value_of("inputfile").map(PathBuf::from),
        realtime: matches.is_present("realtime"),
        limit,
        flags: Flags {
            v_option: matches.is_present("v_flag"),
            q_option: matches.is_present("q_flag"),
        },
    })
}

fn init_logger(flags: &Flags) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    if flags.v_option {
        builder.filter_module("schedsim::trace", LevelFilter::Debug);
    }
    if flags.q_option {
        builder.filter_module("schedsim::queue", LevelFilter::Trace);
    }
    builder.format_timestamp(None).parse_default_env().init();
}

fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<String>>();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => match e.downcast::<clap::Error>() {
            Ok(clap_err) => clap_err.exit(),
            Err(e) => return Err(e),
        },
    };
    init_logger(&opts.flags);
    actual_main_fn(opts)
}
