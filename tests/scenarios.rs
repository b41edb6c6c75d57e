use schedsim::utils::sample_workload;
use schedsim::{
    calculate_metrics, Algorithm, Pid, ProcessSpec, SchedParams, SimConfig, Simulator, State,
};

const DT: f64 = 0.1;
const TOL: f64 = 0.15;

fn simulator(algorithm: Algorithm, params: SchedParams, workload: &[(f64, f64, i32)]) -> Simulator {
    let mut sim = Simulator::new(SimConfig {
        algorithm,
        params,
        ..SimConfig::default()
    })
    .unwrap();
    for (i, &(arrival, burst, priority)) in workload.iter().enumerate() {
        sim.add_process(ProcessSpec::new(format!("P{}", i + 1), arrival, burst, priority))
            .unwrap();
    }
    sim
}

fn preemptive() -> SchedParams {
    SchedParams {
        preemptive: true,
        ..SchedParams::default()
    }
}

fn wait_of(sim: &Simulator, id: Pid) -> f64 {
    sim.processes().get(id).unwrap().wait
}

fn completion_of(sim: &Simulator, id: Pid) -> f64 {
    sim.processes().get(id).unwrap().completion.unwrap()
}

#[test]
fn fcfs_runs_in_arrival_order() {
    let mut sim = simulator(
        Algorithm::Fcfs,
        SchedParams::default(),
        &[(0.0, 5.0, 0), (1.0, 1.0, 0), (2.0, 1.0, 0)],
    );
    assert!(sim.run_to_completion(DT, 100.0).unwrap());

    assert_eq!(sim.state().completed, vec![1, 2, 3]);
    assert!(wait_of(&sim, 1).abs() < TOL);
    assert!((wait_of(&sim, 2) - 4.0).abs() < TOL);
    assert!((wait_of(&sim, 3) - 4.0).abs() < TOL);
}

#[test]
fn non_preemptive_sjf_lets_the_long_job_finish() {
    let mut sim = simulator(
        Algorithm::Sjf,
        SchedParams::default(),
        &[(0.0, 10.0, 0), (1.0, 1.0, 0)],
    );
    assert!(sim.run_to_completion(DT, 100.0).unwrap());

    assert_eq!(sim.state().completed, vec![1, 2]);
    assert!((wait_of(&sim, 2) - 9.0).abs() < TOL);
}

#[test]
fn preemptive_sjf_runs_the_short_job_first() {
    let mut sim = simulator(Algorithm::Sjf, preemptive(), &[(0.0, 10.0, 0), (1.0, 1.0, 0)]);
    assert!(sim.run_to_completion(DT, 100.0).unwrap());

    assert_eq!(sim.state().completed, vec![2, 1]);
    assert!(completion_of(&sim, 2) < 2.5);
    assert!(wait_of(&sim, 2) < 0.5);
    assert!((completion_of(&sim, 1) - 11.0).abs() < TOL);
}

#[test]
fn preemptive_priority_yields_to_more_urgent_arrival() {
    let mut sim = simulator(Algorithm::Priority, preemptive(), &[(0.0, 6.0, 3), (2.0, 2.0, 1)]);
    assert!(sim.run_to_completion(DT, 100.0).unwrap());
    assert_eq!(sim.state().completed, vec![2, 1]);

    let mut sim = simulator(
        Algorithm::Priority,
        SchedParams::default(),
        &[(0.0, 6.0, 3), (2.0, 2.0, 1)],
    );
    assert!(sim.run_to_completion(DT, 100.0).unwrap());
    assert_eq!(sim.state().completed, vec![1, 2]);
}

#[test]
fn round_robin_cycles_through_equal_jobs() {
    let params = SchedParams {
        quantum: 1.0,
        preemptive: false,
    };
    let mut sim = simulator(
        Algorithm::RoundRobin,
        params,
        &[(0.0, 3.0, 0), (0.0, 3.0, 0), (0.0, 3.0, 0)],
    );

    let mut order = Vec::new();
    while !sim.processes().all_done() && sim.clock() < 100.0 {
        let running = sim.step(DT).running;
        if let Some(pid) = running {
            if order.last() != Some(&pid) {
                order.push(pid);
            }
        }
    }

    assert_eq!(order, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
    assert_eq!(sim.state().completed, vec![1, 2, 3]);
    assert!(completion_of(&sim, 1) > 6.5);
    assert!((completion_of(&sim, 3) - 9.0).abs() < TOL);
}

#[test]
fn mlfq_demotes_a_long_job_and_never_promotes_it() {
    let mut sim = simulator(Algorithm::Mlfq, SchedParams::default(), &[(0.0, 10.0, 0)]);
    let mut levels = Vec::new();
    while !sim.processes().all_done() && sim.clock() < 100.0 {
        sim.step(DT);
        levels.push(sim.processes().get(1).unwrap().queue_level.unwrap());
    }

    // levels[i] is observed after (i + 1) * DT seconds of running.
    assert_eq!(levels[18], 1);
    assert_eq!(levels[24], 2);
    assert_eq!(levels[58], 2);
    assert_eq!(levels[64], 3);
    assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*levels.last().unwrap(), 3);
}

#[test]
fn mlfq_view_tracks_ready_processes() {
    let mut sim = simulator(
        Algorithm::Mlfq,
        SchedParams::default(),
        &[(0.0, 10.0, 0), (0.0, 10.0, 0), (50.0, 1.0, 0)],
    );
    for _ in 0..25 {
        sim.step(DT);
    }
    // P1 used its 2s slice and sits on level 2; P2 holds the CPU.
    let view = sim.mlfq_details().unwrap();
    assert_eq!(view.queues[0].processes, Vec::<Pid>::new());
    assert_eq!(view.queues[1].processes, vec![1]);
    assert_eq!(view.queues[2].processes, Vec::<Pid>::new());
    assert_eq!(sim.state().running, Some(2));
}

#[test]
fn every_policy_conserves_time_on_the_sample_workload() {
    let configs = [
        (Algorithm::Fcfs, SchedParams::default()),
        (Algorithm::Sjf, SchedParams::default()),
        (Algorithm::Sjf, preemptive()),
        (Algorithm::Priority, SchedParams::default()),
        (Algorithm::Priority, preemptive()),
        (Algorithm::RoundRobin, SchedParams::default()),
        (Algorithm::Mlfq, SchedParams::default()),
    ];
    for (algorithm, params) in configs {
        let mut sim = Simulator::new(SimConfig {
            algorithm,
            params,
            ..SimConfig::default()
        })
        .unwrap();
        for spec in sample_workload() {
            sim.add_process(spec).unwrap();
        }
        assert!(sim.run_to_completion(DT, 1000.0).unwrap(), "{}", algorithm);
        assert_eq!(sim.state().completed.len(), 4);

        for p in sim.processes().iter() {
            assert_eq!(p.state, State::Completed);
            assert_eq!(p.remaining, 0.0);
            let completion = p.completion.unwrap();
            assert_eq!(p.turnaround, completion - p.arrival);
            assert_eq!(p.wait, p.turnaround - p.burst);
            assert!(p.response.unwrap() >= 0.0);
        }

        let metrics = sim.metrics().unwrap();
        assert!(metrics.is_finite());
        assert_eq!(metrics.context_switches, 3);
        assert!(sim.verdict().is_some());
    }
}

#[test]
fn empty_metrics_are_finite() {
    let m = calculate_metrics(&[], &[]);
    assert!(m.is_finite());
    assert_eq!(m.fairness_score, 1.0);
}

#[test]
fn empty_simulation_never_finishes_or_panics() {
    let mut sim = simulator(Algorithm::Fcfs, SchedParams::default(), &[]);
    for _ in 0..30 {
        sim.step(DT);
    }
    assert!(sim.metrics().unwrap().is_finite());
    assert!(sim.verdict().is_none());
    assert!(!sim.run_to_completion(DT, 5.0).unwrap());
}
