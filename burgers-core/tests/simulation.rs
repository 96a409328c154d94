use burgers_core::integrator::StepOutcome;
use burgers_core::{
    ClosureKind, MemorySink, NoPlanCache, SimMode, Simulation, SimulationParams,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn dns() -> SimulationParams {
    SimulationParams {
        noise_amplitude: 1e-2,
        duration: 0.02,
        save_interval: 0.005,
        ..Default::default()
    }
}

fn les(closure: ClosureKind) -> SimulationParams {
    SimulationParams {
        mode: SimMode::Les,
        closure,
        nx_dns: 128,
        nx_les: 32,
        ..dns()
    }
}

fn run(params: SimulationParams, seed: u64) -> (Vec<f64>, MemorySink) {
    let mut sim = Simulation::new(params, ChaCha8Rng::seed_from_u64(seed), &mut NoPlanCache).unwrap();
    let mut sink = MemorySink::new();
    let summary = sim.run(&mut sink);
    assert!(!summary.stalled);
    (sim.u().to_vec(), sink)
}

#[test]
fn same_seed_gives_identical_fields() {
    let (a, _) = run(dns(), 7);
    let (b, _) = run(dns(), 7);
    assert_eq!(a, b);

    let (c, _) = run(dns(), 8);
    assert_ne!(a, c);
}

#[test]
fn les_is_reproducible_for_every_closure() {
    for kind in ClosureKind::ALL {
        let (a, _) = run(les(kind), 3);
        let (b, _) = run(les(kind), 3);
        assert_eq!(a, b, "{} is not deterministic", kind.as_str());
        assert!(a.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn thread_setting_does_not_change_results() {
    let mut many = dns();
    many.plan.threads = 8;
    let (a, _) = run(dns(), 5);
    let (b, _) = run(many, 5);
    assert_eq!(a, b);
}

#[test]
fn outputs_hit_multiples_even_when_duration_does_not() {
    let params = SimulationParams {
        duration: 0.0125,
        ..les(ClosureKind::ConstantSmagorinsky)
    };
    let (_, sink) = run(params, 1);
    assert_eq!(sink.times(), vec![0.0, 0.005, 2.0 * 0.005]);
    for (i, save) in sink.saves.iter().enumerate() {
        assert_eq!(save.index, i);
        assert_eq!(save.snapshot.scalar("C_sgs"), Some(0.16));
    }
}

#[test]
fn deardorff_energy_is_never_negative_in_output() {
    let (_, sink) = run(les(ClosureKind::Deardorff), 11);
    assert!(sink.fields.iter().any(|f| f.name == "tke_sgs"));
    for save in &sink.saves {
        let tke = save.snapshot.get("tke_sgs").unwrap();
        assert_eq!(tke.len(), 32);
        assert!(tke.iter().all(|&k| k >= 0.0));
        assert!(save.snapshot.scalar("tke_sgs_diss").unwrap() >= 0.0);
    }
}

#[test]
fn each_step_respects_the_stability_bound() {
    let params = SimulationParams {
        noise_amplitude: 1.0,
        ..dns()
    };
    let mut sim = Simulation::new(params, ChaCha8Rng::seed_from_u64(2), &mut NoPlanCache).unwrap();
    let mut sink = MemorySink::new();
    sim.start(&mut sink);

    loop {
        let max_speed = sim.u().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let bound = sim.control().trial_step(max_speed);
        match sim.step(&mut sink) {
            StepOutcome::Advanced { dt, .. } => assert!(dt <= bound, "dt {dt} > bound {bound}"),
            StepOutcome::Finished => break,
            StepOutcome::Stalled { dt } => panic!("stalled at dt {dt}"),
        }
    }
    assert_eq!(sim.time(), sim.params().duration);
}

#[test]
fn unforced_run_stays_at_rest() {
    let params = SimulationParams {
        noise_amplitude: 0.0,
        ..dns()
    };
    let (u, sink) = run(params, 1);
    assert!(u.iter().all(|&v| v == 0.0));
    assert!(sink.saves.iter().all(|s| s.snapshot.scalar("tke") == Some(0.0)));
}
