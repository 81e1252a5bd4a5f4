//! The suite tasks running on the reference backend.

use kinema_core::Phase;
use kinema_engine::{parallel_rollouts, run_episode, LoadOptions, RandomPolicy, StepType};
use kinema_suite::pendulum::{self, Variant};
use kinema_suite::{reach, registry, BENCHMARKING};
use kinema_task::TimeLimit;

fn options(seed: u64, seconds: f64) -> LoadOptions {
    LoadOptions {
        seed: Some(seed),
        time_limit: Some(TimeLimit::Seconds(seconds)),
    }
}

#[test]
fn registry_lists_every_task_in_order() {
    let registry = registry();
    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec![
            "pendulum/balance",
            "pendulum/swingup",
            "pendulum/swingup_sparse",
            "reach/target"
        ]
    );
    assert_eq!(registry.tags("pendulum/swingup_sparse"), Some(&[][..]));
    assert_eq!(registry.tagged(BENCHMARKING).count(), 2);
    for name in registry.names() {
        let env = registry.load(name, &LoadOptions::default()).unwrap();
        assert_eq!(env.name(), name);
        assert!(!env.action_spec().is_empty());
    }
}

#[test]
fn balance_starts_near_upright_and_swingup_hanging() {
    let mut balance = pendulum::environment(Variant::Balance, &options(1, 1.0)).unwrap();
    let mut swingup = pendulum::environment(Variant::Swingup, &options(1, 1.0)).unwrap();
    for _ in 0..5 {
        let up = balance.reset().unwrap();
        assert!(up.observation.get("angle_cos").unwrap()[0] > 0.1f64.cos() - 1e-12);
        let down = swingup.reset().unwrap();
        assert!(down.observation.get("angle_cos").unwrap()[0] < -0.99);
    }
}

#[test]
fn pendulum_episode_runs_to_its_limit() {
    let mut env = registry()
        .load("pendulum/swingup", &options(7, 1.0))
        .unwrap();
    let mut policy = RandomPolicy::new(7);
    let summary = run_episode(env.as_mut(), &mut policy, None).unwrap();
    assert_eq!(summary.steps, 50);
    assert_eq!(summary.final_discount, Some(1.0));
    assert!(summary.total_reward >= 0.0 && summary.total_reward <= 50.0);
}

#[test]
fn default_limits_give_the_expected_step_counts() {
    let balance = pendulum::environment(Variant::Balance, &LoadOptions::default()).unwrap();
    assert_eq!(balance.timing().n_sub_steps, 1);
    assert_eq!(balance.timing().step_limit, Some(500));
    let reach = reach::environment(&LoadOptions::default()).unwrap();
    assert_eq!(reach.timing().n_sub_steps, 5);
    assert_eq!(reach.timing().step_limit, Some(800));
}

#[test]
fn pendulum_observation_spec_is_four_scalars() {
    let mut env = pendulum::environment(Variant::Balance, &options(0, 1.0)).unwrap();
    env.reset().unwrap();
    let spec = env.observation_spec().unwrap();
    assert_eq!(spec.total_dim(), 4);
}

#[test]
fn reach_walker_observes_linear_velocity() {
    let mut env = reach::environment(&options(0, 1.0)).unwrap();
    let first = env.reset().unwrap();
    assert_eq!(first.observation.get("simple_walker/velocity").unwrap().len(), 3);
    assert_eq!(first.observation.get("simple_walker/position").unwrap().len(), 3);
    assert_eq!(env.observation_spec().unwrap().total_dim(), 6);
}

#[test]
fn reach_moves_the_target_every_episode() {
    let mut env = reach::environment(&options(3, 1.0)).unwrap();
    let first = env.reset().unwrap();
    assert_eq!(
        first.observation.keys().collect::<Vec<_>>(),
        vec!["simple_walker/position", "simple_walker/velocity"]
    );
    let a = env.task().state().target();
    env.reset().unwrap();
    let b = env.task().state().target();
    assert_ne!(a, b);
    for [x, y] in [a, b] {
        let r = x.hypot(y);
        assert!(r > 3.0 - 1e-9 && r < 7.0 + 1e-9);
    }
}

#[test]
fn reach_is_deterministic_per_seed() {
    let trace = |seed: u64| {
        let mut env = reach::environment(&options(seed, 0.25)).unwrap();
        let mut out = vec![env.reset().unwrap().observation.flatten()];
        loop {
            let ts = env.step(&[3.0, -2.0]).unwrap();
            out.push(ts.observation.flatten());
            if ts.is_last() {
                return out;
            }
        }
    };
    assert_eq!(trace(11), trace(11));
    assert_ne!(trace(11), trace(12));
}

#[test]
fn steering_at_the_target_terminates_the_episode() {
    let mut env = reach::environment(&LoadOptions::seeded(5)).unwrap();
    let mut ts = env.reset().unwrap();
    let mut steps = 0;
    while !ts.is_last() {
        let [tx, ty] = env.task().state().target();
        let pos = ts.observation.get("simple_walker/position").unwrap().clone();
        let vel = ts.observation.get("simple_walker/velocity").unwrap().clone();
        let action = [
            (2.0 * (tx - pos[0]) - 2.0 * vel[0]).clamp(-10.0, 10.0),
            (2.0 * (ty - pos[1]) - 2.0 * vel[1]).clamp(-10.0, 10.0),
        ];
        ts = env.step(&action).unwrap();
        steps += 1;
    }
    assert_eq!(ts.step_type, StepType::Last);
    assert_eq!(ts.discount, Some(1.0));
    assert_eq!(ts.reward, Some(1.0));
    assert!(steps < 800, "took {steps} steps");
    assert_eq!(env.phase(), Phase::Terminated);
}

#[test]
fn parallel_reach_rollouts_match_serial() {
    let registry = registry();
    let seeds = [2, 7, 1, 8];
    let opts = options(0, 0.5);
    let serial = parallel_rollouts(&registry, reach::NAME, &opts, &seeds, 1, None).unwrap();
    let parallel = parallel_rollouts(&registry, reach::NAME, &opts, &seeds, 3, None).unwrap();
    assert_eq!(serial, parallel);
    assert!(serial.iter().all(|s| s.steps <= 20 && s.finished()));
}
