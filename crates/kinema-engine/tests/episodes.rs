//! End-to-end episode behaviour through the controller, registry, and
//! rollout helpers, using mock physics.

use kinema_core::{Category, ConfigError, HookError, Phase, StepError};
use kinema_engine::{
    parallel_rollouts, run_episode, Environment, EpisodeController, LoadOptions, RandomPolicy,
    StepType, TaskRegistry,
};
use kinema_model::Model;
use kinema_obs::Observable;
use kinema_physics::PhysicsData;
use kinema_task::{Entity, TaskBuilder, TaskRng, TimeLimit};
use kinema_test_utils::{fixtures, MockBackend};
use proptest::prelude::*;
use rand::Rng;

#[derive(Debug, Default)]
struct Jitter {
    offset: f64,
}

fn jitter_model(state: &mut Jitter, _: &mut Model, rng: &mut TaskRng) -> Result<(), HookError> {
    state.offset = rng.random_range(-1.0..1.0);
    Ok(())
}

fn jitter_init(
    state: &mut Jitter,
    physics: &mut dyn PhysicsData,
    rng: &mut TaskRng,
) -> Result<(), HookError> {
    let v = state.offset + rng.random_range(-0.1..0.1);
    physics.write_named(Category::Qvel, "slide", &[v])?;
    Ok(())
}

fn position_reward(_: &Jitter, physics: &dyn PhysicsData) -> Result<f64, HookError> {
    Ok(physics.read_named(Category::Qpos, "slide")?[0])
}

fn slider_task(physics_dt: f64, control_dt: f64, seed: u64) -> kinema_task::Task<Jitter> {
    let root = Entity::new(fixtures::slider_model("slider"))
        .with_observable(Observable::named("position", Category::Qpos, "slide"))
        .unwrap()
        .with_observable(Observable::named("velocity", Category::Qvel, "slide"))
        .unwrap();
    TaskBuilder::new("slider", root, Jitter::default())
        .physics_timestep(physics_dt)
        .control_timestep(control_dt)
        .seed(seed)
        .modify_model(jitter_model)
        .initialize_episode(jitter_init)
        .reward(position_reward)
        .enable_observable("position")
        .enable_observable("velocity")
        .build()
        .unwrap()
}

fn slider_env(options: &LoadOptions) -> Result<Box<dyn Environment>, ConfigError> {
    let task = slider_task(0.005, 0.025, options.seed.unwrap_or(0));
    let limit = options.time_limit.unwrap_or(TimeLimit::Seconds(0.5));
    Ok(Box::new(EpisodeController::new(
        task,
        Box::new(MockBackend::new()),
        limit,
    )?))
}

fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry
        .register("mock/slider", slider_env, &["benchmarking"])
        .unwrap();
    registry
}

#[test]
fn one_second_at_forty_hertz_is_forty_steps() {
    let backend = MockBackend::new();
    let mut env = EpisodeController::new(
        slider_task(0.005, 0.025, 0),
        Box::new(backend.clone()),
        TimeLimit::Seconds(1.0),
    )
    .unwrap();
    assert_eq!(env.timing().n_sub_steps, 5);
    assert_eq!(env.timing().step_limit, Some(40));

    let steps_before = backend.step_count();
    env.reset().unwrap();
    let mut types = Vec::new();
    loop {
        let ts = env.step(&[0.0]).unwrap();
        types.push(ts.step_type);
        if ts.is_last() {
            assert_eq!(ts.discount, Some(1.0));
            break;
        }
    }
    assert_eq!(types.len(), 40);
    assert!(types[..39].iter().all(|t| *t == StepType::Mid));
    assert_eq!(backend.step_count() - steps_before, 200);
    let state = env.episode_state().unwrap();
    assert_eq!(state.step_count, 40);
    assert_eq!(state.physics_steps, 200);
    assert!((state.time - 1.0).abs() < 1e-9);
    assert!((env.physics().unwrap().time() - 1.0).abs() < 1e-9);
    assert_eq!(env.phase(), Phase::Terminated);
}

#[test]
fn same_seed_same_episode() {
    let run = |seed: u64| {
        let mut env = slider_env(&LoadOptions::seeded(seed)).unwrap();
        let mut trace = vec![env.reset().unwrap().observation.flatten()];
        for i in 0..5 {
            let ts = env.step(&[0.1 * f64::from(i)]).unwrap();
            trace.push(ts.observation.flatten());
            trace.push(vec![ts.reward.unwrap()]);
        }
        trace
    };
    assert_eq!(run(42), run(42));
    assert_ne!(run(42), run(43));
}

#[test]
fn reseeding_replays_the_first_episode() {
    let mut env = slider_env(&LoadOptions::seeded(5)).unwrap();
    let first = env.reset_with_seed(11).unwrap();
    env.reset().unwrap();
    let replay = env.reset_with_seed(11).unwrap();
    assert_eq!(first, replay);
}

#[test]
fn modify_model_rejected_while_stepping() {
    let mut env = EpisodeController::new(
        slider_task(0.005, 0.025, 0),
        Box::new(MockBackend::new()),
        TimeLimit::Unbounded,
    )
    .unwrap();
    env.reset().unwrap();
    env.step(&[0.0]).unwrap();
    assert_eq!(env.phase(), Phase::Stepping);
    match env.modify_model(|_| Ok(())) {
        Err(StepError::InvalidPhase { operation, phase }) => {
            assert_eq!(operation, "modify_model");
            assert_eq!(phase, Phase::Stepping);
        }
        other => panic!("expected InvalidPhase, got {other:?}"),
    }
    // The running episode is untouched.
    assert!(env.step(&[0.0]).unwrap().is_mid());
}

#[test]
fn observation_order_survives_toggling_between_episodes() {
    let mut env = EpisodeController::new(
        slider_task(0.005, 0.025, 0),
        Box::new(MockBackend::new()),
        TimeLimit::Seconds(0.025),
    )
    .unwrap();
    env.reset().unwrap();
    env.step(&[0.0]).unwrap();
    let observables = env.observables_mut().unwrap();
    observables.disable("position").unwrap();
    observables.enable("position").unwrap();
    let ts = env.reset().unwrap();
    assert_eq!(
        ts.observation.keys().collect::<Vec<_>>(),
        vec!["position", "velocity"]
    );
}

#[test]
fn run_episode_sums_rewards() {
    let mut env = slider_env(&LoadOptions::seeded(1)).unwrap();
    let mut policy = RandomPolicy::new(1);
    let summary = run_episode(env.as_mut(), &mut policy, None).unwrap();
    assert_eq!(summary.steps, 20);
    assert!(summary.finished());
    assert_eq!(summary.final_discount, Some(1.0));

    let capped = run_episode(env.as_mut(), &mut policy, Some(3)).unwrap();
    assert_eq!(capped.steps, 3);
    assert!(!capped.finished());
}

#[test]
fn parallel_results_do_not_depend_on_worker_count() {
    let registry = registry();
    let seeds = [3, 1, 4, 1, 5, 9, 2, 6];
    let options = LoadOptions::default();
    let serial = parallel_rollouts(&registry, "mock/slider", &options, &seeds, 1, None).unwrap();
    let parallel = parallel_rollouts(&registry, "mock/slider", &options, &seeds, 4, None).unwrap();
    assert_eq!(serial, parallel);
    let order: Vec<_> = parallel.iter().map(|s| s.seed.unwrap()).collect();
    assert_eq!(order, seeds);
    assert_eq!(parallel[1], parallel[3]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn step_counts_follow_the_time_limit(
        physics_dt in prop::sample::select(vec![0.001, 0.002, 0.004, 0.005, 0.01]),
        k in 1u32..=8,
        steps in 1u64..=30,
        shortfall in prop_oneof![Just(0.0), 0.1f64..0.9],
    ) {
        let control_dt = physics_dt * f64::from(k);
        // A limit short of a whole step still rounds up to `steps`.
        let limit = (steps as f64 - shortfall) * control_dt;
        let backend = MockBackend::new();
        let mut env = EpisodeController::new(
            slider_task(physics_dt, control_dt, 0),
            Box::new(backend.clone()),
            TimeLimit::Seconds(limit),
        )
        .unwrap();
        prop_assert_eq!(env.timing().n_sub_steps, k);
        prop_assert_eq!(env.timing().step_limit, Some(steps));

        env.reset().unwrap();
        let before = backend.step_count();
        let mut taken = 0u64;
        while !env.step(&[0.0]).unwrap().is_last() {
            taken += 1;
            prop_assert!(taken < steps);
        }
        let state = env.episode_state().unwrap();
        prop_assert_eq!(state.step_count, steps);
        prop_assert_eq!(state.physics_steps, u64::from(k) * steps);
        prop_assert_eq!(backend.step_count() - before, u64::from(k) * steps);
        prop_assert!((state.time - steps as f64 * control_dt).abs() < 1e-9);
    }
}
