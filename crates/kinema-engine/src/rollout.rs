//! Episode rollouts, sequential and thread-replicated.
//!
//! [`parallel_rollouts`] never shares an environment between threads:
//! each seed gets a fresh environment built by its registry factory on
//! the worker that runs it. Jobs and results travel over crossbeam
//! channels; results come back in seed order regardless of which worker
//! finished first.

use std::error::Error;
use std::fmt;
use std::thread;

use kinema_core::{ActionSpec, StepError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::environment::Environment;
use crate::registry::{LoadOptions, RegistryError, TaskRegistry};
use crate::timestep::TimeStep;

// ── Policy ──────────────────────────────────────────────────────

/// Chooses actions from time steps.
pub trait Policy {
    /// The action to take after observing `time_step`.
    fn act(&mut self, time_step: &TimeStep, spec: &ActionSpec) -> Vec<f64>;
}

/// Uniform random actions within the action spec's bounds.
///
/// A component with one infinite bound is sampled from the unit
/// interval beside its finite bound; one with no finite bound, from
/// `[-1, 1]`.
#[derive(Clone, Debug)]
pub struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    /// A policy drawing from a stream seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, _: &TimeStep, spec: &ActionSpec) -> Vec<f64> {
        spec.minimum
            .iter()
            .zip(&spec.maximum)
            .map(|(&lo, &hi)| {
                let (lo, hi) = match (lo.is_finite(), hi.is_finite()) {
                    (true, true) => (lo, hi),
                    (true, false) => (lo, lo + 1.0),
                    (false, true) => (hi - 1.0, hi),
                    (false, false) => (-1.0, 1.0),
                };
                lo + (hi - lo) * self.rng.random::<f64>()
            })
            .collect()
    }
}

// ── Episodes ────────────────────────────────────────────────────

/// Outcome of one episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeSummary {
    /// The seed the environment was loaded with, if any.
    pub seed: Option<u64>,
    /// Control steps taken.
    pub steps: u64,
    /// Sum of rewards.
    pub total_reward: f64,
    /// Discount of the final step, if the episode reached LAST.
    pub final_discount: Option<f64>,
}

impl EpisodeSummary {
    /// Whether the episode reached its LAST step (rather than being cut
    /// off by `max_steps`).
    pub fn finished(&self) -> bool {
        self.final_discount.is_some()
    }
}

/// Reset `env` and step it with `policy` until LAST or `max_steps`.
///
/// # Errors
///
/// The first [`StepError`] from reset or step.
pub fn run_episode(
    env: &mut dyn Environment,
    policy: &mut dyn Policy,
    max_steps: Option<u64>,
) -> Result<EpisodeSummary, StepError> {
    let mut time_step = env.reset()?;
    let mut summary = EpisodeSummary {
        seed: None,
        steps: 0,
        total_reward: 0.0,
        final_discount: None,
    };
    while !time_step.is_last() && max_steps.is_none_or(|max| summary.steps < max) {
        let action = policy.act(&time_step, env.action_spec());
        time_step = env.step(&action)?;
        summary.steps += 1;
        summary.total_reward += time_step.reward.unwrap_or(0.0);
    }
    if time_step.is_last() {
        summary.final_discount = time_step.discount;
    }
    Ok(summary)
}

// ── Parallel rollouts ───────────────────────────────────────────

/// Errors from [`parallel_rollouts`].
#[derive(Clone, Debug, PartialEq)]
pub enum RolloutError {
    /// Loading the environment failed.
    Registry(RegistryError),
    /// An episode failed.
    Episode {
        /// The seed of the failing episode.
        seed: u64,
        /// The step error.
        error: StepError,
    },
    /// A worker thread panicked.
    WorkerPanicked,
}

impl fmt::Display for RolloutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Episode { seed, error } => write!(f, "episode with seed {seed}: {error}"),
            Self::WorkerPanicked => write!(f, "rollout worker panicked"),
        }
    }
}

impl Error for RolloutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            Self::Episode { error, .. } => Some(error),
            Self::WorkerPanicked => None,
        }
    }
}

impl From<RegistryError> for RolloutError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

fn rollout_one(
    registry: &TaskRegistry,
    name: &str,
    options: &LoadOptions,
    seed: u64,
    max_steps: Option<u64>,
) -> Result<EpisodeSummary, RolloutError> {
    let options = LoadOptions {
        seed: Some(seed),
        ..*options
    };
    let mut env = registry.load(name, &options)?;
    let mut policy = RandomPolicy::new(seed);
    let mut summary = run_episode(env.as_mut(), &mut policy, max_steps)
        .map_err(|error| RolloutError::Episode { seed, error })?;
    summary.seed = Some(seed);
    Ok(summary)
}

/// Run one random-policy episode of task `name` per seed on up to
/// `workers` threads.
///
/// Every seed seeds both its environment and its policy, so the result
/// for a seed does not depend on the worker count. Results are returned
/// in `seeds` order.
///
/// # Errors
///
/// The error of the earliest failing seed, or
/// [`RolloutError::WorkerPanicked`].
pub fn parallel_rollouts(
    registry: &TaskRegistry,
    name: &str,
    options: &LoadOptions,
    seeds: &[u64],
    workers: usize,
    max_steps: Option<u64>,
) -> Result<Vec<EpisodeSummary>, RolloutError> {
    if !registry.contains(name) {
        return Err(RegistryError::UnknownTask {
            name: name.to_string(),
        }
        .into());
    }
    let workers = workers.clamp(1, seeds.len().max(1));
    tracing::info!(task = name, episodes = seeds.len(), workers, "kinema.rollout.start");

    let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, u64)>(seeds.len().max(1));
    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    for job in seeds.iter().copied().enumerate() {
        // Capacity covers every seed, so this cannot block.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let panicked = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, seed) in job_rx.iter() {
                        let result = rollout_one(registry, name, options, seed, max_steps);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join())
            .filter(Result::is_err)
            .count()
    });
    drop(result_tx);
    if panicked > 0 {
        return Err(RolloutError::WorkerPanicked);
    }

    let mut results: Vec<Option<Result<EpisodeSummary, RolloutError>>> =
        (0..seeds.len()).map(|_| None).collect();
    for (index, result) in result_rx.iter() {
        results[index] = Some(result);
    }
    results
        .into_iter()
        .map(|r| r.unwrap_or(Err(RolloutError::WorkerPanicked)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_obs::Observation;

    fn spec(bounds: &[(f64, f64)]) -> ActionSpec {
        ActionSpec {
            names: (0..bounds.len()).map(|i| format!("a{i}")).collect(),
            minimum: bounds.iter().map(|b| b.0).collect(),
            maximum: bounds.iter().map(|b| b.1).collect(),
        }
    }

    #[test]
    fn random_policy_respects_bounds() {
        let spec = spec(&[
            (-10.0, 10.0),
            (0.0, 0.0),
            (2.0, f64::INFINITY),
            (-5.0, f64::INFINITY),
            (f64::NEG_INFINITY, 5.0),
            (f64::NEG_INFINITY, -3.0),
            (f64::NEG_INFINITY, f64::INFINITY),
        ]);
        let ts = TimeStep::first(Observation::new());
        let mut policy = RandomPolicy::new(3);
        for _ in 0..100 {
            let a = policy.act(&ts, &spec);
            assert!((-10.0..=10.0).contains(&a[0]));
            assert_eq!(a[1], 0.0);
            assert!((2.0..=3.0).contains(&a[2]));
            assert!((-5.0..=-4.0).contains(&a[3]));
            assert!((4.0..=5.0).contains(&a[4]));
            assert!((-4.0..=-3.0).contains(&a[5]));
            assert!((-1.0..=1.0).contains(&a[6]));
        }
    }

    #[test]
    fn random_policy_is_seeded() {
        let spec = spec(&[(-1.0, 1.0)]);
        let ts = TimeStep::first(Observation::new());
        let a: Vec<_> = (0..5).map(|_| RandomPolicy::new(9).act(&ts, &spec)).collect();
        assert!(a.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn unknown_task_fails_fast() {
        let registry = TaskRegistry::new();
        let result = parallel_rollouts(&registry, "nope", &LoadOptions::default(), &[1], 2, None);
        assert!(matches!(
            result,
            Err(RolloutError::Registry(RegistryError::UnknownTask { .. }))
        ));
    }
}
