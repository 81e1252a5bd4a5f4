//! Random-policy rollouts of every suite task.
//!
//! Loads each registered task, runs a few episodes with a uniform random
//! policy, and prints per-episode and total reward. Set `RUST_LOG=debug`
//! to see episode and compile events.

use kinema_engine::{parallel_rollouts, run_episode, LoadOptions, RandomPolicy};
use kinema_task::TimeLimit;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = kinema_suite::registry();
    println!("=== Kinema suite: random rollouts ===\n");

    for name in registry.names() {
        let tags = registry.tags(name).unwrap_or_default();
        println!("{name} {tags:?}");
        let options = LoadOptions {
            seed: Some(42),
            time_limit: Some(TimeLimit::Seconds(5.0)),
        };
        let mut env = registry.load(name, &options).unwrap();
        let spec = env.action_spec().clone();
        println!(
            "  actions: {:?} in [{:?}, {:?}]",
            spec.names, spec.minimum, spec.maximum
        );
        let mut policy = RandomPolicy::new(42);
        for episode in 1..=2 {
            let summary = run_episode(env.as_mut(), &mut policy, None).unwrap();
            println!(
                "  episode {episode}: {:>4} steps, reward {:>8.3}, {}",
                summary.steps,
                summary.total_reward,
                if summary.finished() { "finished" } else { "cut off" },
            );
        }
    }

    // --- Replicated rollouts across worker threads ---
    println!("\nreach/target, 8 seeds on 4 workers:");
    let seeds: Vec<u64> = (0..8).collect();
    let options = LoadOptions {
        seed: None,
        time_limit: Some(TimeLimit::Seconds(2.0)),
    };
    let summaries =
        parallel_rollouts(&registry, kinema_suite::reach::NAME, &options, &seeds, 4, None).unwrap();
    let total: f64 = summaries.iter().map(|s| s.total_reward).sum();
    for s in &summaries {
        println!(
            "  seed {:>2}: {:>3} steps, reward {:>7.3}",
            s.seed.unwrap_or_default(),
            s.steps,
            s.total_reward
        );
    }
    println!("  cumulative reward: {total:.3}");
}
