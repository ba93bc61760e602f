//! Chunked-timestep trainer for the reinforcement-learning family.
//!
//! Trains a tabular Q-learning policy on the built-in pole-balance
//! environment. Work is reported in step chunks (never finer than the
//! emitter's chunk floor); the headline metric exists only after the
//! fixed-count evaluation rollout at the end of the run.

use crate::artifacts::{ArtifactKind, ModelArtifact};
use crate::dataset::{self, DatasetKind};
use crate::error::{TrainingError, TrainingResult};
use crate::metrics::RawMetrics;
use crate::progress::ProgressEmitter;
use crate::trainer::{TrainContext, Trainer, TrainingOutcome};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Episodes in the final evaluation rollout.
const EVAL_EPISODES: u32 = 10;

const ANGLE_LIMIT: f64 = 0.25;
const VELOCITY_LIMIT: f64 = 1.5;
const MAX_EPISODE_STEPS: u32 = 200;
const ANGLE_BINS: usize = 6;
const VELOCITY_BINS: usize = 6;
const ACTIONS: usize = 2;
const FORCE: f64 = 2.0;
const GRAVITY: f64 = 9.8;
const DT: f64 = 0.02;
const DISCOUNT: f64 = 0.99;

/// Simplified inverted pendulum: keep the pole upright by pushing left or
/// right. Reward is 1 per surviving step; an episode ends when the pole
/// falls past the angle limit or times out.
struct PoleBalanceEnv {
    angle: f64,
    velocity: f64,
    steps: u32,
    rng: StdRng,
}

impl PoleBalanceEnv {
    fn new(seed: u64) -> Self {
        Self { angle: 0.0, velocity: 0.0, steps: 0, rng: StdRng::seed_from_u64(seed) }
    }

    fn reset(&mut self) -> usize {
        self.angle = self.rng.gen_range(-0.05..0.05);
        self.velocity = self.rng.gen_range(-0.05..0.05);
        self.steps = 0;
        self.state()
    }

    fn step(&mut self, action: usize) -> (usize, f64, bool) {
        let force = if action == 1 { FORCE } else { -FORCE };
        let accel = GRAVITY * self.angle.sin() + force;
        self.velocity = (self.velocity + accel * DT).clamp(-VELOCITY_LIMIT, VELOCITY_LIMIT);
        self.angle += self.velocity * DT;
        self.steps += 1;

        let done = self.angle.abs() > ANGLE_LIMIT || self.steps >= MAX_EPISODE_STEPS;
        (self.state(), 1.0, done)
    }

    fn state(&self) -> usize {
        let angle_bin = discretize(self.angle, ANGLE_LIMIT, ANGLE_BINS);
        let velocity_bin = discretize(self.velocity, VELOCITY_LIMIT, VELOCITY_BINS);
        angle_bin * VELOCITY_BINS + velocity_bin
    }
}

fn discretize(value: f64, limit: f64, bins: usize) -> usize {
    let normalized = ((value + limit) / (2.0 * limit)).clamp(0.0, 1.0);
    ((normalized * bins as f64) as usize).min(bins - 1)
}

/// Epsilon-greedy tabular Q-learning agent.
struct QLearningAgent {
    q: Vec<[f64; ACTIONS]>,
    alpha: f64,
    total_steps: u64,
    taken_steps: u64,
    state: usize,
    episode_active: bool,
    rng: StdRng,
}

impl QLearningAgent {
    fn new(alpha: f64, total_steps: u64, seed: u64) -> Self {
        Self {
            q: vec![[0.0; ACTIONS]; ANGLE_BINS * VELOCITY_BINS],
            alpha,
            total_steps,
            taken_steps: 0,
            state: 0,
            episode_active: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Exploration rate decays linearly over the training budget.
    fn epsilon(&self) -> f64 {
        let progress = self.taken_steps as f64 / self.total_steps.max(1) as f64;
        (1.0 - 0.95 * progress).max(0.05)
    }

    fn greedy_action(&self, state: usize) -> usize {
        usize::from(self.q[state][1] > self.q[state][0])
    }

    fn learn(&mut self, env: &mut PoleBalanceEnv, steps: u64) {
        for _ in 0..steps {
            if !self.episode_active {
                self.state = env.reset();
                self.episode_active = true;
            }

            let action = if self.rng.gen_range(0.0..1.0) < self.epsilon() {
                self.rng.gen_range(0..ACTIONS)
            } else {
                self.greedy_action(self.state)
            };

            let (next_state, reward, done) = env.step(action);
            let future = if done {
                0.0
            } else {
                self.q[next_state][0].max(self.q[next_state][1])
            };
            let target = reward + DISCOUNT * future;
            self.q[self.state][action] += self.alpha * (target - self.q[self.state][action]);

            self.state = next_state;
            self.taken_steps += 1;
            if done {
                self.episode_active = false;
            }
        }
    }

    /// One greedy episode; returns the accumulated reward.
    fn evaluate_episode(&self, env: &mut PoleBalanceEnv) -> f64 {
        let mut state = env.reset();
        let mut total = 0.0;
        loop {
            let (next_state, reward, done) = env.step(self.greedy_action(state));
            total += reward;
            state = next_state;
            if done {
                return total;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ReinforcementTrainer;

#[async_trait]
impl Trainer for ReinforcementTrainer {
    fn id(&self) -> &'static str {
        "q-learning"
    }

    async fn run(
        &self,
        ctx: TrainContext<'_>,
        emitter: &mut ProgressEmitter<'_>,
    ) -> TrainingResult<TrainingOutcome> {
        let DatasetKind::Environment(spec) = ctx.dataset else {
            return Err(TrainingError::Trainer(
                "reinforcement trainer requires an environment".to_string(),
            ));
        };
        let env_spec = dataset::resolve_environment(spec, ctx.params.environment.as_deref());
        debug!(environment = %env_spec.name, "starting reinforcement run");

        let total = ctx.params.timesteps;
        let chunk = ProgressEmitter::chunk_size(total);
        let mut env = PoleBalanceEnv::new(42);
        let mut agent = QLearningAgent::new(ctx.params.learning_rate, total, 7);

        let mut done_steps = 0u64;
        while done_steps < total {
            // Report before the chunk, so a long chunk never hides progress
            // that has already happened.
            emitter.steps_completed(done_steps, total);
            let steps = chunk.min(total - done_steps);
            agent.learn(&mut env, steps);
            done_steps += steps;
        }
        emitter.steps_completed(total, total);

        let rewards: Vec<f64> =
            (0..EVAL_EPISODES).map(|_| agent.evaluate_episode(&mut env)).collect();
        let avg_reward = rewards.iter().sum::<f64>() / f64::from(EVAL_EPISODES);
        let metrics =
            emitter.final_metrics(RawMetrics { accuracy: Some(avg_reward), loss: None });

        Ok(TrainingOutcome {
            metrics,
            current_epoch: EVAL_EPISODES,
            total_epochs: EVAL_EPISODES,
            artifact: ModelArtifact {
                kind: ArtifactKind::RlPolicy,
                architecture: ctx.descriptor.architecture.clone(),
                payload: serde_json::json!({
                    "environment": env_spec.name,
                    "q_values": agent.q,
                }),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset;
    use crate::metrics::MetricNormalizer;
    use crate::model::{ModelDescriptor, TaskType};
    use crate::params::TrainingParams;
    use crate::progress::ProgressSink;
    use epoch_core::{Database, SessionStore, TrainingSession};

    #[tokio::test]
    async fn test_reinforcement_run_reports_chunked_progress() {
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        store.create(&TrainingSession::new("sess-1", "model-1", "cartpole-demo")).unwrap();
        store.start("sess-1", "cartpole-demo", None).unwrap();

        let dataset = dataset::load("cartpole-demo").unwrap();
        let descriptor = ModelDescriptor {
            model_id: "model-1".to_string(),
            architecture: "DQN".to_string(),
            task_type: TaskType::Reinforcement,
        };
        let params = TrainingParams {
            timesteps: 5_000,
            learning_rate: 0.1,
            ..TrainingParams::default()
        };
        let sinks: Vec<Box<dyn ProgressSink>> = vec![];
        let mut emitter = ProgressEmitter::new(
            &store,
            "sess-1",
            MetricNormalizer::new(TaskType::Reinforcement),
            &sinks,
        );

        let ctx = TrainContext { descriptor: &descriptor, params: &params, dataset: &dataset };
        let outcome = ReinforcementTrainer.run(ctx, &mut emitter).await.unwrap();

        let session = store.get("sess-1").unwrap();
        assert_eq!(session.progress, 100.0);
        // Reward metric exists only after the evaluation rollout
        assert_eq!(outcome.metrics.metric_name.as_str(), "Reward");
        assert!(outcome.metrics.accuracy > 0.0);
        assert!((0.0..=100.0).contains(&outcome.metrics.accuracy_percent));
        assert_eq!(outcome.total_epochs, EVAL_EPISODES);
        assert_eq!(outcome.artifact.kind, ArtifactKind::RlPolicy);
    }

    #[test]
    fn test_discretize_covers_range() {
        assert_eq!(discretize(-1.0, 0.25, 6), 0);
        assert_eq!(discretize(0.0, 0.25, 6), 3);
        assert_eq!(discretize(1.0, 0.25, 6), 5);
    }

    #[test]
    fn test_policy_improves_over_random() {
        let mut env = PoleBalanceEnv::new(42);
        let mut agent = QLearningAgent::new(0.1, 20_000, 7);

        let untrained: f64 =
            (0..10).map(|_| agent.evaluate_episode(&mut env)).sum::<f64>() / 10.0;
        agent.learn(&mut env, 20_000);
        let trained: f64 =
            (0..10).map(|_| agent.evaluate_episode(&mut env)).sum::<f64>() / 10.0;

        assert!(
            trained >= untrained,
            "trained policy ({trained}) should not be worse than untrained ({untrained})"
        );
    }

    #[test]
    fn test_episode_always_terminates() {
        let mut env = PoleBalanceEnv::new(1);
        let agent = QLearningAgent::new(0.1, 1, 2);
        let reward = agent.evaluate_episode(&mut env);
        assert!(reward >= 1.0);
        assert!(reward <= f64::from(MAX_EPISODE_STEPS));
    }
}
