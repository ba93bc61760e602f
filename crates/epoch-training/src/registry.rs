//! Architecture-tag resolution.
//!
//! Maps `(architecture tag, task type)` to a trainer implementation. Matching
//! is case-insensitive and tolerant of separators ("Random Forest",
//! "random_forest" and "RandomForest" are the same tag). A plausible but
//! unrecognized tag never fails a run: it resolves to the task's default
//! trainer and the substitution is reported so the runner can log it.

use crate::model::TaskType;
use crate::trainer::Trainer;
use crate::trainers::{EnsembleTrainer, IterativeTrainer, ReinforcementTrainer};
use std::sync::Arc;

/// Trainer family an architecture tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Iterative,
    Ensemble,
    Reinforcement,
}

/// Result of a registry lookup.
#[derive(Clone)]
pub struct Resolution {
    pub trainer: Arc<dyn Trainer>,
    /// Set when the tag did not resolve directly and the task default was
    /// substituted; carries a loggable description.
    pub fallback: Option<String>,
}

pub struct TrainerRegistry {
    iterative: Arc<dyn Trainer>,
    ensemble: Arc<dyn Trainer>,
    reinforcement: Arc<dyn Trainer>,
}

impl Default for TrainerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TrainerRegistry {
    /// Registry over the built-in trainer implementations.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(IterativeTrainer),
            Arc::new(EnsembleTrainer::new()),
            Arc::new(ReinforcementTrainer),
        )
    }

    /// Registry with explicit implementations (tests inject failing or
    /// instrumented trainers through this).
    #[must_use]
    pub fn new(
        iterative: Arc<dyn Trainer>,
        ensemble: Arc<dyn Trainer>,
        reinforcement: Arc<dyn Trainer>,
    ) -> Self {
        Self { iterative, ensemble, reinforcement }
    }

    /// Resolves an architecture tag for a task.
    #[must_use]
    pub fn resolve(&self, architecture: &str, task_type: TaskType) -> Resolution {
        let family = family_for(architecture);
        let default_family = default_family_for(task_type);

        match family {
            // A recognized family still has to fit the task: an RL algorithm
            // cannot train a tabular dataset and vice versa.
            Some(family) if family_fits(family, task_type) => {
                Resolution { trainer: self.trainer_for(family), fallback: None }
            }
            _ => {
                let reason = if architecture.trim().is_empty() {
                    format!("no architecture given; using {} default", task_type)
                } else {
                    format!(
                        "architecture '{}' not recognized for {} task; using default",
                        architecture, task_type
                    )
                };
                Resolution { trainer: self.trainer_for(default_family), fallback: Some(reason) }
            }
        }
    }

    fn trainer_for(&self, family: Family) -> Arc<dyn Trainer> {
        match family {
            Family::Iterative => Arc::clone(&self.iterative),
            Family::Ensemble => Arc::clone(&self.ensemble),
            Family::Reinforcement => Arc::clone(&self.reinforcement),
        }
    }
}

fn normalize(tag: &str) -> String {
    tag.to_uppercase().chars().filter(char::is_ascii_alphanumeric).collect()
}

fn family_for(architecture: &str) -> Option<Family> {
    let tag = normalize(architecture);
    if tag.is_empty() {
        return None;
    }

    // Ensemble names arrive in many spellings; substring matching keeps
    // "Random Forest", "random_forest" and "XGBoost" all in the family.
    if tag.contains("FOREST")
        || tag.contains("BOOST")
        || tag == "RANDOM"
        || tag == "GB"
        || tag == "XGB"
        || tag.contains("LIGHTGBM")
    {
        return Some(Family::Ensemble);
    }

    match tag.as_str() {
        "DQN" | "PPO" | "A2C" | "SAC" | "TD3" | "DDPG" => Some(Family::Reinforcement),
        "RNN" | "LSTM" | "GRU" | "CNN" | "MLP" | "DENSE" | "TRANSFORMER" | "BERT" | "T5"
        | "RESNET" | "VGG" | "INCEPTION" => Some(Family::Iterative),
        tag if tag.starts_with("GPT") => Some(Family::Iterative),
        _ => None,
    }
}

fn default_family_for(task_type: TaskType) -> Family {
    match task_type {
        // Unrecognized tags on tabular data get the single-call ensemble
        // default; an environment task can only mean reinforcement learning.
        TaskType::Classification | TaskType::Regression => Family::Ensemble,
        TaskType::Reinforcement => Family::Reinforcement,
    }
}

fn family_fits(family: Family, task_type: TaskType) -> bool {
    match task_type {
        TaskType::Classification | TaskType::Regression => family != Family::Reinforcement,
        TaskType::Reinforcement => family == Family::Reinforcement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TrainerRegistry {
        TrainerRegistry::with_defaults()
    }

    #[test]
    fn test_known_iterative_tags() {
        for tag in ["LSTM", "lstm", "GRU", "CNN", "GPT-2", "gpt"] {
            let resolution = registry().resolve(tag, TaskType::Classification);
            assert_eq!(resolution.trainer.id(), "sgd-iterative", "{tag}");
            assert!(resolution.fallback.is_none(), "{tag}");
        }
    }

    #[test]
    fn test_ensemble_tags_tolerate_spellings() {
        for tag in ["RandomForest", "Random Forest", "random_forest", "XGBoost", "xgb",
            "Gradient Boosting", "LightGBM"]
        {
            let resolution = registry().resolve(tag, TaskType::Classification);
            assert_eq!(resolution.trainer.id(), "ensemble", "{tag}");
            assert!(resolution.fallback.is_none(), "{tag}");
        }
    }

    #[test]
    fn test_reinforcement_tags() {
        for tag in ["DQN", "ppo", "A2C", "SAC", "TD3"] {
            let resolution = registry().resolve(tag, TaskType::Reinforcement);
            assert_eq!(resolution.trainer.id(), "q-learning", "{tag}");
            assert!(resolution.fallback.is_none(), "{tag}");
        }
    }

    #[test]
    fn test_unknown_tag_falls_back_to_task_default() {
        let resolution = registry().resolve("unknown-arch", TaskType::Classification);
        assert_eq!(resolution.trainer.id(), "ensemble");
        assert!(resolution.fallback.is_some());

        let resolution = registry().resolve("unknown-arch", TaskType::Reinforcement);
        assert_eq!(resolution.trainer.id(), "q-learning");
        assert!(resolution.fallback.is_some());
    }

    #[test]
    fn test_family_task_mismatch_falls_back() {
        // An RL algorithm name on tabular data is a substitution, not an error
        let resolution = registry().resolve("DQN", TaskType::Regression);
        assert_eq!(resolution.trainer.id(), "ensemble");
        assert!(resolution.fallback.is_some());

        let resolution = registry().resolve("LSTM", TaskType::Reinforcement);
        assert_eq!(resolution.trainer.id(), "q-learning");
        assert!(resolution.fallback.is_some());
    }

    #[test]
    fn test_missing_tag_uses_default_quietly_logged() {
        let resolution = registry().resolve("", TaskType::Regression);
        assert_eq!(resolution.trainer.id(), "ensemble");
        assert!(resolution.fallback.unwrap().contains("no architecture given"));
    }
}
